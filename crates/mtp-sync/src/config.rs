//! Transfer configuration.

use std::env;

use serde::Deserialize;

/// Default chunk size for content transfers (64 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;
/// Smallest accepted chunk size. One full-speed USB bulk packet.
pub const MIN_BLOCK_SIZE: usize = 512;
/// Largest accepted chunk size (16 MiB).
pub const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;
/// Session ID used when opening a device session.
pub const DEFAULT_SESSION_ID: u32 = 1;

/// Tunables for one device session.
/// Priority: environment variables > user settings > defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Chunk size for push, and the buffer capacity for pull. Always within
    /// [`MIN_BLOCK_SIZE`, `MAX_BLOCK_SIZE`].
    pub block_size: usize,
    /// Must be non-zero.
    pub session_id: u32,
    /// Whether to end a payload that fills whole USB packets with a zero-length write.
    pub zero_length_terminator: bool,
}

/// User-facing settings, as stored in a JSON settings file.
///
/// Note: Uses serde aliases to accept both camelCase and snake_case keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferSettings {
    #[serde(alias = "blockSize", default)]
    pub block_size: Option<usize>,
    #[serde(alias = "sessionId", default)]
    pub session_id: Option<u32>,
    #[serde(alias = "zeroLengthTerminator", alias = "zlp", default)]
    pub zero_length_terminator: Option<bool>,
}

impl TransferConfig {
    /// Load configuration from environment variables only.
    pub fn from_env() -> Self {
        Self::from_settings_and_env(&TransferSettings::default())
    }

    /// Load configuration with priority: env vars > user settings > defaults.
    pub fn from_settings_and_env(settings: &TransferSettings) -> Self {
        Self::resolve(settings, |key| env::var(key).ok())
    }

    /// Parses a JSON settings object and applies env overrides on top of it.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let settings: TransferSettings = serde_json::from_str(json)?;
        Ok(Self::from_settings_and_env(&settings))
    }

    fn resolve(settings: &TransferSettings, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // 1. MTP_SYNC_BLOCK_SIZE env var
        // 2. blockSize setting
        // 3. Default: 64 KiB
        let block_size = lookup("MTP_SYNC_BLOCK_SIZE")
            .and_then(|v| v.trim().parse().ok())
            .or(settings.block_size)
            .unwrap_or(DEFAULT_BLOCK_SIZE)
            .clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);

        // Zero is not a valid session ID, fall back to the default
        let session_id = lookup("MTP_SYNC_SESSION_ID")
            .and_then(|v| v.trim().parse().ok())
            .or(settings.session_id)
            .filter(|id| *id != 0)
            .unwrap_or(DEFAULT_SESSION_ID);

        let zero_length_terminator = lookup("MTP_SYNC_ZLP")
            .map(|v| v == "true" || v == "1")
            .or(settings.zero_length_terminator)
            .unwrap_or(true);

        Self {
            block_size,
            session_id,
            zero_length_terminator,
        }
    }

    /// Returns a copy with a different block size, clamped to the accepted range.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.clamp(MIN_BLOCK_SIZE, MAX_BLOCK_SIZE);
        self
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            session_id: DEFAULT_SESSION_ID,
            zero_length_terminator: true,
        }
    }
}

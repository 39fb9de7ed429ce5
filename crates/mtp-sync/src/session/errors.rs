//! Error types for session operations.

use serde::Serialize;

use crate::ptp::{CodecError, ObjectFormat, ObjectPropCode, OperationCode, ResponseCode};
use crate::transport::TransportError;
use crate::types::{MetadataField, ObjectHandle};

/// Low-level cause of a failed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum WireError {
    /// The transport failed before the transaction completed.
    Transport { error: TransportError },
    /// The device answered with a non-OK response code.
    Response { operation: OperationCode, code: ResponseCode },
    /// The device sent data we couldn't decode.
    Malformed { message: String },
}

impl WireError {
    /// True for failures that may clear up on their own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                error: TransportError::Timeout
            } | Self::Response {
                code: ResponseCode::DeviceBusy,
                ..
            }
        )
    }

    /// Response code the device sent, if the failure came from a response.
    pub fn response_code(&self) -> Option<ResponseCode> {
        match self {
            Self::Response { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport { error } => write!(f, "transport: {error}"),
            Self::Response { operation, code } => write!(f, "{operation} failed with {code}"),
            Self::Malformed { message } => write!(f, "malformed data: {message}"),
        }
    }
}

impl From<TransportError> for WireError {
    fn from(error: TransportError) -> Self {
        Self::Transport { error }
    }
}

impl From<CodecError> for WireError {
    fn from(e: CodecError) -> Self {
        Self::Malformed { message: e.message }
    }
}

/// Why an object's info couldn't be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ObjectInfoFault {
    /// GetObjectInfo failed.
    Wire { error: WireError },
    /// The object is a folder.
    Association,
    /// The object isn't one of the track formats.
    UnsupportedFormat { format: ObjectFormat },
}

impl std::fmt::Display for ObjectInfoFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wire { error } => write!(f, "{error}"),
            Self::Association => write!(f, "object is a folder"),
            Self::UnsupportedFormat { format } => write!(f, "format {format} is not a track"),
        }
    }
}

/// Which way content was moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Device to host.
    Download,
    /// Host to device.
    Upload,
}

/// Why a content transfer failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum TransferFault {
    Wire { error: WireError },
    /// The source ran dry before the declared size.
    ShortRead { expected: u64, actual: u64 },
    /// Reading the source failed.
    Source { message: String },
    /// Writing the destination failed.
    Sink { message: String },
    /// The device delivered a different byte count than it declared.
    SizeMismatch { expected: u64, actual: u64 },
}

impl std::fmt::Display for TransferFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wire { error } => write!(f, "{error}"),
            Self::ShortRead { expected, actual } => {
                write!(f, "source ended after {actual} of {expected} bytes")
            }
            Self::Source { message } => write!(f, "source read failed: {message}"),
            Self::Sink { message } => write!(f, "destination write failed: {message}"),
            Self::SizeMismatch { expected, actual } => {
                write!(f, "received {actual} bytes, object declares {expected}")
            }
        }
    }
}

impl From<WireError> for TransferFault {
    fn from(error: WireError) -> Self {
        Self::Wire { error }
    }
}

/// Error types for session operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum MtpError {
    /// Listing object handles failed.
    Enumeration { cause: WireError },
    /// An object's info couldn't be read, or the object isn't a track.
    ObjectInfo { handle: ObjectHandle, cause: ObjectInfoFault },
    /// Reading one property failed. Catalog builds absorb this per field.
    PropertyRead {
        handle: ObjectHandle,
        property: ObjectPropCode,
        cause: WireError,
    },
    /// Writing one metadata field failed. Earlier fields stay applied.
    PropertyWrite {
        handle: ObjectHandle,
        field: MetadataField,
        cause: WireError,
    },
    /// The device refused to create the object.
    CreateObject { cause: WireError },
    /// Moving content failed.
    ContentTransfer {
        direction: TransferDirection,
        cause: TransferFault,
    },
    /// The progress callback asked to stop.
    Cancelled { bytes_sent: u64, total: u64 },
    /// Deleting an object failed.
    Delete { handle: ObjectHandle, cause: WireError },
}

impl MtpError {
    pub(super) fn upload(cause: impl Into<TransferFault>) -> Self {
        Self::ContentTransfer {
            direction: TransferDirection::Upload,
            cause: cause.into(),
        }
    }

    pub(super) fn download(cause: impl Into<TransferFault>) -> Self {
        Self::ContentTransfer {
            direction: TransferDirection::Download,
            cause: cause.into(),
        }
    }

    /// Returns true if the operation may succeed if retried.
    ///
    /// Only read-only operations qualify, and only for timeouts and busy devices.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Enumeration { cause } => cause.is_transient(),
            Self::ObjectInfo {
                cause: ObjectInfoFault::Wire { error },
                ..
            } => error.is_transient(),
            Self::ContentTransfer {
                direction: TransferDirection::Download,
                cause: TransferFault::Wire { error },
            } => error.is_transient(),
            _ => false,
        }
    }

    /// Returns a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        let device_said = |cause: &WireError| match cause {
            WireError::Transport {
                error: TransportError::Disconnected | TransportError::NoDevice,
            } => "The device was disconnected. Reconnect it to continue.".to_string(),
            WireError::Transport {
                error: TransportError::Timeout,
            } => "The device stopped responding. Try again.".to_string(),
            WireError::Response {
                code: ResponseCode::DeviceBusy,
                ..
            } => "The device is busy. Wait a moment and try again.".to_string(),
            WireError::Response {
                code: ResponseCode::StoreFull,
                ..
            } => "The device storage is full. Free up some space.".to_string(),
            WireError::Response {
                code: ResponseCode::StoreReadOnly | ResponseCode::ObjectWriteProtected,
                ..
            } => "The device doesn't allow changes to this item.".to_string(),
            other => format!("The device reported an error: {other}."),
        };
        match self {
            Self::Enumeration { cause } => format!("Couldn't list tracks. {}", device_said(cause)),
            Self::ObjectInfo { handle, cause } => match cause {
                ObjectInfoFault::Wire { error } => {
                    format!("Couldn't read object {handle}. {}", device_said(error))
                }
                ObjectInfoFault::Association => format!("Object {handle} is a folder, not a track."),
                ObjectInfoFault::UnsupportedFormat { .. } => {
                    format!("Object {handle} isn't a supported audio track.")
                }
            },
            Self::PropertyRead { handle, cause, .. } => {
                format!("Couldn't read a property of object {handle}. {}", device_said(cause))
            }
            Self::PropertyWrite { field, cause, .. } => {
                format!("Couldn't set the {}. {}", field.label(), device_said(cause))
            }
            Self::CreateObject { cause } => {
                format!("The device refused the new track. {}", device_said(cause))
            }
            Self::ContentTransfer { cause, .. } => match cause {
                TransferFault::Wire { error } => format!("The transfer failed. {}", device_said(error)),
                other => format!("The transfer failed: {other}."),
            },
            Self::Cancelled { .. } => "The transfer was cancelled.".to_string(),
            Self::Delete { handle, cause } => {
                format!("Couldn't delete object {handle}. {}", device_said(cause))
            }
        }
    }
}

impl std::fmt::Display for MtpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enumeration { cause } => write!(f, "Couldn't enumerate objects: {cause}"),
            Self::ObjectInfo { handle, cause } => write!(f, "Object info for {handle}: {cause}"),
            Self::PropertyRead {
                handle,
                property,
                cause,
            } => write!(f, "Reading {property} of {handle}: {cause}"),
            Self::PropertyWrite { handle, field, cause } => {
                write!(f, "Writing {} of {handle}: {cause}", field.label())
            }
            Self::CreateObject { cause } => write!(f, "Couldn't create object: {cause}"),
            Self::ContentTransfer { direction, cause } => match direction {
                TransferDirection::Download => write!(f, "Download failed: {cause}"),
                TransferDirection::Upload => write!(f, "Upload failed: {cause}"),
            },
            Self::Cancelled { bytes_sent, total } => {
                write!(f, "Cancelled after {bytes_sent} of {total} bytes")
            }
            Self::Delete { handle, cause } => write!(f, "Couldn't delete {handle}: {cause}"),
        }
    }
}

impl std::error::Error for MtpError {}

/// Error types for opening a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ConnectError {
    /// The transport has no device behind it.
    NoDeviceFound,
    /// The device was there but the session handshake failed.
    ConnectionError { message: String },
}

impl ConnectError {
    pub(super) fn from_wire(e: &WireError) -> Self {
        match e {
            WireError::Transport {
                error: TransportError::NoDevice,
            } => Self::NoDeviceFound,
            other => Self::ConnectionError {
                message: other.to_string(),
            },
        }
    }
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoDeviceFound => write!(f, "No MTP device found"),
            Self::ConnectionError { message } => write!(f, "Couldn't open MTP session: {message}"),
        }
    }
}

impl std::error::Error for ConnectError {}

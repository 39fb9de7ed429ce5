//! Shared fixtures for session tests.

use super::MtpSession;
use crate::config::TransferConfig;
use crate::ptp::{ObjectFormat, ObjectPropCode, PropertyValue};
use crate::transport::VirtualDevice;
use crate::types::ObjectHandle;

pub(super) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Opens a session on `device`, keeping a clone for inspection.
pub(super) fn connect_with(device: &VirtualDevice, config: TransferConfig) -> MtpSession<VirtualDevice> {
    init_logging();
    MtpSession::open(device.clone(), config).unwrap()
}

pub(super) fn connect(device: &VirtualDevice) -> MtpSession<VirtualDevice> {
    connect_with(device, TransferConfig::default())
}

/// Adds an MP3 with the given title and artist.
pub(super) fn add_song(device: &VirtualDevice, filename: &str, title: &str, artist: &str, data: Vec<u8>) -> ObjectHandle {
    let handle = device.add_track(filename, ObjectFormat::Mp3, data);
    device.set_property(handle, ObjectPropCode::Name, PropertyValue::String(title.to_string()));
    device.set_property(handle, ObjectPropCode::Artist, PropertyValue::String(artist.to_string()));
    handle
}

/// Deterministic payload of `len` bytes.
pub(super) fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

//! Tests for host-to-device transfers and rollback.

use std::io::{self, Cursor, Read};
use std::ops::ControlFlow;

use super::test_support::{connect, connect_with, payload};
use super::{CatalogFilter, MtpError, TransferDirection, TransferFault};
use crate::config::TransferConfig;
use crate::ptp::{ObjectFormat, ObjectPropCode, OperationCode, PropertyValue, ResponseCode};
use crate::transport::VirtualDevice;
use crate::types::{Codec, MetadataField, ObjectHandle, TrackMetadata};

fn track(filename: &str, size: usize) -> TrackMetadata {
    TrackMetadata {
        filename: filename.to_string(),
        file_size: size as u64,
        codec: Codec::Mp3,
        ..Default::default()
    }
}

// ============================================================================
// Zero-length termination
// ============================================================================

#[test]
fn test_packet_multiple_gets_one_zero_length_write() {
    let device = VirtualDevice::new().with_packet_size(512);
    let mut session = connect_with(&device, TransferConfig::default().with_block_size(1024));
    session.create_object("a.mp3", ObjectFormat::Mp3, 1024).unwrap();
    device.clear_write_log();

    session.push(&mut Cursor::new(payload(1024)), 1024, None).unwrap();

    assert_eq!(device.write_log(), vec![12, 1024, 0]);
}

#[test]
fn test_non_multiple_gets_no_zero_length_write() {
    let device = VirtualDevice::new().with_packet_size(512);
    let mut session = connect_with(&device, TransferConfig::default().with_block_size(1024));
    let handle = session.create_object("a.mp3", ObjectFormat::Mp3, 1025).unwrap();
    device.clear_write_log();

    session.push(&mut Cursor::new(payload(1025)), 1025, None).unwrap();

    assert_eq!(device.write_log(), vec![12, 1024, 1]);
    assert_eq!(device.object_data(handle), Some(payload(1025)));
}

#[test]
fn test_zero_length_terminator_can_be_disabled() {
    let device = VirtualDevice::new();
    let config = TransferConfig {
        zero_length_terminator: false,
        ..TransferConfig::default()
    };
    let mut session = connect_with(&device, config);
    session.create_object("a.mp3", ObjectFormat::Mp3, 512).unwrap();
    device.clear_write_log();

    session.push(&mut Cursor::new(payload(512)), 512, None).unwrap();

    assert_eq!(device.write_log(), vec![12, 512]);
}

// ============================================================================
// Progress and cancellation
// ============================================================================

#[test]
fn test_progress_reports_before_each_chunk_and_at_end() {
    let device = VirtualDevice::new();
    let mut session = connect_with(&device, TransferConfig::default().with_block_size(1000));
    session.create_object("a.mp3", ObjectFormat::Mp3, 2500).unwrap();

    let mut calls = Vec::new();
    let mut record = |sent: u64, total: u64| {
        calls.push((sent, total));
        ControlFlow::Continue(())
    };
    session
        .push(&mut Cursor::new(payload(2500)), 2500, Some(&mut record))
        .unwrap();

    assert_eq!(calls, vec![(0, 2500), (1000, 2500), (2000, 2500), (2500, 2500)]);
}

#[test]
fn test_cancel_stops_before_next_chunk() {
    let device = VirtualDevice::new();
    let mut session = connect_with(&device, TransferConfig::default().with_block_size(1024));
    let mut metadata = track("a.mp3", 4096);

    let mut cancel_at_half = |sent: u64, _total: u64| {
        if sent >= 2048 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    };
    device.clear_write_log();
    let err = session
        .send_track(&mut Cursor::new(payload(4096)), &mut metadata, Some(&mut cancel_at_half))
        .unwrap_err();

    assert_eq!(
        err,
        MtpError::Cancelled {
            bytes_sent: 2048,
            total: 4096
        }
    );
    // ObjectInfo dataset, then header and two chunks. The third chunk never goes out.
    let log = device.write_log();
    assert_eq!(&log[1..], &[12, 1024, 1024]);

    // The half-written object was rolled back
    let created = device
        .transactions()
        .iter()
        .find(|t| t.operation == OperationCode::DeleteObject)
        .map(|t| t.params[0])
        .unwrap();
    assert!(!device.contains(ObjectHandle(created)));
    assert!(metadata.object_handle.is_none());

    // Deleting it again is an error, not a crash
    let again = session.delete_object(ObjectHandle(created)).unwrap_err();
    match again {
        MtpError::Delete { cause, .. } => {
            assert_eq!(cause.response_code(), Some(ResponseCode::InvalidObjectHandle));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

// ============================================================================
// Push failures
// ============================================================================

/// Source that yields `limit` bytes, then reports end of input.
struct Truncated {
    limit: usize,
    inner: Cursor<Vec<u8>>,
}

impl Read for Truncated {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.limit.saturating_sub(self.inner.position() as usize);
        let n = buf.len().min(left);
        self.inner.read(&mut buf[..n])
    }
}

#[test]
fn test_short_source_aborts_push() {
    let device = VirtualDevice::new();
    let mut session = connect(&device);
    session.create_object("a.mp3", ObjectFormat::Mp3, 100).unwrap();

    let mut source = Truncated {
        limit: 60,
        inner: Cursor::new(payload(100)),
    };
    let err = session.push(&mut source, 100, None).unwrap_err();
    assert_eq!(
        err,
        MtpError::ContentTransfer {
            direction: TransferDirection::Upload,
            cause: TransferFault::ShortRead {
                expected: 100,
                actual: 60
            },
        }
    );
}

#[test]
fn test_failing_source_aborts_push() {
    struct Broken;
    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("bad sector"))
        }
    }

    let device = VirtualDevice::new();
    let mut session = connect(&device);
    session.create_object("a.mp3", ObjectFormat::Mp3, 10).unwrap();

    let err = session.push(&mut Broken, 10, None).unwrap_err();
    assert!(matches!(
        err,
        MtpError::ContentTransfer {
            cause: TransferFault::Source { .. },
            ..
        }
    ));
}

// ============================================================================
// send_track
// ============================================================================

#[test]
fn test_send_track_then_list() {
    let device = VirtualDevice::new();
    let mut session = connect(&device);
    // Enumerate first so the cache exists and must pick up the new handle
    assert!(session.list_tracks(&CatalogFilter::all()).unwrap().is_empty());

    let mut metadata = TrackMetadata {
        title: Some("Song".to_string()),
        artist: Some("Band".to_string()),
        duration: Some(180),
        ..track("song.mp3", 3000)
    };
    let handle = session
        .send_track(&mut Cursor::new(payload(3000)), &mut metadata, None)
        .unwrap();

    assert_eq!(metadata.object_handle, Some(handle));
    assert_eq!(device.object_data(handle).map(|d| d.len()), Some(3000));
    assert_eq!(device.object_info(handle).unwrap().format, ObjectFormat::Mp3);

    let tracks = session.list_tracks(&CatalogFilter::all()).unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].object_handle, Some(handle));
    assert_eq!(tracks[0].title.as_deref(), Some("Song"));
    assert_eq!(tracks[0].file_size, 3000);
}

#[test]
fn test_send_object_info_goes_to_device_chosen_location() {
    let device = VirtualDevice::new();
    let mut session = connect(&device);
    session.create_object("a.mp3", ObjectFormat::Mp3, 1).unwrap();

    let create = device
        .transactions()
        .into_iter()
        .find(|t| t.operation == OperationCode::SendObjectInfo)
        .unwrap();
    assert_eq!(create.params, vec![0, 0]);
}

#[test]
fn test_unknown_codec_is_sent_as_undefined() {
    let device = VirtualDevice::new();
    let mut session = connect(&device);
    let mut metadata = TrackMetadata {
        codec: Codec::Unknown,
        ..track("mystery.bin", 10)
    };
    let handle = session
        .send_track(&mut Cursor::new(payload(10)), &mut metadata, None)
        .unwrap();
    assert_eq!(device.object_info(handle).unwrap().format, ObjectFormat::Undefined);
}

#[test]
fn test_create_failure_leaves_nothing_behind() {
    let device = VirtualDevice::new();
    device.fail_next(OperationCode::SendObjectInfo, ResponseCode::StoreFull);
    let mut session = connect(&device);

    let err = session
        .send_track(&mut Cursor::new(payload(10)), &mut track("a.mp3", 10), None)
        .unwrap_err();

    assert!(matches!(err, MtpError::CreateObject { .. }));
    assert!(device.handles().is_empty());
    assert!(
        !device
            .transactions()
            .iter()
            .any(|t| t.operation == OperationCode::SendObject || t.operation == OperationCode::DeleteObject)
    );
}

#[test]
fn test_transfer_failure_rolls_back() {
    let device = VirtualDevice::new();
    let mut session = connect(&device);
    session.list_tracks(&CatalogFilter::all()).unwrap();
    // Object info and the data header get through, the first chunk doesn't
    device.fail_writes_after(2);

    let err = session
        .send_track(&mut Cursor::new(payload(5000)), &mut track("a.mp3", 5000), None)
        .unwrap_err();

    assert!(matches!(
        err,
        MtpError::ContentTransfer {
            direction: TransferDirection::Upload,
            cause: TransferFault::Wire { .. },
        }
    ));
    assert!(device.handles().is_empty());
    assert!(session.list_tracks(&CatalogFilter::all()).unwrap().is_empty());
}

#[test]
fn test_bad_final_response_rolls_back() {
    let device = VirtualDevice::new();
    device.fail_next(OperationCode::SendObject, ResponseCode::IncompleteTransfer);
    let mut session = connect(&device);

    let err = session
        .send_track(&mut Cursor::new(payload(700)), &mut track("a.mp3", 700), None)
        .unwrap_err();

    match err {
        MtpError::ContentTransfer {
            cause: TransferFault::Wire { error },
            ..
        } => assert_eq!(error.response_code(), Some(ResponseCode::IncompleteTransfer)),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(device.handles().is_empty());
}

#[test]
fn test_metadata_failure_rolls_back() {
    let device = VirtualDevice::new();
    device.fail_property(ObjectPropCode::Genre, ResponseCode::AccessDenied);
    let mut session = connect(&device);

    let mut metadata = TrackMetadata {
        title: Some("Song".to_string()),
        genre: Some("Jazz".to_string()),
        ..track("a.mp3", 100)
    };
    let err = session
        .send_track(&mut Cursor::new(payload(100)), &mut metadata, None)
        .unwrap_err();

    assert!(matches!(
        err,
        MtpError::PropertyWrite {
            field: MetadataField::Genre,
            ..
        }
    ));
    assert!(device.handles().is_empty());
    assert!(metadata.object_handle.is_none());
}

#[test]
fn test_failed_rollback_keeps_original_error() {
    let device = VirtualDevice::new();
    device.fail_next(OperationCode::SendObject, ResponseCode::GeneralError);
    device.fail_next(OperationCode::DeleteObject, ResponseCode::ObjectWriteProtected);
    let mut session = connect(&device);

    let err = session
        .send_track(&mut Cursor::new(payload(10)), &mut track("a.mp3", 10), None)
        .unwrap_err();

    assert!(matches!(
        err,
        MtpError::ContentTransfer {
            direction: TransferDirection::Upload,
            ..
        }
    ));
    // Rollback was attempted exactly once
    let deletes = device
        .transactions()
        .iter()
        .filter(|t| t.operation == OperationCode::DeleteObject)
        .count();
    assert_eq!(deletes, 1);
}

#[test]
fn test_send_track_from_file_fills_size_and_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("from disk.mp3");
    std::fs::write(&path, payload(2048)).unwrap();

    let device = VirtualDevice::new();
    let mut session = connect(&device);
    let mut metadata = TrackMetadata {
        codec: Codec::Mp3,
        title: Some("Disk".to_string()),
        ..Default::default()
    };
    let handle = session.send_track_from_file(&path, &mut metadata, None).unwrap();

    assert_eq!(metadata.file_size, 2048);
    assert_eq!(metadata.filename, "from disk.mp3");
    assert_eq!(device.object_data(handle), Some(payload(2048)));
    assert_eq!(
        device.property(handle, ObjectPropCode::Name),
        Some(PropertyValue::String("Disk".to_string()))
    );
}

#[test]
fn test_send_track_from_missing_file() {
    let device = VirtualDevice::new();
    let mut session = connect(&device);
    let mut metadata = track("", 0);
    let err = session
        .send_track_from_file(std::path::Path::new("/nonexistent/track.mp3"), &mut metadata, None)
        .unwrap_err();
    assert!(matches!(
        err,
        MtpError::ContentTransfer {
            cause: TransferFault::Source { .. },
            ..
        }
    ));
    assert!(device.handles().is_empty());
}

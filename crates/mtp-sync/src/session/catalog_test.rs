//! Tests for track enumeration and record building.

use super::test_support::{add_song, connect};
use super::{CatalogFilter, MtpError, ObjectInfoFault};
use crate::ptp::{ObjectFormat, ObjectPropCode, OperationCode, PropertyValue, ResponseCode};
use crate::transport::VirtualDevice;
use crate::types::{Codec, ObjectHandle, StorageId};

#[test]
fn test_lists_tracks_in_enumeration_order() {
    let device = VirtualDevice::new();
    let first = add_song(&device, "one.mp3", "One", "Band", vec![0; 10]);
    let second = add_song(&device, "two.mp3", "Two", "Band", vec![0; 20]);
    let mut session = connect(&device);

    let tracks = session.list_tracks(&CatalogFilter::all()).unwrap();

    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].object_handle, Some(first));
    assert_eq!(tracks[0].title.as_deref(), Some("One"));
    assert_eq!(tracks[0].filename, "one.mp3");
    assert_eq!(tracks[0].file_size, 10);
    assert_eq!(tracks[0].codec, Codec::Mp3);
    assert_eq!(tracks[1].object_handle, Some(second));
    assert_eq!(tracks[1].artist.as_deref(), Some("Band"));
}

#[test]
fn test_skips_folders_and_non_audio() {
    let device = VirtualDevice::new();
    device.add_folder("Music");
    device.add_track("notes.txt", ObjectFormat::Undefined, b"hi".to_vec());
    device.add_track("cover.jpg", ObjectFormat::Unknown(0x3801), vec![0; 4]);
    let wav = device.add_track("a.wav", ObjectFormat::Wav, vec![0; 4]);
    let wma = device.add_track("b.wma", ObjectFormat::Wma, vec![0; 4]);
    let mut session = connect(&device);

    let tracks = session.list_tracks(&CatalogFilter::all()).unwrap();
    let handles: Vec<_> = tracks.iter().filter_map(|t| t.object_handle).collect();
    assert_eq!(handles, vec![wav, wma]);
}

#[test]
fn test_partial_metadata_is_valid() {
    let device = VirtualDevice::new();
    let handle = device.add_track("bare.mp3", ObjectFormat::Mp3, vec![0; 7]);
    device.set_property(handle, ObjectPropCode::Name, PropertyValue::String("Only title".to_string()));
    let mut session = connect(&device);

    let tracks = session.list_tracks(&CatalogFilter::all()).unwrap();

    assert_eq!(tracks.len(), 1);
    let track = &tracks[0];
    assert_eq!(track.title.as_deref(), Some("Only title"));
    assert_eq!(track.file_size, 7);
    assert!(track.artist.is_none());
    assert!(track.album.is_none());
    assert!(track.genre.is_none());
    assert!(track.release_date.is_none());
    assert!(track.duration.is_none());
    assert!(track.track_number.is_none());
}

#[test]
fn test_reads_properties_in_catalog_order() {
    let device = VirtualDevice::new();
    device.add_track("a.mp3", ObjectFormat::Mp3, vec![0; 3]);
    let mut session = connect(&device);
    session.list_tracks(&CatalogFilter::all()).unwrap();

    let props: Vec<u32> = device
        .transactions()
        .iter()
        .filter(|t| t.operation == OperationCode::GetObjectPropValue)
        .map(|t| t.params[1])
        .collect();
    assert_eq!(
        props,
        vec![0xDC44, 0xDC46, 0xDC89, 0xDC8B, 0xDC8C, 0xDC9A, 0xDC99]
    );
}

#[test]
fn test_numeric_properties() {
    let device = VirtualDevice::new();
    let handle = device.add_track("a.mp3", ObjectFormat::Mp3, vec![0; 3]);
    device.set_property(handle, ObjectPropCode::Duration, PropertyValue::U32(215_000));
    device.set_property(handle, ObjectPropCode::Track, PropertyValue::U16(4));
    device.set_property(handle, ObjectPropCode::Genre, PropertyValue::String("Jazz".to_string()));
    device.set_property(
        handle,
        ObjectPropCode::OriginalReleaseDate,
        PropertyValue::String("19590817T000000".to_string()),
    );
    let mut session = connect(&device);

    let track = session.track(handle).unwrap();
    assert_eq!(track.duration, Some(215_000));
    assert_eq!(track.track_number, Some(4));
    assert_eq!(track.genre.as_deref(), Some("Jazz"));
    assert_eq!(track.release_date.as_deref(), Some("19590817T000000"));
}

#[test]
fn test_failed_property_read_leaves_field_unset() {
    let device = VirtualDevice::new();
    add_song(&device, "a.mp3", "Title", "Artist", vec![0; 3]);
    device.fail_property(ObjectPropCode::Artist, ResponseCode::GeneralError);
    let mut session = connect(&device);

    let tracks = session.list_tracks(&CatalogFilter::all()).unwrap();
    assert_eq!(tracks[0].title.as_deref(), Some("Title"));
    assert!(tracks[0].artist.is_none());
}

#[test]
fn test_unreadable_object_info_is_skipped() {
    let device = VirtualDevice::new();
    add_song(&device, "a.mp3", "A", "X", vec![0; 3]);
    let second = add_song(&device, "b.mp3", "B", "X", vec![0; 3]);
    device.fail_next(OperationCode::GetObjectInfo, ResponseCode::GeneralError);
    let mut session = connect(&device);

    let tracks = session.list_tracks(&CatalogFilter::all()).unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].object_handle, Some(second));
}

#[test]
fn test_enumeration_failure_aborts() {
    let device = VirtualDevice::new();
    add_song(&device, "a.mp3", "A", "X", vec![0; 3]);
    device.fail_next(OperationCode::GetObjectHandles, ResponseCode::DeviceBusy);
    let mut session = connect(&device);

    let err = session.list_tracks(&CatalogFilter::all()).unwrap_err();
    assert!(matches!(err, MtpError::Enumeration { .. }));
    assert!(err.is_retryable());

    // Nothing was cached, so the next call enumerates again
    assert_eq!(session.list_tracks(&CatalogFilter::all()).unwrap().len(), 1);
}

#[test]
fn test_handles_are_enumerated_once_per_session() {
    let device = VirtualDevice::new();
    add_song(&device, "a.mp3", "A", "X", vec![0; 3]);
    add_song(&device, "b.mp3", "B", "Y", vec![0; 3]);
    let mut session = connect(&device);

    let first = session.list_tracks(&CatalogFilter::all()).unwrap();
    let second = session.list_tracks(&CatalogFilter::all()).unwrap();
    assert_eq!(first, second);

    let enumerations = device
        .transactions()
        .iter()
        .filter(|t| t.operation == OperationCode::GetObjectHandles)
        .count();
    assert_eq!(enumerations, 1);
}

#[test]
fn test_invalidate_handle_cache_re_enumerates() {
    let device = VirtualDevice::new();
    add_song(&device, "a.mp3", "A", "X", vec![0; 3]);
    let mut session = connect(&device);
    assert_eq!(session.list_tracks(&CatalogFilter::all()).unwrap().len(), 1);

    // Added behind the session's back
    add_song(&device, "b.mp3", "B", "Y", vec![0; 3]);
    assert_eq!(session.list_tracks(&CatalogFilter::all()).unwrap().len(), 1);

    session.invalidate_handle_cache();
    assert_eq!(session.list_tracks(&CatalogFilter::all()).unwrap().len(), 2);
}

#[test]
fn test_filter_by_codec_and_storage() {
    let device = VirtualDevice::new();
    let mp3 = device.add_track("a.mp3", ObjectFormat::Mp3, vec![0; 3]);
    device.add_track("b.wav", ObjectFormat::Wav, vec![0; 3]);
    let mut session = connect(&device);

    let filter = CatalogFilter {
        codecs: vec![Codec::Mp3],
        ..CatalogFilter::default()
    };
    let tracks = session.list_tracks(&filter).unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].object_handle, Some(mp3));

    let elsewhere = CatalogFilter {
        storage: Some(StorageId(0x0002_0001)),
        ..CatalogFilter::default()
    };
    assert!(session.list_tracks(&elsewhere).unwrap().is_empty());

    let everywhere = CatalogFilter {
        storage: Some(StorageId::ALL),
        ..CatalogFilter::default()
    };
    assert_eq!(session.list_tracks(&everywhere).unwrap().len(), 2);
}

#[test]
fn test_filter_deserializes_from_camel_case() {
    let filter: CatalogFilter = serde_json::from_str(r#"{"codecs": ["wma", "wav"]}"#).unwrap();
    assert_eq!(filter.codecs, vec![Codec::Wma, Codec::Wav]);
    assert!(filter.storage.is_none());
}

#[test]
fn test_track_rejects_folders_and_unknown_handles() {
    let device = VirtualDevice::new();
    let folder = device.add_folder("Music");
    let text = device.add_track("notes.txt", ObjectFormat::Undefined, vec![]);
    let mut session = connect(&device);

    assert!(matches!(
        session.track(folder),
        Err(MtpError::ObjectInfo {
            cause: ObjectInfoFault::Association,
            ..
        })
    ));
    assert!(matches!(
        session.track(text),
        Err(MtpError::ObjectInfo {
            cause: ObjectInfoFault::UnsupportedFormat {
                format: ObjectFormat::Undefined
            },
            ..
        })
    ));
    assert!(matches!(
        session.track(ObjectHandle(999)),
        Err(MtpError::ObjectInfo {
            cause: ObjectInfoFault::Wire { .. },
            ..
        })
    ));
}

#[test]
fn test_unsupported_format_is_skipped_before_property_reads() {
    let device = VirtualDevice::new();
    let image = device.add_track("cover.jpg", ObjectFormat::Unknown(0x3801), vec![0; 4]);
    let song = add_song(&device, "a.mp3", "A", "X", vec![0; 3]);
    let mut session = connect(&device);

    let tracks = session.list_tracks(&CatalogFilter::all()).unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].object_handle, Some(song));

    let queried: Vec<u32> = device
        .transactions()
        .iter()
        .filter(|t| t.operation == OperationCode::GetObjectPropValue)
        .map(|t| t.params[0])
        .collect();
    assert!(!queried.contains(&image.0));
    assert_eq!(queried.len(), 7);
}

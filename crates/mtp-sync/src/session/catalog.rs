//! Object catalog: handle enumeration and per-track metadata records.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::MtpSession;
use super::errors::{MtpError, ObjectInfoFault};
use crate::ptp::{DataType, ObjectInfo, ObjectPropCode, OperationCode, PropertyValue, decode_handle_array};
use crate::transport::Transport;
use crate::types::{Codec, MetadataField, ObjectHandle, StorageId, TrackMetadata};

/// Host-side narrowing of the track list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilter {
    /// Only tracks on this storage. `None` means every storage.
    #[serde(default)]
    pub storage: Option<StorageId>,
    /// Only tracks with these codecs. Empty means every recognized codec.
    #[serde(default)]
    pub codecs: Vec<Codec>,
}

impl CatalogFilter {
    /// Every track on every storage.
    pub fn all() -> Self {
        Self::default()
    }

    fn matches(&self, info: &ObjectInfo, codec: Codec) -> bool {
        if let Some(storage) = self.storage
            && storage != StorageId::ALL
            && info.storage_id != storage
        {
            return false;
        }
        self.codecs.is_empty() || self.codecs.contains(&codec)
    }
}

/// Codec of a track object, or `None` for folders and anything that isn't audio we list.
fn track_codec(info: &ObjectInfo) -> Option<Codec> {
    if info.is_association() {
        return None;
    }
    Codec::from_format(info.format)
}

impl<T: Transport> MtpSession<T> {
    /// Lists every track on the device, in device enumeration order.
    ///
    /// Enumerates handles once per session. Handles whose info can't be read are skipped,
    /// and property reads that fail leave the field unset.
    pub fn list_tracks(&mut self, filter: &CatalogFilter) -> Result<Vec<TrackMetadata>, MtpError> {
        let handles = self.object_handles()?;
        debug!("MTP list_tracks: {} handles, filter={:?}", handles.len(), filter);

        let mut tracks = Vec::new();
        for handle in handles {
            let info = match self.object_info(handle) {
                Ok(info) => info,
                Err(e) => {
                    warn!("MTP list_tracks: skipping {}: {}", handle, e);
                    continue;
                }
            };
            let Some(codec) = track_codec(&info) else {
                debug!("MTP list_tracks: skipping {}, format {} isn't a track", handle, info.format);
                continue;
            };
            if !filter.matches(&info, codec) {
                continue;
            }
            tracks.push(self.build_track(handle, &info, codec));
        }

        debug!("MTP list_tracks: {} tracks", tracks.len());
        Ok(tracks)
    }

    /// Builds the record for one track.
    pub fn track(&mut self, handle: ObjectHandle) -> Result<TrackMetadata, MtpError> {
        let info = self.object_info(handle)?;
        if info.is_association() {
            return Err(MtpError::ObjectInfo {
                handle,
                cause: ObjectInfoFault::Association,
            });
        }
        let codec = track_codec(&info).ok_or(MtpError::ObjectInfo {
            handle,
            cause: ObjectInfoFault::UnsupportedFormat { format: info.format },
        })?;
        Ok(self.build_track(handle, &info, codec))
    }

    /// Returns the device's handle list, enumerating on first use.
    pub fn object_handles(&mut self) -> Result<Vec<ObjectHandle>, MtpError> {
        if let Some(handles) = self.handles.get() {
            return Ok(handles.to_vec());
        }

        let data = self
            .read_dataset(
                OperationCode::GetObjectHandles,
                // Every storage, every format, every parent
                &[StorageId::ALL.0, 0, 0],
            )
            .map_err(|cause| MtpError::Enumeration { cause })?;
        let handles = decode_handle_array(&data).map_err(|e| MtpError::Enumeration { cause: e.into() })?;

        debug!("MTP enumerated {} objects", handles.len());
        self.handles.fill(handles.clone());
        Ok(handles)
    }

    pub fn object_info(&mut self, handle: ObjectHandle) -> Result<ObjectInfo, MtpError> {
        let fault = |error| MtpError::ObjectInfo {
            handle,
            cause: ObjectInfoFault::Wire { error },
        };
        let data = self
            .read_dataset(OperationCode::GetObjectInfo, &[handle.0])
            .map_err(fault)?;
        ObjectInfo::decode(&data).map_err(|e| fault(e.into()))
    }

    /// Reads one object property. `Ok(None)` means the device sent no value.
    pub fn read_property(
        &mut self,
        handle: ObjectHandle,
        property: ObjectPropCode,
        data_type: DataType,
    ) -> Result<Option<PropertyValue>, MtpError> {
        let fault = |cause| MtpError::PropertyRead {
            handle,
            property,
            cause,
        };
        let data = self
            .read_dataset(OperationCode::GetObjectPropValue, &[handle.0, u32::from(property.code())])
            .map_err(fault)?;
        PropertyValue::decode(&data, data_type).map_err(|e| fault(e.into()))
    }

    fn build_track(&mut self, handle: ObjectHandle, info: &ObjectInfo, codec: Codec) -> TrackMetadata {
        let mut track = TrackMetadata {
            filename: info.filename.clone(),
            file_size: info.compressed_size,
            codec,
            object_handle: Some(handle),
            ..Default::default()
        };

        for field in MetadataField::CATALOG_ORDER {
            match self.read_property(handle, field.property(), field.data_type()) {
                Ok(Some(value)) => {
                    if !track.set_field(field, value) {
                        debug!("MTP {}: {} has an unexpected type, ignoring", handle, field.label());
                    }
                }
                Ok(None) => {}
                // Absent properties are normal, leave the field unset
                Err(e) => debug!("MTP {}: no {}: {}", handle, field.label(), e),
            }
        }
        track
    }
}

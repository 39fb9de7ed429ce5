//! Track metadata writes, one property per round-trip.

use log::{debug, warn};

use super::MtpSession;
use super::errors::MtpError;
use crate::ptp::strings::fits_ptp_string;
use crate::ptp::{OperationCode, PropertyValue};
use crate::transport::Transport;
use crate::types::{MetadataField, ObjectHandle, TrackMetadata};

impl<T: Transport> MtpSession<T> {
    /// Writes every present field of `metadata` to the object.
    ///
    /// Fields go out in a fixed order (title, album, artist, genre, duration, track
    /// number, release date). Stops at the first failure; fields written before it stay
    /// applied. Filename and size are never re-sent.
    pub fn update_track_metadata(&mut self, handle: ObjectHandle, metadata: &TrackMetadata) -> Result<(), MtpError> {
        debug!("MTP update_track_metadata: handle={}", handle);
        for field in MetadataField::APPLY_ORDER {
            let Some(value) = metadata.field_value(field) else {
                continue;
            };
            self.write_property(handle, field, &value)?;
        }
        Ok(())
    }

    fn write_property(&mut self, handle: ObjectHandle, field: MetadataField, value: &PropertyValue) -> Result<(), MtpError> {
        let property = field.property();
        if let PropertyValue::String(text) = value
            && !fits_ptp_string(text)
        {
            warn!("MTP {} of {} is too long for the device and will be cut short", field.label(), handle);
        }
        self.transact_data_out(
            OperationCode::SetObjectPropValue,
            &[handle.0, u32::from(property.code())],
            &value.encode(),
        )
        .map_err(|cause| MtpError::PropertyWrite { handle, field, cause })?;
        debug!("MTP set {} on {}", field.label(), handle);
        Ok(())
    }
}

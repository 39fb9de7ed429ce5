//! Object deletion and the compensating delete used by rollback.

use log::{debug, info, warn};

use super::MtpSession;
use super::errors::MtpError;
use crate::ptp::OperationCode;
use crate::transport::Transport;
use crate::types::ObjectHandle;

impl<T: Transport> MtpSession<T> {
    /// Deletes an object from the device.
    ///
    /// A handle the device no longer knows fails with [`MtpError::Delete`].
    pub fn delete_object(&mut self, handle: ObjectHandle) -> Result<(), MtpError> {
        debug!("MTP delete_object: handle={}", handle);
        // Second parameter is the format filter, unused for a single handle
        self.transact(OperationCode::DeleteObject, &[handle.0, 0])
            .map_err(|cause| MtpError::Delete { handle, cause })?;
        self.handles.remove(handle);
        info!("MTP deleted {}", handle);
        Ok(())
    }

    /// Deletes a track. Same as [`Self::delete_object`].
    pub fn delete_track(&mut self, handle: ObjectHandle) -> Result<(), MtpError> {
        self.delete_object(handle)
    }

    /// Deletes a half-created object after `cause` made its creation fail. Attempted once;
    /// a failure is logged and otherwise ignored.
    pub(super) fn roll_back(&mut self, handle: ObjectHandle, cause: &MtpError) {
        match self.delete_object(handle) {
            Ok(()) => info!("MTP rolled back {} after: {}", handle, cause),
            Err(e) => warn!("MTP rollback of {} failed: {} (original error: {})", handle, e, cause),
        }
    }
}

//! MTP session management.
//!
//! An [`MtpSession`] owns one open device session: the transaction counter, the session
//! ID, the selected storage, the device info, and the cached handle list. Every operation
//! takes `&mut self` and blocks until the device answers.
//!
//! Operations are split across files by concern, each adding an `impl` block:
//! `catalog` (enumeration and track records), `pull_ops` (device to host), `push_ops`
//! (host to device, with rollback), `metadata_ops` (property writes), and
//! `mutation_ops` (deletes).

mod cache;
mod catalog;
pub(crate) mod errors;
mod metadata_ops;
mod mutation_ops;
mod pull_ops;
mod push_ops;

pub use catalog::CatalogFilter;
pub use errors::{ConnectError, MtpError, ObjectInfoFault, TransferDirection, TransferFault, WireError};
pub use pull_ops::ObjectSink;
pub use push_ops::ProgressFn;

use std::io::Write;

use log::{debug, info, warn};

use crate::config::TransferConfig;
use crate::ptp::{
    Container, ContainerType, DataType, DeviceInfo, DevicePropCode, OperationCode, PropertyValue, ResponseCode,
    decode_storage_ids, encode_data_header,
};
use crate::transport::Transport;
use crate::types::StorageId;
use cache::HandleCache;

/// An open session with one device.
pub struct MtpSession<T: Transport> {
    transport: T,
    config: TransferConfig,
    /// Last transaction ID used. OpenSession always goes out with 0.
    transaction_id: u32,
    storage_id: StorageId,
    device_info: DeviceInfo,
    handles: HandleCache,
    open: bool,
}

impl<T: Transport> MtpSession<T> {
    /// Opens a session on the device behind `transport`.
    ///
    /// Sends OpenSession, reads the device info, and selects the first storage the device
    /// reports. Storage 0 is used when it reports none or can't list them. No retries.
    pub fn open(transport: T, config: TransferConfig) -> Result<Self, ConnectError> {
        let mut session = Self {
            transport,
            config,
            transaction_id: 0,
            storage_id: StorageId(0),
            device_info: DeviceInfo::default(),
            handles: HandleCache::default(),
            open: false,
        };

        if let Err(e) = session.handshake() {
            warn!("MTP open failed: {}", e);
            session.shutdown();
            return Err(ConnectError::from_wire(&e));
        }

        info!(
            "MTP session {} open: {} {} (serial {}), storage 0x{:08x}",
            session.config.session_id,
            session.device_info.manufacturer,
            session.device_info.model,
            session.device_info.serial_number,
            session.storage_id.0
        );
        Ok(session)
    }

    fn handshake(&mut self) -> Result<(), WireError> {
        let session_id = self.config.session_id;
        self.send(OperationCode::OpenSession, 0, &[session_id])?;
        self.finish(OperationCode::OpenSession, 0)?;
        self.open = true;

        let data = self.read_dataset(OperationCode::GetDeviceInfo, &[])?;
        self.device_info = DeviceInfo::decode(&data)?;

        // Storage IDs are optional: a device that can't list them is used with storage 0
        match self.read_storage_ids() {
            Ok(ids) => self.storage_id = ids.first().copied().unwrap_or(StorageId(0)),
            Err(e) => warn!("MTP GetStorageIds failed, using storage 0: {}", e),
        }
        Ok(())
    }

    fn read_storage_ids(&mut self) -> Result<Vec<StorageId>, WireError> {
        let data = self.read_dataset(OperationCode::GetStorageIds, &[])?;
        Ok(decode_storage_ids(&data)?)
    }

    /// Closes the session. Dropping the session does the same.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        match self.transact(OperationCode::CloseSession, &[]) {
            Ok(_) => debug!("MTP session {} closed", self.config.session_id),
            Err(e) => warn!("MTP CloseSession failed: {}", e),
        }
        self.handles.clear();
        self.device_info = DeviceInfo::default();
    }

    // ========================================================================
    // Device info accessors
    // ========================================================================

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn model_name(&self) -> &str {
        &self.device_info.model
    }

    pub fn serial_number(&self) -> &str {
        &self.device_info.serial_number
    }

    pub fn device_version(&self) -> &str {
        &self.device_info.device_version
    }

    pub fn storage_id(&self) -> StorageId {
        self.storage_id
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Reads the device's friendly name. Returns `None` if the device doesn't have one
    /// or the read fails.
    pub fn owner_name(&mut self) -> Option<String> {
        let prop = DevicePropCode::DeviceFriendlyName;
        let data = match self.read_dataset(OperationCode::GetDevicePropValue, &[u32::from(prop.code())]) {
            Ok(data) => data,
            Err(e) => {
                debug!("MTP owner_name: {} unavailable: {}", prop, e);
                return None;
            }
        };
        match PropertyValue::decode(&data, DataType::String) {
            Ok(value) => value.and_then(|v| v.as_str().map(str::to_string)),
            Err(e) => {
                debug!("MTP owner_name: couldn't decode {}: {}", prop, e);
                None
            }
        }
    }

    /// Drops the cached handle list so the next listing re-enumerates.
    pub fn invalidate_handle_cache(&mut self) {
        self.handles.clear();
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Draws a fresh transaction ID. 0 is reserved for OpenSession and 0xFFFFFFFF is invalid.
    fn next_transaction_id(&mut self) -> u32 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        if self.transaction_id == 0 || self.transaction_id == u32::MAX {
            self.transaction_id = 1;
        }
        self.transaction_id
    }

    fn send(&mut self, operation: OperationCode, transaction_id: u32, params: &[u32]) -> Result<(), WireError> {
        let request = Container::command(operation, transaction_id, params);
        Ok(self.transport.send_request(&request)?)
    }

    /// Reads the response for `transaction_id` and turns non-OK codes into errors.
    fn finish(&mut self, operation: OperationCode, transaction_id: u32) -> Result<Container, WireError> {
        let response = self.transport.read_response()?;
        if response.kind != ContainerType::Response {
            return Err(WireError::Malformed {
                message: format!("expected a response to {}, got {:?}", operation, response.kind),
            });
        }
        if response.transaction_id != transaction_id {
            return Err(WireError::Malformed {
                message: format!(
                    "response to {} carries transaction {}, expected {}",
                    operation, response.transaction_id, transaction_id
                ),
            });
        }
        match response.response_code() {
            ResponseCode::Ok => Ok(response),
            code => Err(WireError::Response { operation, code }),
        }
    }

    /// Runs a transaction without a data phase.
    fn transact(&mut self, operation: OperationCode, params: &[u32]) -> Result<Container, WireError> {
        let transaction_id = self.next_transaction_id();
        self.send(operation, transaction_id, params)?;
        self.finish(operation, transaction_id)
    }

    /// Runs a transaction with a device-to-host data phase streamed into `sink`.
    fn transact_data_in(
        &mut self,
        operation: OperationCode,
        params: &[u32],
        sink: &mut dyn Write,
    ) -> Result<(Container, u64), WireError> {
        let transaction_id = self.next_transaction_id();
        self.send(operation, transaction_id, params)?;
        let received = self.transport.read_data(sink)?;
        let response = self.finish(operation, transaction_id)?;
        Ok((response, received))
    }

    /// Runs a transaction whose data phase is small enough to collect in memory.
    fn read_dataset(&mut self, operation: OperationCode, params: &[u32]) -> Result<Vec<u8>, WireError> {
        let mut data = Vec::new();
        self.transact_data_in(operation, params, &mut data)?;
        Ok(data)
    }

    /// Runs a transaction with a small host-to-device data phase, sent as a single write.
    fn transact_data_out(
        &mut self,
        operation: OperationCode,
        params: &[u32],
        payload: &[u8],
    ) -> Result<Container, WireError> {
        let transaction_id = self.next_transaction_id();
        self.send(operation, transaction_id, params)?;

        let header = encode_data_header(operation, transaction_id, payload.len() as u64);
        let mut phase = Vec::with_capacity(header.len() + payload.len());
        phase.extend_from_slice(&header);
        phase.extend_from_slice(payload);
        self.transport.write_bytes(&phase)?;
        if self.needs_terminator(phase.len() as u64) {
            self.transport.write_bytes(&[])?;
        }

        self.finish(operation, transaction_id)
    }

    /// True when a transfer of `len` bytes fills whole packets and must be closed with a
    /// zero-length write.
    fn needs_terminator(&self, len: u64) -> bool {
        let packet = self.transport.max_packet_size() as u64;
        self.config.zero_length_terminator && packet > 0 && len % packet == 0
    }
}

impl<T: Transport> Drop for MtpSession<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test_support;


#[cfg(test)]
mod catalog_test;


#[cfg(test)]
mod push_ops_test;

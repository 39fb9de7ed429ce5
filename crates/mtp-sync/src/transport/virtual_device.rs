//! In-memory MTP responder for tests and embedder E2E runs.
//!
//! Answers the operations the engine issues from a `BTreeMap` object store, and records
//! every bulk-out write and every transaction so tests can assert on wire behavior.
//! Clones share state, so a test can keep one clone while the session owns another.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::BufMut;
use log::debug;

use super::{DEFAULT_MAX_PACKET_SIZE, Transport, TransportError};
use crate::ptp::{
    Container, DataHeader, DataType, DevicePropCode, DeviceInfo, HEADER_LEN, ObjectFormat, ObjectInfo, ObjectPropCode,
    OperationCode, PropertyValue, ResponseCode, encode_u32_array,
};
use crate::types::{ObjectHandle, StorageId};

/// Storage ID the virtual device reports by default.
pub const VIRTUAL_STORAGE_ID: StorageId = StorageId(0x0001_0001);

/// One object in the virtual store.
#[derive(Debug, Clone)]
pub struct VirtualObject {
    pub info: ObjectInfo,
    pub data: Vec<u8>,
    pub properties: HashMap<ObjectPropCode, PropertyValue>,
}

/// A transaction the device received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub operation: OperationCode,
    pub transaction_id: u32,
    pub params: Vec<u32>,
}

/// Host-to-device data phase in progress.
struct Incoming {
    request: Container,
    buf: Vec<u8>,
}

struct VirtualState {
    objects: BTreeMap<u32, VirtualObject>,
    next_handle: u32,
    storage_ids: Vec<StorageId>,
    device_info: DeviceInfo,
    friendly_name: Option<String>,
    session: Option<u32>,
    packet_size: usize,

    // Current transaction
    incoming: Option<Incoming>,
    pending_data: Option<Vec<u8>>,
    pending_response: Option<Container>,
    /// Handle announced by the last SendObjectInfo, waiting for its SendObject.
    pending_object: Option<u32>,

    // Instrumentation
    write_log: Vec<usize>,
    transactions: Vec<TransactionRecord>,
    faults: VecDeque<(OperationCode, ResponseCode)>,
    property_faults: HashMap<ObjectPropCode, ResponseCode>,
    writes_left: Option<usize>,
    unplugged: bool,
}

/// A cloneable in-memory device implementing [`Transport`].
#[derive(Clone)]
pub struct VirtualDevice {
    state: Arc<Mutex<VirtualState>>,
}

impl Default for VirtualDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDevice {
    pub fn new() -> Self {
        let device_info = DeviceInfo {
            standard_version: 100,
            vendor_extension_id: 6,
            vendor_extension_version: 100,
            vendor_extension_desc: "microsoft.com: 1.0".to_string(),
            operations_supported: [
                OperationCode::GetDeviceInfo,
                OperationCode::OpenSession,
                OperationCode::CloseSession,
                OperationCode::GetStorageIds,
                OperationCode::GetObjectHandles,
                OperationCode::GetObjectInfo,
                OperationCode::GetObject,
                OperationCode::DeleteObject,
                OperationCode::SendObjectInfo,
                OperationCode::SendObject,
                OperationCode::GetDevicePropValue,
                OperationCode::GetObjectPropValue,
                OperationCode::SetObjectPropValue,
            ]
            .iter()
            .map(|op| op.code())
            .collect(),
            device_properties_supported: vec![DevicePropCode::DeviceFriendlyName.code()],
            playback_formats: vec![
                ObjectFormat::Wav.code(),
                ObjectFormat::Mp3.code(),
                ObjectFormat::Wma.code(),
            ],
            manufacturer: "Virtual".to_string(),
            model: "Virtual Jukebox".to_string(),
            device_version: "1.0".to_string(),
            serial_number: "VIRT-0001".to_string(),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(VirtualState {
                objects: BTreeMap::new(),
                next_handle: 1,
                storage_ids: vec![VIRTUAL_STORAGE_ID],
                device_info,
                friendly_name: Some("Virtual Player".to_string()),
                session: None,
                packet_size: DEFAULT_MAX_PACKET_SIZE,
                incoming: None,
                pending_data: None,
                pending_response: None,
                pending_object: None,
                write_log: Vec::new(),
                transactions: Vec::new(),
                faults: VecDeque::new(),
                property_faults: HashMap::new(),
                writes_left: None,
                unplugged: false,
            })),
        }
    }

    /// Locks the shared state. A test that panicked mid-call leaves the store usable, so
    /// poison is ignored.
    fn lock(&self) -> MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the bulk-out max packet size reported to the session.
    pub fn with_packet_size(self, packet_size: usize) -> Self {
        self.lock().packet_size = packet_size.max(1);
        self
    }

    // ========================================================================
    // Store setup and inspection
    // ========================================================================

    /// Adds a file object at the storage root.
    pub fn add_track(&self, filename: &str, format: ObjectFormat, data: Vec<u8>) -> ObjectHandle {
        let mut state = self.lock();
        let storage = state.storage_ids.first().copied().unwrap_or(StorageId(0));
        let mut info = ObjectInfo::new_file(filename, format, data.len() as u64);
        info.storage_id = storage;
        state.insert(VirtualObject {
            info,
            data,
            properties: HashMap::new(),
        })
    }

    /// Adds a folder (association) at the storage root.
    pub fn add_folder(&self, name: &str) -> ObjectHandle {
        let mut state = self.lock();
        let storage = state.storage_ids.first().copied().unwrap_or(StorageId(0));
        let mut info = ObjectInfo::new_file(name, ObjectFormat::Association, 0);
        info.storage_id = storage;
        info.association_type = 1;
        state.insert(VirtualObject {
            info,
            data: Vec::new(),
            properties: HashMap::new(),
        })
    }

    pub fn set_property(&self, handle: ObjectHandle, prop: ObjectPropCode, value: PropertyValue) {
        if let Some(object) = self.lock().objects.get_mut(&handle.0) {
            object.properties.insert(prop, value);
        }
    }

    pub fn set_storage_ids(&self, ids: Vec<StorageId>) {
        self.lock().storage_ids = ids;
    }

    pub fn set_friendly_name(&self, name: Option<&str>) {
        self.lock().friendly_name = name.map(str::to_string);
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.lock().objects.contains_key(&handle.0)
    }

    pub fn handles(&self) -> Vec<ObjectHandle> {
        self.lock().objects.keys().map(|h| ObjectHandle(*h)).collect()
    }

    pub fn object_data(&self, handle: ObjectHandle) -> Option<Vec<u8>> {
        self.lock().objects.get(&handle.0).map(|o| o.data.clone())
    }

    pub fn object_info(&self, handle: ObjectHandle) -> Option<ObjectInfo> {
        self.lock().objects.get(&handle.0).map(|o| o.info.clone())
    }

    pub fn property(&self, handle: ObjectHandle, prop: ObjectPropCode) -> Option<PropertyValue> {
        self.lock()
            .objects
            .get(&handle.0)
            .and_then(|o| o.properties.get(&prop).cloned())
    }

    pub fn session_open(&self) -> bool {
        self.lock().session.is_some()
    }

    // ========================================================================
    // Instrumentation
    // ========================================================================

    /// Sizes of every successful bulk-out write, in order. Command containers are not included.
    pub fn write_log(&self) -> Vec<usize> {
        self.lock().write_log.clone()
    }

    pub fn clear_write_log(&self) {
        self.lock().write_log.clear();
    }

    /// Every command the device received, in order.
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.lock().transactions.clone()
    }

    /// Makes the next `operation` answer `code` without side effects.
    pub fn fail_next(&self, operation: OperationCode, code: ResponseCode) {
        self.lock().faults.push_back((operation, code));
    }

    /// Makes every get or set of `prop` answer `code`.
    pub fn fail_property(&self, prop: ObjectPropCode, code: ResponseCode) {
        self.lock().property_faults.insert(prop, code);
    }

    /// Lets `count` more bulk-out writes through, then fails every later one.
    pub fn fail_writes_after(&self, count: usize) {
        self.lock().writes_left = Some(count);
    }

    /// Simulates the cable being pulled: every later call fails with `Disconnected`.
    pub fn unplug(&self) {
        self.lock().unplugged = true;
    }
}

// ============================================================================
// Transport
// ============================================================================

impl Transport for VirtualDevice {
    fn send_request(&mut self, request: &Container) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.unplugged {
            return Err(TransportError::Disconnected);
        }
        if state.incoming.take().is_some() {
            debug!("Virtual device: discarding incomplete data phase");
        }
        state.pending_data = None;
        state.pending_response = None;

        let operation = request.operation();
        state.transactions.push(TransactionRecord {
            operation,
            transaction_id: request.transaction_id,
            params: request.params.clone(),
        });

        if matches!(
            operation,
            OperationCode::SendObjectInfo | OperationCode::SendObject | OperationCode::SetObjectPropValue
        ) {
            state.incoming = Some(Incoming {
                request: request.clone(),
                buf: Vec::new(),
            });
            return Ok(());
        }

        let (data, code, params) = match state.take_fault(operation) {
            Some(code) => (None, code, Vec::new()),
            None => state.execute(request),
        };
        state.pending_data = data;
        state.pending_response = Some(Container::response(code, request.transaction_id, &params));
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.unplugged {
            return Err(TransportError::Disconnected);
        }
        if let Some(left) = state.writes_left.as_mut() {
            if *left == 0 {
                return Err(TransportError::Io {
                    message: "bulk-out endpoint stalled".to_string(),
                });
            }
            *left -= 1;
        }
        state.write_log.push(bytes.len());

        let Some(incoming) = state.incoming.as_mut() else {
            if bytes.is_empty() {
                // Zero-length terminator after a completed data phase
                return Ok(());
            }
            return Err(TransportError::Io {
                message: "unexpected data phase".to_string(),
            });
        };
        incoming.buf.extend_from_slice(bytes);
        if incoming.buf.len() < HEADER_LEN {
            return Ok(());
        }
        let header = DataHeader::decode(&incoming.buf).map_err(|e| TransportError::Io { message: e.to_string() })?;
        if incoming.buf.len() < header.length as usize {
            return Ok(());
        }

        if let Some(incoming) = state.incoming.take() {
            let request = incoming.request;
            let payload = &incoming.buf[HEADER_LEN..];
            let (code, params) = match state.take_fault(request.operation()) {
                Some(code) => (code, Vec::new()),
                None => state.execute_data_out(&request, payload),
            };
            state.pending_response = Some(Container::response(code, request.transaction_id, &params));
        }
        Ok(())
    }

    fn read_data(&mut self, sink: &mut dyn Write) -> Result<u64, TransportError> {
        let data = {
            let mut state = self.lock();
            if state.unplugged {
                return Err(TransportError::Disconnected);
            }
            state.pending_data.take()
        };
        match data {
            Some(data) => {
                sink.write_all(&data)?;
                Ok(data.len() as u64)
            }
            None => Ok(0),
        }
    }

    fn read_response(&mut self) -> Result<Container, TransportError> {
        let mut state = self.lock();
        if state.unplugged {
            return Err(TransportError::Disconnected);
        }
        if let Some(incoming) = state.incoming.take() {
            return Ok(Container::response(
                ResponseCode::IncompleteTransfer,
                incoming.request.transaction_id,
                &[],
            ));
        }
        state.pending_response.take().ok_or(TransportError::Timeout)
    }

    fn max_packet_size(&self) -> usize {
        self.lock().packet_size
    }
}

// ============================================================================
// Operation handlers
// ============================================================================

type Outcome = (Option<Vec<u8>>, ResponseCode, Vec<u32>);

fn reply(code: ResponseCode) -> Outcome {
    (None, code, Vec::new())
}

fn reply_data(data: Vec<u8>) -> Outcome {
    (Some(data), ResponseCode::Ok, Vec::new())
}

/// Wire type the virtual device uses for each property it stores.
fn property_type(prop: ObjectPropCode) -> Option<DataType> {
    match prop {
        ObjectPropCode::Name
        | ObjectPropCode::Artist
        | ObjectPropCode::Genre
        | ObjectPropCode::AlbumName
        | ObjectPropCode::OriginalReleaseDate
        | ObjectPropCode::ObjectFileName => Some(DataType::String),
        ObjectPropCode::Duration => Some(DataType::Uint32),
        ObjectPropCode::Track => Some(DataType::Uint16),
        ObjectPropCode::ObjectSize | ObjectPropCode::Unknown(_) => None,
    }
}

impl VirtualState {
    fn insert(&mut self, object: VirtualObject) -> ObjectHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.objects.insert(handle, object);
        ObjectHandle(handle)
    }

    fn take_fault(&mut self, operation: OperationCode) -> Option<ResponseCode> {
        let index = self.faults.iter().position(|(op, _)| *op == operation)?;
        self.faults.remove(index).map(|(_, code)| code)
    }

    fn execute(&mut self, request: &Container) -> Outcome {
        let operation = request.operation();
        match operation {
            OperationCode::OpenSession => {
                if self.session.is_some() {
                    return reply(ResponseCode::SessionAlreadyOpen);
                }
                if request.param(0) == 0 {
                    return reply(ResponseCode::InvalidParameter);
                }
                self.session = Some(request.param(0));
                return reply(ResponseCode::Ok);
            }
            OperationCode::GetDeviceInfo => return reply_data(self.device_info.encode()),
            _ => {}
        }
        if self.session.is_none() {
            return reply(ResponseCode::SessionNotOpen);
        }

        match operation {
            OperationCode::CloseSession => {
                self.session = None;
                self.pending_object = None;
                reply(ResponseCode::Ok)
            }
            OperationCode::GetStorageIds => {
                let mut data = Vec::new();
                let ids: Vec<u32> = self.storage_ids.iter().map(|s| s.0).collect();
                encode_u32_array(&mut data, &ids);
                reply_data(data)
            }
            OperationCode::GetObjectHandles => {
                let storage = request.param(0);
                let format = request.param(1) as u16;
                let parent = request.param(2);
                let handles: Vec<u32> = self
                    .objects
                    .iter()
                    .filter(|(_, o)| storage == StorageId::ALL.0 || o.info.storage_id.0 == storage)
                    .filter(|(_, o)| format == 0 || o.info.format.code() == format)
                    .filter(|(_, o)| match parent {
                        0 => true,
                        0xFFFF_FFFF => o.info.parent == ObjectHandle::ROOT,
                        p => o.info.parent.0 == p,
                    })
                    .map(|(h, _)| *h)
                    .collect();
                let mut data = Vec::new();
                encode_u32_array(&mut data, &handles);
                reply_data(data)
            }
            OperationCode::GetObjectInfo => match self.objects.get(&request.param(0)) {
                Some(object) => reply_data(object.info.encode()),
                None => reply(ResponseCode::InvalidObjectHandle),
            },
            OperationCode::GetObject => match self.objects.get(&request.param(0)) {
                Some(object) => reply_data(object.data.clone()),
                None => reply(ResponseCode::InvalidObjectHandle),
            },
            OperationCode::DeleteObject => {
                let handle = request.param(0);
                if self.objects.remove(&handle).is_none() {
                    return reply(ResponseCode::InvalidObjectHandle);
                }
                if self.pending_object == Some(handle) {
                    self.pending_object = None;
                }
                reply(ResponseCode::Ok)
            }
            OperationCode::GetObjectPropValue => {
                let prop = ObjectPropCode::from_code(request.param(1) as u16);
                let Some(object) = self.objects.get(&request.param(0)) else {
                    return reply(ResponseCode::InvalidObjectHandle);
                };
                if let Some(code) = self.property_faults.get(&prop) {
                    return reply(*code);
                }
                let value = match prop {
                    ObjectPropCode::ObjectFileName => Some(PropertyValue::String(object.info.filename.clone())),
                    ObjectPropCode::ObjectSize => {
                        let mut data = Vec::new();
                        data.put_u64_le(object.data.len() as u64);
                        return reply_data(data);
                    }
                    _ => object.properties.get(&prop).cloned(),
                };
                match value {
                    Some(value) => reply_data(value.encode()),
                    None => reply(ResponseCode::ObjectPropNotSupported),
                }
            }
            OperationCode::GetDevicePropValue => {
                match (DevicePropCode::from_code(request.param(0) as u16), &self.friendly_name) {
                    (DevicePropCode::DeviceFriendlyName, Some(name)) => {
                        reply_data(PropertyValue::String(name.clone()).encode())
                    }
                    _ => reply(ResponseCode::DevicePropNotSupported),
                }
            }
            _ => reply(ResponseCode::OperationNotSupported),
        }
    }

    fn execute_data_out(&mut self, request: &Container, payload: &[u8]) -> (ResponseCode, Vec<u32>) {
        if self.session.is_none() {
            return (ResponseCode::SessionNotOpen, Vec::new());
        }
        match request.operation() {
            OperationCode::SendObjectInfo => self.send_object_info(request, payload),
            OperationCode::SendObject => {
                let Some(handle) = self.pending_object.take() else {
                    return (ResponseCode::NoValidObjectInfo, Vec::new());
                };
                let Some(object) = self.objects.get_mut(&handle) else {
                    return (ResponseCode::NoValidObjectInfo, Vec::new());
                };
                object.data = payload.to_vec();
                if object.info.compressed_size != payload.len() as u64 {
                    return (ResponseCode::IncompleteTransfer, Vec::new());
                }
                (ResponseCode::Ok, Vec::new())
            }
            OperationCode::SetObjectPropValue => {
                let prop = ObjectPropCode::from_code(request.param(1) as u16);
                let Some(object) = self.objects.get_mut(&request.param(0)) else {
                    return (ResponseCode::InvalidObjectHandle, Vec::new());
                };
                if let Some(code) = self.property_faults.get(&prop) {
                    return (*code, Vec::new());
                }
                let Some(data_type) = property_type(prop) else {
                    return (ResponseCode::InvalidObjectPropCode, Vec::new());
                };
                match PropertyValue::decode(payload, data_type) {
                    Ok(Some(value)) => {
                        if let PropertyValue::String(name) = &value
                            && prop == ObjectPropCode::ObjectFileName
                        {
                            object.info.filename = name.clone();
                        }
                        object.properties.insert(prop, value);
                        (ResponseCode::Ok, Vec::new())
                    }
                    Ok(None) => {
                        object.properties.remove(&prop);
                        (ResponseCode::Ok, Vec::new())
                    }
                    Err(_) => (ResponseCode::InvalidParameter, Vec::new()),
                }
            }
            _ => (ResponseCode::OperationNotSupported, Vec::new()),
        }
    }

    fn send_object_info(&mut self, request: &Container, payload: &[u8]) -> (ResponseCode, Vec<u32>) {
        let Ok(mut info) = ObjectInfo::decode(payload) else {
            return (ResponseCode::GeneralError, Vec::new());
        };
        let storage = match request.param(0) {
            0 => match self.storage_ids.first() {
                Some(id) => *id,
                None => return (ResponseCode::StoreFull, Vec::new()),
            },
            id if self.storage_ids.contains(&StorageId(id)) => StorageId(id),
            _ => return (ResponseCode::InvalidStorageId, Vec::new()),
        };
        let parent = match request.param(1) {
            0 | 0xFFFF_FFFF => ObjectHandle::ROOT,
            p => match self.objects.get(&p) {
                Some(o) if o.info.is_association() => ObjectHandle(p),
                _ => return (ResponseCode::InvalidParentObject, Vec::new()),
            },
        };
        info.storage_id = storage;
        info.parent = parent;
        let handle = self.insert(VirtualObject {
            info,
            data: Vec::new(),
            properties: HashMap::new(),
        });
        // A second SendObjectInfo supersedes the first
        self.pending_object = Some(handle.0);
        debug!("Virtual device: created object {handle}");
        (ResponseCode::Ok, vec![storage.0, parent.0, handle.0])
    }
}

//! ObjectInfo and DeviceInfo datasets, plus u16/u32 array framing.

use bytes::{Buf, BufMut};

use super::codes::{ObjectFormat, OperationCode};
use super::container::CodecError;
use super::strings::{read_ptp_string, write_ptp_string};
use crate::types::{ObjectHandle, StorageId};

fn ensure(buf: &impl Buf, n: usize, what: &str) -> Result<(), CodecError> {
    if buf.remaining() < n {
        Err(CodecError::new(format!(
            "{} truncated: needs {} bytes, {} remaining",
            what,
            n,
            buf.remaining()
        )))
    } else {
        Ok(())
    }
}

// ============================================================================
// Arrays
// ============================================================================

/// Decodes a u32 array (u32 count, then elements).
pub fn decode_u32_array(buf: &mut impl Buf) -> Result<Vec<u32>, CodecError> {
    ensure(&*buf, 4, "array count")?;
    let count = buf.get_u32_le() as usize;
    ensure(&*buf, count.saturating_mul(4), "u32 array")?;
    Ok((0..count).map(|_| buf.get_u32_le()).collect())
}

/// Decodes a u16 array (u32 count, then elements).
pub fn decode_u16_array(buf: &mut impl Buf) -> Result<Vec<u16>, CodecError> {
    ensure(&*buf, 4, "array count")?;
    let count = buf.get_u32_le() as usize;
    ensure(&*buf, count.saturating_mul(2), "u16 array")?;
    Ok((0..count).map(|_| buf.get_u16_le()).collect())
}

pub fn encode_u32_array(buf: &mut impl BufMut, values: &[u32]) {
    buf.put_u32_le(values.len() as u32);
    for v in values {
        buf.put_u32_le(*v);
    }
}

pub fn encode_u16_array(buf: &mut impl BufMut, values: &[u16]) {
    buf.put_u32_le(values.len() as u32);
    for v in values {
        buf.put_u16_le(*v);
    }
}

/// Decodes the GetObjectHandles data phase.
pub fn decode_handle_array(bytes: &[u8]) -> Result<Vec<ObjectHandle>, CodecError> {
    let mut buf = bytes;
    Ok(decode_u32_array(&mut buf)?.into_iter().map(ObjectHandle).collect())
}

/// Decodes the GetStorageIDs data phase.
pub fn decode_storage_ids(bytes: &[u8]) -> Result<Vec<StorageId>, CodecError> {
    let mut buf = bytes;
    Ok(decode_u32_array(&mut buf)?.into_iter().map(StorageId).collect())
}

// ============================================================================
// ObjectInfo
// ============================================================================

/// The ObjectInfo dataset.
///
/// Thumbnail and image fields are carried so a decoded dataset re-encodes unchanged,
/// though the engine never reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub storage_id: StorageId,
    pub format: ObjectFormat,
    pub protection_status: u16,
    /// In bytes. The wire field is u32, so anything above 4 GiB is sent as `u32::MAX`.
    pub compressed_size: u64,
    pub thumb_format: u16,
    pub thumb_compressed_size: u32,
    pub thumb_pix_width: u32,
    pub thumb_pix_height: u32,
    pub image_pix_width: u32,
    pub image_pix_height: u32,
    pub image_bit_depth: u32,
    pub parent: ObjectHandle,
    pub association_type: u16,
    pub association_desc: u32,
    pub sequence_number: u32,
    pub filename: String,
    pub capture_date: String,
    pub modification_date: String,
    pub keywords: String,
}

impl ObjectInfo {
    /// Dataset describing a new file to be created with SendObjectInfo.
    pub fn new_file(filename: &str, format: ObjectFormat, size: u64) -> Self {
        Self {
            storage_id: StorageId(0),
            format,
            protection_status: 0,
            compressed_size: size,
            thumb_format: 0,
            thumb_compressed_size: 0,
            thumb_pix_width: 0,
            thumb_pix_height: 0,
            image_pix_width: 0,
            image_pix_height: 0,
            image_bit_depth: 0,
            parent: ObjectHandle::ROOT,
            association_type: 0,
            association_desc: 0,
            sequence_number: 0,
            filename: filename.to_string(),
            capture_date: String::new(),
            modification_date: String::new(),
            keywords: String::new(),
        }
    }

    pub fn is_association(&self) -> bool {
        self.format == ObjectFormat::Association
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.filename.len() * 2);
        buf.put_u32_le(self.storage_id.0);
        buf.put_u16_le(self.format.code());
        buf.put_u16_le(self.protection_status);
        buf.put_u32_le(u32::try_from(self.compressed_size).unwrap_or(u32::MAX));
        buf.put_u16_le(self.thumb_format);
        buf.put_u32_le(self.thumb_compressed_size);
        buf.put_u32_le(self.thumb_pix_width);
        buf.put_u32_le(self.thumb_pix_height);
        buf.put_u32_le(self.image_pix_width);
        buf.put_u32_le(self.image_pix_height);
        buf.put_u32_le(self.image_bit_depth);
        buf.put_u32_le(self.parent.0);
        buf.put_u16_le(self.association_type);
        buf.put_u32_le(self.association_desc);
        buf.put_u32_le(self.sequence_number);
        write_ptp_string(&mut buf, &self.filename);
        write_ptp_string(&mut buf, &self.capture_date);
        write_ptp_string(&mut buf, &self.modification_date);
        write_ptp_string(&mut buf, &self.keywords);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        // Fixed-size part, up to and including SequenceNumber
        const FIXED_LEN: usize = 52;
        let mut buf = bytes;
        ensure(&buf, FIXED_LEN, "ObjectInfo")?;
        let storage_id = StorageId(buf.get_u32_le());
        let format = ObjectFormat::from_code(buf.get_u16_le());
        let protection_status = buf.get_u16_le();
        let compressed_size = u64::from(buf.get_u32_le());
        let thumb_format = buf.get_u16_le();
        let thumb_compressed_size = buf.get_u32_le();
        let thumb_pix_width = buf.get_u32_le();
        let thumb_pix_height = buf.get_u32_le();
        let image_pix_width = buf.get_u32_le();
        let image_pix_height = buf.get_u32_le();
        let image_bit_depth = buf.get_u32_le();
        let parent = ObjectHandle(buf.get_u32_le());
        let association_type = buf.get_u16_le();
        let association_desc = buf.get_u32_le();
        let sequence_number = buf.get_u32_le();
        let filename = read_ptp_string(&mut buf)?;
        // Some devices stop after the filename
        let capture_date = read_optional_string(&mut buf)?;
        let modification_date = read_optional_string(&mut buf)?;
        let keywords = read_optional_string(&mut buf)?;

        Ok(Self {
            storage_id,
            format,
            protection_status,
            compressed_size,
            thumb_format,
            thumb_compressed_size,
            thumb_pix_width,
            thumb_pix_height,
            image_pix_width,
            image_pix_height,
            image_bit_depth,
            parent,
            association_type,
            association_desc,
            sequence_number,
            filename,
            capture_date,
            modification_date,
            keywords,
        })
    }
}

fn read_optional_string(buf: &mut impl Buf) -> Result<String, CodecError> {
    if buf.has_remaining() {
        read_ptp_string(buf)
    } else {
        Ok(String::new())
    }
}

// ============================================================================
// DeviceInfo
// ============================================================================

/// The subset of the DeviceInfo dataset the engine keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub standard_version: u16,
    pub vendor_extension_id: u32,
    pub vendor_extension_version: u16,
    pub vendor_extension_desc: String,
    pub functional_mode: u16,
    pub operations_supported: Vec<u16>,
    pub events_supported: Vec<u16>,
    pub device_properties_supported: Vec<u16>,
    pub capture_formats: Vec<u16>,
    pub playback_formats: Vec<u16>,
    pub manufacturer: String,
    pub model: String,
    pub device_version: String,
    pub serial_number: String,
}

impl DeviceInfo {
    pub fn supports(&self, operation: OperationCode) -> bool {
        self.operations_supported.contains(&operation.code())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u16_le(self.standard_version);
        buf.put_u32_le(self.vendor_extension_id);
        buf.put_u16_le(self.vendor_extension_version);
        write_ptp_string(&mut buf, &self.vendor_extension_desc);
        buf.put_u16_le(self.functional_mode);
        encode_u16_array(&mut buf, &self.operations_supported);
        encode_u16_array(&mut buf, &self.events_supported);
        encode_u16_array(&mut buf, &self.device_properties_supported);
        encode_u16_array(&mut buf, &self.capture_formats);
        encode_u16_array(&mut buf, &self.playback_formats);
        write_ptp_string(&mut buf, &self.manufacturer);
        write_ptp_string(&mut buf, &self.model);
        write_ptp_string(&mut buf, &self.device_version);
        write_ptp_string(&mut buf, &self.serial_number);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut buf = bytes;
        ensure(&buf, 8, "DeviceInfo")?;
        let standard_version = buf.get_u16_le();
        let vendor_extension_id = buf.get_u32_le();
        let vendor_extension_version = buf.get_u16_le();
        let vendor_extension_desc = read_ptp_string(&mut buf)?;
        ensure(&buf, 2, "DeviceInfo functional mode")?;
        let functional_mode = buf.get_u16_le();
        let operations_supported = decode_u16_array(&mut buf)?;
        let events_supported = decode_u16_array(&mut buf)?;
        let device_properties_supported = decode_u16_array(&mut buf)?;
        let capture_formats = decode_u16_array(&mut buf)?;
        let playback_formats = decode_u16_array(&mut buf)?;
        let manufacturer = read_ptp_string(&mut buf)?;
        let model = read_ptp_string(&mut buf)?;
        let device_version = read_ptp_string(&mut buf)?;
        let serial_number = read_ptp_string(&mut buf)?;

        Ok(Self {
            standard_version,
            vendor_extension_id,
            vendor_extension_version,
            vendor_extension_desc,
            functional_mode,
            operations_supported,
            events_supported,
            device_properties_supported,
            capture_formats,
            playback_formats,
            manufacturer,
            model,
            device_version,
            serial_number,
        })
    }
}

//! PTP container framing.
//!
//! Every bulk transfer starts with a 12-byte header: total length (u32), container type
//! (u16), operation or response code (u16), transaction ID (u32). Command and response
//! containers carry up to five u32 parameters after the header. All fields are little-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::codes::{ContainerType, OperationCode, ResponseCode};

/// Size of the container header in bytes.
pub const HEADER_LEN: usize = 12;

/// Maximum number of parameters in a command or response container.
pub const MAX_PARAMS: usize = 5;

/// A malformed or truncated wire payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError {
    pub message: String,
}

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed PTP data: {}", self.message)
    }
}

impl std::error::Error for CodecError {}

/// A command, response, or event container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub kind: ContainerType,
    pub code: u16,
    pub transaction_id: u32,
    pub params: Vec<u32>,
}

impl Container {
    pub fn command(operation: OperationCode, transaction_id: u32, params: &[u32]) -> Self {
        Self {
            kind: ContainerType::Command,
            code: operation.code(),
            transaction_id,
            params: params.to_vec(),
        }
    }

    pub fn response(code: ResponseCode, transaction_id: u32, params: &[u32]) -> Self {
        Self {
            kind: ContainerType::Response,
            code: code.code(),
            transaction_id,
            params: params.to_vec(),
        }
    }

    pub fn operation(&self) -> OperationCode {
        OperationCode::from_code(self.code)
    }

    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::from_code(self.code)
    }

    /// Returns parameter `index`, or 0 if the device didn't send it.
    pub fn param(&self, index: usize) -> u32 {
        self.params.get(index).copied().unwrap_or(0)
    }

    pub fn encode(&self) -> Bytes {
        let params = &self.params[..self.params.len().min(MAX_PARAMS)];
        let len = HEADER_LEN + params.len() * 4;
        let mut buf = BytesMut::with_capacity(len);
        buf.put_u32_le(len as u32);
        buf.put_u16_le(self.kind.code());
        buf.put_u16_le(self.code);
        buf.put_u32_le(self.transaction_id);
        for param in params {
            buf.put_u32_le(*param);
        }
        buf.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut buf = bytes;
        if buf.remaining() < HEADER_LEN {
            return Err(CodecError::new(format!("container too short: {} bytes", bytes.len())));
        }
        let length = buf.get_u32_le() as usize;
        let kind_code = buf.get_u16_le();
        let code = buf.get_u16_le();
        let transaction_id = buf.get_u32_le();

        let kind = ContainerType::from_code(kind_code)
            .ok_or_else(|| CodecError::new(format!("unknown container type {}", kind_code)))?;
        if length < HEADER_LEN || length > bytes.len() {
            return Err(CodecError::new(format!(
                "container length {} doesn't fit {} received bytes",
                length,
                bytes.len()
            )));
        }
        let param_bytes = length - HEADER_LEN;
        if param_bytes % 4 != 0 || param_bytes / 4 > MAX_PARAMS {
            return Err(CodecError::new(format!("bad parameter block of {} bytes", param_bytes)));
        }
        let params = (0..param_bytes / 4).map(|_| buf.get_u32_le()).collect();

        Ok(Self {
            kind,
            code,
            transaction_id,
            params,
        })
    }
}

/// Header of a data-phase transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    /// Total length including the header. Saturates at `u32::MAX` for payloads over 4 GiB.
    pub length: u32,
    pub code: u16,
    pub transaction_id: u32,
}

impl DataHeader {
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut buf = bytes;
        if buf.remaining() < HEADER_LEN {
            return Err(CodecError::new("data header truncated"));
        }
        let length = buf.get_u32_le();
        let kind = buf.get_u16_le();
        if kind != ContainerType::Data.code() {
            return Err(CodecError::new(format!("expected data container, got type {}", kind)));
        }
        Ok(Self {
            length,
            code: buf.get_u16_le(),
            transaction_id: buf.get_u32_le(),
        })
    }

    /// Payload bytes announced by the header.
    pub fn payload_len(&self) -> usize {
        (self.length as usize).saturating_sub(HEADER_LEN)
    }
}

/// Encodes the header that precedes a host-to-device data phase.
pub fn encode_data_header(operation: OperationCode, transaction_id: u32, payload_len: u64) -> [u8; HEADER_LEN] {
    let total = u32::try_from(payload_len.saturating_add(HEADER_LEN as u64)).unwrap_or(u32::MAX);
    let mut header = [0u8; HEADER_LEN];
    let mut buf = &mut header[..];
    buf.put_u32_le(total);
    buf.put_u16_le(ContainerType::Data.code());
    buf.put_u16_le(operation.code());
    buf.put_u32_le(transaction_id);
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_encoding() {
        let cmd = Container::command(OperationCode::OpenSession, 0, &[1]);
        let bytes = cmd.encode();
        assert_eq!(&bytes[..], &[16, 0, 0, 0, 1, 0, 0x02, 0x10, 0, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_response_decodes_params() {
        let resp = Container::response(ResponseCode::Ok, 7, &[0x10001, 0, 42]);
        let decoded = Container::decode(&resp.encode()).unwrap();
        assert_eq!(decoded.response_code(), ResponseCode::Ok);
        assert_eq!(decoded.transaction_id, 7);
        assert_eq!(decoded.param(2), 42);
        assert_eq!(decoded.param(4), 0);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Container::decode(&[1, 2, 3]).is_err());
        // Length field claims more bytes than were received
        let mut bytes = Container::response(ResponseCode::Ok, 1, &[]).encode().to_vec();
        bytes[0] = 40;
        assert!(Container::decode(&bytes).is_err());
        // Unknown container type
        let mut bytes = Container::response(ResponseCode::Ok, 1, &[]).encode().to_vec();
        bytes[4] = 9;
        assert!(Container::decode(&bytes).is_err());
    }

    #[test]
    fn test_data_header_layout() {
        let header = encode_data_header(OperationCode::SendObject, 0x0102_0304, 1000);
        assert_eq!(header, [0xF4, 0x03, 0, 0, 2, 0, 0x0D, 0x10, 0x04, 0x03, 0x02, 0x01]);
        let decoded = DataHeader::decode(&header).unwrap();
        assert_eq!(decoded.payload_len(), 1000);
        assert_eq!(decoded.code, OperationCode::SendObject.code());
    }

    #[test]
    fn test_data_header_saturates_for_huge_payloads() {
        let header = encode_data_header(OperationCode::SendObject, 1, 5 * 1024 * 1024 * 1024);
        assert_eq!(&header[..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
    }
}

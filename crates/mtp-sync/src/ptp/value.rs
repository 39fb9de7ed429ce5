//! Typed property values as carried in Get/SetObjectPropValue data phases.

use bytes::{Buf, BufMut};

use super::codes::DataType;
use super::container::CodecError;
use super::strings::{read_ptp_string, write_ptp_string};

/// A property value of one of the types the engine reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    U8(u8),
    U16(u16),
    U32(u32),
    String(String),
}

impl PropertyValue {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::U8(_) => DataType::Uint8,
            Self::U16(_) => DataType::Uint16,
            Self::U32(_) => DataType::Uint32,
            Self::String(_) => DataType::String,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::U8(v) => buf.put_u8(*v),
            Self::U16(v) => buf.put_u16_le(*v),
            Self::U32(v) => buf.put_u32_le(*v),
            Self::String(s) => write_ptp_string(&mut buf, s),
        }
        buf
    }

    /// Decodes a value of type `data_type`.
    ///
    /// Returns `Ok(None)` when the device sent no payload or an empty string, which the
    /// catalog treats as "not set".
    pub fn decode(bytes: &[u8], data_type: DataType) -> Result<Option<Self>, CodecError> {
        if bytes.is_empty() {
            return Ok(None);
        }
        let mut buf = bytes;
        let need = |n: usize| -> Result<(), CodecError> {
            if bytes.len() < n {
                Err(CodecError::new(format!(
                    "{} value needs {} bytes, got {}",
                    data_type,
                    n,
                    bytes.len()
                )))
            } else {
                Ok(())
            }
        };
        let value = match data_type {
            DataType::Uint8 => {
                need(1)?;
                Self::U8(buf.get_u8())
            }
            DataType::Uint16 => {
                need(2)?;
                Self::U16(buf.get_u16_le())
            }
            DataType::Uint32 => {
                need(4)?;
                Self::U32(buf.get_u32_le())
            }
            DataType::String => {
                let s = read_ptp_string(&mut buf)?;
                if s.is_empty() {
                    return Ok(None);
                }
                Self::String(s)
            }
            DataType::Unknown(code) => {
                return Err(CodecError::new(format!("unsupported data type 0x{:04x}", code)));
            }
        };
        Ok(Some(value))
    }

    /// Widens any integer value to u32.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U8(v) => Some(u32::from(*v)),
            Self::U16(v) => Some(u32::from(*v)),
            Self::U32(v) => Some(*v),
            Self::String(_) => None,
        }
    }

    /// Returns the value as u16 if it is an integer that fits.
    pub fn as_u16(&self) -> Option<u16> {
        self.as_u32().and_then(|v| u16::try_from(v).ok())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding_is_little_endian() {
        assert_eq!(PropertyValue::U16(0x0102).encode(), vec![0x02, 0x01]);
        assert_eq!(PropertyValue::U32(180_000).encode(), 180_000u32.to_le_bytes().to_vec());
        assert_eq!(PropertyValue::U8(7).encode(), vec![7]);
    }

    #[test]
    fn test_decode_matches_encode() {
        let value = PropertyValue::String("Title".to_string());
        let decoded = PropertyValue::decode(&value.encode(), DataType::String).unwrap();
        assert_eq!(decoded, Some(value));

        let decoded = PropertyValue::decode(&[0x2C, 0x01, 0, 0], DataType::Uint32).unwrap();
        assert_eq!(decoded, Some(PropertyValue::U32(300)));
    }

    #[test]
    fn test_empty_payload_and_empty_string_are_absent() {
        assert_eq!(PropertyValue::decode(&[], DataType::Uint32).unwrap(), None);
        assert_eq!(PropertyValue::decode(&[0], DataType::String).unwrap(), None);
    }

    #[test]
    fn test_short_payload_is_an_error() {
        assert!(PropertyValue::decode(&[1, 2], DataType::Uint32).is_err());
        assert!(PropertyValue::decode(&[1, 2], DataType::Unknown(0x4002)).is_err());
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(PropertyValue::U32(70_000).as_u16(), None);
        assert_eq!(PropertyValue::U32(12).as_u16(), Some(12));
        assert_eq!(PropertyValue::String("x".into()).as_u32(), None);
        assert_eq!(PropertyValue::String("x".into()).as_str(), Some("x"));
    }
}

//! PTP/MTP wire codec.
//!
//! Pure, deterministic little-endian encoders and decoders. Nothing in here does I/O.

mod codes;
mod container;
mod dataset;
pub mod strings;
mod value;

pub use codes::{ContainerType, DataType, DevicePropCode, ObjectFormat, ObjectPropCode, OperationCode, ResponseCode};
pub use container::{CodecError, Container, DataHeader, HEADER_LEN, MAX_PARAMS, encode_data_header};
pub use dataset::{
    DeviceInfo, ObjectInfo, decode_handle_array, decode_storage_ids, decode_u16_array, decode_u32_array,
    encode_u16_array, encode_u32_array,
};
pub use value::PropertyValue;

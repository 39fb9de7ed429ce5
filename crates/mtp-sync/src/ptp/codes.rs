//! Wire code enums for operations, responses, formats, and properties.
//!
//! Every enum keeps an `Unknown(u16)` variant so codes we don't model survive a round trip.

/// Generates a `u16` wire code enum with `code()`, `from_code()` and `Display`.
macro_rules! wire_code {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            Unknown(u16),
        }

        impl $name {
            pub fn code(self) -> u16 {
                match self {
                    $(Self::$variant => $value,)+
                    Self::Unknown(code) => code,
                }
            }

            pub fn from_code(code: u16) -> Self {
                match code {
                    $($value => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    Self::Unknown(code) => write!(f, "Unknown(0x{:04x})", code),
                    other => write!(f, "{:?}", other),
                }
            }
        }
    };
}

wire_code! {
    /// PTP/MTP operation codes used by the engine.
    pub enum OperationCode {
        GetDeviceInfo = 0x1001,
        OpenSession = 0x1002,
        CloseSession = 0x1003,
        GetStorageIds = 0x1004,
        GetStorageInfo = 0x1005,
        GetObjectHandles = 0x1007,
        GetObjectInfo = 0x1008,
        GetObject = 0x1009,
        DeleteObject = 0x100B,
        SendObjectInfo = 0x100C,
        SendObject = 0x100D,
        GetDevicePropDesc = 0x1014,
        GetDevicePropValue = 0x1015,
        GetObjectPropValue = 0x9803,
        SetObjectPropValue = 0x9804,
    }
}

wire_code! {
    /// Response codes a device may return at the end of a transaction.
    pub enum ResponseCode {
        Ok = 0x2001,
        GeneralError = 0x2002,
        SessionNotOpen = 0x2003,
        InvalidTransactionId = 0x2004,
        OperationNotSupported = 0x2005,
        ParameterNotSupported = 0x2006,
        IncompleteTransfer = 0x2007,
        InvalidStorageId = 0x2008,
        InvalidObjectHandle = 0x2009,
        DevicePropNotSupported = 0x200A,
        InvalidObjectFormatCode = 0x200B,
        StoreFull = 0x200C,
        ObjectWriteProtected = 0x200D,
        StoreReadOnly = 0x200E,
        AccessDenied = 0x200F,
        NoValidObjectInfo = 0x2015,
        DeviceBusy = 0x2019,
        InvalidParentObject = 0x201A,
        InvalidParameter = 0x201D,
        SessionAlreadyOpen = 0x201E,
        TransactionCancelled = 0x201F,
        InvalidObjectPropCode = 0xA801,
        ObjectPropNotSupported = 0xA80A,
    }
}

wire_code! {
    /// Object format codes.
    pub enum ObjectFormat {
        Undefined = 0x3000,
        /// Folder.
        Association = 0x3001,
        Wav = 0x3008,
        Mp3 = 0x3009,
        Wma = 0xB901,
    }
}

wire_code! {
    /// MTP object property codes.
    pub enum ObjectPropCode {
        ObjectSize = 0xDC04,
        ObjectFileName = 0xDC07,
        Name = 0xDC44,
        Artist = 0xDC46,
        Duration = 0xDC89,
        Track = 0xDC8B,
        Genre = 0xDC8C,
        OriginalReleaseDate = 0xDC99,
        AlbumName = 0xDC9A,
    }
}

wire_code! {
    /// Device property codes.
    pub enum DevicePropCode {
        DeviceFriendlyName = 0xD402,
    }
}

wire_code! {
    /// Property value data types.
    pub enum DataType {
        Uint8 = 0x0002,
        Uint16 = 0x0004,
        Uint32 = 0x0006,
        String = 0xFFFF,
    }
}

/// Container type field of the PTP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ContainerType {
    Command,
    Data,
    Response,
    Event,
}

impl ContainerType {
    pub fn code(self) -> u16 {
        match self {
            Self::Command => 1,
            Self::Data => 2,
            Self::Response => 3,
            Self::Event => 4,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Command),
            2 => Some(Self::Data),
            3 => Some(Self::Response),
            4 => Some(Self::Event),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_map_both_ways() {
        assert_eq!(OperationCode::SendObject.code(), 0x100D);
        assert_eq!(OperationCode::from_code(0x9804), OperationCode::SetObjectPropValue);
        assert_eq!(ResponseCode::from_code(0x2001), ResponseCode::Ok);
        assert_eq!(ResponseCode::ObjectPropNotSupported.code(), 0xA80A);
        assert_eq!(ObjectFormat::from_code(0xB901), ObjectFormat::Wma);
        assert_eq!(ObjectPropCode::AlbumName.code(), 0xDC9A);
        assert_eq!(DataType::from_code(0xFFFF), DataType::String);
    }

    #[test]
    fn test_unknown_codes_are_preserved() {
        let code = ResponseCode::from_code(0x2BAD);
        assert_eq!(code, ResponseCode::Unknown(0x2BAD));
        assert_eq!(code.code(), 0x2BAD);
        assert_eq!(code.to_string(), "Unknown(0x2bad)");
    }

    #[test]
    fn test_display_uses_variant_name() {
        assert_eq!(ResponseCode::DeviceBusy.to_string(), "DeviceBusy");
        assert_eq!(OperationCode::GetObjectHandles.to_string(), "GetObjectHandles");
    }

    #[test]
    fn test_container_type_codes() {
        assert_eq!(ContainerType::from_code(2), Some(ContainerType::Data));
        assert_eq!(ContainerType::Response.code(), 3);
        assert_eq!(ContainerType::from_code(9), None);
    }
}

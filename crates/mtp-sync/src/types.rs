//! Core type definitions shared by the codec and the session layer.
//!
//! Track records are serializable (camelCase) so they can be handed to a UI layer as-is.

use serde::{Deserialize, Serialize};

use crate::ptp::{DataType, ObjectFormat, ObjectPropCode, PropertyValue};

/// Device-assigned object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(pub u32);

impl ObjectHandle {
    /// Parent value meaning "storage root" / "let the device choose".
    pub const ROOT: ObjectHandle = ObjectHandle(0);

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Storage identifier within a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(pub u32);

impl StorageId {
    /// Wildcard used by GetObjectHandles to mean every storage.
    pub const ALL: StorageId = StorageId(0xFFFF_FFFF);

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Audio codec of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Wav,
    Mp3,
    Wma,
    #[default]
    Unknown,
}

impl Codec {
    /// Maps a wire format to a codec. Returns `None` for anything the catalog doesn't list.
    pub fn from_format(format: ObjectFormat) -> Option<Self> {
        match format {
            ObjectFormat::Wav => Some(Self::Wav),
            ObjectFormat::Mp3 => Some(Self::Mp3),
            ObjectFormat::Wma => Some(Self::Wma),
            _ => None,
        }
    }

    /// Maps to the wire format used on object creation. `Unknown` becomes `Undefined`.
    pub fn format(self) -> ObjectFormat {
        match self {
            Self::Wav => ObjectFormat::Wav,
            Self::Mp3 => ObjectFormat::Mp3,
            Self::Wma => ObjectFormat::Wma,
            Self::Unknown => ObjectFormat::Undefined,
        }
    }
}

/// A track metadata attribute that maps onto one object property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetadataField {
    Title,
    Artist,
    Album,
    Genre,
    Duration,
    TrackNumber,
    ReleaseDate,
}

impl MetadataField {
    /// Query order used when building catalog records.
    pub const CATALOG_ORDER: [MetadataField; 7] = [
        Self::Title,
        Self::Artist,
        Self::Duration,
        Self::TrackNumber,
        Self::Genre,
        Self::Album,
        Self::ReleaseDate,
    ];

    /// Write order used when applying metadata to an object.
    pub const APPLY_ORDER: [MetadataField; 7] = [
        Self::Title,
        Self::Album,
        Self::Artist,
        Self::Genre,
        Self::Duration,
        Self::TrackNumber,
        Self::ReleaseDate,
    ];

    pub fn property(self) -> ObjectPropCode {
        match self {
            Self::Title => ObjectPropCode::Name,
            Self::Artist => ObjectPropCode::Artist,
            Self::Album => ObjectPropCode::AlbumName,
            Self::Genre => ObjectPropCode::Genre,
            Self::Duration => ObjectPropCode::Duration,
            Self::TrackNumber => ObjectPropCode::Track,
            Self::ReleaseDate => ObjectPropCode::OriginalReleaseDate,
        }
    }

    pub fn data_type(self) -> DataType {
        match self {
            Self::Duration => DataType::Uint32,
            Self::TrackNumber => DataType::Uint16,
            _ => DataType::String,
        }
    }

    /// Human-readable name used in logs and error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Genre => "genre",
            Self::Duration => "duration",
            Self::TrackNumber => "track number",
            Self::ReleaseDate => "release date",
        }
    }
}

/// Metadata for one track on the device.
///
/// Every optional field is independent: `None` means "not queried or not present on
/// the device", never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    /// Format: "YYYYMMDDThhmmss".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    /// In milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u16>,
    pub filename: String,
    /// In bytes.
    pub file_size: u64,
    pub codec: Codec,
    /// Set by the catalog, and by a successful send.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_handle: Option<ObjectHandle>,
}

impl TrackMetadata {
    /// Returns the value to write for `field`, or `None` if the field should be skipped.
    ///
    /// Strings are written when present; numbers only when non-zero.
    pub fn field_value(&self, field: MetadataField) -> Option<PropertyValue> {
        match field {
            MetadataField::Title => self.title.clone().map(PropertyValue::String),
            MetadataField::Artist => self.artist.clone().map(PropertyValue::String),
            MetadataField::Album => self.album.clone().map(PropertyValue::String),
            MetadataField::Genre => self.genre.clone().map(PropertyValue::String),
            MetadataField::ReleaseDate => self.release_date.clone().map(PropertyValue::String),
            MetadataField::Duration => self.duration.filter(|d| *d != 0).map(PropertyValue::U32),
            MetadataField::TrackNumber => self.track_number.filter(|n| *n != 0).map(PropertyValue::U16),
        }
    }

    /// Stores a value read from the device. Returns false if the value's type doesn't fit the field.
    pub fn set_field(&mut self, field: MetadataField, value: PropertyValue) -> bool {
        match (field, value) {
            (MetadataField::Title, PropertyValue::String(s)) => self.title = Some(s),
            (MetadataField::Artist, PropertyValue::String(s)) => self.artist = Some(s),
            (MetadataField::Album, PropertyValue::String(s)) => self.album = Some(s),
            (MetadataField::Genre, PropertyValue::String(s)) => self.genre = Some(s),
            (MetadataField::ReleaseDate, PropertyValue::String(s)) => self.release_date = Some(s),
            (MetadataField::Duration, value) => match value.as_u32() {
                Some(ms) => self.duration = Some(ms),
                None => return false,
            },
            (MetadataField::TrackNumber, value) => match value.as_u16() {
                Some(n) => self.track_number = Some(n),
                None => return false,
            },
            _ => return false,
        }
        true
    }
}

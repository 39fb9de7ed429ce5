//! Host-side MTP object transfer and property synchronization.
//!
//! Opens a session on a portable media device, lists its tracks with their metadata,
//! copies track content in both directions, and writes metadata back, deleting any
//! half-created object when a multi-step upload fails partway.
//!
//! The USB side is behind the [`Transport`] trait. With the `virtual-device` feature the
//! crate also ships [`transport::VirtualDevice`], an in-memory device for E2E tests.
//!
//! ```ignore
//! let mut session = MtpSession::open(usb_transport, TransferConfig::from_env())?;
//! for track in session.list_tracks(&CatalogFilter::all())? {
//!     log::info!("{:?} by {:?}", track.title, track.artist);
//! }
//! ```

// Warn on unused code to catch dead code early
#![warn(unused)]
// Warn on unused dependencies
#![warn(unused_crate_dependencies)]
// Warn on redundant path prefixes (e.g., std::path::Path when Path is imported)
#![warn(unused_qualifications)]
// Use log::* macros instead of println!/eprintln! for proper log level control
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod ptp;
pub mod session;
pub mod transport;
pub mod types;

pub use config::TransferConfig;
pub use session::{
    CatalogFilter, ConnectError, MtpError, MtpSession, ObjectInfoFault, ObjectSink, ProgressFn, TransferDirection,
    TransferFault, WireError,
};
pub use transport::{Transport, TransportError};
pub use types::{Codec, MetadataField, ObjectHandle, StorageId, TrackMetadata};

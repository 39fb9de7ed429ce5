//! Host-to-device transfers: the chunked content push and track creation with rollback.

use std::fs::File;
use std::io::{self, Read};
use std::ops::ControlFlow;
use std::path::Path;

use log::{debug, info, warn};

use super::MtpSession;
use super::errors::{MtpError, TransferFault, WireError};
use crate::ptp::{ObjectFormat, ObjectInfo, OperationCode, encode_data_header};
use crate::transport::Transport;
use crate::types::{Codec, ObjectHandle, TrackMetadata};

/// Progress callback for pushes.
/// Called before each chunk with (bytes_sent_so_far, total_bytes). Return
/// `ControlFlow::Break(())` to cancel before that chunk goes out.
pub type ProgressFn<'a> = &'a mut dyn FnMut(u64, u64) -> ControlFlow<()>;

/// Fills `buf` from `source`, stopping early only at end of input. Returns the bytes read.
fn read_full(source: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl<T: Transport> MtpSession<T> {
    /// Streams `size` bytes from `source` as the content of the object announced by the
    /// last SendObjectInfo.
    ///
    /// The data-phase header goes out as its own write, then the payload in
    /// `block_size` chunks. A payload that fills whole USB packets is closed with one
    /// zero-length write.
    pub fn push(&mut self, source: &mut dyn Read, size: u64, mut progress: Option<ProgressFn<'_>>) -> Result<(), MtpError> {
        debug!("MTP push: size={}", size);
        let operation = OperationCode::SendObject;
        let wire = |error: WireError| MtpError::upload(error);

        let transaction_id = self.next_transaction_id();
        self.send(operation, transaction_id, &[]).map_err(wire)?;
        self.transport
            .write_bytes(&encode_data_header(operation, transaction_id, size))
            .map_err(|e| wire(e.into()))?;

        let block_size = self.config.block_size;
        let buffer_len = usize::try_from(size).map_or(block_size, |s| s.min(block_size));
        let mut buffer = vec![0u8; buffer_len];
        let mut sent: u64 = 0;

        while sent < size {
            // Bounded by block_size, so the cast can't truncate
            let chunk_len = (size - sent).min(block_size as u64) as usize;
            let chunk = &mut buffer[..chunk_len];

            let read = read_full(source, chunk).map_err(|e| {
                MtpError::upload(TransferFault::Source {
                    message: e.to_string(),
                })
            })?;
            if read < chunk_len {
                return Err(MtpError::upload(TransferFault::ShortRead {
                    expected: size,
                    actual: sent + read as u64,
                }));
            }

            if let Some(callback) = progress.as_deref_mut()
                && callback(sent, size).is_break()
            {
                info!("MTP push cancelled after {} of {} bytes", sent, size);
                return Err(MtpError::Cancelled {
                    bytes_sent: sent,
                    total: size,
                });
            }

            self.transport.write_bytes(chunk).map_err(|e| wire(e.into()))?;
            sent += chunk_len as u64;
        }

        if let Some(callback) = progress.as_deref_mut() {
            // Final report, too late to cancel
            let _ = callback(size, size);
        }

        if self.needs_terminator(size) {
            self.transport.write_bytes(&[]).map_err(|e| wire(e.into()))?;
        }

        self.finish(operation, transaction_id).map_err(wire)?;
        info!("MTP pushed {} bytes", size);
        Ok(())
    }

    /// Creates a track on the device: object info, then content, then metadata.
    ///
    /// If the content push or the metadata writes fail, the new object is deleted before
    /// the error is returned. A failed delete is logged and doesn't replace the original
    /// error. On success `metadata.object_handle` is set.
    pub fn send_track(
        &mut self,
        source: &mut dyn Read,
        metadata: &mut TrackMetadata,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<ObjectHandle, MtpError> {
        debug!(
            "MTP send_track: filename={}, size={}, codec={:?}",
            metadata.filename, metadata.file_size, metadata.codec
        );
        if metadata.codec == Codec::Unknown {
            warn!("MTP send_track: unknown codec for {}, sending as undefined format", metadata.filename);
        }

        let handle = self.create_object(&metadata.filename, metadata.codec.format(), metadata.file_size)?;

        if let Err(e) = self.push(source, metadata.file_size, progress) {
            self.roll_back(handle, &e);
            return Err(e);
        }
        if let Err(e) = self.update_track_metadata(handle, metadata) {
            self.roll_back(handle, &e);
            return Err(e);
        }

        metadata.object_handle = Some(handle);
        self.handles.insert(handle);
        info!("MTP sent track {} as {}", metadata.filename, handle);
        Ok(handle)
    }

    /// Sends a track from a file. A zero `file_size` is taken from the filesystem, and an
    /// empty `filename` from the path.
    pub fn send_track_from_file(
        &mut self,
        path: &Path,
        metadata: &mut TrackMetadata,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<ObjectHandle, MtpError> {
        let source_error = |e: io::Error| {
            MtpError::upload(TransferFault::Source {
                message: format!("{}: {}", path.display(), e),
            })
        };
        let mut file = File::open(path).map_err(source_error)?;
        if metadata.file_size == 0 {
            metadata.file_size = file.metadata().map_err(source_error)?.len();
        }
        if metadata.filename.is_empty()
            && let Some(name) = path.file_name()
        {
            metadata.filename = name.to_string_lossy().into_owned();
        }
        self.send_track(&mut file, metadata, progress)
    }

    /// Announces a new object with SendObjectInfo and returns the handle the device assigned.
    pub(super) fn create_object(
        &mut self,
        filename: &str,
        format: ObjectFormat,
        size: u64,
    ) -> Result<ObjectHandle, MtpError> {
        let info = ObjectInfo::new_file(filename, format, size);
        // Storage 0 and parent 0 let the device choose where the object goes
        let response = self
            .transact_data_out(OperationCode::SendObjectInfo, &[0, 0], &info.encode())
            .map_err(|cause| MtpError::CreateObject { cause })?;

        // Response params: storage, parent, new handle
        let handle = ObjectHandle(response.param(2));
        if handle.0 == 0 {
            return Err(MtpError::CreateObject {
                cause: WireError::Malformed {
                    message: "SendObjectInfo response carries no object handle".to_string(),
                },
            });
        }
        debug!(
            "MTP created object {} (storage 0x{:08x}, parent 0x{:08x})",
            handle,
            response.param(0),
            response.param(1)
        );
        Ok(handle)
    }
}

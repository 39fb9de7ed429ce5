//! Device-to-host transfers.

use std::fs::File;
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info};

use super::MtpSession;
use super::errors::{MtpError, ObjectInfoFault, TransferFault};
use crate::ptp::OperationCode;
use crate::transport::Transport;
use crate::types::ObjectHandle;

/// Destination of a pull.
pub trait ObjectSink: Write {
    /// Reserves room for `size` bytes before any data arrives.
    fn preallocate(&mut self, size: u64) -> io::Result<()> {
        let _ = size;
        Ok(())
    }
}

impl ObjectSink for File {
    /// Sets the file length up front, then rewinds so the data lands from offset 0.
    fn preallocate(&mut self, size: u64) -> io::Result<()> {
        self.set_len(size)?;
        self.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

impl ObjectSink for Vec<u8> {
    fn preallocate(&mut self, size: u64) -> io::Result<()> {
        let size = usize::try_from(size).map_err(io::Error::other)?;
        self.try_reserve_exact(size).map_err(io::Error::other)
    }
}

impl ObjectSink for Cursor<Vec<u8>> {
    fn preallocate(&mut self, size: u64) -> io::Result<()> {
        self.get_mut().preallocate(size)
    }
}

/// Counts bytes on their way into the sink and remembers the first write failure, so a
/// failing destination can be told apart from a failing device.
struct CountingSink<'a> {
    inner: &'a mut dyn ObjectSink,
    written: u64,
    failure: Option<String>,
}

impl Write for CountingSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.write(buf) {
            Ok(n) => {
                self.written += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.failure.get_or_insert_with(|| e.to_string());
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().inspect_err(|e| {
            self.failure.get_or_insert_with(|| e.to_string());
        })
    }
}

impl<T: Transport> MtpSession<T> {
    /// Copies an object's content into `sink`. Returns the byte count.
    ///
    /// Not cancellable. On failure the sink keeps whatever was preallocated and written;
    /// cleaning it up is the caller's job.
    pub fn pull(&mut self, handle: ObjectHandle, sink: &mut dyn ObjectSink) -> Result<u64, MtpError> {
        debug!("MTP pull: handle={}", handle);
        let info = self.object_info(handle)?;
        if info.is_association() {
            return Err(MtpError::ObjectInfo {
                handle,
                cause: ObjectInfoFault::Association,
            });
        }
        let expected = info.compressed_size;

        sink.preallocate(expected).map_err(|e| {
            MtpError::download(TransferFault::Sink {
                message: e.to_string(),
            })
        })?;

        let block_size = self.config.block_size;
        let mut counter = CountingSink {
            inner: sink,
            written: 0,
            failure: None,
        };
        let result = {
            let mut writer = BufWriter::with_capacity(block_size, &mut counter);
            match self.transact_data_in(OperationCode::GetObject, &[handle.0], &mut writer) {
                Ok(_) => writer.flush().map_err(|e| TransferFault::Sink {
                    message: e.to_string(),
                }),
                Err(error) => Err(TransferFault::Wire { error }),
            }
        };
        // A sink failure surfaces as a transport error from the data phase, so check it first
        if let Some(message) = counter.failure.take() {
            return Err(MtpError::download(TransferFault::Sink { message }));
        }
        result.map_err(MtpError::download)?;

        let received = counter.written;
        if received != expected {
            return Err(MtpError::download(TransferFault::SizeMismatch {
                expected,
                actual: received,
            }));
        }

        info!("MTP pulled {} ({} bytes)", handle, received);
        Ok(received)
    }

    /// Pulls an object into a file at `path`, creating or truncating it.
    pub fn get_track_to_file(&mut self, handle: ObjectHandle, path: &Path) -> Result<u64, MtpError> {
        let mut file = File::create(path).map_err(|e| {
            MtpError::download(TransferFault::Sink {
                message: format!("{}: {}", path.display(), e),
            })
        })?;
        self.pull(handle, &mut file)
    }
}

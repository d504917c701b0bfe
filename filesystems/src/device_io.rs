// Image-backed block I/O
// Every driver read and write goes through one handle at absolute byte
// offsets; there is no buffering layer above the OS.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use fatkit_core::FatError;

/// Exclusive read/write handle over a filesystem image.
///
/// The handle is owned by the mounted volume for its whole lifetime and is
/// closed when the volume is dropped, on every exit path.
pub struct ImageFile {
    file: File,
}

impl ImageFile {
    /// Open the image for shared random-access read and write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FatError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    /// Read exactly `len` bytes at an absolute byte offset.
    ///
    /// A short read fails the current operation with an I/O error.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, FatError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Write all of `data` at an absolute byte offset.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), FatError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), FatError> {
        self.file.flush()?;
        Ok(())
    }
}

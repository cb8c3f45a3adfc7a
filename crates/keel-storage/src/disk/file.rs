//! File-backed disk manager using positioned I/O.
//!
//! Pages live at `page_id * page_size` offsets in a single database file.
//! Positioned reads and writes (`read_at` / `write_all_at`) allow concurrent
//! I/O from multiple threads without a seek lock on the file.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use keel_common::PageId;

use super::DiskManager;

/// Disk manager that stores pages in a single file.
pub struct FileDiskManager {
    file: File,
    path: PathBuf,
    page_size: usize,
}

impl FileDiskManager {
    /// Opens (creating if necessary) the database file at `path`.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        Ok(Self {
            file,
            path,
            page_size,
        })
    }

    /// Returns the path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of whole pages currently stored in the file.
    pub fn num_pages(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len() / self.page_size as u64)
    }

    /// Flushes file contents to stable storage.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_data()
    }

    fn offset(&self, page_id: PageId) -> io::Result<u64> {
        if page_id.as_i32() < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot address page {page_id:?}"),
            ));
        }
        Ok(page_id.as_i32() as u64 * self.page_size as u64)
    }

    fn check_buffer(&self, len: usize) -> io::Result<()> {
        if len != self.page_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "buffer is {len} bytes, expected page size {}",
                    self.page_size
                ),
            ));
        }
        Ok(())
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> io::Result<()> {
        self.check_buffer(buf.len())?;
        let offset = self.offset(page_id)?;

        // A page past the end of the file (or a partially written tail) reads
        // as zeroes.
        let mut pos = 0;
        while pos < buf.len() {
            match self.file.read_at(&mut buf[pos..], offset + pos as u64) {
                Ok(0) => break,
                Ok(n) => pos += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf[pos..].fill(0);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> io::Result<()> {
        self.check_buffer(buf.len())?;
        let offset = self.offset(page_id)?;
        self.file.write_all_at(buf, offset)
    }
}

impl std::fmt::Debug for FileDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileDiskManager")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .finish()
    }
}

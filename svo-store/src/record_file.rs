//! Fixed-length record I/O over a single file.
//!
//! Every call is one seek followed by one read or write. Nothing is cached;
//! record `i` always lives at byte offset `i * record_size`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::errors::{OctreeError, OctreeResult};

/// A file holding an array of equally sized records.
pub struct RecordFile {
    file: File,
    path: PathBuf,
    record_size: usize,
}

impl RecordFile {
    /// Opens the file at `path` for reading and writing.
    ///
    /// With `create` a missing file is created empty; with `truncate` an
    /// existing file is emptied.
    pub fn open(
        path: &Path,
        record_size: usize,
        create: bool,
        truncate: bool,
    ) -> OctreeResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(truncate)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            record_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn set_record_size(&mut self, record_size: usize) {
        self.record_size = record_size;
    }

    /// Current file length in bytes
    pub fn len_bytes(&self) -> OctreeResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Number of whole records currently in the file
    pub fn record_count(&self) -> OctreeResult<u64> {
        if self.record_size == 0 {
            return Ok(0);
        }
        Ok(self.len_bytes()? / self.record_size as u64)
    }

    /// Read the record at `index` (one seek + one read).
    ///
    /// The record must lie entirely within the file; nothing is allocated
    /// for a record the file cannot hold.
    pub fn read_record(&mut self, index: u64) -> OctreeResult<Vec<u8>> {
        let offset = self.offset(index)?;
        let len = self.len_bytes()?;
        let fits = offset
            .checked_add(self.record_size as u64)
            .is_some_and(|end| end <= len);
        if !fits {
            return Err(OctreeError::TruncatedRecord {
                expected: self.record_size,
                actual: len.saturating_sub(offset) as usize,
            });
        }

        let mut buffer = vec![0u8; self.record_size];
        self.file.seek(SeekFrom::Start(offset))?;
        let filled = read_full(&mut self.file, &mut buffer)?;
        if filled < self.record_size {
            return Err(OctreeError::TruncatedRecord {
                expected: self.record_size,
                actual: filled,
            });
        }
        Ok(buffer)
    }

    /// Overwrite the record at `index`. Only that record's bytes are touched.
    pub fn write_record(&mut self, index: u64, record: &[u8]) -> OctreeResult<()> {
        self.check_len(record)?;
        self.file.seek(SeekFrom::Start(self.offset(index)?))?;
        self.file.write_all(record)?;
        Ok(())
    }

    /// Write `record` at the end of the file, returning its byte offset.
    pub fn append_record(&mut self, record: &[u8]) -> OctreeResult<u64> {
        self.check_len(record)?;
        let position = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(record)?;
        Ok(position)
    }

    /// Flush file contents and metadata to disk
    pub fn sync(&mut self) -> OctreeResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn offset(&self, index: u64) -> OctreeResult<u64> {
        index
            .checked_mul(self.record_size as u64)
            .ok_or(OctreeError::OutOfRange {
                index,
                count: u64::MAX / self.record_size.max(1) as u64,
            })
    }

    fn check_len(&self, record: &[u8]) -> OctreeResult<()> {
        if record.len() != self.record_size {
            return Err(OctreeError::RecordSizeMismatch {
                expected: self.record_size,
                actual: record.len(),
            });
        }
        Ok(())
    }
}

/// Fill `buffer` as far as the file allows, returning the number of bytes read.
fn read_full(file: &mut File, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

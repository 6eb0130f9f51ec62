use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use common::{DbError, DbResult};

/// Durable store of fixed-length records addressed by a 1-based record
/// number. The heap file keeps one block per record and relies on the
/// record count to rediscover its highest block id on open.
#[derive(Debug)]
pub struct RecordFile {
    file: File,
    path: PathBuf,
    record_len: usize,
}

impl RecordFile {
    /// Create the file, failing if it already exists.
    pub fn create(path: &Path, record_len: usize) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            record_len,
        })
    }

    /// Open an existing file for reading and writing.
    pub fn open(path: &Path, record_len: usize) -> DbResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            record_len,
        })
    }

    /// Close the file and delete it from the filesystem.
    pub fn remove(self) -> DbResult<()> {
        let Self { file, path, .. } = self;
        drop(file);
        fs::remove_file(&path)?;
        Ok(())
    }

    /// Number of records currently stored.
    pub fn num_records(&self) -> DbResult<u32> {
        let len = self.file.metadata()?.len();
        Ok((len / self.record_len as u64) as u32)
    }

    pub fn get(&mut self, key: u32, buf: &mut [u8]) -> DbResult<()> {
        if buf.len() != self.record_len {
            return Err(DbError::Storage(format!(
                "record buffer is {} bytes, expected {}",
                buf.len(),
                self.record_len
            )));
        }
        let offset = self.offset(key)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    pub fn put(&mut self, key: u32, bytes: &[u8]) -> DbResult<()> {
        if bytes.len() != self.record_len {
            return Err(DbError::Storage(format!(
                "record is {} bytes, expected {}",
                bytes.len(),
                self.record_len
            )));
        }
        let offset = self.offset(key)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        self.file.flush()?;
        Ok(())
    }

    fn offset(&self, key: u32) -> DbResult<u64> {
        if key == 0 {
            return Err(DbError::Storage("record keys are 1-based".into()));
        }
        Ok(u64::from(key - 1) * self.record_len as u64)
    }
}

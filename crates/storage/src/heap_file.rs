use std::path::PathBuf;

use common::{BlockId, Config, DbError, DbResult};
use log::debug;

use crate::record_file::RecordFile;
use crate::{BLOCK_SZ, SlottedPage};

/// The block sequence backing one relation, stored as fixed-length records
/// in a [`RecordFile`] at `<data_dir>/<name>.db`.
///
/// `last` is the highest block id ever allocated; it is recovered from the
/// record count on open, so no header block or free list is kept.
#[derive(Debug)]
pub struct HeapFile {
    name: String,
    path: PathBuf,
    file: Option<RecordFile>,
    last: u32,
}

impl HeapFile {
    pub fn new(config: &Config, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = config.data_dir.join(format!("{name}.db"));
        Self {
            name,
            path,
            file: None,
            last: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Highest allocated block id.
    pub fn last_block(&self) -> BlockId {
        BlockId(self.last)
    }

    /// Create the underlying file (exclusive) and allocate block 1, so a
    /// reopened file always has at least one block to append into.
    pub fn create(&mut self) -> DbResult<()> {
        debug!("creating heap file {}", self.path.display());
        self.file = Some(RecordFile::create(&self.path, BLOCK_SZ)?);
        self.last = 0;
        let block = self.get_new()?;
        self.put(&block)
    }

    /// Open the underlying file if it is not open already, recovering
    /// `last` from the stored record count.
    pub fn open(&mut self) -> DbResult<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let file = RecordFile::open(&self.path, BLOCK_SZ)?;
        self.last = file.num_records()?;
        self.file = Some(file);
        Ok(())
    }

    pub fn close(&mut self) -> DbResult<()> {
        self.file = None;
        Ok(())
    }

    /// Close and remove the file from the filesystem.
    pub fn destroy(&mut self) -> DbResult<()> {
        debug!("destroying heap file {}", self.path.display());
        let file = match self.file.take() {
            Some(file) => file,
            None => RecordFile::open(&self.path, BLOCK_SZ)?,
        };
        file.remove()?;
        self.last = 0;
        Ok(())
    }

    /// Allocate a new block: reserve storage under the next key, then read
    /// it back so the returned page owns the buffer the store will accept
    /// on a later `put`.
    pub fn get_new(&mut self) -> DbResult<SlottedPage> {
        let next = self.last + 1;
        let file = self.require_open()?;
        file.put(next, &[0u8; BLOCK_SZ])?;
        let mut buf = vec![0u8; BLOCK_SZ];
        file.get(next, &mut buf)?;
        self.last = next;
        SlottedPage::new(buf, BlockId(next))
    }

    pub fn get(&mut self, block_id: BlockId) -> DbResult<SlottedPage> {
        let file = self.require_open()?;
        let mut buf = vec![0u8; BLOCK_SZ];
        file.get(block_id.0, &mut buf)?;
        SlottedPage::from_bytes(buf, block_id)
    }

    pub fn put(&mut self, block: &SlottedPage) -> DbResult<()> {
        let key = block.block_id().0;
        let file = self.require_open()?;
        file.put(key, block.bytes())
    }

    /// Dense enumeration of every allocated block id.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (1..=self.last).map(BlockId)
    }

    fn require_open(&mut self) -> DbResult<&mut RecordFile> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(DbError::Storage(format!(
                "heap file '{}' is not open",
                self.name
            ))),
        }
    }
}

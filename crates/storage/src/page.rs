use std::mem::size_of;

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_into_slice};
use common::{BlockId, DbError, DbResult, RecordId};

use crate::BLOCK_SZ;

const SLOT_BYTES: usize = size_of::<Slot>();

fn bincode_config() -> impl Config {
    config::legacy()
}

/// 4-byte slot header: payload size and the offset of its first byte.
///
/// Slot 0 doubles as the page header, where `size` holds `num_records` and
/// `loc` holds `end_free`. A deleted slot is `(0, 0)` and stays that way;
/// record ids are never reused within a page.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
struct Slot {
    size: u16,
    loc: u16,
}

/// Record container within one block.
///
/// Slot headers grow upward from the low end of the block, payloads are
/// packed downward from the high end, and `end_free` is the offset of the
/// last free byte between them (inclusive).
#[derive(Debug, Clone)]
pub struct SlottedPage {
    block_id: BlockId,
    data: Vec<u8>,
    num_records: u16,
    end_free: u16,
}

impl SlottedPage {
    /// Format a fresh block: no records, all space after the header free.
    pub fn new(data: Vec<u8>, block_id: BlockId) -> DbResult<Self> {
        let mut page = Self::with_buffer(data, block_id)?;
        page.num_records = 0;
        page.end_free = (BLOCK_SZ - 1) as u16;
        page.write_header()?;
        Ok(page)
    }

    /// Adopt an existing block, reading `num_records` and `end_free` from
    /// header slot 0.
    pub fn from_bytes(data: Vec<u8>, block_id: BlockId) -> DbResult<Self> {
        let mut page = Self::with_buffer(data, block_id)?;
        let header = page.read_slot_at(0)?;
        page.num_records = header.size;
        page.end_free = header.loc;
        Ok(page)
    }

    fn with_buffer(data: Vec<u8>, block_id: BlockId) -> DbResult<Self> {
        if data.len() != BLOCK_SZ {
            return Err(DbError::Storage(format!(
                "block {} has {} bytes, expected {BLOCK_SZ}",
                block_id.0,
                data.len()
            )));
        }
        Ok(Self {
            block_id,
            data,
            num_records: 0,
            end_free: 0,
        })
    }

    pub fn block_id(&self) -> BlockId {
        self.block_id
    }

    /// Highest record id ever assigned in this block. Never decreases;
    /// deleted records keep their slot as a tombstone.
    pub fn num_records(&self) -> u16 {
        self.num_records
    }

    /// Offset of the last byte of free space, inclusive.
    pub fn end_free(&self) -> u16 {
        self.end_free
    }

    /// The raw block bytes, as the heap file writes them back out.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether a record of `size` payload bytes fits, counting its slot
    /// header plus a one-slot safety margin.
    pub fn has_room(&self, size: usize) -> bool {
        let available = i64::from(self.end_free) - (i64::from(self.num_records) + 2) * 4;
        available >= size as i64
    }

    /// Store a new record, returning its id. The page is unchanged when
    /// there is no room.
    pub fn add(&mut self, payload: &[u8]) -> DbResult<RecordId> {
        if !self.has_room(payload.len()) {
            return Err(DbError::NoRoom("not enough room for new record".into()));
        }
        self.num_records += 1;
        let id = self.num_records;
        let size = payload.len() as u16;
        self.end_free -= size;
        let loc = self.end_free + 1;
        self.data[loc as usize..loc as usize + payload.len()].copy_from_slice(payload);
        self.write_header()?;
        self.write_slot(id, Slot { size, loc })?;
        Ok(id)
    }

    /// Borrow the payload of record `id`, or `None` if it was deleted.
    pub fn get(&self, id: RecordId) -> DbResult<Option<&[u8]>> {
        let slot = self.slot(id)?;
        if slot.loc == 0 {
            return Ok(None);
        }
        Ok(Some(
            &self.data[slot.loc as usize..slot.loc as usize + slot.size as usize],
        ))
    }

    /// Delete record `id`, reclaiming its payload bytes. Deleting a
    /// tombstone is a no-op.
    pub fn del(&mut self, id: RecordId) -> DbResult<()> {
        let slot = self.slot(id)?;
        if slot.loc == 0 {
            return Ok(());
        }
        self.write_slot(id, Slot { size: 0, loc: 0 })?;
        self.slide(slot.loc, slot.loc + slot.size)
    }

    /// Replace the payload of record `id` in place, sliding neighbors to
    /// shrink or grow as needed. Fails with no room (page unchanged) when
    /// the growth does not fit.
    pub fn put(&mut self, id: RecordId, payload: &[u8]) -> DbResult<()> {
        let slot = self.slot(id)?;
        if slot.loc == 0 {
            return Err(DbError::Storage(format!(
                "record {id} in block {} is deleted",
                self.block_id.0
            )));
        }
        let new_size = payload.len();
        let old_size = slot.size as usize;
        if new_size > old_size {
            let extra = new_size - old_size;
            if !self.has_room(extra) {
                return Err(DbError::NoRoom("not enough room to grow record".into()));
            }
            let new_loc = slot.loc - extra as u16;
            self.slide(slot.loc, new_loc)?;
            self.data[new_loc as usize..new_loc as usize + new_size].copy_from_slice(payload);
            self.write_slot(
                id,
                Slot {
                    size: new_size as u16,
                    loc: new_loc,
                },
            )?;
        } else {
            self.data[slot.loc as usize..slot.loc as usize + new_size].copy_from_slice(payload);
            self.slide(slot.loc + new_size as u16, slot.loc + slot.size)?;
            // the slide relocated the rewritten payload; keep its adjusted
            // location and record the new size
            let moved = self.slot(id)?;
            self.write_slot(
                id,
                Slot {
                    size: new_size as u16,
                    loc: moved.loc,
                },
            )?;
        }
        Ok(())
    }

    /// Live record ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        (1..=self.num_records).filter(|&id| self.slot(id).is_ok_and(|slot| slot.loc != 0))
    }

    /// Shift the payloads packed between `end_free` and `start` so the byte
    /// at `start` lands at `end`: `end > start` closes a hole (delete,
    /// shrink), `end < start` opens one (grow). Adjusts the location of
    /// every live slot at or below `start`, then `end_free`, exactly once.
    fn slide(&mut self, start: u16, end: u16) -> DbResult<()> {
        if start == end {
            return Ok(());
        }
        let shift = i32::from(end) - i32::from(start);
        let src_lo = self.end_free as usize + 1;
        let dst_lo = (src_lo as i32 + shift) as usize;
        self.data.copy_within(src_lo..start as usize, dst_lo);
        for id in 1..=self.num_records {
            let slot = self.slot(id)?;
            if slot.loc != 0 && slot.loc <= start {
                let loc = (i32::from(slot.loc) + shift) as u16;
                self.write_slot(
                    id,
                    Slot {
                        size: slot.size,
                        loc,
                    },
                )?;
            }
        }
        self.end_free = (i32::from(self.end_free) + shift) as u16;
        self.write_header()
    }

    fn slot_offset(id: RecordId) -> usize {
        4 * id as usize
    }

    fn slot(&self, id: RecordId) -> DbResult<Slot> {
        if id == 0 || id > self.num_records {
            return Err(DbError::Storage(format!(
                "record {id} out of range in block {}",
                self.block_id.0
            )));
        }
        self.read_slot_at(Self::slot_offset(id))
    }

    fn read_slot_at(&self, start: usize) -> DbResult<Slot> {
        let end = start + SLOT_BYTES;
        if end > BLOCK_SZ {
            return Err(DbError::Storage(format!(
                "slot at offset {start} out of bounds in block {}",
                self.block_id.0
            )));
        }
        let (slot, read) = decode_from_slice(&self.data[start..end], bincode_config())
            .map_err(|e| DbError::Storage(format!("read slot failed: {e}")))?;
        debug_assert_eq!(read, SLOT_BYTES);
        Ok(slot)
    }

    fn write_slot(&mut self, id: RecordId, slot: Slot) -> DbResult<()> {
        let start = Self::slot_offset(id);
        if start + SLOT_BYTES > BLOCK_SZ {
            return Err(DbError::Storage(format!(
                "slot {id} out of bounds in block {}",
                self.block_id.0
            )));
        }
        let written = encode_into_slice(
            slot,
            &mut self.data[start..start + SLOT_BYTES],
            bincode_config(),
        )
        .map_err(|e| DbError::Storage(format!("write slot failed: {e}")))?;
        debug_assert_eq!(written, SLOT_BYTES);
        Ok(())
    }

    fn write_header(&mut self) -> DbResult<()> {
        let header = Slot {
            size: self.num_records,
            loc: self.end_free,
        };
        let written = encode_into_slice(header, &mut self.data[..SLOT_BYTES], bincode_config())
            .map_err(|e| DbError::Storage(format!("write page header failed: {e}")))?;
        debug_assert_eq!(written, SLOT_BYTES);
        Ok(())
    }
}

//! Heap storage: slotted pages stacked into heap files, with a typed
//! relational table on top.
//!
//! The layering mirrors the write path: [`HeapTable`] marshals a row and
//! hands the bytes to a [`SlottedPage`], [`HeapFile`] round-trips whole
//! blocks through the [`RecordFile`] page store.

mod heap_file;
mod heap_table;
mod page;
mod record_file;

pub use heap_file::HeapFile;
pub use heap_table::{Column, HeapTable};
pub use page::SlottedPage;
pub use record_file::RecordFile;

/// Fixed block size, the unit of I/O. Chosen at build time; the on-block
/// format addresses bytes with u16 offsets, so this must stay ≤ 64 KiB.
pub const BLOCK_SZ: usize = 4096;

const _: () = assert!(BLOCK_SZ <= u16::MAX as usize + 1);

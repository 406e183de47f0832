//! On-disk layout.
//!
//! ```text
//! [Directory: 2048B]   // 256 x (sub-table offset: u32, slot count: u32)
//! [Record 1]           // key_len: u32, value_len: u32, key, value
//! ...
//! [Record N]
//! [Sub-table 0]        // slot count x (hash: u32, record offset: u32)
//! ...
//! [Sub-table 255]
//! [Checksum: 32B]      // SHA-256 of every preceding byte
//! ```
//!
//! All integers are little-endian `u32`. A slot with hash `0` is empty.

use crate::error::{Error, Result};
use crate::medium::ReadAt;
use std::io::Write;

/// Number of sub-tables, one per value of the hash's low byte.
pub const NUM_TABLES: usize = 256;

/// Size of one encoded `u32` pair.
pub const PAIR_SIZE: usize = 8;

/// Size of the directory at the start of the file.
pub const DIRECTORY_SIZE: usize = NUM_TABLES * PAIR_SIZE;

/// Size of the `(key_len, value_len)` header in front of every record.
pub const RECORD_HEADER_SIZE: u64 = PAIR_SIZE as u64;

/// Bytes reserved per record for its share of the sub-tables: one slot,
/// doubled for the load factor.
pub const SLOT_RESERVATION: u64 = 2 * PAIR_SIZE as u64;

/// The largest file the 32-bit offsets can describe.
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// Encode two `u32` values as 8 little-endian bytes.
pub fn encode_pair(a: u32, b: u32) -> [u8; PAIR_SIZE] {
    let mut buf = [0u8; PAIR_SIZE];
    buf[..4].copy_from_slice(&a.to_le_bytes());
    buf[4..].copy_from_slice(&b.to_le_bytes());
    buf
}

/// Decode two `u32` values from the first 8 bytes of `data`.
pub fn decode_pair(data: &[u8]) -> Result<(u32, u32)> {
    if data.len() < PAIR_SIZE {
        return Err(Error::corruption(format!("pair too short: {} bytes", data.len())));
    }
    let mut a = [0u8; 4];
    let mut b = [0u8; 4];
    a.copy_from_slice(&data[0..4]);
    b.copy_from_slice(&data[4..8]);
    Ok((u32::from_le_bytes(a), u32::from_le_bytes(b)))
}

/// Append a pair to a sequential writer.
pub fn write_pair<W: Write>(writer: &mut W, a: u32, b: u32) -> Result<()> {
    writer.write_all(&encode_pair(a, b))?;
    Ok(())
}

/// Read a pair at an absolute offset.
pub fn read_pair_at<R: ReadAt + ?Sized>(medium: &R, offset: u64) -> Result<(u32, u32)> {
    let mut buf = [0u8; PAIR_SIZE];
    medium.read_exact_at(&mut buf, offset)?;
    decode_pair(&buf)
}

/// Sub-table index for a hash.
#[inline]
pub fn bucket_index(hash: u32) -> usize {
    (hash & 0xff) as usize
}

/// Starting probe slot for a hash in a sub-table of `length` slots.
#[inline]
pub fn start_slot(hash: u32, length: u32) -> u32 {
    (hash >> 8) % length
}

/// One hash table slot: a key hash and the offset of its record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    /// Hash of the record's key
    pub hash: u32,
    /// Absolute offset of the record's header
    pub offset: u32,
}

impl Slot {
    /// Create a new Slot
    pub fn new(hash: u32, offset: u32) -> Self {
        Self { hash, offset }
    }

    /// Whether a reader treats this slot as empty.
    pub fn is_empty(&self) -> bool {
        self.hash == 0
    }
}

/// Lay out one bucket's entries in an open-addressed table of twice their
/// number of slots, probing linearly from each entry's start slot.
///
/// A slot holding hash `0` counts as free, exactly as readers see it. An
/// entry whose hash is `0` can therefore be overwritten by a later entry and
/// is never found, but it never hides the entries probed past it.
pub fn build_table(entries: &[Slot]) -> Vec<Slot> {
    let length = entries.len() * 2;
    let mut table = vec![Slot::default(); length];

    for entry in entries {
        let mut slot = start_slot(entry.hash, length as u32) as usize;
        while !table[slot].is_empty() {
            slot = (slot + 1) % length;
        }
        table[slot] = *entry;
    }

    table
}

/// Location and slot count of one sub-table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableHandle {
    /// Absolute offset of the sub-table
    pub offset: u32,
    /// Number of slots (not bytes)
    pub length: u32,
}

impl TableHandle {
    /// Create a new TableHandle
    pub fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }

    /// Offset of the given slot.
    pub fn slot_offset(&self, slot: u32) -> u64 {
        u64::from(self.offset) + PAIR_SIZE as u64 * u64::from(slot)
    }

    /// Offset one past the last slot.
    pub fn end_offset(&self) -> u64 {
        self.slot_offset(self.length)
    }
}

/// The 256 sub-table handles stored at the front of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    tables: [TableHandle; NUM_TABLES],
}

impl Default for Directory {
    fn default() -> Self {
        Self { tables: [TableHandle::default(); NUM_TABLES] }
    }
}

impl Directory {
    /// Handle of the sub-table for `bucket`.
    pub fn table(&self, bucket: usize) -> TableHandle {
        self.tables[bucket]
    }

    /// Handle of the sub-table that holds `hash`.
    pub fn table_for(&self, hash: u32) -> TableHandle {
        self.tables[bucket_index(hash)]
    }

    pub(crate) fn set(&mut self, bucket: usize, handle: TableHandle) {
        self.tables[bucket] = handle;
    }

    /// All handles in bucket order.
    pub fn tables(&self) -> &[TableHandle; NUM_TABLES] {
        &self.tables
    }

    /// Total number of slots across all sub-tables.
    pub fn total_slots(&self) -> u64 {
        self.tables.iter().map(|t| u64::from(t.length)).sum()
    }

    /// Encode the directory (2048 bytes)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DIRECTORY_SIZE);
        for table in &self.tables {
            buf.extend_from_slice(&encode_pair(table.offset, table.length));
        }
        buf
    }

    /// Decode a directory from exactly 2048 bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != DIRECTORY_SIZE {
            return Err(Error::corruption(format!(
                "Directory size mismatch: expected {}, got {}",
                DIRECTORY_SIZE,
                data.len()
            )));
        }

        let mut directory = Self::default();
        for (i, chunk) in data.chunks_exact(PAIR_SIZE).enumerate() {
            let (offset, length) = decode_pair(chunk)?;
            directory.tables[i] = TableHandle::new(offset, length);
        }
        Ok(directory)
    }

    /// Read the directory from the start of a medium
    pub fn read_from<R: ReadAt + ?Sized>(medium: &R) -> Result<Self> {
        let mut buf = vec![0u8; DIRECTORY_SIZE];
        medium.read_exact_at(&mut buf, 0)?;
        Self::decode(&buf)
    }

    /// Offset where the records end and the first sub-table begins.
    pub fn records_end(&self) -> u64 {
        u64::from(self.tables[0].offset)
    }

    /// Check every handle against the data region `[DIRECTORY_SIZE, data_size)`.
    pub fn validate(&self, data_size: u64) -> Result<()> {
        let records_end = self.records_end();
        if records_end < DIRECTORY_SIZE as u64 || records_end > data_size {
            return Err(Error::corruption(format!(
                "Record region end {} lies outside the data region",
                records_end
            )));
        }

        for (i, table) in self.tables.iter().enumerate() {
            if table.length == 0 {
                continue;
            }
            if u64::from(table.offset) < DIRECTORY_SIZE as u64 || table.end_offset() > data_size {
                return Err(Error::corruption(format!(
                    "Sub-table {} at offset {} with {} slots lies outside the data region",
                    i, table.offset, table.length
                )));
            }
        }
        Ok(())
    }
}

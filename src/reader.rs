//! Database reader.
//!
//! Opening a database verifies the checksum trailer and loads the 2048-byte
//! directory. Nothing else is cached: each lookup probes one sub-table on the
//! medium and reads back candidate records to compare their keys.

use crate::config::Options;
use crate::error::{Error, Result};
use crate::format::{read_pair_at, start_slot, Directory, DIRECTORY_SIZE, RECORD_HEADER_SIZE};
use crate::hash::{Fasthash, KeyHasher};
use crate::integrity;
use crate::medium::ReadAt;
use bytes::Bytes;
use std::fs::File;
use std::path::Path;

/// Reader provides lookups into a finalized database.
///
/// A reader never changes after it is opened, so it can be shared across
/// threads (for example in an `Arc`) whenever its medium and hasher can.
///
/// Usage:
/// ```no_run
/// use constdb::Reader;
///
/// let reader = Reader::open("data.cdb").unwrap();
/// if let Some(value) = reader.get(b"key1").unwrap() {
///     println!("Found: {:?}", value);
/// }
/// ```
#[derive(Debug)]
pub struct Reader<R, H = Fasthash> {
    medium: R,
    hasher: H,
    directory: Directory,
    /// Size of the checksummed region, i.e. the file without its trailer.
    data_size: u64,
}

impl Reader<File> {
    /// Open the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, &Options::default())
    }

    /// Open the database at `path` with the given options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: &Options) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Opening database: {:?}", path);
        Self::with_options(File::open(path)?, Fasthash, options)
    }
}

impl<H: KeyHasher> Reader<File, H> {
    /// Open the database at `path`, written with `hasher`.
    pub fn open_with_hasher<P: AsRef<Path>>(path: P, hasher: H) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Opening database: {:?}", path);
        Self::with_options(File::open(path)?, hasher, &Options::default())
    }
}

impl<R: ReadAt> Reader<R> {
    /// Open a database held by any random-access medium.
    pub fn new(medium: R) -> Result<Self> {
        Self::with_options(medium, Fasthash, &Options::default())
    }
}

impl<R: ReadAt, H: KeyHasher> Reader<R, H> {
    /// Open a database written with `hasher`.
    ///
    /// The hasher must be the one the database was built with. A different
    /// one is not detected; every lookup just reports the key as missing.
    pub fn with_hasher(medium: R, hasher: H) -> Result<Self> {
        Self::with_options(medium, hasher, &Options::default())
    }

    /// Open a database with explicit options.
    ///
    /// Fails with a corruption error if the file is too small, the checksum
    /// does not match, or the directory points outside the file.
    pub fn with_options(medium: R, hasher: H, options: &Options) -> Result<Self> {
        options.validate()?;

        let data_size = integrity::verify(&medium, options.checksum_chunk_size)?;
        let directory = Directory::read_from(&medium)?;
        directory.validate(data_size)?;

        log::info!(
            "Opened database: {} records, {} bytes",
            directory.total_slots() / 2,
            data_size + integrity::CHECKSUM_SIZE as u64
        );

        Ok(Self { medium, hasher, directory, data_size })
    }

    /// Get the value of the first record for `key` in probe order.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let mut found = None;
        self.probe(key, |value| {
            found = Some(value);
            false
        })?;
        Ok(found)
    }

    /// Get the values of every record for `key`, in probe order.
    pub fn get_all(&self, key: &[u8]) -> Result<Vec<Bytes>> {
        let mut values = Vec::new();
        self.probe(key, |value| {
            values.push(value);
            true
        })?;
        Ok(values)
    }

    /// Check whether any record has `key`.
    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Walk the sub-table for `key`, handing each matching value to `visit`
    /// until it returns false.
    fn probe<F: FnMut(Bytes) -> bool>(&self, key: &[u8], mut visit: F) -> Result<()> {
        let hash = self.hasher.hash(key);
        let table = self.directory.table_for(hash);
        if table.length == 0 {
            return Ok(());
        }

        let start = start_slot(hash, table.length);
        let mut slot = start;
        loop {
            let (slot_hash, record_offset) = read_pair_at(&self.medium, table.slot_offset(slot))?;

            // An empty slot ends the probe sequence
            if slot_hash == 0 {
                break;
            }

            if slot_hash == hash {
                if let Some(value) = self.value_at(u64::from(record_offset), key)? {
                    if !visit(value) {
                        break;
                    }
                }
            }

            slot = (slot + 1) % table.length;
            if slot == start {
                break;
            }
        }

        Ok(())
    }

    fn value_at(&self, offset: u64, key: &[u8]) -> Result<Option<Bytes>> {
        let (key_len, value_len) = self.record_header(offset)?;

        // Lengths differ, no need to read the key
        if key_len as usize != key.len() {
            return Ok(None);
        }

        let mut buf = vec![0u8; key_len as usize + value_len as usize];
        self.medium.read_exact_at(&mut buf, offset + RECORD_HEADER_SIZE)?;
        if &buf[..key.len()] != key {
            return Ok(None);
        }

        Ok(Some(Bytes::from(buf).slice(key.len()..)))
    }
}

impl<R: ReadAt, H> Reader<R, H> {
    pub(crate) fn from_parts(medium: R, hasher: H, directory: Directory, data_size: u64) -> Self {
        Self { medium, hasher, directory, data_size }
    }

    /// Number of records in the database.
    pub fn len(&self) -> usize {
        (self.directory.total_slots() / 2) as usize
    }

    /// Whether the database holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The directory loaded at open.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Size of the file, checksum trailer included.
    pub fn file_size(&self) -> u64 {
        self.data_size + integrity::CHECKSUM_SIZE as u64
    }

    /// Iterate over every record in the order it was written.
    pub fn iter(&self) -> Iter<'_, R, H> {
        Iter { reader: self, position: DIRECTORY_SIZE as u64, end: self.records_end() }
    }

    /// Close the database.
    pub fn close(self) -> Result<()> {
        drop(self);
        Ok(())
    }

    /// Give back the underlying medium.
    pub fn into_inner(self) -> R {
        self.medium
    }

    fn records_end(&self) -> u64 {
        self.directory.records_end()
    }

    /// Read and bounds-check the `(key_len, value_len)` header at `offset`.
    fn record_header(&self, offset: u64) -> Result<(u32, u32)> {
        let end = self.records_end();
        if offset < DIRECTORY_SIZE as u64 || offset + RECORD_HEADER_SIZE > end {
            return Err(Error::corruption(format!(
                "Record offset {} outside the record region [{}, {})",
                offset, DIRECTORY_SIZE, end
            )));
        }

        let (key_len, value_len) = read_pair_at(&self.medium, offset)?;
        let record_end = offset + RECORD_HEADER_SIZE + u64::from(key_len) + u64::from(value_len);
        if record_end > end {
            return Err(Error::corruption(format!(
                "Record at offset {} runs past the record region ({} > {})",
                offset, record_end, end
            )));
        }

        Ok((key_len, value_len))
    }

    fn read_record(&self, offset: u64) -> Result<(Bytes, Bytes, u64)> {
        let (key_len, value_len) = self.record_header(offset)?;
        let key_len = key_len as usize;

        let mut buf = vec![0u8; key_len + value_len as usize];
        self.medium.read_exact_at(&mut buf, offset + RECORD_HEADER_SIZE)?;
        let next = offset + RECORD_HEADER_SIZE + buf.len() as u64;

        let buf = Bytes::from(buf);
        Ok((buf.slice(..key_len), buf.slice(key_len..), next))
    }
}

/// Iterator over all records of a database, in write order.
///
/// Yields `(key, value)` pairs, duplicates included. Stops after the first
/// error.
pub struct Iter<'a, R, H> {
    reader: &'a Reader<R, H>,
    position: u64,
    end: u64,
}

impl<R: ReadAt, H> Iterator for Iter<'_, R, H> {
    type Item = Result<(Bytes, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.end {
            return None;
        }

        match self.reader.read_record(self.position) {
            Ok((key, value, next)) => {
                self.position = next;
                Some(Ok((key, value)))
            }
            Err(e) => {
                self.position = self.end;
                Some(Err(e))
            }
        }
    }
}

impl<'a, R: ReadAt, H> IntoIterator for &'a Reader<R, H> {
    type Item = Result<(Bytes, Bytes)>;
    type IntoIter = Iter<'a, R, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

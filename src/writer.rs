//! Database writer.
//!
//! Records are appended as they arrive. Their hash entries are kept in memory,
//! grouped by bucket, until [`Writer::finish`] lays out the 256 sub-tables
//! after the records, fills in the directory at the front of the file and
//! appends the checksum trailer.

use crate::config::Options;
use crate::error::{Error, Result};
use crate::format::{
    build_table, bucket_index, write_pair, Directory, Slot, TableHandle, DIRECTORY_SIZE,
    MAX_FILE_SIZE, NUM_TABLES, PAIR_SIZE, RECORD_HEADER_SIZE, SLOT_RESERVATION,
};
use crate::hash::{Fasthash, KeyHasher};
use crate::integrity::{checksum_reader, CHECKSUM_SIZE};
use crate::medium::ReadAt;
use crate::reader::Reader;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

enum State {
    Building,
    Finalized(Directory),
    Poisoned,
}

/// Writer builds a database record by record.
///
/// The database is only valid once [`finish`](Writer::finish),
/// [`close`](Writer::close) or [`freeze`](Writer::freeze) has run. A writer
/// dropped before that leaves an invalid file behind.
///
/// Usage:
/// ```no_run
/// use constdb::Writer;
///
/// let mut writer = Writer::create("data.cdb").unwrap();
/// writer.put(b"key1", b"value1").unwrap();
/// writer.put(b"key2", b"value2").unwrap();
/// writer.close().unwrap();
/// ```
pub struct Writer<S: Read + Write + Seek, H: KeyHasher = Fasthash> {
    file: Option<BufWriter<S>>,
    hasher: H,
    buckets: [Vec<Slot>; NUM_TABLES],
    /// Offset the next record or sub-table will be written at.
    offset: u64,
    estimated_footer_size: u64,
    num_entries: u64,
    size_limit: u64,
    options: Options,
    state: State,
}

impl Writer<File> {
    /// Create a database at `path`, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_options(path, Options::default())
    }

    /// Create a database at `path` with the given options.
    pub fn create_with_options<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Creating database: {:?}", path);
        Self::with_options(open_for_build(path)?, Fasthash, options)
    }
}

impl<H: KeyHasher> Writer<File, H> {
    /// Create a database at `path` that hashes keys with `hasher`.
    pub fn create_with_hasher<P: AsRef<Path>>(path: P, hasher: H) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Creating database: {:?}", path);
        Self::with_options(open_for_build(path)?, hasher, Options::default())
    }
}

fn open_for_build(path: &Path) -> Result<File> {
    let mut open = OpenOptions::new();
    open.read(true).write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        open.mode(0o600);
    }
    Ok(open.open(path)?)
}

impl<S: Read + Write + Seek> Writer<S> {
    /// Build a database on an empty, readable and writable medium.
    pub fn new(sink: S) -> Result<Self> {
        Self::with_options(sink, Fasthash, Options::default())
    }
}

impl<S: Read + Write + Seek, H: KeyHasher> Writer<S, H> {
    /// Build a database that hashes keys with `hasher`.
    ///
    /// Every reader of the result must use the same hash function.
    pub fn with_hasher(sink: S, hasher: H) -> Result<Self> {
        Self::with_options(sink, hasher, Options::default())
    }

    /// Build a database with explicit options.
    ///
    /// `sink` must be empty. Leftover bytes would follow the trailer and fail
    /// verification, so a non-empty medium is rejected with
    /// [`Error::InvalidArgument`].
    pub fn with_options(mut sink: S, hasher: H, options: Options) -> Result<Self> {
        options.validate()?;

        let existing = sink.seek(SeekFrom::End(0))?;
        if existing != 0 {
            return Err(Error::invalid_argument(format!(
                "medium must be empty, found {} bytes",
                existing
            )));
        }

        // Reserve room for the directory, filled in at finalize
        let mut file = BufWriter::with_capacity(options.write_buffer_size, sink);
        file.write_all(&[0u8; DIRECTORY_SIZE])?;

        Ok(Self {
            file: Some(file),
            hasher,
            buckets: std::array::from_fn(|_| Vec::new()),
            offset: DIRECTORY_SIZE as u64,
            estimated_footer_size: 0,
            num_entries: 0,
            size_limit: MAX_FILE_SIZE,
            options,
            state: State::Building,
        })
    }

    /// Append a record.
    ///
    /// Fails with [`Error::TooMuchData`] before writing anything if the
    /// finished file could outgrow the 32-bit offset space. Keys may repeat.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_building()?;

        let record_size = RECORD_HEADER_SIZE + key.len() as u64 + value.len() as u64;
        let projected = self
            .offset
            .saturating_add(record_size)
            .saturating_add(self.estimated_footer_size)
            .saturating_add(SLOT_RESERVATION)
            .saturating_add(CHECKSUM_SIZE as u64);
        if projected > self.size_limit {
            return Err(Error::TooMuchData { projected, limit: self.size_limit });
        }

        let hash = self.hasher.hash(key);
        let file = self.file.as_mut().ok_or_else(|| Error::invalid_state("writer is closed"))?;
        if let Err(e) = write_record(file, key, value) {
            self.state = State::Poisoned;
            return Err(e);
        }

        self.buckets[bucket_index(hash)].push(Slot::new(hash, self.offset as u32));
        self.offset += record_size;
        self.estimated_footer_size += SLOT_RESERVATION;
        self.num_entries += 1;

        Ok(())
    }

    /// Finalize the database and return its directory.
    ///
    /// Only the first successful call writes anything; later calls return the
    /// same directory. After a failed finalize the file is unusable and every
    /// further call fails with [`Error::InvalidState`].
    pub fn finish(&mut self) -> Result<Directory> {
        match &self.state {
            State::Finalized(directory) => return Ok(directory.clone()),
            State::Poisoned => {
                return Err(Error::invalid_state("a previous write or finalize failed"))
            }
            State::Building => {}
        }

        match self.write_index() {
            Ok(directory) => {
                self.state = State::Finalized(directory.clone());
                Ok(directory)
            }
            Err(e) => {
                self.state = State::Poisoned;
                Err(e)
            }
        }
    }

    /// Finalize the database and release the medium.
    pub fn close(mut self) -> Result<()> {
        self.finish()?;
        if let Some(file) = self.file.take() {
            file.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        }
        Ok(())
    }

    /// Finalize the database and reopen the same medium for reads.
    ///
    /// The directory is handed over from memory, so the file is not re-read
    /// or re-verified.
    pub fn freeze(mut self) -> Result<Reader<S, H>>
    where
        S: ReadAt,
        H: Clone,
    {
        let directory = self.finish()?;
        let file = self.file.take().ok_or_else(|| Error::invalid_state("writer is closed"))?;
        let medium = file.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        Ok(Reader::from_parts(medium, self.hasher.clone(), directory, self.offset))
    }

    /// Number of records written so far.
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Bytes written so far, directory placeholder included.
    pub fn current_size(&self) -> u64 {
        self.offset
    }

    /// Whether the database has been finalized.
    pub fn is_finalized(&self) -> bool {
        matches!(self.state, State::Finalized(_))
    }

    fn check_building(&self) -> Result<()> {
        match self.state {
            State::Building => Ok(()),
            State::Finalized(_) => Err(Error::invalid_state("database already finalized")),
            State::Poisoned => Err(Error::invalid_state("a previous write or finalize failed")),
        }
    }

    fn write_index(&mut self) -> Result<Directory> {
        let file = self.file.as_mut().ok_or_else(|| Error::invalid_state("writer is closed"))?;
        let buckets = std::mem::replace(&mut self.buckets, std::array::from_fn(|_| Vec::new()));
        let table_limit = self.size_limit.saturating_sub(CHECKSUM_SIZE as u64);
        let mut directory = Directory::default();

        // Sub-tables go back to back after the records, in bucket order
        for (bucket, entries) in buckets.iter().enumerate() {
            let table = build_table(entries);
            let end = self.offset + (table.len() * PAIR_SIZE) as u64;
            if end > table_limit {
                return Err(Error::TooMuchData {
                    projected: end + CHECKSUM_SIZE as u64,
                    limit: self.size_limit,
                });
            }

            directory.set(bucket, TableHandle::new(self.offset as u32, table.len() as u32));
            for slot in &table {
                write_pair(file, slot.hash, slot.offset)?;
            }
            self.offset = end;
        }
        file.flush()?;

        let sink = file.get_mut();
        sink.seek(SeekFrom::Start(0))?;
        sink.write_all(&directory.encode())?;

        sink.seek(SeekFrom::Start(0))?;
        let checksum = checksum_reader(sink, self.offset, self.options.checksum_chunk_size)?;
        sink.seek(SeekFrom::Start(self.offset))?;
        sink.write_all(&checksum)?;
        sink.flush()?;

        log::info!(
            "Finalized database: {} records, {} bytes",
            self.num_entries,
            self.offset + CHECKSUM_SIZE as u64
        );

        Ok(directory)
    }
}

fn write_record<W: Write>(writer: &mut W, key: &[u8], value: &[u8]) -> Result<()> {
    write_pair(writer, key.len() as u32, value.len() as u32)?;
    writer.write_all(key)?;
    writer.write_all(value)?;
    Ok(())
}

impl<S: Read + Write + Seek, H: KeyHasher> Drop for Writer<S, H> {
    fn drop(&mut self) {
        if matches!(self.state, State::Building) {
            log::warn!(
                "Writer dropped before finalize, {} records left in an invalid file",
                self.num_entries
            );
        }
    }
}

//! # constdb - An Immutable Constant Key/Value Database
//!
//! constdb builds a database once and then serves it read-only. All records
//! are written in a single build phase; finalizing lays out an on-disk hash
//! index so that every later lookup costs one directory access (in memory),
//! one or a few slot reads and one record read.
//!
//! ## Architecture
//!
//! - **Hash**: maps keys to 32-bit hashes ([`hash`])
//! - **Format**: the directory, record and sub-table layout ([`format`])
//! - **Writer**: appends records and builds the index at finalize ([`writer`])
//! - **Integrity**: SHA-256 trailer over the whole file ([`integrity`])
//! - **Reader**: verifies the trailer and probes the index ([`reader`])
//! - **Medium**: positioned reads over files or memory ([`medium`])
//!
//! Files are limited to 4GB, because every offset in the index is a `u32`.
//! The writer refuses records that could push the finished file past that.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), constdb::Error> {
//! // Build phase
//! let mut writer = constdb::create("./data.cdb")?;
//! writer.put(b"key1", b"value1")?;
//! writer.put(b"key2", b"value2")?;
//! writer.close()?;
//!
//! // Read phase
//! let reader = constdb::open("./data.cdb")?;
//! if let Some(value) = reader.get(b"key1")? {
//!     println!("Found: {:?}", value);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! A database must always be read with the hasher it was written with.
//! Mixing hashers is not detected and makes every key appear missing.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod config;
pub mod error;
pub mod format;
pub mod hash;
pub mod integrity;
pub mod medium;
pub mod reader;
pub mod writer;

// Re-exports
pub use config::Options;
pub use error::{Error, Result};
pub use format::{Directory, TableHandle};
pub use hash::{Crc32Hasher, Fasthash, KeyHasher};
pub use medium::{ReadAt, SeekReader};
pub use reader::Reader;
pub use writer::Writer;

use std::fs::File;
use std::path::Path;

/// Create a database at `path`, truncating any existing file.
pub fn create<P: AsRef<Path>>(path: P) -> Result<Writer<File>> {
    Writer::create(path)
}

/// Open the database at `path` for reads.
///
/// The checksum trailer is verified before the reader is returned.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Reader<File>> {
    Reader::open(path)
}

/// Check the checksum trailer of the database at `path` without opening it.
///
/// Returns the number of bytes covered by the checksum.
pub fn verify<P: AsRef<Path>>(path: P) -> Result<u64> {
    let file = File::open(path)?;
    integrity::verify(&file, config::DEFAULT_CHECKSUM_CHUNK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_open_verify() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.cdb");

        let mut writer = create(&path).unwrap();
        writer.put(b"hello", b"world").unwrap();
        writer.close().unwrap();

        let covered = verify(&path).unwrap();
        assert_eq!(covered, std::fs::metadata(&path).unwrap().len() - 32);

        let reader = open(&path).unwrap();
        assert_eq!(reader.get(b"hello").unwrap().as_deref(), Some(&b"world"[..]));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = open(dir.path().join("missing.cdb"));
        assert!(matches!(result.unwrap_err(), Error::Io(_)));
    }
}

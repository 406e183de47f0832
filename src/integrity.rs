//! Whole-file checksum trailer.
//!
//! The last 32 bytes of a finalized database are the SHA-256 digest of every
//! byte before them. Readers recompute it before trusting the directory.

use crate::error::{Error, Result};
use crate::format::DIRECTORY_SIZE;
use crate::medium::ReadAt;
use sha2::{Digest, Sha256};
use std::io::Read;
use subtle::ConstantTimeEq;

/// Size of the checksum trailer.
pub const CHECKSUM_SIZE: usize = 32;

/// Smallest valid file: an empty directory plus the trailer.
pub const MIN_FILE_SIZE: u64 = (DIRECTORY_SIZE + CHECKSUM_SIZE) as u64;

/// A SHA-256 digest.
pub type Checksum = [u8; CHECKSUM_SIZE];

/// Digest the next `len` bytes of a sequential reader.
pub fn checksum_reader<R: Read>(reader: &mut R, len: u64, chunk_size: usize) -> Result<Checksum> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size];
    let mut remaining = len;

    while remaining > 0 {
        let n = remaining.min(buf.len() as u64) as usize;
        reader.read_exact(&mut buf[..n])?;
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }

    Ok(hasher.finalize().into())
}

/// Digest bytes `[0, len)` of a medium.
pub fn checksum_at<R: ReadAt + ?Sized>(medium: &R, len: u64, chunk_size: usize) -> Result<Checksum> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size];
    let mut offset = 0u64;

    while offset < len {
        let n = (len - offset).min(buf.len() as u64) as usize;
        medium.read_exact_at(&mut buf[..n], offset)?;
        hasher.update(&buf[..n]);
        offset += n as u64;
    }

    Ok(hasher.finalize().into())
}

/// Compare two digests without an early exit on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Verify the trailer of a finalized database.
///
/// Returns the size of the checksummed region (file size minus trailer).
pub fn verify<R: ReadAt + ?Sized>(medium: &R, chunk_size: usize) -> Result<u64> {
    let size = medium.size()?;
    if size < MIN_FILE_SIZE {
        return Err(Error::corruption(format!(
            "File too small to be a valid database: {} bytes, need at least {}",
            size, MIN_FILE_SIZE
        )));
    }

    let data_size = size - CHECKSUM_SIZE as u64;
    let mut expected = [0u8; CHECKSUM_SIZE];
    medium.read_exact_at(&mut expected, data_size)?;

    let actual = checksum_at(medium, data_size, chunk_size)?;
    if !constant_time_eq(&expected, &actual) {
        log::warn!("Checksum mismatch over {} bytes, database possibly corrupt", data_size);
        return Err(Error::ChecksumMismatch {
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        });
    }

    Ok(data_size)
}

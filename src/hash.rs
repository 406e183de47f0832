//! Key hashing.
//!
//! Every key is reduced to a `u32`. The low 8 bits select one of the 256
//! sub-tables, the remaining bits pick the starting probe slot.
//!
//! A database must be read with the same [`KeyHasher`] it was written with.
//! This cannot be detected at runtime: a reader with the wrong hasher simply
//! reports every key as missing.

/// Maps a key to the 32-bit hash stored in the index.
pub trait KeyHasher {
    /// Hash `key`. Must be deterministic and free of per-process state.
    fn hash(&self, key: &[u8]) -> u32;
}

impl<H: KeyHasher + ?Sized> KeyHasher for &H {
    fn hash(&self, key: &[u8]) -> u32 {
        (**self).hash(key)
    }
}

/// Seed used by [`Fasthash`].
pub const FASTHASH_SEED: u64 = 0x2de9_ce7b_97d9_569f;

const FASTHASH_M: u64 = 0x8803_55f2_1e6d_1965;

/// The default hasher: fasthash64 with a fixed seed, folded to 32 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fasthash;

impl KeyHasher for Fasthash {
    fn hash(&self, key: &[u8]) -> u32 {
        hash32(key)
    }
}

/// Alternate hasher computing CRC-32 (IEEE) of the key.
///
/// CRC-32 of the empty key is `0`, which the index reads as an empty slot, so
/// an empty key stored with this hasher is never found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc32Hasher;

impl KeyHasher for Crc32Hasher {
    fn hash(&self, key: &[u8]) -> u32 {
        crc32fast::hash(key)
    }
}

/// Hash a key with the default function.
pub fn hash32(key: &[u8]) -> u32 {
    let h = fasthash64(FASTHASH_SEED, key);
    h.wrapping_sub(h >> 32) as u32
}

#[inline]
fn mix(mut h: u64) -> u64 {
    h ^= h >> 23;
    h = h.wrapping_mul(0x2127_599b_f432_5c37);
    h ^= h >> 47;
    h
}

/// fasthash64 over `buf`, little-endian word order.
pub fn fasthash64(seed: u64, buf: &[u8]) -> u64 {
    let mut h = seed ^ (buf.len() as u64).wrapping_mul(FASTHASH_M);

    let mut chunks = buf.chunks_exact(8);
    for chunk in &mut chunks {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        h ^= mix(u64::from_le_bytes(word));
        h = h.wrapping_mul(FASTHASH_M);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let v = tail.iter().enumerate().fold(0u64, |v, (i, &b)| v ^ (u64::from(b) << (8 * i)));
        h ^= mix(v);
        h = h.wrapping_mul(FASTHASH_M);
    }

    mix(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash32(b"hello"), hash32(b"hello"));
        assert_eq!(Fasthash.hash(b""), Fasthash.hash(b""));
        assert_eq!(Fasthash.hash(b"abc"), hash32(b"abc"));
    }

    #[test]
    fn test_hash_distinguishes_keys() {
        assert_ne!(hash32(b"hello"), hash32(b"world"));
        assert_ne!(hash32(b"a"), hash32(b"b"));
        // Tail bytes and length both feed the hash
        assert_ne!(hash32(b"12345678"), hash32(b"123456789"));
        assert_ne!(hash32(b"\0"), hash32(b""));
    }

    #[test]
    fn test_known_hash_values() {
        // Existing files depend on these exact values
        assert_eq!(fasthash64(FASTHASH_SEED, b""), 0xc3dd_aabd_0571_7b6b);
        assert_eq!(fasthash64(FASTHASH_SEED, b"hello"), 0x5e88_cf51_3af8_373d);
        assert_eq!(fasthash64(FASTHASH_SEED, b"12345678"), 0x3d78_07f3_2f8d_81e3);
        assert_eq!(fasthash64(FASTHASH_SEED, b"hello, constant world"), 0x135d_2191_f8d7_c77e);
        assert_eq!(fasthash64(0, b""), 0);

        assert_eq!(hash32(b""), 0x4193_d0ae);
        assert_eq!(hash32(b"hello"), 0xdc6f_67ec);
        assert_eq!(hash32(b"12345678"), 0xf215_79f0);
        assert_eq!(hash32(b"hello, constant world"), 0xe57a_a5ed);
    }

    #[test]
    fn test_fold_matches_64bit_hash() {
        let h = fasthash64(FASTHASH_SEED, b"fold me");
        assert_eq!(hash32(b"fold me"), h.wrapping_sub(h >> 32) as u32);
    }

    #[test]
    fn test_seed_changes_hash() {
        assert_ne!(fasthash64(0, b"key"), fasthash64(FASTHASH_SEED, b"key"));
    }

    #[test]
    fn test_low_byte_spread() {
        let buckets: HashSet<u32> =
            (0..4096).map(|i| hash32(format!("key{}", i).as_bytes()) & 0xff).collect();
        // 4096 keys should land in nearly every one of the 256 buckets
        assert!(buckets.len() > 240, "only {} buckets used", buckets.len());
    }

    #[test]
    fn test_crc32_hasher() {
        assert_eq!(Crc32Hasher.hash(b"123456789"), 0xcbf4_3926);
        assert_eq!(Crc32Hasher.hash(b""), 0);
    }

    #[test]
    fn test_hasher_by_reference() {
        let hasher = Fasthash;
        let by_ref = &hasher;
        assert_eq!(by_ref.hash(b"key"), hasher.hash(b"key"));
    }
}

//! # Bloom Filter
//!
//! A fixed-size probabilistic set used by every sorted run to reject keys that
//! are definitely absent before the index is searched.
//!
//! The filter can tell you with certainty that a key is **not** in the set (no
//! false negatives), but may report that a key **is** in the set when it isn't.
//! Its size does not depend on the number of inserted keys: every filter is
//! exactly [`FILTER_BYTES`] bytes, so heavily loaded runs see a higher false
//! positive rate. Lookups stay correct because a positive answer is always
//! confirmed by the run's index.
//!
//! ## Hashing
//!
//! One XXH3-128 hash of the key's little-endian bytes is split into
//! [`NUM_HASHES`] 32-bit lanes, each reduced modulo [`FILTER_BITS`].
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let mut bf = BloomFilter::new();
//! bf.insert(42);
//! assert!(bf.may_contain(42));
//! ```
use std::io::{self, Read, Write};

use thiserror::Error;
use xxhash_rust::xxh3::xxh3_128;

/// Size of the packed bitmap in bytes.
pub const FILTER_BYTES: usize = 10 * 1024;

/// Number of addressable bits.
pub const FILTER_BITS: u64 = (FILTER_BYTES * 8) as u64;

/// Number of hash lanes (k).
pub const NUM_HASHES: usize = 4;

/// Errors raised by direct bit access or bitmap decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BloomError {
    /// A bit index past the end of the bitmap.
    #[error("bit index {index} out of range (filter holds {len} bits)")]
    BitOutOfRange { index: u64, len: u64 },

    /// A serialized bitmap of the wrong size.
    #[error("filter bitmap must be {expected} bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },
}

/// A bloom filter backed by a fixed [`FILTER_BYTES`]-byte bit vector.
///
/// Bit `i` lives in byte `i / 8` at position `i % 8`, least significant bit
/// first. This is also the on-disk order.
#[derive(Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self {
            bits: vec![0u8; FILTER_BYTES],
        }
    }

    /// Builds a filter holding every key yielded by `keys`.
    pub fn from_keys<I: IntoIterator<Item = u64>>(keys: I) -> Self {
        let mut bf = Self::new();
        for key in keys {
            bf.insert(key);
        }
        bf
    }

    /// Wraps a packed bitmap read from a run file.
    ///
    /// # Errors
    ///
    /// Returns [`BloomError::BadLength`] unless `bytes` is exactly
    /// [`FILTER_BYTES`] long.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, BloomError> {
        if bytes.len() != FILTER_BYTES {
            return Err(BloomError::BadLength {
                expected: FILTER_BYTES,
                actual: bytes.len(),
            });
        }
        Ok(Self { bits: bytes })
    }

    /// Returns the packed bitmap.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Inserts a key into the filter.
    pub fn insert(&mut self, key: u64) {
        for idx in lanes(key) {
            self.bits[(idx / 8) as usize] |= 1 << (idx % 8);
        }
    }

    /// Returns `true` if the key **might** be in the set, `false` if it is
    /// **definitely not** in the set.
    #[must_use]
    pub fn may_contain(&self, key: u64) -> bool {
        lanes(key)
            .iter()
            .all(|&idx| (self.bits[(idx / 8) as usize] >> (idx % 8)) & 1 == 1)
    }

    /// Reads a single bit.
    pub fn bit(&self, index: u64) -> Result<bool, BloomError> {
        check_index(index)?;
        Ok((self.bits[(index / 8) as usize] >> (index % 8)) & 1 == 1)
    }

    /// Sets or clears a single bit.
    pub fn set_bit(&mut self, index: u64, value: bool) -> Result<(), BloomError> {
        check_index(index)?;
        let byte = &mut self.bits[(index / 8) as usize];
        if value {
            *byte |= 1 << (index % 8);
        } else {
            *byte &= !(1 << (index % 8));
        }
        Ok(())
    }

    /// Returns the number of bits currently set.
    #[must_use]
    pub fn count_ones(&self) -> u64 {
        self.bits.iter().map(|b| u64::from(b.count_ones())).sum()
    }

    /// Writes the packed bitmap (exactly [`FILTER_BYTES`] bytes).
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.bits)
    }

    /// Reads a packed bitmap of [`FILTER_BYTES`] bytes.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut bits = vec![0u8; FILTER_BYTES];
        r.read_exact(&mut bits)?;
        Ok(Self { bits })
    }
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("bits", &FILTER_BITS)
            .field("ones", &self.count_ones())
            .finish()
    }
}

fn check_index(index: u64) -> Result<(), BloomError> {
    if index >= FILTER_BITS {
        return Err(BloomError::BitOutOfRange {
            index,
            len: FILTER_BITS,
        });
    }
    Ok(())
}

/// Splits one 128-bit hash of the key into `NUM_HASHES` bit positions.
fn lanes(key: u64) -> [u64; NUM_HASHES] {
    let hash = xxh3_128(&key.to_le_bytes());
    let mut out = [0u64; NUM_HASHES];
    for (i, slot) in out.iter_mut().enumerate() {
        let lane = (hash >> (32 * i)) as u32;
        *slot = u64::from(lane) % FILTER_BITS;
    }
    out
}

#[cfg(test)]
mod tests;

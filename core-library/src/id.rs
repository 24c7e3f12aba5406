//! # Time-Ordered Identifiers
//!
//! Primary keys for catalogued entities (artists, albums, tracks, playlists).
//!
//! ## Layout
//!
//! | Bytes | Content |
//! |-------|---------|
//! | 0..6  | 48-bit big-endian Unix timestamp in milliseconds |
//! | 6     | top nibble: version tag `0100` |
//! | 8     | top two bits: variant tag `10` |
//! | rest  | randomness, or a counter within one millisecond |
//!
//! Because the timestamp leads, byte-wise comparison of identifiers follows
//! creation order, which keeps `ORDER BY id` meaningful and index inserts
//! append-mostly.
//!
//! Within a single millisecond the generator increments the trailing bytes of
//! the previous identifier instead of drawing new randomness. When those bytes
//! are exhausted it falls back to fresh randomness, so ordering is only
//! guaranteed up to a counter overflow. With a constant random source that
//! fallback can reproduce the previous identifier exactly.
//!
//! ## Usage
//!
//! ```ignore
//! use core_library::id::IdGenerator;
//!
//! let mut ids = IdGenerator::system();
//! let id = ids.generate()?;
//! println!("{id}"); // 0189f7a2-3c41-4d2e-9a6b-0c1d2e3f4a5b
//! ```

use crate::error::{LibraryError, Result};
use bridge_traits::time::{Clock, SystemClock};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const VERSION_BYTE: usize = 6;
const VARIANT_BYTE: usize = 8;
const COUNTER_START: usize = VARIANT_BYTE + 1;

/// A 16-byte time-ordered identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier([u8; 16]);

impl Identifier {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build an identifier from a stored blob; fails unless exactly 16 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 16] = bytes.try_into().map_err(|_| {
            LibraryError::InvalidIdentifier(format!("expected 16 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parse the canonical hyphenated hex form
    pub fn parse(text: &str) -> Result<Self> {
        let uuid = Uuid::try_parse(text)
            .map_err(|e| LibraryError::InvalidIdentifier(format!("{text:?}: {e}")))?;
        Ok(Self(*uuid.as_bytes()))
    }

    /// Millisecond timestamp recorded at creation
    pub fn timestamp_millis(&self) -> i64 {
        self.0[..VERSION_BYTE]
            .iter()
            .fold(0i64, |acc, byte| (acc << 8) | i64::from(*byte))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Uuid::from_bytes(self.0).hyphenated().fmt(f)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({self})")
    }
}

impl FromStr for Identifier {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(IdentifierVisitor)
    }
}

/// Accepts the textual form or the raw 16-byte form a row carries
struct IdentifierVisitor;

impl<'de> Visitor<'de> for IdentifierVisitor {
    type Value = Identifier;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a hyphenated identifier string or 16 bytes")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Identifier, E> {
        Identifier::parse(v).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Identifier, E> {
        Identifier::from_slice(v).map_err(E::custom)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Identifier, A::Error> {
        let mut bytes = Vec::with_capacity(16);
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.push(byte);
        }
        Identifier::from_slice(&bytes).map_err(de::Error::custom)
    }
}

/// Source of random bytes for new identifiers
pub trait RandomSource: Send {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()>;
}

/// Operating-system randomness
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        getrandom::getrandom(buf).map_err(|e| LibraryError::Random(e.to_string()))
    }
}

/// Generator of time-ordered identifiers
///
/// Not synchronized: share it behind a `Mutex` when several tasks allocate ids.
pub struct IdGenerator<C = SystemClock, R = OsRandom> {
    clock: C,
    random: R,
    last: Option<(i64, [u8; 16])>,
}

impl IdGenerator<SystemClock, OsRandom> {
    /// Generator backed by the system clock and OS randomness
    pub fn system() -> Self {
        Self::new(SystemClock, OsRandom)
    }
}

impl Default for IdGenerator<SystemClock, OsRandom> {
    fn default() -> Self {
        Self::system()
    }
}

impl<C: Clock, R: RandomSource> IdGenerator<C, R> {
    pub fn new(clock: C, random: R) -> Self {
        Self {
            clock,
            random,
            last: None,
        }
    }

    /// Produce the next identifier
    pub fn generate(&mut self) -> Result<Identifier> {
        let now = self.clock.unix_timestamp_millis();

        let incremented = match self.last {
            Some((last_ts, last_bytes)) if last_ts == now => increment_counter(last_bytes),
            _ => None,
        };

        let mut bytes = match incremented {
            Some(bytes) => bytes,
            None => {
                let mut bytes = [0u8; 16];
                bytes[..VERSION_BYTE].copy_from_slice(&now.to_be_bytes()[2..]);
                self.random.fill(&mut bytes[VERSION_BYTE..])?;
                bytes
            }
        };

        bytes[VERSION_BYTE] = (bytes[VERSION_BYTE] & 0x0F) | 0x40;
        bytes[VARIANT_BYTE] = (bytes[VARIANT_BYTE] & 0x3F) | 0x80;

        self.last = Some((now, bytes));
        Ok(Identifier(bytes))
    }
}

/// Increment bytes 9..16 as one big-endian counter; `None` once exhausted
fn increment_counter(mut bytes: [u8; 16]) -> Option<[u8; 16]> {
    for byte in bytes[COUNTER_START..].iter_mut().rev() {
        if *byte == 0xFF {
            *byte = 0;
        } else {
            *byte += 1;
            return Some(bytes);
        }
    }
    None
}

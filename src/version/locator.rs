//! Progress watermark of a version.
//!
//! A locator records how far into its upstream source a version has
//! consumed, so that ingestion can resume exactly where the version left
//! off. It is persisted as a hex string holding a small little-endian
//! binary record.

use std::cmp::Ordering;
use std::fmt;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, VersionError};

const LOCATOR_MAGIC: u16 = 0x4C43; // "LC"
const LOCATOR_LAYOUT: u8 = 1;
const FIXED_HEADER_LEN: usize = 2 + 1 + 8 + 8 + 4 + 1 + 4;

/// Position inside the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Offset {
    /// Source timestamp of the last consumed message.
    pub timestamp: i64,

    /// Number of messages sharing `timestamp` already consumed.
    pub concurrent_idx: u32,
}

impl Offset {
    /// Create a new offset.
    pub fn new(timestamp: i64, concurrent_idx: u32) -> Self {
        Offset {
            timestamp,
            concurrent_idx,
        }
    }
}

/// Serializable progress watermark.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Locator {
    src: u64,
    offset: Offset,
    user_data: String,
    legacy: bool,
}

impl Locator {
    /// Create a locator for the given source.
    pub fn new(src: u64, offset: Offset) -> Self {
        Locator {
            src,
            offset,
            user_data: String::new(),
            legacy: false,
        }
    }

    /// Synthesize a locator for a document written before locators existed.
    ///
    /// The result carries only a timestamp and is flagged legacy.
    pub fn from_legacy_timestamp(timestamp: i64) -> Self {
        let mut locator = Locator::new(0, Offset::new(timestamp, 0));
        locator.set_legacy_locator();
        locator
    }

    pub fn src(&self) -> u64 {
        self.src
    }

    pub fn set_src(&mut self, src: u64) {
        self.src = src;
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn set_offset(&mut self, timestamp: i64, concurrent_idx: u32) {
        self.offset = Offset::new(timestamp, concurrent_idx);
    }

    pub fn user_data(&self) -> &str {
        &self.user_data
    }

    pub fn set_user_data<S: Into<String>>(&mut self, user_data: S) {
        self.user_data = user_data.into();
    }

    /// Mark this locator for pre-format-3 comparison semantics.
    pub fn set_legacy_locator(&mut self) {
        self.legacy = true;
    }

    pub fn is_legacy_locator(&self) -> bool {
        self.legacy
    }

    /// Whether the locator points anywhere at all.
    pub fn is_valid(&self) -> bool {
        self.offset.timestamp >= 0 && (self.legacy || self.src != 0 || self.offset.timestamp > 0)
    }

    /// Whether `other` was produced from the same source, ignoring offsets.
    ///
    /// In non-strict mode a legacy locator on either side is considered to
    /// share the source, because legacy documents never recorded one.
    pub fn is_same_src(&self, other: &Locator, strict: bool) -> bool {
        if !strict && (self.legacy || other.legacy) {
            return true;
        }
        self.src == other.src
    }

    /// Whether this locator has consumed at least as far as `other`.
    ///
    /// Legacy locators only carry a timestamp, so a legacy locator on either
    /// side compares timestamps alone.
    pub fn is_faster_than(&self, other: &Locator) -> bool {
        if self.legacy || other.legacy {
            return self.offset.timestamp >= other.offset.timestamp;
        }
        if self.src != other.src {
            return false;
        }
        self.offset.cmp(&other.offset) != Ordering::Less
    }

    /// Serialize into the binary record.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let user_data = self.user_data.as_bytes();
        let mut buf = Vec::with_capacity(FIXED_HEADER_LEN + user_data.len());
        buf.write_u16::<LittleEndian>(LOCATOR_MAGIC)?;
        buf.write_u8(LOCATOR_LAYOUT)?;
        buf.write_u64::<LittleEndian>(self.src)?;
        buf.write_i64::<LittleEndian>(self.offset.timestamp)?;
        buf.write_u32::<LittleEndian>(self.offset.concurrent_idx)?;
        buf.write_u8(u8::from(self.legacy))?;
        let len = u32::try_from(user_data.len())
            .map_err(|_| VersionError::locator("user data exceeds u32::MAX bytes"))?;
        buf.write_u32::<LittleEndian>(len)?;
        buf.extend_from_slice(user_data);
        Ok(buf)
    }

    /// Deserialize from the binary record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FIXED_HEADER_LEN {
            return Err(VersionError::locator(format!(
                "truncated locator: {} bytes, need at least {FIXED_HEADER_LEN}",
                bytes.len()
            )));
        }

        let mut reader = Cursor::new(bytes);
        let magic = reader.read_u16::<LittleEndian>()?;
        if magic != LOCATOR_MAGIC {
            return Err(VersionError::locator(format!(
                "bad locator magic: {magic:#06x}"
            )));
        }
        let layout = reader.read_u8()?;
        if layout != LOCATOR_LAYOUT {
            return Err(VersionError::locator(format!(
                "unsupported locator layout: {layout}"
            )));
        }

        let src = reader.read_u64::<LittleEndian>()?;
        let timestamp = reader.read_i64::<LittleEndian>()?;
        let concurrent_idx = reader.read_u32::<LittleEndian>()?;
        let legacy = match reader.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(VersionError::locator(format!(
                    "invalid legacy flag: {other}"
                )));
            }
        };
        let len = reader.read_u32::<LittleEndian>()? as usize;
        if bytes.len() - FIXED_HEADER_LEN != len {
            return Err(VersionError::locator(format!(
                "user data length mismatch: header says {len}, found {}",
                bytes.len() - FIXED_HEADER_LEN
            )));
        }
        let mut raw = vec![0u8; len];
        reader.read_exact(&mut raw)?;
        let user_data = String::from_utf8(raw)
            .map_err(|e| VersionError::locator(format!("user data is not UTF-8: {e}")))?;

        Ok(Locator {
            src,
            offset: Offset::new(timestamp, concurrent_idx),
            user_data,
            legacy,
        })
    }

    /// Serialize into the hex string embedded in version documents.
    pub fn serialize(&self) -> Result<String> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// Parse the hex string embedded in version documents.
    pub fn deserialize(text: &str) -> Result<Self> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| VersionError::locator(format!("invalid hex: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{src:{}, offset:({}, {})",
            self.src, self.offset.timestamp, self.offset.concurrent_idx
        )?;
        if self.legacy {
            write!(f, ", legacy")?;
        }
        write!(f, "}}")
    }
}

//! Record identifiers.
//!
//! The relational backend hands out integer primary keys, the document
//! backend hands out 12-byte object ids. [`RecordId`] carries either.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::OBJECT_ID_SIZE;
use crate::error::{RegistrationError, Result};

/// Per-process random bytes mixed into every object id.
static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
/// Monotonic counter, seeded randomly once per process.
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// Document identifier.
///
/// # Layout
/// ```text
/// seconds since epoch (4, big endian) || process unique (5) || counter (3, big endian)
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_SIZE]);

impl ObjectId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        let timestamp = chrono::Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
        let process = PROCESS_UNIQUE.get_or_init(|| rand::thread_rng().gen());
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(rand::thread_rng().gen_range(0..0x00FF_FFFF)))
            .fetch_add(1, Ordering::SeqCst)
            & 0x00FF_FFFF;

        let mut bytes = [0u8; OBJECT_ID_SIZE];
        bytes[0..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(process);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        Self(bytes)
    }

    /// Creates an identifier from raw bytes.
    pub fn from_bytes(bytes: [u8; OBJECT_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn bytes(&self) -> [u8; OBJECT_ID_SIZE] {
        self.0
    }

    /// Seconds since the Unix epoch at which the identifier was generated.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Lowercase hex rendering (24 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 24-character hex string.
    pub fn parse_str(s: &str) -> Result<Self> {
        let decoded = hex::decode(s.trim())
            .map_err(|e| RegistrationError::InvalidIdentifier(format!("{s}: {e}")))?;
        let bytes: [u8; OBJECT_ID_SIZE] = decoded.try_into().map_err(|v: Vec<u8>| {
            RegistrationError::InvalidIdentifier(format!(
                "object id must be {} bytes, got {}",
                OBJECT_ID_SIZE,
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Identifier of a registration record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Relational primary key.
    Integer(i64),
    /// Document id.
    Document(ObjectId),
}

impl RecordId {
    /// Returns the integer key, if this is a relational identifier.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RecordId::Integer(id) => Some(*id),
            RecordId::Document(_) => None,
        }
    }

    /// Returns the object id, if this is a document identifier.
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            RecordId::Integer(_) => None,
            RecordId::Document(oid) => Some(*oid),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Integer(id)
    }
}

impl From<ObjectId> for RecordId {
    fn from(oid: ObjectId) -> Self {
        RecordId::Document(oid)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Integer(id) => write!(f, "{id}"),
            RecordId::Document(oid) => write!(f, "{oid}"),
        }
    }
}

impl FromStr for RecordId {
    type Err = RegistrationError;

    /// Integers parse as relational keys, 24 hex characters as object ids.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(RecordId::Integer(id));
        }
        if s.len() == OBJECT_ID_SIZE * 2 {
            return ObjectId::parse_str(s).map(RecordId::Document);
        }
        Err(RegistrationError::InvalidIdentifier(s.to_string()))
    }
}

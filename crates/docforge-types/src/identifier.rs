use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::TypeError;

/// Number of bytes in an [`Identifier`].
pub const IDENTIFIER_LEN: usize = 12;

/// Key under which the extended JSON form carries the hex identifier.
const EXTENDED_KEY: &str = "$oid";

/// Storage-assigned identifier of a persisted document.
///
/// Layout: 4-byte big-endian creation time in seconds, 5 bytes of generator
/// discriminator, 3-byte big-endian counter. Identifiers produced by one
/// generator therefore sort in creation order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier([u8; IDENTIFIER_LEN]);

impl Identifier {
    /// Create an identifier from raw bytes.
    pub const fn from_raw(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw 12 bytes.
    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LEN] {
        &self.0
    }

    /// Seconds since the Unix epoch recorded at generation.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Canonical string encoding: 24 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from the canonical hex encoding.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != IDENTIFIER_LEN {
            return Err(TypeError::InvalidLength {
                expected: IDENTIFIER_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; IDENTIFIER_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Normalize a property value into an identifier.
    ///
    /// Accepts the canonical hex string and the extended form
    /// `{"$oid": "<hex>"}`.
    pub fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::String(s) => Self::from_hex(s),
            Value::Object(map) if map.len() == 1 => match map.get(EXTENDED_KEY) {
                Some(Value::String(s)) => Self::from_hex(s),
                _ => Err(TypeError::NotAnIdentifier(value.to_string())),
            },
            other => Err(TypeError::NotAnIdentifier(other.to_string())),
        }
    }

    /// The value stored under `_id` in raw documents.
    pub fn to_value(&self) -> Value {
        Value::String(self.to_hex())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.short_hex())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Identifier {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; IDENTIFIER_LEN]> for Identifier {
    fn from(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<Identifier> for Value {
    fn from(id: Identifier) -> Self {
        id.to_value()
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Thread-safe source of fresh identifiers.
///
/// Each generator picks a random discriminator and counter seed, so two
/// generators in the same second do not collide in practice.
#[derive(Debug)]
pub struct IdentifierGenerator {
    discriminator: [u8; 5],
    counter: AtomicU32,
}

impl IdentifierGenerator {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let mut discriminator = [0u8; 5];
        rng.fill(&mut discriminator);
        Self {
            discriminator,
            counter: AtomicU32::new(rng.gen::<u32>() & 0x00ff_ffff),
        }
    }

    /// Produce the next identifier.
    pub fn next_id(&self) -> Identifier {
        let seconds = chrono::Utc::now().timestamp().clamp(0, i64::from(u32::MAX)) as u32;
        let count = self.counter.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; IDENTIFIER_LEN];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.discriminator);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Identifier(bytes)
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new()
    }
}

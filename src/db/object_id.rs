// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Store-assigned document identifiers.
//!
//! Layout: 4-byte big-endian Unix timestamp followed by 8 random bytes,
//! rendered as 24 lowercase hex characters.

use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const ID_LEN: usize = 12;
const HEX_LEN: usize = ID_LEN * 2;

/// Opaque identifier assigned by the store when a document is inserted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; ID_LEN]);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ObjectIdError {
    #[error("identifier must be {HEX_LEN} hex characters, got {0}")]
    Length(usize),

    #[error("identifier is not valid hex")]
    NotHex,

    #[error("system random number generator unavailable")]
    Rng,
}

impl ObjectId {
    /// Generate a fresh identifier.
    pub fn generate() -> Result<Self, ObjectIdError> {
        let mut bytes = [0u8; ID_LEN];
        let timestamp = chrono::Utc::now().timestamp() as u32;
        bytes[..4].copy_from_slice(&timestamp.to_be_bytes());
        SystemRandom::new()
            .fill(&mut bytes[4..])
            .map_err(|_| ObjectIdError::Rng)?;
        Ok(Self(bytes))
    }

    /// Seconds since the Unix epoch at which this id was generated.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HEX_LEN {
            return Err(ObjectIdError::Length(s.len()));
        }
        let mut bytes = [0u8; ID_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ObjectIdError::NotHex)?;
        Ok(Self(bytes))
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

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

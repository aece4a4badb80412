//! Canonical byte encoding used for every hash input.
//!
//! Integers are big-endian, strings and blobs carry a `u32` length prefix. The order in which a
//! type appends its fields is part of the wire contract: changing it requires bumping
//! [`crate::SCHEMA_VERSION`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};

/// A SHA-256 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// Genesis value for hash chains and "no digest yet".
    pub const ZERO: Digest = Digest([0; 32]);

    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }

    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut out = [0_u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight bytes are plenty to tell digests apart in logs.
        write!(f, "Digest({}..)", &self.hex()[..16])
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Digest::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Deterministic, length-prefixed, big-endian byte writer.
#[derive(Clone, Debug, Default)]
pub struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn append_u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn append_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn append_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn append_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn append_bool(&mut self, value: bool) -> &mut Self {
        self.append_u8(u8::from(value))
    }

    /// UTF-8 bytes with a `u32` length prefix.
    pub fn append_string(&mut self, value: &str) -> &mut Self {
        self.append_data(value.as_bytes())
    }

    /// Raw bytes with a `u32` length prefix.
    pub fn append_data(&mut self, value: &[u8]) -> &mut Self {
        let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
        self.append_u32(len);
        self.buf.extend_from_slice(value);
        self
    }

    /// Fixed-width 32 bytes, no prefix.
    pub fn append_digest(&mut self, digest: &Digest) -> &mut Self {
        self.buf.extend_from_slice(&digest.0);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn sha256(&self) -> Digest {
        Digest::of(&self.buf)
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.buf)
    }
}

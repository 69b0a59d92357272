//! Content addressing
//!
//! Archives, source files and installed outputs are all identified by the
//! xxHash64 (seed 0) of their bytes. The textual form is the base64 encoding
//! of the little-endian digest, which is what modlist files have always used.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use xxhash_rust::xxh64::{Xxh64, xxh64};

const BUFFER_SIZE: usize = 64 * 1024; // 64KB buffer

/// xxHash64 digest of a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub u64);

#[derive(Debug, Error)]
pub enum HashParseError {
    #[error("invalid base64 hash: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("hash must be 8 bytes, got {0}")]
    Length(usize),
}

impl Hash {
    /// Hash an in-memory blob
    pub fn of(data: &[u8]) -> Self {
        Hash(xxh64(data, 0))
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0.to_le_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, HashParseError> {
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        let bytes: [u8; 8] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| HashParseError::Length(decoded.len()))?;
        Ok(Hash(u64::from_le_bytes(bytes)))
    }

    /// Lowercase hex form, used for blob ids inside a modlist package
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_le_bytes())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl FromStr for Hash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_base64(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Hash::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Hash everything a reader yields, returning the digest and the byte count
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<(Hash, u64)> {
    let mut hasher = Xxh64::new(0);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        total += bytes_read as u64;
    }

    Ok((Hash(hasher.digest()), total))
}

/// Compute hash and size of a file on disk
pub fn hash_file<P: AsRef<Path>>(path: P) -> io::Result<(Hash, u64)> {
    hash_reader(File::open(path.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_is_little_endian_digest() {
        let hash = Hash::of(b"Hello, World!");
        let expected = base64::engine::general_purpose::STANDARD
            .encode(xxh64(b"Hello, World!", 0).to_le_bytes());
        assert_eq!(hash.to_base64(), expected);
        assert_eq!(Hash::from_base64(&expected).unwrap(), hash);
    }

    #[test]
    fn test_rejects_wrong_length() {
        let err = Hash::from_base64("AAAA").unwrap_err();
        assert!(matches!(err, HashParseError::Length(3)));
    }

    #[test]
    fn test_streaming_hash_equals_in_memory_hash() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let (hash, size) = hash_reader(data.as_slice()).unwrap();
        assert_eq!(hash, Hash::of(&data));
        assert_eq!(size, data.len() as u64);
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let hash = Hash::of(b"abc");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_base64()));
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}

//! Patch blob encoding
//!
//! Layout before compression:
//!
//! ```text
//! magic "MLPATCH1"
//! base size (varint)   base hash (8 bytes LE)
//! target size (varint) target hash (8 bytes LE)
//! op count (varint)
//! ops: 0x00 offset len | 0x01 len bytes
//! ```
//!
//! Varints are unsigned LEB128. The whole buffer is zlib-compressed.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::PatchError;
use crate::hashing::Hash;

pub const MAGIC: &[u8; 8] = b"MLPATCH1";

const OP_COPY: u8 = 0;
const OP_INSERT: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
    /// Copy `len` bytes of the base starting at `offset`
    Copy { offset: u64, len: u64 },
    /// Literal bytes not found in the base
    Insert(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub base_hash: Hash,
    pub base_size: u64,
    pub target_hash: Hash,
    pub target_size: u64,
    pub ops: Vec<DeltaOp>,
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], PatchError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| PatchError::Corrupt("unexpected end of patch".to_string()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, PatchError> {
        Ok(self.take(1)?[0])
    }

    fn varint(&mut self) -> Result<u64, PatchError> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.byte()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(PatchError::Corrupt("varint overflow".to_string()))
    }

    fn hash(&mut self) -> Result<Hash, PatchError> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| PatchError::Corrupt("short hash".to_string()))?;
        Ok(Hash(u64::from_le_bytes(bytes)))
    }

    fn len(&mut self) -> Result<usize, PatchError> {
        usize::try_from(self.varint()?).map_err(|_| PatchError::Corrupt("length out of range".to_string()))
    }
}

impl Delta {
    pub fn encode(&self) -> Result<Vec<u8>, PatchError> {
        let mut raw = Vec::with_capacity(64);
        raw.extend_from_slice(MAGIC);
        write_varint(&mut raw, self.base_size);
        raw.extend_from_slice(&self.base_hash.0.to_le_bytes());
        write_varint(&mut raw, self.target_size);
        raw.extend_from_slice(&self.target_hash.0.to_le_bytes());
        write_varint(&mut raw, self.ops.len() as u64);

        for op in &self.ops {
            match op {
                DeltaOp::Copy { offset, len } => {
                    raw.push(OP_COPY);
                    write_varint(&mut raw, *offset);
                    write_varint(&mut raw, *len);
                }
                DeltaOp::Insert(bytes) => {
                    raw.push(OP_INSERT);
                    write_varint(&mut raw, bytes.len() as u64);
                    raw.extend_from_slice(bytes);
                }
            }
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }

    pub fn decode(blob: &[u8]) -> Result<Self, PatchError> {
        let mut raw = Vec::new();
        ZlibDecoder::new(blob)
            .read_to_end(&mut raw)
            .map_err(|e| PatchError::Corrupt(format!("decompression failed: {}", e)))?;

        let mut cursor = Cursor { data: &raw, pos: 0 };
        if cursor.take(MAGIC.len())? != MAGIC {
            return Err(PatchError::Corrupt("bad magic".to_string()));
        }

        let base_size = cursor.varint()?;
        let base_hash = cursor.hash()?;
        let target_size = cursor.varint()?;
        let target_hash = cursor.hash()?;
        let count = cursor.len()?;

        let mut ops = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            match cursor.byte()? {
                OP_COPY => {
                    let offset = cursor.varint()?;
                    let len = cursor.varint()?;
                    ops.push(DeltaOp::Copy { offset, len });
                }
                OP_INSERT => {
                    let len = cursor.len()?;
                    ops.push(DeltaOp::Insert(cursor.take(len)?.to_vec()));
                }
                other => return Err(PatchError::Corrupt(format!("unknown op {:#04x}", other))),
            }
        }

        if cursor.pos != raw.len() {
            return Err(PatchError::Corrupt("trailing data".to_string()));
        }

        Ok(Delta {
            base_hash,
            base_size,
            target_hash,
            target_size,
            ops,
        })
    }
}

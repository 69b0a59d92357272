//! Block-matching delta between two byte buffers
//!
//! The base is cut into fixed blocks and indexed by a polynomial hash. A
//! rolling hash over the target finds candidate blocks, which are then
//! verified byte for byte and extended in both directions.

use std::collections::HashMap;

use super::PatchError;
use super::format::{Delta, DeltaOp};
use crate::hashing::Hash;

const BLOCK: usize = 32;
const PRIME: u64 = 0x0000_0100_0000_01b3;
const MAX_CANDIDATES: usize = 16;

fn block_hash(window: &[u8]) -> u64 {
    window
        .iter()
        .fold(0u64, |h, &b| h.wrapping_mul(PRIME).wrapping_add(u64::from(b) + 1))
}

/// `PRIME^(BLOCK - 1)`, the weight of the byte leaving the window
fn leading_weight() -> u64 {
    (1..BLOCK).fold(1u64, |acc, _| acc.wrapping_mul(PRIME))
}

struct BlockIndex {
    blocks: HashMap<u64, Vec<usize>>,
}

impl BlockIndex {
    fn new(base: &[u8]) -> Self {
        let mut blocks: HashMap<u64, Vec<usize>> = HashMap::new();
        for (n, chunk) in base.chunks_exact(BLOCK).enumerate() {
            let offsets = blocks.entry(block_hash(chunk)).or_default();
            if offsets.len() < MAX_CANDIDATES {
                offsets.push(n * BLOCK);
            }
        }
        Self { blocks }
    }

    fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Longest verified forward match for the window starting at `pos`
    fn best_match(&self, base: &[u8], target: &[u8], pos: usize, hash: u64) -> Option<(usize, usize)> {
        let window = &target[pos..pos + BLOCK];
        self.blocks
            .get(&hash)?
            .iter()
            .filter(|&&offset| &base[offset..offset + BLOCK] == window)
            .map(|&offset| {
                let len = base[offset..]
                    .iter()
                    .zip(&target[pos..])
                    .take_while(|(a, b)| a == b)
                    .count();
                (offset, len)
            })
            .fold(None, |best: Option<(usize, usize)>, cand| match best {
                Some(b) if b.1 >= cand.1 => Some(b),
                _ => Some(cand),
            })
    }
}

#[derive(Default)]
struct OpsBuilder {
    ops: Vec<DeltaOp>,
}

impl OpsBuilder {
    fn insert(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Some(DeltaOp::Insert(prev)) = self.ops.last_mut() {
            prev.extend_from_slice(bytes);
        } else {
            self.ops.push(DeltaOp::Insert(bytes.to_vec()));
        }
    }

    fn copy(&mut self, offset: usize, len: usize) {
        let (offset, len) = (offset as u64, len as u64);
        if len == 0 {
            return;
        }
        if let Some(DeltaOp::Copy { offset: prev_offset, len: prev_len }) = self.ops.last_mut() {
            if *prev_offset + *prev_len == offset {
                *prev_len += len;
                return;
            }
        }
        self.ops.push(DeltaOp::Copy { offset, len });
    }
}

/// Compute the operations that turn `base` into `target`
pub fn diff(base: &[u8], target: &[u8]) -> Delta {
    let index = BlockIndex::new(base);
    let weight = leading_weight();
    let mut builder = OpsBuilder::default();
    let mut literal_start = 0;
    let mut pos = 0;

    if target.len() >= BLOCK && !index.is_empty() {
        let mut hash = block_hash(&target[..BLOCK]);
        loop {
            if let Some((offset, len)) = index.best_match(base, target, pos, hash) {
                let mut back = 0;
                while back < offset
                    && pos - back > literal_start
                    && base[offset - back - 1] == target[pos - back - 1]
                {
                    back += 1;
                }
                builder.insert(&target[literal_start..pos - back]);
                builder.copy(offset - back, len + back);

                pos += len;
                literal_start = pos;
                if pos + BLOCK > target.len() {
                    break;
                }
                hash = block_hash(&target[pos..pos + BLOCK]);
                continue;
            }

            if pos + BLOCK >= target.len() {
                break;
            }
            let out = u64::from(target[pos]) + 1;
            let incoming = u64::from(target[pos + BLOCK]) + 1;
            hash = hash
                .wrapping_sub(out.wrapping_mul(weight))
                .wrapping_mul(PRIME)
                .wrapping_add(incoming);
            pos += 1;
        }
    }
    builder.insert(&target[literal_start..]);

    Delta {
        base_hash: Hash::of(base),
        base_size: base.len() as u64,
        target_hash: Hash::of(target),
        target_size: target.len() as u64,
        ops: builder.ops,
    }
}

/// Replay `delta` on top of `base`
pub fn apply_delta(base: &[u8], delta: &Delta) -> Result<Vec<u8>, PatchError> {
    let capacity = usize::try_from(delta.target_size).unwrap_or(0).min(1 << 30);
    let mut out = Vec::with_capacity(capacity);

    for op in &delta.ops {
        match op {
            DeltaOp::Copy { offset, len } => {
                let start = usize::try_from(*offset).ok();
                let end = start.zip(usize::try_from(*len).ok()).and_then(|(s, l)| s.checked_add(l));
                match (start, end) {
                    (Some(start), Some(end)) if end <= base.len() => {
                        out.extend_from_slice(&base[start..end]);
                    }
                    _ => {
                        return Err(PatchError::Corrupt(format!(
                            "copy of {} bytes at {} exceeds base of {} bytes",
                            len,
                            offset,
                            base.len()
                        )));
                    }
                }
            }
            DeltaOp::Insert(bytes) => out.extend_from_slice(bytes),
        }
    }

    Ok(out)
}

//! Binary patches between a source file and its modified form
//!
//! A patch records the hash of the base it was made from and of the target
//! it produces, so applying it to the wrong base, or producing the wrong
//! output, is always detected.

use thiserror::Error;

use crate::hashing::Hash;

mod delta;
mod format;

pub use delta::diff;
pub use format::{Delta, DeltaOp};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Corrupt patch: {0}")]
    Corrupt(String),

    #[error("Patch was made for base {expected}, got {actual}")]
    BaseMismatch { expected: Hash, actual: Hash },

    #[error("Patched output hash mismatch: expected {expected}, got {actual}")]
    TargetMismatch { expected: Hash, actual: Hash },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Create a patch blob turning `base` into `target`.
///
/// The blob is replayed once before it is returned, so a patch that comes out
/// of here is known to reproduce `target`.
pub fn create(base: &[u8], target: &[u8]) -> Result<Vec<u8>, PatchError> {
    let blob = diff(base, target).encode()?;
    apply(base, &blob, Hash::of(target))?;
    Ok(blob)
}

/// Apply a patch blob to `base`, checking the result hashes to `expected`
pub fn apply(base: &[u8], blob: &[u8], expected: Hash) -> Result<Vec<u8>, PatchError> {
    let delta = Delta::decode(blob)?;

    let base_hash = Hash::of(base);
    if base_hash != delta.base_hash || base.len() as u64 != delta.base_size {
        return Err(PatchError::BaseMismatch {
            expected: delta.base_hash,
            actual: base_hash,
        });
    }

    let out = delta::apply_delta(base, &delta)?;
    let actual = Hash::of(&out);
    if actual != expected || actual != delta.target_hash || out.len() as u64 != delta.target_size {
        return Err(PatchError::TargetMismatch { expected, actual });
    }

    Ok(out)
}

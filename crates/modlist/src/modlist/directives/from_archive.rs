//! FromArchive directive
//!
//! The output file is byte-identical to an entry of a downloaded archive.

use serde::{Deserialize, Serialize};

use super::{ArchiveHashPath, ResolveContext, ResolvedFile, verify};
use crate::error::DirectiveError;
use crate::hashing::Hash;

/// Copy a file straight out of a downloaded archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FromArchive {
    /// Destination path relative to install directory
    #[serde(rename = "To")]
    pub to: String,
    /// Content hash of the target file
    #[serde(rename = "Hash")]
    pub hash: Hash,
    /// Size in bytes of the target file
    #[serde(rename = "Size")]
    pub size: u64,
    /// Archive entry holding the exact bytes
    #[serde(rename = "ArchiveHashPath")]
    pub archive_hash_path: ArchiveHashPath,
}

impl FromArchive {
    pub fn new(to: String, hash: Hash, size: u64, archive_hash_path: ArchiveHashPath) -> Self {
        Self {
            to,
            hash,
            size,
            archive_hash_path,
        }
    }

    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolvedFile, DirectiveError> {
        let data = ctx.archive_entry(&self.archive_hash_path)?;
        verify(data, self.hash)?;
        Ok(ResolvedFile::new(data.to_vec(), self.hash))
    }
}

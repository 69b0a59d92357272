//! PatchedFromArchive directive
//!
//! Handles files that started life as an archive entry and were modified by
//! the list author. Only the binary patch is embedded.

use serde::{Deserialize, Serialize};

use super::{ArchiveHashPath, ResolveContext, ResolvedFile};
use crate::error::DirectiveError;
use crate::hashing::Hash;
use crate::patch;

/// Extract a file from an archive and apply an embedded binary patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchedFromArchive {
    /// Destination path relative to install directory
    #[serde(rename = "To")]
    pub to: String,
    /// Content hash of the target file (after patching)
    #[serde(rename = "Hash")]
    pub hash: Hash,
    /// Size in bytes of the target file (after patching)
    #[serde(rename = "Size")]
    pub size: u64,
    /// Archive entry used as the patch base
    #[serde(rename = "ArchiveHashPath")]
    pub archive_hash_path: ArchiveHashPath,
    /// Hash of the base entry (before patching)
    #[serde(rename = "FromHash")]
    pub from_hash: Hash,
    /// Blob id of the patch
    #[serde(rename = "PatchID")]
    pub patch_id: String,
}

impl PatchedFromArchive {
    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolvedFile, DirectiveError> {
        let base = ctx.archive_entry(&self.archive_hash_path)?;
        let blob = ctx.blob(&self.patch_id)?;
        let data = patch::apply(base, blob, self.hash)?;
        Ok(ResolvedFile::new(data, self.hash))
    }
}

//! RemappedInlineFile directive
//!
//! Embedded text with path placeholders. The written file depends on where
//! the list is installed, so the recorded hash only describes the compiled
//! form and the expected hash is taken from the remapped bytes.

use serde::{Deserialize, Serialize};

use super::{ResolveContext, ResolvedFile};
use crate::error::DirectiveError;
use crate::hashing::Hash;

/// Write embedded text with path placeholders replaced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemappedInlineFile {
    /// Destination path relative to install directory
    #[serde(rename = "To")]
    pub to: String,
    /// Hash of the file on the author's machine
    #[serde(rename = "Hash")]
    pub hash: Hash,
    #[serde(rename = "Size")]
    pub size: u64,
    /// Blob id of the placeholder text
    #[serde(rename = "SourceDataID")]
    pub source_data_id: String,
}

impl RemappedInlineFile {
    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolvedFile, DirectiveError> {
        let text = String::from_utf8(ctx.blob(&self.source_data_id)?.to_vec())?;
        let data = ctx.remapper.expand_placeholders(&text).into_bytes();
        let expected = Hash::of(&data);
        Ok(ResolvedFile::new(data, expected))
    }
}

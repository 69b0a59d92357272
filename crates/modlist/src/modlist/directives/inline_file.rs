//! InlineFile directive

use serde::{Deserialize, Serialize};

use super::{ResolveContext, ResolvedFile, verify};
use crate::error::DirectiveError;
use crate::hashing::Hash;

/// Write bytes embedded verbatim in the modlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineFile {
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Hash")]
    pub hash: Hash,
    #[serde(rename = "Size")]
    pub size: u64,
    /// Blob id of the embedded data
    #[serde(rename = "SourceDataID")]
    pub source_data_id: String,
}

impl InlineFile {
    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolvedFile, DirectiveError> {
        let data = ctx.blob(&self.source_data_id)?;
        verify(data, self.hash)?;
        Ok(ResolvedFile::new(data.to_vec(), self.hash))
    }
}

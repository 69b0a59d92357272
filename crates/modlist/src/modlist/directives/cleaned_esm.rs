//! CleanedEsm directive
//!
//! Game master files cannot be redistributed. The installer reads the
//! user's own copy from the game directory, refuses to continue unless it is
//! the exact version the list was built against, and optionally patches it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ResolveContext, ResolvedFile, verify};
use crate::error::DirectiveError;
use crate::hashing::Hash;
use crate::{patch, paths};

/// Reproduce a file from a hash-verified game master
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedEsm {
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Hash")]
    pub hash: Hash,
    #[serde(rename = "Size")]
    pub size: u64,
    /// Hash of the stock game file
    #[serde(rename = "SourceEsmHash")]
    pub source_esm_hash: Hash,
    /// Game file path relative to the game directory
    #[serde(rename = "GameFile")]
    pub game_file: String,
    /// Patch turning the stock file into the output; `None` when they are identical
    #[serde(rename = "PatchID", default, skip_serializing_if = "Option::is_none")]
    pub patch_id: Option<String>,
}

impl CleanedEsm {
    pub fn game_path(&self, game_dir: &Path) -> PathBuf {
        paths::join(game_dir, &self.game_file)
    }

    /// Check the game directory holds the expected stock file
    pub fn check_game_file(&self, ctx: &ResolveContext<'_>) -> Result<Vec<u8>, DirectiveError> {
        let path = self.game_path(ctx.game_dir);
        let data = match ctx.fs.read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DirectiveError::InvalidGameFile {
                    path,
                    expected: self.source_esm_hash,
                    actual: None,
                });
            }
            Err(e) => return Err(e.into()),
        };
        let actual = Hash::of(&data);
        if actual != self.source_esm_hash {
            return Err(DirectiveError::InvalidGameFile {
                path,
                expected: self.source_esm_hash,
                actual: Some(actual),
            });
        }
        Ok(data)
    }

    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolvedFile, DirectiveError> {
        let base = self.check_game_file(ctx)?;
        let data = match &self.patch_id {
            Some(id) => patch::apply(&base, ctx.blob(id)?, self.hash)?,
            None => {
                verify(&base, self.hash)?;
                base
            }
        };
        Ok(ResolvedFile::new(data, self.hash))
    }
}

//! The modlist: archive manifest, directives and embedded blobs
//!
//! A [`ModList`] is the complete, portable description of an installation.
//! It is serialized as PascalCase JSON with `$type`-tagged directives and
//! stored together with its blobs in a zip package (see [`ModList::save`]).

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hashing::Hash;
use crate::paths;

pub mod blobs;
pub mod directives;
mod package;
pub mod remap;

pub use blobs::{BlobStore, InlineBlob};
pub use directives::{
    ArchiveHashPath, CleanedEsm, Directive, FromArchive, IgnoredDirectly, InlineFile, NoMatch,
    PatchedFromArchive, RemappedInlineFile, ResolveContext, ResolvedFile,
};
pub use remap::PathRemapper;

#[derive(Debug, Error)]
pub enum ModListError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Package has no '{0}' entry")]
    MissingManifest(&'static str),

    #[error("Directive target '{to}' is not a relative path inside the install root")]
    InvalidTarget { to: String },

    #[error("More than one directive writes '{to}'")]
    DuplicateTarget { to: String },

    #[error("Directive for '{to}' references unknown archive {hash}")]
    UnknownArchive { to: String, hash: Hash },

    #[error("Directive for '{to}' references missing blob '{id}'")]
    MissingBlob { to: String, id: String },

    #[error("{kind} directive for '{to}' cannot be part of a modlist")]
    UnexpectedDirective { to: String, kind: &'static str },
}

/// A downloaded archive the modlist depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    #[serde(rename = "Hash")]
    pub hash: Hash,
    #[serde(rename = "Size")]
    pub size: u64,
    /// File name the author downloaded it as
    #[serde(rename = "Name")]
    pub name: String,
    /// Provenance text from the archive's `.meta` sidecar
    #[serde(rename = "Meta", default)]
    pub meta: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModList {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Version", default)]
    pub version: String,
    #[serde(rename = "Author", default)]
    pub author: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "GameName", default)]
    pub game: String,
    #[serde(rename = "Archives")]
    pub archives: Vec<Archive>,
    #[serde(rename = "Directives")]
    pub directives: Vec<Directive>,
    #[serde(skip)]
    pub blobs: BlobStore,
}

impl ModList {
    /// Sort directives by target and archives by hash, and drop unreferenced
    /// archives and blobs
    pub fn normalize(&mut self) {
        self.directives.sort_by(|a, b| a.to().cmp(b.to()));

        let used_archives: HashSet<Hash> = self.directives.iter().filter_map(Directive::archive_hash).collect();
        let archives: BTreeMap<Hash, Archive> = self
            .archives
            .drain(..)
            .filter(|a| used_archives.contains(&a.hash))
            .map(|a| (a.hash, a))
            .collect();
        self.archives = archives.into_values().collect();

        let used_blobs: HashSet<&str> = self.directives.iter().flat_map(Directive::blob_ids).collect();
        self.blobs.retain_referenced(&used_blobs);
    }

    /// Check the structural invariants every modlist must satisfy
    pub fn validate(&self) -> Result<(), ModListError> {
        let archives: HashSet<Hash> = self.archives.iter().map(|a| a.hash).collect();
        let mut targets = HashSet::with_capacity(self.directives.len());

        for directive in &self.directives {
            let to = directive.to();
            if !directive.is_installable() {
                return Err(ModListError::UnexpectedDirective {
                    to: to.to_string(),
                    kind: directive.kind(),
                });
            }
            if !paths::is_safe_relative(to) {
                return Err(ModListError::InvalidTarget { to: to.to_string() });
            }
            if !targets.insert(to) {
                return Err(ModListError::DuplicateTarget { to: to.to_string() });
            }
            if let Some(hash) = directive.archive_hash() {
                if !archives.contains(&hash) {
                    return Err(ModListError::UnknownArchive { to: to.to_string(), hash });
                }
            }
            for id in directive.blob_ids() {
                if !self.blobs.contains(id) {
                    return Err(ModListError::MissingBlob {
                        to: to.to_string(),
                        id: id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn archive(&self, hash: &Hash) -> Option<&Archive> {
        self.archives.iter().find(|a| &a.hash == hash)
    }

    /// Pretty-printed manifest JSON (blobs are not included)
    pub fn to_json(&self) -> Result<String, ModListError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ModListError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Count of directives per kind, for logging
    pub fn directive_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for directive in &self.directives {
            *counts.entry(directive.kind()).or_insert(0) += 1;
        }
        counts
    }
}

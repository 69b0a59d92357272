//! Directive types
//!
//! A directive says how to produce one output file of an installation. Each
//! variant lives in its own file together with the code that resolves it to
//! bytes on the install machine.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::blobs::BlobStore;
use super::remap::PathRemapper;
use crate::error::DirectiveError;
use crate::fs::FileSystem;
use crate::hashing::Hash;

pub mod cleaned_esm;
pub mod from_archive;
pub mod ignored_directly;
pub mod inline_file;
pub mod no_match;
pub mod patched_from_archive;
pub mod remapped_inline_file;

pub use cleaned_esm::CleanedEsm;
pub use from_archive::FromArchive;
pub use ignored_directly::IgnoredDirectly;
pub use inline_file::InlineFile;
pub use no_match::NoMatch;
pub use patched_from_archive::PatchedFromArchive;
pub use remapped_inline_file::RemappedInlineFile;

/// A file inside an archive: `[archive hash, internal path]` on the wire.
/// Nested archives are not supported.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveHashPath {
    pub archive: Hash,
    pub path: String,
}

impl ArchiveHashPath {
    pub fn new(archive: Hash, path: impl Into<String>) -> Self {
        Self {
            archive,
            path: path.into(),
        }
    }
}

impl Serialize for ArchiveHashPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.archive.to_base64())?;
        seq.serialize_element(&self.path)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ArchiveHashPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PathVisitor;

        impl<'de> Visitor<'de> for PathVisitor {
            type Value = ArchiveHashPath;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an [archive hash, path] pair")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let hash: String = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let path: String = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(1, &self))?;
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom("nested archive paths are not supported"));
                }
                let archive = Hash::from_base64(&hash).map_err(de::Error::custom)?;
                Ok(ArchiveHashPath { archive, path })
            }
        }

        deserializer.deserialize_seq(PathVisitor)
    }
}

/// Bytes ready to be written, with the hash they must have once on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub data: Vec<u8>,
    pub expected: Hash,
}

impl ResolvedFile {
    pub fn new(data: Vec<u8>, expected: Hash) -> Self {
        Self { data, expected }
    }
}

/// Everything a directive may need to produce its bytes
pub struct ResolveContext<'a> {
    pub blobs: &'a BlobStore,
    pub fs: &'a dyn FileSystem,
    pub game_dir: &'a Path,
    pub remapper: &'a PathRemapper,
    /// Entries extracted from the directive's archive, `None` when the archive was not found
    pub extracted: Option<&'a HashMap<String, Vec<u8>>>,
}

impl<'a> ResolveContext<'a> {
    pub(crate) fn blob(&self, id: &str) -> Result<&'a [u8], DirectiveError> {
        self.blobs
            .get(id)
            .ok_or_else(|| DirectiveError::BlobMissing { id: id.to_string() })
    }

    pub(crate) fn archive_entry(&self, source: &ArchiveHashPath) -> Result<&'a [u8], DirectiveError> {
        let extracted = self
            .extracted
            .ok_or(DirectiveError::ArchiveMissing { hash: source.archive })?;
        extracted
            .get(&source.path)
            .map(Vec::as_slice)
            .ok_or_else(|| DirectiveError::EntryMissing {
                archive: source.archive,
                path: source.path.clone(),
            })
    }
}

pub(crate) fn verify(data: &[u8], expected: Hash) -> Result<(), DirectiveError> {
    let actual = Hash::of(data);
    if actual != expected {
        return Err(DirectiveError::HashMismatch { expected, actual });
    }
    Ok(())
}

/// How to produce one output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum Directive {
    FromArchive(FromArchive),
    PatchedFromArchive(PatchedFromArchive),
    InlineFile(InlineFile),
    RemappedInlineFile(RemappedInlineFile),
    CleanedEsm(CleanedEsm),
    IgnoredDirectly(IgnoredDirectly),
    NoMatch(NoMatch),
}

impl Directive {
    /// Destination path relative to the install root
    pub fn to(&self) -> &str {
        match self {
            Directive::FromArchive(d) => &d.to,
            Directive::PatchedFromArchive(d) => &d.to,
            Directive::InlineFile(d) => &d.to,
            Directive::RemappedInlineFile(d) => &d.to,
            Directive::CleanedEsm(d) => &d.to,
            Directive::IgnoredDirectly(d) => &d.to,
            Directive::NoMatch(d) => &d.to,
        }
    }

    /// Content hash of the output file
    pub fn hash(&self) -> Hash {
        match self {
            Directive::FromArchive(d) => d.hash,
            Directive::PatchedFromArchive(d) => d.hash,
            Directive::InlineFile(d) => d.hash,
            Directive::RemappedInlineFile(d) => d.hash,
            Directive::CleanedEsm(d) => d.hash,
            Directive::IgnoredDirectly(d) => d.hash,
            Directive::NoMatch(d) => d.hash,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Directive::FromArchive(d) => d.size,
            Directive::PatchedFromArchive(d) => d.size,
            Directive::InlineFile(d) => d.size,
            Directive::RemappedInlineFile(d) => d.size,
            Directive::CleanedEsm(d) => d.size,
            Directive::IgnoredDirectly(d) => d.size,
            Directive::NoMatch(d) => d.size,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Directive::FromArchive(_) => "FromArchive",
            Directive::PatchedFromArchive(_) => "PatchedFromArchive",
            Directive::InlineFile(_) => "InlineFile",
            Directive::RemappedInlineFile(_) => "RemappedInlineFile",
            Directive::CleanedEsm(_) => "CleanedEsm",
            Directive::IgnoredDirectly(_) => "IgnoredDirectly",
            Directive::NoMatch(_) => "NoMatch",
        }
    }

    /// Archive entry this directive reads from, if any
    pub fn archive_source(&self) -> Option<&ArchiveHashPath> {
        match self {
            Directive::FromArchive(d) => Some(&d.archive_hash_path),
            Directive::PatchedFromArchive(d) => Some(&d.archive_hash_path),
            _ => None,
        }
    }

    /// Hash of the archive this directive reads from, if any
    pub fn archive_hash(&self) -> Option<Hash> {
        self.archive_source().map(|s| s.archive)
    }

    /// Ids of the inline blobs this directive needs
    pub fn blob_ids(&self) -> Vec<&str> {
        match self {
            Directive::PatchedFromArchive(d) => vec![d.patch_id.as_str()],
            Directive::InlineFile(d) => vec![d.source_data_id.as_str()],
            Directive::RemappedInlineFile(d) => vec![d.source_data_id.as_str()],
            Directive::CleanedEsm(d) => d.patch_id.as_deref().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Whether this directive can appear in a modlist
    pub fn is_installable(&self) -> bool {
        !matches!(self, Directive::IgnoredDirectly(_) | Directive::NoMatch(_))
    }

    /// Produce the output bytes and the hash they must have
    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> Result<ResolvedFile, DirectiveError> {
        match self {
            Directive::FromArchive(d) => d.resolve(ctx),
            Directive::PatchedFromArchive(d) => d.resolve(ctx),
            Directive::InlineFile(d) => d.resolve(ctx),
            Directive::RemappedInlineFile(d) => d.resolve(ctx),
            Directive::CleanedEsm(d) => d.resolve(ctx),
            Directive::IgnoredDirectly(_) | Directive::NoMatch(_) => {
                Err(DirectiveError::NotInstallable { kind: self.kind() })
            }
        }
    }
}

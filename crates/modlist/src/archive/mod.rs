//! Archive access
//!
//! Format-specific extraction sits behind [`ArchiveReader`]; the compiler sees
//! archives through the content-addressed [`ArchiveIndex`], the installer
//! through [`locate_archives`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::hashing::Hash;

pub mod index;
pub mod zip_reader;

pub use index::{ArchiveIndex, EntryRef, IndexedArchive, locate_archives};
pub use zip_reader::ZipArchiveReader;

/// One file inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Internal path, `/`-separated
    pub path: String,
    pub hash: Hash,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to open archive '{path}'")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read archive '{path}': {message}")]
    Read { path: PathBuf, message: String },

    #[error("Unsupported archive type: {0}")]
    Unsupported(PathBuf),
}

/// Reads the contents of downloaded archives
pub trait ArchiveReader: Send + Sync {
    /// Whether this reader understands the file at `path`
    fn can_read(&self, path: &Path) -> bool;

    /// List every file entry with its content hash
    fn list(&self, archive: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// Extract the requested entries; entries that do not exist are absent from the result
    fn extract(&self, archive: &Path, wanted: &[String]) -> Result<HashMap<String, Vec<u8>>, ArchiveError>;
}

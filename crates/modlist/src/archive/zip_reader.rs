//! Zip archive support

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use super::{ArchiveEntry, ArchiveError, ArchiveReader};
use crate::hashing::hash_reader;
use crate::paths;

#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiveReader;

impl ZipArchiveReader {
    pub fn new() -> Self {
        Self
    }

    fn open(archive: &Path) -> Result<ZipArchive<BufReader<File>>, ArchiveError> {
        let file = File::open(archive).map_err(|source| ArchiveError::Open {
            path: archive.to_path_buf(),
            source,
        })?;
        ZipArchive::new(BufReader::new(file)).map_err(|e| read_error(archive, e))
    }
}

/// Upper bound on the buffer reserved from a size declared in a zip header
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Read an entry to the end. The declared size is only a capacity hint.
pub(crate) fn read_entry_data<R: Read>(mut entry: R, declared_size: u64) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(declared_size.min(MAX_PREALLOC) as usize);
    entry.read_to_end(&mut data)?;
    Ok(data)
}

fn read_error(archive: &Path, err: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Read {
        path: archive.to_path_buf(),
        message: err.to_string(),
    }
}

impl ArchiveReader for ZipArchiveReader {
    fn can_read(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false)
    }

    fn list(&self, archive: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut zip = Self::open(archive)?;
        let mut entries = Vec::with_capacity(zip.len());

        for i in 0..zip.len() {
            let entry = zip.by_index(i).map_err(|e| read_error(archive, e))?;
            if entry.is_dir() {
                continue;
            }
            let path = paths::normalize(entry.name());
            let (hash, size) = hash_reader(entry).map_err(|e| read_error(archive, e))?;
            entries.push(ArchiveEntry { path, hash, size });
        }

        debug!("Listed {} entries in {}", entries.len(), archive.display());
        Ok(entries)
    }

    fn extract(&self, archive: &Path, wanted: &[String]) -> Result<HashMap<String, Vec<u8>>, ArchiveError> {
        let wanted: HashSet<&str> = wanted.iter().map(String::as_str).collect();
        let mut zip = Self::open(archive)?;
        let mut extracted = HashMap::with_capacity(wanted.len());

        for i in 0..zip.len() {
            if extracted.len() == wanted.len() {
                break;
            }
            let mut entry = zip.by_index(i).map_err(|e| read_error(archive, e))?;
            if entry.is_dir() {
                continue;
            }
            let path = paths::normalize(entry.name());
            if !wanted.contains(path.as_str()) || extracted.contains_key(&path) {
                continue;
            }
            let size = entry.size();
            let data = read_entry_data(&mut entry, size).map_err(|e| read_error(archive, e))?;
            extracted.insert(path, data);
        }

        debug!("Extracted {}/{} entries from {}", extracted.len(), wanted.len(), archive.display());
        Ok(extracted)
    }
}

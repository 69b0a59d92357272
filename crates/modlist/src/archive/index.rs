//! Content-addressed index over the downloaded archives
//!
//! Archives are hashed when the index is built, but their entries are only
//! listed on the first query or by [`ArchiveIndex::prime`]. After that the
//! index is read-only and shared by every classification worker.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::{ArchiveEntry, ArchiveError, ArchiveReader};
use crate::fs::FileSystem;
use crate::hashing::Hash;
use crate::modlist::Archive;
use crate::paths;

/// A downloaded archive known to the index
#[derive(Debug, Clone)]
pub struct IndexedArchive {
    pub hash: Hash,
    pub size: u64,
    /// File name in the downloads directory
    pub name: String,
    pub path: PathBuf,
    /// Contents of the `<archive>.meta` sidecar, if any
    pub meta: String,
}

impl IndexedArchive {
    pub fn to_manifest_entry(&self) -> Archive {
        Archive {
            hash: self.hash,
            size: self.size,
            name: self.name.clone(),
            meta: self.meta.clone(),
        }
    }
}

/// A file inside a specific archive
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryRef {
    pub archive: Hash,
    pub path: String,
    pub hash: Hash,
    pub size: u64,
}

#[derive(Debug, Default)]
struct Entries {
    by_hash: HashMap<Hash, Vec<EntryRef>>,
    by_name: HashMap<String, Vec<EntryRef>>,
    by_archive: HashMap<Hash, Vec<EntryRef>>,
}

pub struct ArchiveIndex {
    archives: BTreeMap<Hash, IndexedArchive>,
    reader: Arc<dyn ArchiveReader>,
    entries: OnceCell<Entries>,
}

impl std::fmt::Debug for ArchiveIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveIndex")
            .field("archives", &self.archives.len())
            .field("listed", &self.entries.get().is_some())
            .finish()
    }
}

fn meta_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(".meta");
    PathBuf::from(name)
}

impl ArchiveIndex {
    /// Hash every readable archive in `downloads_dir`
    pub fn scan(
        fs: &dyn FileSystem,
        reader: Arc<dyn ArchiveReader>,
        downloads_dir: &Path,
    ) -> Result<Self, ArchiveError> {
        let files = fs.list_files(downloads_dir).map_err(|source| ArchiveError::Open {
            path: downloads_dir.to_path_buf(),
            source,
        })?;

        let hashed: Vec<Result<IndexedArchive, ArchiveError>> = files
            .par_iter()
            .filter(|f| reader.can_read(&f.path))
            .map(|f| -> Result<IndexedArchive, ArchiveError> {
                let (hash, size) = fs.hash(&f.path).map_err(|source| ArchiveError::Open {
                    path: f.path.clone(),
                    source,
                })?;
                let meta_file = meta_path(&f.path);
                let meta = if fs.exists(&meta_file) {
                    fs.read_to_string(&meta_file).unwrap_or_default()
                } else {
                    String::new()
                };
                Ok(IndexedArchive {
                    hash,
                    size,
                    name: paths::file_name(&f.relative).to_string(),
                    path: f.path.clone(),
                    meta,
                })
            })
            .collect();

        let mut archives: BTreeMap<Hash, IndexedArchive> = BTreeMap::new();
        for archive in hashed {
            let archive = archive?;
            if let Some(existing) = archives.get(&archive.hash) {
                debug!("{} duplicates {}, ignoring", archive.name, existing.name);
                continue;
            }
            archives.insert(archive.hash, archive);
        }

        info!("Indexed {} archives in {}", archives.len(), downloads_dir.display());
        Ok(Self::from_archives(archives.into_values().collect(), reader))
    }

    pub fn from_archives(archives: Vec<IndexedArchive>, reader: Arc<dyn ArchiveReader>) -> Self {
        Self {
            archives: archives.into_iter().map(|a| (a.hash, a)).collect(),
            reader,
            entries: OnceCell::new(),
        }
    }

    fn entries(&self) -> Result<&Entries, ArchiveError> {
        self.entries.get_or_try_init(|| {
            let listed: Vec<(Hash, Vec<ArchiveEntry>)> = self
                .archives
                .values()
                .collect::<Vec<_>>()
                .par_iter()
                .map(|a| -> Result<(Hash, Vec<ArchiveEntry>), ArchiveError> {
                    Ok((a.hash, self.reader.list(&a.path)?))
                })
                .collect::<Result<_, ArchiveError>>()?;

            let mut entries = Entries::default();
            for (archive, files) in listed {
                for file in files {
                    let entry = EntryRef {
                        archive,
                        path: file.path,
                        hash: file.hash,
                        size: file.size,
                    };
                    entries.by_hash.entry(entry.hash).or_default().push(entry.clone());
                    entries
                        .by_name
                        .entry(paths::file_name(&entry.path).to_lowercase())
                        .or_default()
                        .push(entry.clone());
                    entries.by_archive.entry(archive).or_default().push(entry);
                }
            }
            for refs in entries
                .by_hash
                .values_mut()
                .chain(entries.by_name.values_mut())
                .chain(entries.by_archive.values_mut())
            {
                refs.sort();
            }

            debug!("Archive index holds {} distinct entry hashes", entries.by_hash.len());
            Ok(entries)
        })
    }

    /// List every archive now. Must run before lookups are issued from rayon
    /// workers: listing itself runs on the pool and the cell is not reentrant.
    pub fn prime(&self) -> Result<(), ArchiveError> {
        self.entries().map(|_| ())
    }

    pub fn archives(&self) -> impl Iterator<Item = &IndexedArchive> {
        self.archives.values()
    }

    pub fn archive(&self, hash: &Hash) -> Option<&IndexedArchive> {
        self.archives.get(hash)
    }

    /// Look up an archive by its download file name, ignoring case and any directories
    pub fn archive_by_name(&self, name: &str) -> Option<&IndexedArchive> {
        let wanted = paths::file_name(&paths::normalize(name)).to_lowercase();
        self.archives.values().find(|a| a.name.to_lowercase() == wanted)
    }

    /// First entry (in a stable order) whose content hash is `hash`
    pub fn find_by_hash(&self, hash: &Hash) -> Result<Option<&EntryRef>, ArchiveError> {
        Ok(self.entries()?.by_hash.get(hash).and_then(|refs| refs.first()))
    }

    /// Entries whose file name equals `name`, ignoring case
    pub fn find_by_name(&self, name: &str) -> Result<&[EntryRef], ArchiveError> {
        Ok(self
            .entries()?
            .by_name
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    pub fn entries_of(&self, archive: &Hash) -> Result<&[EntryRef], ArchiveError> {
        Ok(self
            .entries()?
            .by_archive
            .get(archive)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    /// Extract the bytes of a single indexed entry
    pub fn read_entry(&self, entry: &EntryRef) -> Result<Vec<u8>, ArchiveError> {
        let archive = self
            .archives
            .get(&entry.archive)
            .ok_or_else(|| ArchiveError::Read {
                path: PathBuf::from(entry.archive.to_string()),
                message: "archive is not indexed".to_string(),
            })?;
        let mut extracted = self.reader.extract(&archive.path, std::slice::from_ref(&entry.path))?;
        extracted.remove(&entry.path).ok_or_else(|| ArchiveError::Read {
            path: archive.path.clone(),
            message: format!("entry '{}' disappeared", entry.path),
        })
    }
}

/// Find the archives a modlist needs in a download cache.
///
/// Only files whose size matches a wanted archive are hashed.
pub fn locate_archives(
    fs: &dyn FileSystem,
    downloads_dir: &Path,
    wanted: &[Archive],
) -> std::io::Result<HashMap<Hash, PathBuf>> {
    let sizes: HashSet<u64> = wanted.iter().map(|a| a.size).collect();
    let hashes: HashSet<Hash> = wanted.iter().map(|a| a.hash).collect();

    let candidates: Vec<_> = fs
        .list_files(downloads_dir)?
        .into_iter()
        .filter(|f| sizes.contains(&f.size))
        .collect();

    let located: Vec<(Hash, PathBuf)> = candidates
        .par_iter()
        .filter_map(|f| match fs.hash(&f.path) {
            Ok((hash, _)) if hashes.contains(&hash) => Some((hash, f.path.clone())),
            Ok(_) => None,
            Err(e) => {
                warn!("Could not hash {}: {}", f.path.display(), e);
                None
            }
        })
        .collect();

    let mut found = HashMap::new();
    for (hash, path) in located {
        found.entry(hash).or_insert(path);
    }
    info!("Located {}/{} archives in {}", found.len(), wanted.len(), downloads_dir.display());
    Ok(found)
}

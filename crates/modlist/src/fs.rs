//! Filesystem port
//!
//! The compiler and installer only touch the disk through [`FileSystem`], so
//! the classification and reconciliation logic does not depend on a concrete
//! filesystem binding. [`NativeFileSystem`] is the adapter over `std::fs`.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;
use walkdir::WalkDir;

use crate::hashing::{self, Hash};
use crate::paths;

/// Suffix of staged (not yet promoted) files
pub const STAGING_SUFFIX: &str = ".staging";

/// A regular file found while listing a directory tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path relative to the listed root, `/`-separated
    pub relative: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

pub trait FileSystem: Send + Sync + fmt::Debug {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write `data` to a temporary file next to `target` and return its path.
    /// Nothing at `target` changes until [`FileSystem::promote`].
    fn stage(&self, target: &Path, data: &[u8]) -> io::Result<PathBuf>;

    /// Atomically move a staged file into place
    fn promote(&self, staged: &Path, target: &Path) -> io::Result<()>;

    /// All regular files below `root`, sorted by relative path. Missing root yields nothing.
    fn list_files(&self, root: &Path) -> io::Result<Vec<FileEntry>>;

    /// All directories below `root` (excluding `root`), deepest first
    fn list_dirs(&self, root: &Path) -> io::Result<Vec<PathBuf>>;

    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove `path` if it is an empty directory; returns whether it was removed
    fn remove_dir_if_empty(&self, path: &Path) -> io::Result<bool>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn hash(&self, path: &Path) -> io::Result<(Hash, u64)> {
        let data = self.read(path)?;
        Ok((Hash::of(&data), data.len() as u64))
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        String::from_utf8(self.read(path)?).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// [`FileSystem`] backed by the local disk
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeFileSystem;

impl NativeFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for NativeFileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn stage(&self, target: &Path, data: &[u8]) -> io::Result<PathBuf> {
        let parent = target
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory"))?;
        fs::create_dir_all(parent)?;

        let mut file = tempfile::Builder::new()
            .prefix(".")
            .suffix(STAGING_SUFFIX)
            .tempfile_in(parent)?;
        file.write_all(data)?;
        file.as_file().sync_all()?;

        let (_, staged) = file.keep()?;
        Ok(staged)
    }

    fn promote(&self, staged: &Path, target: &Path) -> io::Result<()> {
        fs::rename(staged, target)?;
        debug!("Promoted {} to {}", staged.display(), target.display());
        Ok(())
    }

    fn list_files(&self, root: &Path) -> io::Result<Vec<FileEntry>> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(relative) = paths::relative_to(root, entry.path()) else {
                continue;
            };
            let metadata = entry.metadata().map_err(io::Error::from)?;
            entries.push(FileEntry {
                path: entry.path().to_path_buf(),
                relative,
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }
        entries.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(entries)
    }

    fn list_dirs(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            }
        }
        Ok(dirs)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn set_modified(&self, path: &Path, time: SystemTime) -> io::Result<()> {
        fs::File::options().write(true).open(path)?.set_modified(time)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_if_empty(&self, path: &Path) -> io::Result<bool> {
        if fs::read_dir(path)?.next().is_some() {
            return Ok(false);
        }
        fs::remove_dir(path)?;
        Ok(true)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn hash(&self, path: &Path) -> io::Result<(Hash, u64)> {
        hashing::hash_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_stage_then_promote() {
        let dir = tempfile::tempdir().unwrap();
        let fs = NativeFileSystem::new();
        let target = dir.path().join("a").join("b.txt");

        let staged = fs.stage(&target, b"hello").unwrap();
        assert!(!target.exists());
        assert!(staged.file_name().unwrap().to_string_lossy().ends_with(STAGING_SUFFIX));

        fs.promote(&staged, &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
        assert!(!staged.exists());
    }

    #[test]
    fn test_list_files_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("z/y")).unwrap();
        std::fs::write(dir.path().join("z/y/file.txt"), b"1").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"22").unwrap();

        let files = NativeFileSystem.list_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "z/y/file.txt"]);
        assert_eq!(files[0].size, 2);

        assert!(NativeFileSystem.list_files(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_dirs_deepest_first_and_empty_removal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("outer/inner")).unwrap();
        std::fs::write(dir.path().join("outer/keep.txt"), b"x").unwrap();

        let dirs = NativeFileSystem.list_dirs(dir.path()).unwrap();
        assert_eq!(dirs, vec![dir.path().join("outer/inner"), dir.path().join("outer")]);

        assert!(NativeFileSystem.remove_dir_if_empty(&dirs[0]).unwrap());
        assert!(!NativeFileSystem.remove_dir_if_empty(&dirs[1]).unwrap());
    }

    #[test]
    fn test_set_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();

        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        NativeFileSystem.set_modified(&path, old).unwrap();
        assert_eq!(NativeFileSystem.modified(&path).unwrap(), old);
    }
}

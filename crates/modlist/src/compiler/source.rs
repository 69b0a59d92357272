//! Source file enumeration

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::fs::{FileEntry, FileSystem};
use crate::hashing::Hash;
use crate::paths;

/// Where a source file came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    /// A file of an installed mod
    Mod { name: String },
    /// A file of a mod manager profile
    Profile { name: String },
    /// A file of the game installation; `relative` is relative to the game directory
    Game { relative: String },
    /// A loose file directly under the mods or profiles directory
    Other,
}

/// One file of the installation being compiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSourceFile {
    /// Install-relative target path, `/`-separated
    pub path: String,
    pub abs_path: PathBuf,
    pub hash: Hash,
    pub size: u64,
    pub origin: SourceOrigin,
}

impl RawSourceFile {
    /// Path inside the owning mod, profile or game directory
    pub fn inner_path(&self) -> &str {
        match &self.origin {
            SourceOrigin::Game { relative } => relative,
            SourceOrigin::Mod { .. } | SourceOrigin::Profile { .. } => {
                let mut parts = self.path.splitn(3, '/');
                parts.next();
                parts.next();
                parts.next().unwrap_or(&self.path)
            }
            SourceOrigin::Other => &self.path,
        }
    }

    pub fn mod_name(&self) -> Option<&str> {
        match &self.origin {
            SourceOrigin::Mod { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_game_file(&self) -> bool {
        matches!(self.origin, SourceOrigin::Game { .. })
    }
}

struct Pending {
    path: String,
    entry: FileEntry,
    origin: SourceOrigin,
}

fn grouped(root_name: &str, entries: Vec<FileEntry>, make: fn(String) -> SourceOrigin) -> Vec<Pending> {
    entries
        .into_iter()
        .map(|entry| {
            let origin = match entry.relative.split_once('/') {
                Some((owner, _)) => make(owner.to_string()),
                None => SourceOrigin::Other,
            };
            Pending {
                path: format!("{}/{}", root_name, entry.relative),
                entry,
                origin,
            }
        })
        .collect()
}

fn list(fs: &dyn FileSystem, root: &Path) -> Result<Vec<FileEntry>, CompileError> {
    fs.list_files(root).map_err(|source| CompileError::Scan {
        path: root.to_path_buf(),
        source,
    })
}

/// Enumerate and hash every mod, profile and game file
pub fn scan_sources(fs: &dyn FileSystem, config: &CompilerConfig) -> Result<Vec<RawSourceFile>, CompileError> {
    let conventions = &config.conventions;
    let mods_root = config.source_dir.join(&conventions.mods_dir);
    let profiles_root = config.source_dir.join(&conventions.profiles_dir);

    let mut pending = grouped(&conventions.mods_dir, list(fs, &mods_root)?, |name| SourceOrigin::Mod { name });
    pending.extend(grouped(&conventions.profiles_dir, list(fs, &profiles_root)?, |name| {
        SourceOrigin::Profile { name }
    }));

    // The mod manager and the downloads often live inside the game folder
    let excluded = [&config.source_dir, &config.downloads_dir];
    for entry in list(fs, &config.game_dir)? {
        if excluded.iter().any(|dir| entry.path.starts_with(dir)) {
            continue;
        }
        pending.push(Pending {
            path: format!("{}/{}", conventions.game_folder_files_dir, entry.relative),
            origin: SourceOrigin::Game {
                relative: entry.relative.clone(),
            },
            entry,
        });
    }

    debug!("Hashing {} source files", pending.len());
    let mut sources = pending
        .into_par_iter()
        .map(|p| -> Result<RawSourceFile, CompileError> {
            let (hash, size) = fs.hash(&p.entry.path).map_err(|source| CompileError::Scan {
                path: p.entry.path.clone(),
                source,
            })?;
            Ok(RawSourceFile {
                path: paths::normalize(&p.path),
                abs_path: p.entry.path,
                hash,
                size,
                origin: p.origin,
            })
        })
        .collect::<Result<Vec<_>, CompileError>>()?;

    sources.sort_by(|a, b| a.path.cmp(&b.path));
    info!("Found {} source files", sources.len());
    Ok(sources)
}

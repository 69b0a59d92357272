//! Bringing an existing install root in line with a modlist
//!
//! Files that no directive writes are deleted, except inside the override
//! directory and under preserved prefixes. Directories left empty are
//! removed afterwards, deepest first.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Conventions;
use crate::fs::{FileEntry, FileSystem};
use crate::paths;

/// Files present in the install root before installation, by relative path
#[derive(Debug, Default)]
pub struct InstallState {
    pub files: HashMap<String, FileEntry>,
    pub override_exists: bool,
}

impl InstallState {
    pub fn scan(fs: &dyn FileSystem, install_dir: &Path, conventions: &Conventions) -> io::Result<Self> {
        let files = fs
            .list_files(install_dir)?
            .into_iter()
            .map(|f| (f.relative.clone(), f))
            .collect();
        let override_exists = fs.is_dir(&paths::join(install_dir, &conventions.override_dir));
        Ok(Self { files, override_exists })
    }
}

fn is_protected(relative: &str, conventions: &Conventions) -> bool {
    paths::is_under(relative, &conventions.override_dir)
        || conventions
            .preserved_install_prefixes
            .iter()
            .any(|prefix| paths::is_under(relative, prefix))
}

/// Delete every file that is neither a target nor protected; returns the deleted paths
pub fn delete_extras(
    fs: &dyn FileSystem,
    state: &mut InstallState,
    targets: &HashSet<&str>,
    conventions: &Conventions,
) -> io::Result<Vec<String>> {
    let mut extras: Vec<String> = state
        .files
        .keys()
        .filter(|rel| !targets.contains(rel.as_str()) && !is_protected(rel, conventions))
        .cloned()
        .collect();
    extras.sort();

    for rel in &extras {
        if let Some(entry) = state.files.remove(rel) {
            debug!("Deleting extra file {}", rel);
            fs.remove_file(&entry.path)?;
        }
    }
    if !extras.is_empty() {
        info!("Deleted {} files not in the modlist", extras.len());
    }
    Ok(extras)
}

/// Remove empty directories below `install_dir`, never touching protected ones
pub fn remove_empty_dirs(fs: &dyn FileSystem, install_dir: &Path, conventions: &Conventions) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for dir in fs.list_dirs(install_dir)? {
        let Some(relative) = paths::relative_to(install_dir, &dir) else {
            continue;
        };
        let protected_root = relative.eq_ignore_ascii_case(&conventions.override_dir)
            || conventions
                .preserved_install_prefixes
                .iter()
                .any(|p| relative.eq_ignore_ascii_case(p.trim_end_matches('/')));
        if protected_root || is_protected(&relative, conventions) {
            continue;
        }
        if fs.remove_dir_if_empty(&dir)? {
            debug!("Removed empty directory {}", relative);
            removed.push(dir);
        }
    }
    Ok(removed)
}

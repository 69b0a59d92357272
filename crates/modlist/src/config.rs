//! Configuration types for compiling and installing modlists
//!
//! Reserved directory names, marker strings and file-type rules live in
//! [`Conventions`], which is threaded explicitly through the compiler and the
//! installer instead of being global state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Naming conventions and classification rules shared by compiler and installer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conventions {
    /// Directory (under the source and install roots) holding one folder per mod
    pub mods_dir: String,
    /// Directory holding one folder per profile
    pub profiles_dir: String,
    /// Where game files land in the install root. When it already exists in
    /// the source root the author manages game files there, and the compiler
    /// leaves the game directory out.
    pub game_folder_files_dir: String,
    /// User-owned directory in the install root. The installer never writes,
    /// deletes or prunes anything under it.
    pub override_dir: String,
    /// Per-mod metadata file name
    pub mod_meta_file: String,
    /// Marker in a mod's notes/comments opting its files into verbatim embedding
    pub include_tag: String,
    /// Game data directory (relative to the game root) holding master files
    pub game_data_dir: String,
    /// Extensions of master game files whose integrity is checked, not reconstructed
    pub master_extensions: Vec<String>,
    /// Text file extensions eligible for install-time path remapping
    pub remappable_extensions: Vec<String>,
    /// Source paths starting with any of these are excluded
    pub ignored_prefixes: Vec<String>,
    /// Source paths ending with any of these are excluded
    pub ignored_suffixes: Vec<String>,
    /// Source paths containing any of these are excluded
    pub ignored_substrings: Vec<String>,
    /// Install-root prefixes reconciliation never deletes from
    pub preserved_install_prefixes: Vec<String>,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            mods_dir: "mods".to_string(),
            profiles_dir: "profiles".to_string(),
            game_folder_files_dir: "Game Folder Files".to_string(),
            override_dir: "overrides".to_string(),
            mod_meta_file: "meta.ini".to_string(),
            include_tag: "WABBAJACK_INCLUDE".to_string(),
            game_data_dir: "Data".to_string(),
            master_extensions: vec![".esm".to_string()],
            remappable_extensions: [".ini", ".json", ".txt", ".cfg", ".xml", ".yaml", ".yml"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignored_prefixes: vec!["logs/".to_string(), "webcache/".to_string(), "crashDumps/".to_string()],
            ignored_suffixes: vec![".log".to_string(), ".tmp".to_string()],
            ignored_substrings: Vec::new(),
            preserved_install_prefixes: vec!["downloads/".to_string()],
        }
    }
}

impl Conventions {
    /// Load conventions from a JSON file; missing keys keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_master(&self, relative: &str) -> bool {
        crate::paths::extension(relative)
            .map(|ext| self.master_extensions.iter().any(|m| m.eq_ignore_ascii_case(&ext)))
            .unwrap_or(false)
    }

    pub fn is_remappable(&self, relative: &str) -> bool {
        crate::paths::extension(relative)
            .map(|ext| self.remappable_extensions.iter().any(|m| m.eq_ignore_ascii_case(&ext)))
            .unwrap_or(false)
    }
}

/// Compilation configuration
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Mod manager root containing the mods and profiles directories
    pub source_dir: PathBuf,
    /// Game installation directory
    pub game_dir: PathBuf,
    /// Directory containing downloaded archives
    pub downloads_dir: PathBuf,
    /// Profiles to include; empty means every profile
    pub profiles: Vec<String>,
    pub name: String,
    pub author: String,
    pub description: String,
    pub version: String,
    pub game: String,
    pub conventions: Conventions,
}

impl CompilerConfig {
    pub fn new(source_dir: impl Into<PathBuf>, game_dir: impl Into<PathBuf>, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            game_dir: game_dir.into(),
            downloads_dir: downloads_dir.into(),
            profiles: Vec::new(),
            name: String::new(),
            author: String::new(),
            description: String::new(),
            version: "1.0.0".to_string(),
            game: String::new(),
            conventions: Conventions::default(),
        }
    }

    pub fn with_profile<S: Into<String>>(mut self, profile: S) -> Self {
        self.profiles.push(profile.into());
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_game<S: Into<String>>(mut self, game: S) -> Self {
        self.game = game.into();
        self
    }

    pub fn with_version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_author<S: Into<String>>(mut self, author: S) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_conventions(mut self, conventions: Conventions) -> Self {
        self.conventions = conventions;
        self
    }

    /// Whether files of `profile` belong in the list
    pub fn includes_profile(&self, profile: &str) -> bool {
        self.profiles.is_empty() || self.profiles.iter().any(|p| p == profile)
    }
}

/// Installation configuration
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Directory where the modlist will be installed
    pub install_dir: PathBuf,
    /// Directory containing downloaded archives
    pub downloads_dir: PathBuf,
    /// Game installation directory (master files and path remapping)
    pub game_dir: PathBuf,
    /// Maximum number of concurrent install units
    pub max_concurrency: usize,
    /// Maximum number of archives extracted at the same time
    pub max_concurrent_extractions: usize,
    pub conventions: Conventions,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from("./install"),
            downloads_dir: PathBuf::from("./downloads"),
            game_dir: PathBuf::from("./game"),
            max_concurrency: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            max_concurrent_extractions: 2,
            conventions: Conventions::default(),
        }
    }
}

impl InstallerConfig {
    pub fn new(install_dir: impl Into<PathBuf>, downloads_dir: impl Into<PathBuf>, game_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            downloads_dir: downloads_dir.into(),
            game_dir: game_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn with_max_concurrent_extractions(mut self, max: usize) -> Self {
        self.max_concurrent_extractions = max.max(1);
        self
    }

    pub fn with_conventions(mut self, conventions: Conventions) -> Self {
        self.conventions = conventions;
        self
    }
}

//! Error types for compiling and installing modlists

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::hashing::Hash;
use crate::modlist::ModListError;
use crate::patch::PatchError;

fn found(actual: &Option<Hash>) -> String {
    actual.map(|h| h.to_string()).unwrap_or_else(|| "no file".to_string())
}

/// Errors loading configuration files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A fault inside a compilation step, as opposed to the step not applying
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Failed to read source file '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Patch creation failed for '{path}': {source}")]
    Patch {
        path: String,
        #[source]
        source: PatchError,
    },
}

/// Why a source file did not end up with a directive
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("no compilation step matched ({0})")]
    NoMatch(String),

    #[error(transparent)]
    Step(#[from] StepError),
}

/// One source file the compiler could not classify
#[derive(Debug, Error)]
#[error("{path}: {reason}")]
pub struct ClassificationFailure {
    pub path: String,
    pub reason: FailureReason,
}

/// Errors that can occur during compilation
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to scan '{path}'")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Compiled modlist is invalid: {0}")]
    ModList(#[from] ModListError),

    #[error("{} source files could not be classified", .0.len())]
    Classification(Vec<ClassificationFailure>),

    #[error("Compilation cancelled")]
    Cancelled,
}

/// Errors for a single directive during installation
#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("Archive not found in download cache: {hash}")]
    ArchiveMissing { hash: Hash },

    #[error("Archive {archive} has no entry '{path}'")]
    EntryMissing { archive: Hash, path: String },

    #[error("Inline data '{id}' missing from modlist")]
    BlobMissing { id: String },

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: Hash, actual: Hash },

    #[error("Patch application failed: {0}")]
    Patch(#[from] PatchError),

    #[error("Game file '{path}' changed: expected {expected}, found {}", found(.actual))]
    InvalidGameFile {
        path: PathBuf,
        expected: Hash,
        actual: Option<Hash>,
    },

    #[error("Written file '{path}' failed verification: expected {expected}, got {actual}")]
    WriteVerification { path: PathBuf, expected: Hash, actual: Hash },

    #[error("Remapped file is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{kind} directives cannot be installed")]
    NotInstallable { kind: &'static str },
}

/// A directive that ended in the failed state
#[derive(Debug, Error)]
#[error("{to}: {error}")]
pub struct DirectiveFailure {
    pub to: String,
    pub error: DirectiveError,
}

/// Errors that can occur during installation
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid modlist: {0}")]
    InvalidModList(#[from] ModListError),

    #[error(
        "Game file '{path}' does not match the version this modlist was built against \
         (expected {expected}, found {}); verify or reinstall the game",
        found(.actual)
    )]
    InvalidGameEsm {
        path: PathBuf,
        expected: Hash,
        actual: Option<Hash>,
    },

    #[error("{} directives failed to install", .0.len())]
    Failures(Vec<DirectiveFailure>),

    #[error("Installation cancelled")]
    Cancelled,

    #[error("Install task failed: {0}")]
    Task(String),
}

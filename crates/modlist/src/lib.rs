//! Modlist Library
//!
//! Compiles a mod manager installation into a portable modlist and installs
//! a modlist on another machine from the same downloaded archives.
//!
//! A modlist records, for every file of the original installation, how to
//! reproduce it: copied out of a downloaded archive, patched from an archive
//! entry, embedded inline, embedded with machine paths replaced by
//! placeholders, or patched from a stock game master.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use modlist::config::{CompilerConfig, InstallerConfig};
//! use modlist::{Compiler, Installer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Author side
//! let config = CompilerConfig::new("./MO2", "./Skyrim", "./MO2/downloads")
//!     .with_profile("Default")
//!     .with_name("My List");
//! let list = Compiler::new(config).compile()?;
//! list.save("my-list.modlist")?;
//!
//! // User side
//! let list = modlist::ModList::load("my-list.modlist")?;
//! let config = InstallerConfig::new("./Install", "./downloads", "./Skyrim");
//! let report = Installer::new(config, list).install().await?;
//! println!("{} files written", report.written);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Content addressing**: every file and archive is identified by its xxHash64
//! - **Ordered classification**: a fixed pipeline of steps decides each file's directive
//! - **Binary patches**: modified archive files ship as compact deltas
//! - **Path remapping**: configuration files survive a different install location
//! - **Verified writes**: output is staged and hashed before it replaces a file
//! - **Incremental installs**: unchanged files are skipped, stray files removed

pub mod archive;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fs;
pub mod hashing;
pub mod installer;
pub mod modlist;
pub mod patch;
pub mod paths;

// Re-export commonly used types for convenience
pub use compiler::Compiler;
pub use config::{CompilerConfig, Conventions, InstallerConfig};
pub use error::{CompileError, InstallError};
pub use hashing::Hash;
pub use installer::{InstallPhase, InstallProgress, InstallReport, Installer, ProgressCallback};
pub use modlist::{Directive, ModList};

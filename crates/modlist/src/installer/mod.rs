//! Modlist installer
//!
//! Installation runs in phases:
//!
//! 1. validate the modlist and the stock game masters it patches
//! 2. locate the required archives in the download cache
//! 3. reconcile the install root: delete files the list does not write
//! 4. install every directive, one unit per archive or per loose directive
//! 5. report
//!
//! Units run concurrently up to `max_concurrency`; archive extraction is
//! additionally bounded by `max_concurrent_extractions`. Every file is staged
//! and verified before it replaces the target.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use modlist::config::InstallerConfig;
//! use modlist::installer::{Installer, InstallProgress};
//! use modlist::modlist::ModList;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let modlist = ModList::load("list.modlist")?;
//! let config = InstallerConfig::new("./install", "./downloads", "./game");
//!
//! let report = Installer::new(config, modlist)
//!     .with_progress_callback(Arc::new(|p: InstallProgress| {
//!         println!("{:?}: {}/{} {}", p.phase, p.processed_items, p.total_items, p.message);
//!     }))
//!     .install()
//!     .await?;
//! println!("{} files written", report.written);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::archive::{ArchiveReader, ZipArchiveReader, locate_archives};
use crate::config::InstallerConfig;
use crate::error::{DirectiveError, DirectiveFailure, InstallError};
use crate::fs::{FileSystem, NativeFileSystem};
use crate::modlist::{Directive, ModList, PathRemapper, ResolveContext};

pub mod reconcile;
pub mod state;
mod task;

pub use reconcile::InstallState;
pub use state::{DirectiveOutcome, DirectiveState, InstallReport, SkipReason};

use task::{Shared, Unit};

/// Progress callback type for installation updates
pub type ProgressCallback = Arc<dyn Fn(InstallProgress) + Send + Sync>;

/// Installation progress information
#[derive(Debug, Clone)]
pub struct InstallProgress {
    pub phase: InstallPhase,
    pub current_step: usize,
    pub total_steps: usize,
    pub processed_items: usize,
    pub total_items: usize,
    pub bytes_processed: u64,
    pub total_bytes: u64,
    pub message: String,
}

/// Installation phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    Preparing,
    ValidatingGameFiles,
    LocatingArchives,
    Reconciling,
    InstallingFiles,
    Finishing,
    Complete,
}

const TOTAL_STEPS: usize = 6;

pub struct Installer {
    config: InstallerConfig,
    modlist: Arc<ModList>,
    fs: Arc<dyn FileSystem>,
    reader: Arc<dyn ArchiveReader>,
    progress_callback: Option<ProgressCallback>,
    cancellation_token: CancellationToken,
    total_bytes: u64,
    processed_bytes: AtomicU64,
}

impl Installer {
    pub fn new(config: InstallerConfig, modlist: ModList) -> Self {
        let total_bytes = modlist.directives.iter().map(Directive::size).sum();
        Self {
            config,
            modlist: Arc::new(modlist),
            fs: Arc::new(NativeFileSystem),
            reader: Arc::new(ZipArchiveReader),
            progress_callback: None,
            cancellation_token: CancellationToken::new(),
            total_bytes,
            processed_bytes: AtomicU64::new(0),
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_archive_reader(mut self, reader: Arc<dyn ArchiveReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    fn remapper(&self) -> PathRemapper {
        PathRemapper::new(&self.config.game_dir, &self.config.install_dir, &self.config.downloads_dir)
    }

    /// Install the modlist into the configured directory
    pub async fn install(self) -> Result<InstallReport, InstallError> {
        info!(
            "Installing '{}' ({} directives) into {}",
            self.modlist.name,
            self.modlist.directives.len(),
            self.config.install_dir.display()
        );
        self.update_progress(InstallPhase::Preparing, 0, 0, 0, "Validating modlist".to_string());
        self.modlist.validate()?;
        self.check_cancelled()?;

        self.validate_game_masters()?;
        self.check_cancelled()?;

        self.update_progress(InstallPhase::LocatingArchives, 2, 0, self.modlist.archives.len(), "Locating archives".to_string());
        let located = locate_archives(self.fs.as_ref(), &self.config.downloads_dir, &self.modlist.archives)?;
        for archive in &self.modlist.archives {
            if !located.contains_key(&archive.hash) {
                error!("Archive '{}' ({}) is not in the download cache", archive.name, archive.hash);
            }
        }
        self.check_cancelled()?;

        self.update_progress(InstallPhase::Reconciling, 3, 0, 0, "Removing files not in the modlist".to_string());
        self.fs.create_dir_all(&self.config.install_dir)?;
        let mut existing = InstallState::scan(self.fs.as_ref(), &self.config.install_dir, &self.config.conventions)?;
        let targets: HashSet<&str> = self.modlist.directives.iter().map(Directive::to).collect();
        let deleted = reconcile::delete_extras(self.fs.as_ref(), &mut existing, &targets, &self.config.conventions)?;
        let removed_dirs =
            reconcile::remove_empty_dirs(self.fs.as_ref(), &self.config.install_dir, &self.config.conventions)?;
        if existing.override_exists {
            info!("Override directory present; its files will not be written");
        }

        let mut report = InstallReport {
            deleted: deleted.len(),
            removed_dirs: removed_dirs.len(),
            ..InstallReport::default()
        };

        let shared = Arc::new(Shared {
            config: self.config.clone(),
            fs: self.fs.clone(),
            reader: self.reader.clone(),
            modlist: self.modlist.clone(),
            remapper: self.remapper(),
            located,
            existing,
            cancellation_token: self.cancellation_token.clone(),
            processed_bytes: AtomicU64::new(0),
        });
        let outcomes = self.run_units(shared).await?;

        self.update_progress(InstallPhase::Finishing, 5, outcomes.len(), outcomes.len(), "Finishing".to_string());
        let mut failures = Vec::new();
        let mut cancelled = false;
        for outcome in outcomes {
            report.record(&outcome);
            match outcome.state {
                DirectiveState::Failed(error) => failures.push(DirectiveFailure { to: outcome.to, error }),
                DirectiveState::Skipped(SkipReason::Cancelled) => cancelled = true,
                _ => {}
            }
        }

        if cancelled || self.cancellation_token.is_cancelled() {
            info!("Installation cancelled");
            return Err(InstallError::Cancelled);
        }
        if !failures.is_empty() {
            failures.sort_by(|a, b| a.to.cmp(&b.to));
            for failure in &failures {
                error!("Failed to install {}", failure);
            }
            return Err(InstallError::Failures(failures));
        }

        info!(
            "Installed '{}': {} written, {} unchanged, {} overridden, {} deleted",
            self.modlist.name, report.written, report.unchanged, report.overridden, report.deleted
        );
        self.update_progress(InstallPhase::Complete, TOTAL_STEPS, 0, 0, "Installation completed successfully".to_string());
        Ok(report)
    }

    /// Every cleaned master must start from the exact stock file
    fn validate_game_masters(&self) -> Result<(), InstallError> {
        let masters: Vec<_> = self
            .modlist
            .directives
            .iter()
            .filter_map(|d| match d {
                Directive::CleanedEsm(esm) => Some(esm),
                _ => None,
            })
            .collect();
        self.update_progress(
            InstallPhase::ValidatingGameFiles,
            1,
            0,
            masters.len(),
            "Checking game masters".to_string(),
        );

        let remapper = self.remapper();
        let ctx = ResolveContext {
            blobs: &self.modlist.blobs,
            fs: self.fs.as_ref(),
            game_dir: &self.config.game_dir,
            remapper: &remapper,
            extracted: None,
        };
        for esm in masters {
            match esm.check_game_file(&ctx) {
                Ok(_) => debug!("Game master {} verified", esm.game_file),
                Err(DirectiveError::InvalidGameFile { path, expected, actual }) => {
                    return Err(InstallError::InvalidGameEsm { path, expected, actual });
                }
                Err(DirectiveError::Io(e)) => return Err(InstallError::Io(e)),
                Err(e) => return Err(InstallError::Task(e.to_string())),
            }
        }
        Ok(())
    }

    async fn run_units(&self, shared: Arc<Shared>) -> Result<Vec<DirectiveOutcome>, InstallError> {
        let units = Unit::plan(&self.modlist);
        let total_items = self.modlist.directives.len();
        info!("Installing {} directives in {} units", total_items, units.len());
        self.update_progress(InstallPhase::InstallingFiles, 4, 0, total_items, "Installing files".to_string());

        let extractions = Arc::new(Semaphore::new(self.config.max_concurrent_extractions.max(1)));
        let mut results = stream::iter(units)
            .map(|unit| {
                let shared = shared.clone();
                let extractions = extractions.clone();
                async move {
                    let permit = match unit.archive {
                        Some(_) => match extractions.acquire_owned().await {
                            Ok(permit) => Some(permit),
                            Err(e) => return Err(InstallError::Task(e.to_string())),
                        },
                        None => None,
                    };
                    tokio::task::spawn_blocking(move || shared.execute(unit, permit))
                        .await
                        .map_err(|e| InstallError::Task(e.to_string()))
                }
            })
            .buffer_unordered(self.config.max_concurrency.max(1));

        let mut outcomes = Vec::with_capacity(total_items);
        while let Some(result) = results.next().await {
            outcomes.extend(result?);
            self.processed_bytes
                .store(shared.processed_bytes.load(Ordering::Relaxed), Ordering::Relaxed);
            self.update_progress(
                InstallPhase::InstallingFiles,
                4,
                outcomes.len(),
                total_items,
                "Installing files".to_string(),
            );
        }
        Ok(outcomes)
    }

    fn check_cancelled(&self) -> Result<(), InstallError> {
        if self.cancellation_token.is_cancelled() {
            info!("Installation cancelled");
            return Err(InstallError::Cancelled);
        }
        Ok(())
    }

    /// Update progress and notify callback if set
    fn update_progress(
        &self,
        phase: InstallPhase,
        current_step: usize,
        processed_items: usize,
        total_items: usize,
        message: String,
    ) {
        if let Some(callback) = &self.progress_callback {
            callback(InstallProgress {
                phase,
                current_step,
                total_steps: TOTAL_STEPS,
                processed_items,
                total_items,
                bytes_processed: self.processed_bytes.load(Ordering::Relaxed),
                total_bytes: self.total_bytes,
                message,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use crate::archive::zip_reader::tests::write_zip;
    use crate::fs::FileEntry;
    use crate::hashing::Hash;
    use crate::modlist::{Archive, ArchiveHashPath, FromArchive, InlineBlob, InlineFile, ModList};

    struct Dirs {
        _root: tempfile::TempDir,
        install: PathBuf,
        downloads: PathBuf,
        game: PathBuf,
    }

    fn dirs() -> Dirs {
        let root = tempfile::tempdir().unwrap();
        let install = root.path().join("install");
        let downloads = root.path().join("downloads");
        let game = root.path().join("game");
        for dir in [&install, &downloads, &game] {
            std::fs::create_dir_all(dir).unwrap();
        }
        Dirs {
            _root: root,
            install,
            downloads,
            game,
        }
    }

    fn config(d: &Dirs) -> InstallerConfig {
        InstallerConfig::new(&d.install, &d.downloads, &d.game)
    }

    fn inline(to: &str, data: &[u8], blobs: &mut crate::modlist::BlobStore) -> Directive {
        let id = blobs.insert(InlineBlob::new(data.to_vec()));
        Directive::InlineFile(InlineFile {
            to: to.to_string(),
            hash: Hash::of(data),
            size: data.len() as u64,
            source_data_id: id,
        })
    }

    fn archive_list(d: &Dirs) -> ModList {
        let zip = d.downloads.join("mod.zip");
        write_zip(&zip, &[("a.pex", b"alpha"), ("b/c.esp", b"charlie")]);
        let bytes = std::fs::read(&zip).unwrap();
        let hash = Hash::of(&bytes);

        let mut modlist = ModList {
            name: "Test".to_string(),
            archives: vec![Archive {
                hash,
                size: bytes.len() as u64,
                name: "mod.zip".to_string(),
                meta: String::new(),
            }],
            ..ModList::default()
        };
        for (to, entry, data) in [("mods/M/a.pex", "a.pex", &b"alpha"[..]), ("mods/M/c.esp", "b/c.esp", b"charlie")] {
            modlist.directives.push(Directive::FromArchive(FromArchive::new(
                to.to_string(),
                Hash::of(data),
                data.len() as u64,
                ArchiveHashPath::new(hash, entry),
            )));
        }
        let blobs = &mut modlist.blobs;
        let profile = inline("profiles/Default/plugins.txt", b"*c.esp\n", blobs);
        modlist.directives.push(profile);
        modlist.normalize();
        modlist
    }

    #[tokio::test]
    async fn test_install_then_reinstall_is_unchanged() {
        let d = dirs();
        let modlist = archive_list(&d);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let report = Installer::new(config(&d), modlist.clone())
            .with_progress_callback(Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .install()
            .await
            .unwrap();
        assert_eq!(report.written, 3);
        assert_eq!(std::fs::read(d.install.join("mods/M/c.esp")).unwrap(), b"charlie");
        assert_eq!(std::fs::read(d.install.join("profiles/Default/plugins.txt")).unwrap(), b"*c.esp\n");
        assert!(calls.load(Ordering::SeqCst) > 0);

        let report = Installer::new(config(&d), modlist).install().await.unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.unchanged, 3);
    }

    #[tokio::test]
    async fn test_missing_archive_fails_only_its_directives() {
        let d = dirs();
        let modlist = archive_list(&d);
        std::fs::remove_file(d.downloads.join("mod.zip")).unwrap();

        let err = Installer::new(config(&d), modlist).install().await.unwrap_err();
        let InstallError::Failures(failures) = err else {
            panic!("expected failures, got {:?}", err);
        };
        let failed: Vec<_> = failures.iter().map(|f| f.to.as_str()).collect();
        assert_eq!(failed, vec!["mods/M/a.pex", "mods/M/c.esp"]);
        assert!(failures.iter().all(|f| matches!(f.error, DirectiveError::ArchiveMissing { .. })));
        // The inline directive still went through
        assert!(d.install.join("profiles/Default/plugins.txt").is_file());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let d = dirs();
        let token = CancellationToken::new();
        token.cancel();
        let result = Installer::new(config(&d), archive_list(&d))
            .with_cancellation_token(token)
            .install()
            .await;
        assert!(matches!(result, Err(InstallError::Cancelled)));
        assert!(!d.install.join("mods").exists());
    }

    /// Corrupts the first `corrupt` staged writes
    #[derive(Debug)]
    struct FlakyFs {
        inner: NativeFileSystem,
        corrupt: Mutex<usize>,
    }

    impl FileSystem for FlakyFs {
        fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
            self.inner.read(path)
        }
        fn stage(&self, target: &Path, data: &[u8]) -> std::io::Result<PathBuf> {
            let mut corrupt = self.corrupt.lock().unwrap();
            if *corrupt > 0 {
                *corrupt -= 1;
                return self.inner.stage(target, b"garbage");
            }
            self.inner.stage(target, data)
        }
        fn promote(&self, staged: &Path, target: &Path) -> std::io::Result<()> {
            self.inner.promote(staged, target)
        }
        fn list_files(&self, root: &Path) -> std::io::Result<Vec<FileEntry>> {
            self.inner.list_files(root)
        }
        fn list_dirs(&self, root: &Path) -> std::io::Result<Vec<PathBuf>> {
            self.inner.list_dirs(root)
        }
        fn modified(&self, path: &Path) -> std::io::Result<std::time::SystemTime> {
            self.inner.modified(path)
        }
        fn set_modified(&self, path: &Path, time: std::time::SystemTime) -> std::io::Result<()> {
            self.inner.set_modified(path, time)
        }
        fn remove_file(&self, path: &Path) -> std::io::Result<()> {
            self.inner.remove_file(path)
        }
        fn remove_dir_if_empty(&self, path: &Path) -> std::io::Result<bool> {
            self.inner.remove_dir_if_empty(path)
        }
        fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
            self.inner.create_dir_all(path)
        }
        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }
        fn is_dir(&self, path: &Path) -> bool {
            self.inner.is_dir(path)
        }
    }

    fn single_inline() -> ModList {
        let mut modlist = ModList::default();
        let directive = inline("mods/M/file.txt", b"payload", &mut modlist.blobs);
        modlist.directives.push(directive);
        modlist
    }

    #[tokio::test]
    async fn test_bad_staged_write_is_retried_once() {
        let d = dirs();
        let fs = Arc::new(FlakyFs {
            inner: NativeFileSystem,
            corrupt: Mutex::new(1),
        });
        let report = Installer::new(config(&d), single_inline())
            .with_file_system(fs)
            .install()
            .await
            .unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(std::fs::read(d.install.join("mods/M/file.txt")).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_second_bad_write_fails_verification() {
        let d = dirs();
        let fs = Arc::new(FlakyFs {
            inner: NativeFileSystem,
            corrupt: Mutex::new(2),
        });
        let err = Installer::new(config(&d), single_inline())
            .with_file_system(fs)
            .install()
            .await
            .unwrap_err();
        let InstallError::Failures(failures) = err else {
            panic!("expected failures, got {:?}", err);
        };
        assert!(matches!(
            &failures[0].error,
            DirectiveError::WriteVerification { actual, .. } if *actual == Hash::of(b"garbage")
        ));
        assert!(!d.install.join("mods/M/file.txt").exists());
        let leftovers = NativeFileSystem.list_files(&d.install).unwrap();
        assert!(leftovers.is_empty(), "staged files left behind: {:?}", leftovers);
    }
}

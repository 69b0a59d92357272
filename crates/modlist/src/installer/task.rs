//! Install units
//!
//! A unit is either every directive reading from one archive, which shares a
//! single extraction, or one directive that needs no archive. Units run on
//! the blocking pool; each directive in a unit is driven to a terminal state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::reconcile::InstallState;
use super::state::{DirectiveOutcome, DirectiveState, SkipReason};
use crate::archive::{ArchiveError, ArchiveReader};
use crate::config::InstallerConfig;
use crate::error::DirectiveError;
use crate::fs::FileSystem;
use crate::hashing::Hash;
use crate::modlist::{Directive, ModList, PathRemapper, ResolveContext, ResolvedFile};
use crate::paths;

/// Staged writes are retried this many times before giving up
const WRITE_ATTEMPTS: usize = 2;

pub(crate) struct Unit {
    /// Archive shared by every directive of the unit
    pub archive: Option<Hash>,
    /// Indices into the modlist's directives
    pub directives: Vec<usize>,
}

impl Unit {
    /// One unit per archive (in hash order), then one per remaining directive
    pub fn plan(modlist: &ModList) -> Vec<Unit> {
        let mut by_archive: std::collections::BTreeMap<Hash, Vec<usize>> = Default::default();
        let mut units = Vec::new();
        for (i, directive) in modlist.directives.iter().enumerate() {
            match directive.archive_hash() {
                Some(hash) => by_archive.entry(hash).or_default().push(i),
                None => units.push(Unit {
                    archive: None,
                    directives: vec![i],
                }),
            }
        }
        let mut grouped: Vec<Unit> = by_archive
            .into_iter()
            .map(|(hash, directives)| Unit {
                archive: Some(hash),
                directives,
            })
            .collect();
        grouped.append(&mut units);
        grouped
    }
}

/// Read-only state shared by all units
pub(crate) struct Shared {
    pub config: InstallerConfig,
    pub fs: Arc<dyn FileSystem>,
    pub reader: Arc<dyn ArchiveReader>,
    pub modlist: Arc<ModList>,
    pub remapper: PathRemapper,
    pub located: HashMap<Hash, PathBuf>,
    pub existing: InstallState,
    pub cancellation_token: CancellationToken,
    pub processed_bytes: AtomicU64,
}

impl Shared {
    fn target(&self, to: &str) -> PathBuf {
        paths::join(&self.config.install_dir, to)
    }

    fn outcome(&self, directive: &Directive, state: DirectiveState) -> DirectiveOutcome {
        trace!("{} -> {}", directive.to(), state);
        if state.is_terminal() {
            self.processed_bytes.fetch_add(directive.size(), Ordering::Relaxed);
        }
        DirectiveOutcome {
            to: directive.to().to_string(),
            bytes: directive.size(),
            state,
        }
    }

    /// Whether the file already on disk hashes to `expected`
    fn is_unchanged(&self, to: &str, size: u64, expected: Hash) -> bool {
        let Some(entry) = self.existing.files.get(to) else {
            return false;
        };
        if entry.size != size {
            return false;
        }
        match self.fs.hash(&entry.path) {
            Ok((actual, _)) => actual == expected,
            Err(e) => {
                warn!("Could not hash existing {}: {}", entry.path.display(), e);
                false
            }
        }
    }

    /// Decide skips that need no resolution
    fn precheck(&self, directive: &Directive) -> Option<DirectiveState> {
        if self.cancellation_token.is_cancelled() {
            return Some(DirectiveState::Skipped(SkipReason::Cancelled));
        }
        let to = directive.to();
        if self.existing.override_exists && paths::is_under(to, &self.config.conventions.override_dir) {
            return Some(DirectiveState::Skipped(SkipReason::Override));
        }
        // Remapped output depends on this machine's paths; checked after resolving
        if !matches!(directive, Directive::RemappedInlineFile(_))
            && self.is_unchanged(to, directive.size(), directive.hash())
        {
            return Some(DirectiveState::Skipped(SkipReason::Unchanged));
        }
        None
    }

    fn extract(&self, archive: Hash, wanted: &[&Directive]) -> Option<Result<HashMap<String, Vec<u8>>, ArchiveError>> {
        let path = self.located.get(&archive)?;
        let mut entries: Vec<String> = wanted
            .iter()
            .filter_map(|d| d.archive_source().map(|s| s.path.clone()))
            .collect();
        entries.sort();
        entries.dedup();
        debug!("Extracting {} entries from {}", entries.len(), path.display());
        Some(self.reader.extract(path, &entries))
    }

    /// Run every directive of `unit` to a terminal state
    pub fn execute(&self, unit: Unit, permit: Option<OwnedSemaphorePermit>) -> Vec<DirectiveOutcome> {
        let directives = &self.modlist.directives;
        let mut outcomes = Vec::with_capacity(unit.directives.len());
        let mut pending = Vec::new();

        for &i in &unit.directives {
            match self.precheck(&directives[i]) {
                Some(state) => outcomes.push(self.outcome(&directives[i], state)),
                None => pending.push(&directives[i]),
            }
        }
        if pending.is_empty() {
            return outcomes;
        }

        let extracted = match unit.archive {
            Some(hash) => match self.extract(hash, &pending) {
                Some(Ok(map)) => Some(map),
                Some(Err(e)) => {
                    let message = e.to_string();
                    for directive in pending {
                        let error = DirectiveError::Archive(ArchiveError::Read {
                            path: self.located.get(&hash).cloned().unwrap_or_default(),
                            message: message.clone(),
                        });
                        outcomes.push(self.outcome(directive, DirectiveState::Failed(error)));
                    }
                    return outcomes;
                }
                None => None,
            },
            None => None,
        };
        drop(permit);

        let ctx = ResolveContext {
            blobs: &self.modlist.blobs,
            fs: self.fs.as_ref(),
            game_dir: &self.config.game_dir,
            remapper: &self.remapper,
            extracted: extracted.as_ref(),
        };

        for directive in pending {
            let state = self.install_one(directive, &ctx);
            outcomes.push(self.outcome(directive, state));
        }
        outcomes
    }

    fn install_one(&self, directive: &Directive, ctx: &ResolveContext<'_>) -> DirectiveState {
        let file = match directive.resolve(ctx) {
            Ok(file) => file,
            Err(e) => return DirectiveState::Failed(e),
        };
        trace!("{} -> resolved", directive.to());
        if self.cancellation_token.is_cancelled() {
            return DirectiveState::Skipped(SkipReason::Cancelled);
        }
        if matches!(directive, Directive::RemappedInlineFile(_))
            && self.is_unchanged(directive.to(), file.data.len() as u64, file.expected)
        {
            return DirectiveState::Skipped(SkipReason::Unchanged);
        }
        write_verified(self.fs.as_ref(), &self.target(directive.to()), file)
    }
}

/// Drive a resolved file through staging and verification into place.
/// A staged copy that does not hash to the expected value is discarded and
/// written once more before the directive fails.
pub(crate) fn write_verified(fs: &dyn FileSystem, target: &Path, file: ResolvedFile) -> DirectiveState {
    let mut attempts = 0;
    let mut state = DirectiveState::Resolved(file);
    loop {
        state = match state {
            DirectiveState::Resolved(file) => {
                attempts += 1;
                match fs.stage(target, &file.data) {
                    Ok(staged) => DirectiveState::Written { staged, file },
                    Err(e) => DirectiveState::Failed(e.into()),
                }
            }
            DirectiveState::Written { staged, file } => match fs.hash(&staged) {
                Ok((actual, _)) if actual == file.expected => match fs.promote(&staged, target) {
                    Ok(()) => DirectiveState::Verified,
                    Err(e) => {
                        let _ = fs.remove_file(&staged);
                        DirectiveState::Failed(e.into())
                    }
                },
                Ok((actual, _)) => {
                    warn!(
                        "Staged {} hashed to {} instead of {} (attempt {})",
                        target.display(),
                        actual,
                        file.expected,
                        attempts
                    );
                    let _ = fs.remove_file(&staged);
                    if attempts < WRITE_ATTEMPTS {
                        DirectiveState::Resolved(file)
                    } else {
                        DirectiveState::Failed(DirectiveError::WriteVerification {
                            path: target.to_path_buf(),
                            expected: file.expected,
                            actual,
                        })
                    }
                }
                Err(e) => {
                    let _ = fs.remove_file(&staged);
                    DirectiveState::Failed(e.into())
                }
            },
            terminal => return terminal,
        };
    }
}

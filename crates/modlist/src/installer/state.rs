//! Per-directive install state

use std::fmt;
use std::path::PathBuf;

use crate::error::DirectiveError;
use crate::modlist::ResolvedFile;

/// Why a directive was not written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The file on disk already has the target hash
    Unchanged,
    /// The target lies in the override directory, which is never written
    Override,
    /// Installation was cancelled before the directive ran
    Cancelled,
}

/// `Pending -> Resolved -> Written -> Verified`, or `Skipped` / `Failed`
#[derive(Debug)]
pub enum DirectiveState {
    Pending,
    Resolved(ResolvedFile),
    /// Staged next to the target, not yet verified
    Written { staged: PathBuf, file: ResolvedFile },
    /// Verified and promoted into place
    Verified,
    Skipped(SkipReason),
    Failed(DirectiveError),
}

impl DirectiveState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Skipped(_) | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved(_) => "resolved",
            Self::Written { .. } => "written",
            Self::Verified => "verified",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for DirectiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped(reason) => write!(f, "skipped ({:?})", reason),
            Self::Failed(err) => write!(f, "failed: {}", err),
            Self::Written { file, .. } => write!(f, "written ({} bytes, unverified)", file.data.len()),
            other => f.write_str(other.name()),
        }
    }
}

/// Final state of one directive
#[derive(Debug)]
pub struct DirectiveOutcome {
    pub to: String,
    pub bytes: u64,
    pub state: DirectiveState,
}

/// Summary of a finished installation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Files written and verified
    pub written: usize,
    /// Files left alone because they already matched
    pub unchanged: usize,
    /// Targets skipped because of the override directory
    pub overridden: usize,
    /// Extra files removed from the install root
    pub deleted: usize,
    /// Empty directories removed from the install root
    pub removed_dirs: usize,
    pub bytes_written: u64,
}

impl InstallReport {
    pub(crate) fn record(&mut self, outcome: &DirectiveOutcome) {
        match outcome.state {
            DirectiveState::Verified => {
                self.written += 1;
                self.bytes_written += outcome.bytes;
            }
            DirectiveState::Skipped(SkipReason::Unchanged) => self.unchanged += 1,
            DirectiveState::Skipped(SkipReason::Override) => self.overridden += 1,
            _ => {}
        }
    }
}

//! Filesystem mutation gate.
//!
//! Every directory creation, deletion, rename and output write in a run goes
//! through [`FsActions`]. In dry-run mode the action is logged and recorded in
//! a journal instead of performed, and the caller proceeds as if it had succeeded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// A mutating action that was skipped because of dry-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    CreateDir(PathBuf),
    RemoveDir(PathBuf),
    Rename { from: PathBuf, to: PathBuf },
    WriteFile(PathBuf),
}

/// Performs or, in dry-run mode, records filesystem mutations.
#[derive(Debug, Default)]
pub struct FsActions {
    dry_run: bool,
    journal: Mutex<Vec<PlannedAction>>,
}

impl FsActions {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            journal: Mutex::new(Vec::new()),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Actions skipped so far, in the order they were requested.
    pub fn journal(&self) -> Vec<PlannedAction> {
        self.journal
            .lock()
            .map(|journal| journal.clone())
            .unwrap_or_default()
    }

    fn record(&self, action: PlannedAction) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(action);
        }
    }

    /// Creates `path` and its parents. A dry run journals each missing
    /// directory once, however many units ask for it.
    pub fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        if self.dry_run {
            if path.is_dir() {
                return Ok(());
            }
            let action = PlannedAction::CreateDir(path.to_path_buf());
            if let Ok(mut journal) = self.journal.lock() {
                if !journal.contains(&action) {
                    info!("[dry-run] would create directory {}", path.display());
                    journal.push(action);
                }
            }
            return Ok(());
        }
        fs::create_dir_all(path)
    }

    /// Recursively deletes `path`. Callers validate the target first.
    pub fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        if self.dry_run {
            info!("[dry-run] would delete {}", path.display());
            self.record(PlannedAction::RemoveDir(path.to_path_buf()));
            return Ok(());
        }
        fs::remove_dir_all(path)
    }

    pub fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.dry_run {
            info!("[dry-run] would move {} -> {}", from.display(), to.display());
            self.record(PlannedAction::Rename {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            });
            return Ok(());
        }
        fs::rename(from, to)
    }

    /// Records an output file that a dry run would have written.
    pub fn would_write(&self, path: &Path) {
        info!("[dry-run] would write {}", path.display());
        self.record(PlannedAction::WriteFile(path.to_path_buf()));
    }
}

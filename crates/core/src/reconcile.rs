//! Output root reconciliation.
//!
//! Decides, once per run and before any file is processed, what happens to an
//! output root left behind by an earlier run: move it aside, delete it, write
//! next to it, or keep it and resume.

use crate::config::ReconcileMode;
use crate::dry_run::FsActions;
use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Literal the user must type to confirm deleting an existing output root.
pub const OVERWRITE_CONFIRMATION: &str = "OVERWRITE";

/// Errors that can occur while reconciling the output root.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Overwrite needs confirmation but there is no way to ask for it.
    #[error(
        "refusing to delete {} without confirmation; pass --yes to overwrite non-interactively",
        .0.display()
    )]
    ConfirmationRequired(PathBuf),

    /// The user did not confirm the deletion.
    #[error("overwrite of {} was not confirmed", .0.display())]
    ConfirmationDeclined(PathBuf),

    /// A deletion target resolved to a path that must never be deleted.
    #[error("refusing to delete unsafe path '{}'", .0.display())]
    InvariantViolation(PathBuf),

    /// Filesystem error while moving, deleting or creating the root.
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Answer from a confirmation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
    /// No interactive channel exists to ask on.
    Unavailable,
}

/// Asks the user to confirm a destructive action by typing `expected`.
pub trait Confirmer {
    fn confirm(&self, prompt: &str, expected: &str) -> Confirmation;
}

/// Confirms through the controlling terminal; unavailable when stdin is not a TTY.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, prompt: &str, expected: &str) -> Confirmation {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Confirmation::Unavailable;
        }

        eprint!("{} Type {} to continue: ", prompt, expected);
        let _ = io::stderr().flush();

        let mut answer = String::new();
        match stdin.lock().read_line(&mut answer) {
            Ok(0) | Err(_) => Confirmation::Unavailable,
            Ok(_) if answer.trim() == expected => Confirmation::Confirmed,
            Ok(_) => Confirmation::Declined,
        }
    }
}

/// What reconciliation did to the requested root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Nothing existed or the existing root is reused as-is.
    KeepAsIs,
    /// The existing root was moved to `backup`.
    RelocateExisting { backup: PathBuf },
    /// The existing root was deleted.
    DeleteExisting,
    /// The requested root was taken; a free sibling is used instead.
    RenameToUnique { requested: PathBuf },
}

/// Result of reconciliation: the root every later step writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub root: PathBuf,
    pub action: ReconcileAction,
}

/// Strips `.` components and trailing separators so suffixes land on the last name.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = normalize(path).into_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// First of `{root}_2`, `{root}_3`, … that does not exist.
pub fn unique_sibling(root: &Path) -> PathBuf {
    (2u32..)
        .map(|n| with_suffix(root, &format!("_{}", n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| with_suffix(root, "_new"))
}

/// Timestamp used in backup names, local time `YYYYMMDD_HHMMSS`.
pub fn backup_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Backup location `{root}__backup_{timestamp}`, suffixed with `_2`, `_3`, … if taken.
pub fn backup_path(root: &Path, timestamp: &str) -> PathBuf {
    let base = with_suffix(root, &format!("__backup_{}", timestamp));
    if !base.exists() {
        return base;
    }
    unique_sibling(&base)
}

/// Rejects deletion targets that are empty, `.`, `..`, the filesystem root
/// or the current directory and its ancestors.
pub fn check_delete_target(path: &Path) -> Result<(), ReconcileError> {
    let unsafe_path = || Err(ReconcileError::InvariantViolation(path.to_path_buf()));

    if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
        return unsafe_path();
    }

    let normalized = normalize(path);
    let components: Vec<Component> = normalized.components().collect();
    if components.is_empty() {
        return unsafe_path();
    }
    // Needs at least one real name: `/`, `..`, `../..` and friends are refused
    if !components.iter().any(|c| matches!(c, Component::Normal(_))) {
        return unsafe_path();
    }

    // Catches spellings like `/tmp/..` or `./x/..` that resolve to `/` or `.`
    if let Ok(resolved) = fs::canonicalize(path) {
        if resolved.parent().is_none() {
            return unsafe_path();
        }
        if let Ok(cwd) = std::env::current_dir().and_then(fs::canonicalize) {
            if cwd.starts_with(&resolved) {
                return unsafe_path();
            }
        }
    }

    Ok(())
}

/// Applies `mode` to `requested` and returns the root to write into.
///
/// Runs exactly once, before any file is processed. In dry-run mode every
/// mutation is recorded instead of performed but the returned root is the
/// same as in a real run.
pub fn reconcile(
    requested: &Path,
    mode: ReconcileMode,
    assume_yes: bool,
    confirmer: &dyn Confirmer,
    actions: &FsActions,
) -> Result<ReconcileOutcome, ReconcileError> {
    let exists = requested.exists();

    let outcome = match (mode, exists) {
        (ReconcileMode::Resume, _) | (_, false) => ReconcileOutcome {
            root: requested.to_path_buf(),
            action: ReconcileAction::KeepAsIs,
        },
        (ReconcileMode::New, true) => {
            let root = unique_sibling(requested);
            info!(
                "{} exists, writing to {} instead",
                requested.display(),
                root.display()
            );
            ReconcileOutcome {
                root,
                action: ReconcileAction::RenameToUnique {
                    requested: requested.to_path_buf(),
                },
            }
        }
        (ReconcileMode::Backup, true) => {
            let backup = backup_path(requested, &backup_timestamp());
            info!("Moving {} to {}", requested.display(), backup.display());
            actions
                .rename(requested, &backup)
                .map_err(|source| ReconcileError::Io {
                    action: "back up",
                    path: requested.to_path_buf(),
                    source,
                })?;
            ReconcileOutcome {
                root: requested.to_path_buf(),
                action: ReconcileAction::RelocateExisting { backup },
            }
        }
        (ReconcileMode::Overwrite, true) => {
            check_delete_target(requested)?;

            if assume_yes {
                info!("Overwrite confirmed by --yes");
            } else {
                let prompt = format!(
                    "Output folder {} exists and will be permanently deleted.",
                    requested.display()
                );
                match confirmer.confirm(&prompt, OVERWRITE_CONFIRMATION) {
                    Confirmation::Confirmed => {}
                    Confirmation::Declined => {
                        return Err(ReconcileError::ConfirmationDeclined(requested.to_path_buf()))
                    }
                    Confirmation::Unavailable => {
                        return Err(ReconcileError::ConfirmationRequired(requested.to_path_buf()))
                    }
                }
            }

            warn!("Deleting {}", requested.display());
            actions
                .remove_dir_all(requested)
                .map_err(|source| ReconcileError::Io {
                    action: "delete",
                    path: requested.to_path_buf(),
                    source,
                })?;
            ReconcileOutcome {
                root: requested.to_path_buf(),
                action: ReconcileAction::DeleteExisting,
            }
        }
    };

    actions
        .create_dir_all(&outcome.root)
        .map_err(|source| ReconcileError::Io {
            action: "create",
            path: outcome.root.clone(),
            source,
        })?;

    Ok(outcome)
}

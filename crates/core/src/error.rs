//! Run-level error type.

use crate::config::ConfigError;
use crate::labels::LabelError;
use crate::reconcile::ReconcileError;
use crate::startup::StartupError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a whole run. Per-file failures are collected in
/// [`RunResult`](crate::scheduler::RunResult) instead.
#[derive(Debug, Error)]
pub enum SplitError {
    /// Invalid arguments or settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be read or parsed
    #[error("Configuration error: {0}")]
    ConfigFile(#[from] ConfigError),

    /// Label file missing, empty or unreadable
    #[error("Configuration error: {0}")]
    Labels(#[from] LabelError),

    /// A required external tool is missing
    #[error("Startup check failed: {0}")]
    Startup(#[from] StartupError),

    /// Output root could not be reconciled
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// The label set does not fit an input file; every later file is suspect too
    #[error(
        "channel count mismatch in {}: label file has {labels} labels but the file has {channels} channels",
        .file.display()
    )]
    ChannelCountMismatch {
        file: PathBuf,
        labels: usize,
        channels: usize,
    },
}

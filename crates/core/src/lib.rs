//! polysplit
//!
//! Splits multi-channel (poly) WAV/AIFF recordings into one mono file per
//! channel, named from a label file, with bounded concurrency and safe
//! handling of an existing output folder.

pub mod codec;
pub mod concurrency;
pub mod dry_run;
pub mod engine;
pub mod error;
pub mod labels;
pub mod naming;
pub mod planner;
pub mod probe;
pub mod reconcile;
pub mod scan;
pub mod scheduler;
pub mod session;
pub mod startup;

#[cfg(test)]
mod testing;

pub use polysplit_config as config;
pub use polysplit_config::{Config, ConfigError, LayoutMode, ReconcileMode};
pub use codec::{select_encoding, EncodingSpec};
pub use concurrency::ConcurrencyPlan;
pub use dry_run::{FsActions, PlannedAction};
pub use engine::{EngineError, FfmpegEngine, MediaEngine};
pub use error::SplitError;
pub use labels::{load_labels, parse_labels, sanitize_label, LabelError};
pub use naming::{destination_path, output_dir_for, output_file_name};
pub use planner::{plan_job, JobPlan, PlanError, PlanSettings, PlannedOutput};
pub use probe::{FfprobeProbe, MediaInfo, MediaProbe, ProbeError};
pub use reconcile::{
    reconcile, Confirmation, Confirmer, ReconcileAction, ReconcileError, ReconcileOutcome,
    TerminalConfirmer,
};
pub use scan::discover_inputs;
pub use scheduler::{FileFailure, JobError, RunResult, SharedRunResult, WorkScheduler};
pub use session::{Session, SessionOptions, SessionReport};
pub use startup::{run_startup_checks, StartupError};

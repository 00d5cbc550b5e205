//! Work scheduler module for polysplit
//!
//! Runs one unit of work per input file (plan, then execute) with the number
//! of concurrently running units limited by a semaphore, and aggregates the
//! per-file outcomes into a [`RunResult`].

use crate::concurrency::ConcurrencyPlan;
use crate::dry_run::FsActions;
use crate::engine::{EngineError, MediaEngine};
use crate::error::SplitError;
use crate::planner::{plan_job, JobPlan, PlanError, PlanSettings};
use crate::probe::MediaProbe;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

/// Error type for a single file's unit of work
#[derive(Debug, Error)]
pub enum JobError {
    /// Planning failed
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Failed to create the file's output directory
    #[error("failed to create {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The media engine failed
    #[error("splitting {} failed: {source}", .file.display())]
    Engine {
        file: PathBuf,
        #[source]
        source: EngineError,
    },

    /// Another input of this run already maps to the same output names
    #[error(
        "{} has the same output names as {}; skipped",
        .file.display(),
        .claimed_by.display()
    )]
    DuplicateOutputs { file: PathBuf, claimed_by: PathBuf },

    /// The unit panicked
    #[error("processing {} panicked: {message}", .file.display())]
    Panicked { file: PathBuf, message: String },
}

impl JobError {
    /// Whether this error must stop the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, JobError::Plan(plan) if plan.is_fatal())
    }
}

/// Successful outcome of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The engine produced `written` outputs; `already_done` were kept from a previous run
    Split { written: usize, already_done: usize },
    /// Every output already existed
    NothingToDo { already_done: usize },
    /// Dry run: `planned` outputs would have been written
    DryRun { planned: usize },
}

/// A file that failed, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub file: PathBuf,
    pub message: String,
}

/// Aggregate outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Files whose missing outputs were produced (or would be, in a dry run)
    pub planned: usize,
    /// Files with nothing left to do
    pub skipped: usize,
    /// Files that failed
    pub failed: usize,
    /// Output files written
    pub outputs_written: usize,
    /// One entry per failed file
    pub failures: Vec<FileFailure>,
}

impl RunResult {
    /// Number of files that reached a terminal state
    pub fn total(&self) -> usize {
        self.planned + self.skipped + self.failed
    }
}

/// Run result shared between concurrently completing units
pub type SharedRunResult = Arc<RwLock<RunResult>>;

/// Create a new empty shared run result
pub fn new_shared_result() -> SharedRunResult {
    Arc::new(RwLock::new(RunResult::default()))
}

/// State every unit needs
#[derive(Clone)]
struct UnitContext {
    labels: Arc<[String]>,
    settings: Arc<PlanSettings>,
    probe: Arc<dyn MediaProbe>,
    engine: Arc<dyn MediaEngine>,
    actions: Arc<FsActions>,
    /// Output name prefix (output dir + stem) -> input that owns it
    claimed: Arc<Mutex<HashMap<PathBuf, PathBuf>>>,
}

impl UnitContext {
    /// Reserve the outputs of `plan` for its input; first claimant wins.
    fn claim_outputs(&self, plan: &JobPlan) -> Result<(), JobError> {
        let stem = plan.input.file_stem().unwrap_or_default();
        let key = plan.output_dir.join(stem);

        let mut claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match claimed.get(&key) {
            Some(owner) if owner != &plan.input => Err(JobError::DuplicateOutputs {
                file: plan.input.clone(),
                claimed_by: owner.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                claimed.insert(key, plan.input.clone());
                Ok(())
            }
        }
    }

    /// Plan and materialize one file. Blocking.
    fn process(&self, input: &PathBuf) -> Result<FileOutcome, JobError> {
        let plan = plan_job(input, &self.labels, &self.settings, self.probe.as_ref())?;
        self.claim_outputs(&plan)?;

        if plan.is_empty() {
            return Ok(FileOutcome::NothingToDo {
                already_done: plan.already_done,
            });
        }

        self.actions
            .create_dir_all(&plan.output_dir)
            .map_err(|source| JobError::OutputDir {
                path: plan.output_dir.clone(),
                source,
            })?;

        if self.actions.is_dry_run() {
            for output in &plan.outputs {
                self.actions.would_write(&output.path);
            }
            return Ok(FileOutcome::DryRun {
                planned: plan.outputs.len(),
            });
        }

        self.engine
            .execute(&plan)
            .map_err(|source| JobError::Engine {
                file: input.clone(),
                source,
            })?;

        Ok(FileOutcome::Split {
            written: plan.outputs.len(),
            already_done: plan.already_done,
        })
    }
}

/// Scheduler that runs per-file units with concurrency limiting
///
/// Uses a tokio Semaphore to bound the number of units in flight; discovery
/// waits for a free permit before admitting the next file.
pub struct WorkScheduler {
    /// Semaphore for limiting concurrent units
    semaphore: Arc<Semaphore>,
    /// Concurrency plan the semaphore was sized from
    concurrency_plan: ConcurrencyPlan,
    /// Shared state handed to every unit
    context: UnitContext,
    /// Aggregated outcome
    result: SharedRunResult,
    /// Set once a fatal error is seen; stops admission
    abort: Arc<AtomicBool>,
}

impl WorkScheduler {
    /// Create a new WorkScheduler
    ///
    /// # Arguments
    /// * `plan` - Concurrency plan determining max concurrent files
    /// * `labels` - Channel labels, shared read-only by every unit
    /// * `settings` - Output naming and mode settings
    /// * `probe` - Media prober
    /// * `engine` - Media engine materializing outputs
    /// * `actions` - Filesystem gate honoring dry-run
    pub fn new(
        plan: ConcurrencyPlan,
        labels: Arc<[String]>,
        settings: PlanSettings,
        probe: Arc<dyn MediaProbe>,
        engine: Arc<dyn MediaEngine>,
        actions: Arc<FsActions>,
    ) -> Self {
        let permits = plan.max_concurrent_files.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            concurrency_plan: plan,
            context: UnitContext {
                labels,
                settings: Arc::new(settings),
                probe,
                engine,
                actions,
                claimed: Arc::new(Mutex::new(HashMap::new())),
            },
            result: new_shared_result(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the number of available permits (slots for concurrent units)
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get the concurrency plan
    pub fn concurrency_plan(&self) -> &ConcurrencyPlan {
        &self.concurrency_plan
    }

    /// Get the shared run result
    pub fn result(&self) -> SharedRunResult {
        self.result.clone()
    }

    /// Whether a fatal error has stopped admission
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Acquire a permit for a unit
    ///
    /// This waits until a permit is available if all slots are in use.
    async fn acquire_permit(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }

    /// Run every input through plan + execute
    ///
    /// Inputs are pulled lazily, one per free slot. A channel count mismatch
    /// stops admission of further files; units already running are awaited and
    /// the mismatch is returned. Every other failure is recorded in the result
    /// and the run continues. Returns only after every started unit has finished.
    pub async fn run<I>(&self, inputs: I) -> Result<RunResult, SplitError>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut units: JoinSet<(PathBuf, Result<FileOutcome, JobError>)> = JoinSet::new();
        let mut fatal: Option<JobError> = None;

        for input in inputs {
            if self.is_aborted() {
                break;
            }

            let Some(permit) = self.acquire_permit().await else {
                break;
            };

            // A unit may have failed fatally while we waited for its permit
            if self.is_aborted() {
                break;
            }

            while let Some(done) = units.try_join_next() {
                self.record(done, &mut fatal).await;
            }

            let context = self.context.clone();
            let abort = self.abort.clone();
            units.spawn(async move {
                let file = input.clone();
                let outcome = tokio::task::spawn_blocking(move || context.process(&input))
                    .await
                    .unwrap_or_else(|join_err| {
                        Err(JobError::Panicked {
                            file: file.clone(),
                            message: join_err.to_string(),
                        })
                    });

                // Flag before releasing the permit so the admission loop sees it
                if matches!(&outcome, Err(e) if e.is_fatal()) {
                    abort.store(true, Ordering::SeqCst);
                }
                drop(permit);

                (file, outcome)
            });
        }

        if self.is_aborted() && !units.is_empty() {
            warn!("Waiting for {} running file(s) to finish before stopping", units.len());
        }

        while let Some(done) = units.join_next().await {
            self.record(done, &mut fatal).await;
        }

        match fatal {
            Some(JobError::Plan(PlanError::ChannelCountMismatch {
                file,
                labels,
                channels,
            })) => Err(SplitError::ChannelCountMismatch {
                file,
                labels,
                channels,
            }),
            _ => Ok(self.result.read().await.clone()),
        }
    }

    /// Fold one finished unit into the run result
    async fn record(
        &self,
        done: Result<(PathBuf, Result<FileOutcome, JobError>), JoinError>,
        fatal: &mut Option<JobError>,
    ) {
        let (file, outcome) = match done {
            Ok(done) => done,
            Err(join_err) => {
                error!("A file unit was lost: {}", join_err);
                let mut result = self.result.write().await;
                result.failed += 1;
                result.failures.push(FileFailure {
                    file: PathBuf::new(),
                    message: join_err.to_string(),
                });
                return;
            }
        };

        let mut result = self.result.write().await;
        match outcome {
            Ok(FileOutcome::Split {
                written,
                already_done,
            }) => {
                if already_done > 0 {
                    info!(
                        "{}: wrote {} channel(s), {} already present",
                        file.display(),
                        written,
                        already_done
                    );
                } else {
                    info!("{}: wrote {} channel(s)", file.display(), written);
                }
                result.planned += 1;
                result.outputs_written += written;
            }
            Ok(FileOutcome::DryRun { planned }) => {
                info!("{}: would write {} channel(s)", file.display(), planned);
                result.planned += 1;
            }
            Ok(FileOutcome::NothingToDo { already_done }) => {
                info!(
                    "{}: nothing to do ({} output(s) already present)",
                    file.display(),
                    already_done
                );
                result.skipped += 1;
            }
            Err(err) => {
                error!("{}", err);
                result.failed += 1;
                result.failures.push(FileFailure {
                    file,
                    message: err.to_string(),
                });
                if err.is_fatal() && fatal.is_none() {
                    *fatal = Some(err);
                }
            }
        }
    }
}

//! Session startup and run sequence for polysplit
//!
//! A [`Session`] owns everything a single run needs and executes it once:
//! validate options, load labels, reconcile the output root, discover inputs
//! and hand them to the [`WorkScheduler`].

use crate::concurrency::ConcurrencyPlan;
use crate::config::{Config, LayoutMode, ReconcileMode, ToolsConfig};
use crate::dry_run::{FsActions, PlannedAction};
use crate::engine::{FfmpegEngine, MediaEngine};
use crate::error::SplitError;
use crate::labels::load_labels;
use crate::naming::DEFAULT_PAD_WIDTH;
use crate::planner::PlanSettings;
use crate::probe::{FfprobeProbe, MediaProbe};
use crate::reconcile::{reconcile, Confirmer, ReconcileAction};
use crate::scan::discover_inputs;
use crate::scheduler::{RunResult, WorkScheduler};
use crate::startup::run_startup_checks;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Resolved options for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Directory searched for input files
    pub src: PathBuf,
    /// Requested output root (before reconciliation)
    pub out: PathBuf,
    /// Label file, one label per channel
    pub labels_path: PathBuf,
    /// Output layout
    pub layout: LayoutMode,
    /// How an existing output root is handled
    pub mode: ReconcileMode,
    /// Worker limit; `None` derives it from the CPU count
    pub workers: Option<usize>,
    /// Zero-pad width of channel indices
    pub pad_width: usize,
    /// Skip the overwrite confirmation
    pub assume_yes: bool,
    /// Log mutating actions instead of performing them
    pub dry_run: bool,
}

impl SessionOptions {
    /// Options with the run settings taken from `config`
    pub fn from_config(config: &Config, src: PathBuf, out: PathBuf, labels_path: PathBuf) -> Self {
        Self {
            src,
            out,
            labels_path,
            layout: config.output.layout,
            mode: config.run.mode,
            workers: match config.run.workers {
                0 => None,
                n => Some(n as usize),
            },
            pad_width: config.output.pad_width,
            assume_yes: false,
            dry_run: false,
        }
    }

    /// Rejects option combinations no run can proceed with
    pub fn validate(&self) -> Result<(), SplitError> {
        if self.src.as_os_str().is_empty() {
            return Err(SplitError::Config("no source directory given".to_string()));
        }
        if !self.src.is_dir() {
            return Err(SplitError::Config(format!(
                "source directory {} does not exist",
                self.src.display()
            )));
        }
        if self.out.as_os_str().is_empty() {
            return Err(SplitError::Config("no output directory given".to_string()));
        }
        if self.pad_width == 0 {
            return Err(SplitError::Config("pad width must be at least 1".to_string()));
        }
        if self.workers == Some(0) {
            return Err(SplitError::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            src: PathBuf::new(),
            out: PathBuf::new(),
            labels_path: PathBuf::new(),
            layout: LayoutMode::default(),
            mode: ReconcileMode::default(),
            workers: None,
            pad_width: DEFAULT_PAD_WIDTH,
            assume_yes: false,
            dry_run: false,
        }
    }
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Root every output was written into
    pub root: PathBuf,
    /// What reconciliation did to the requested root
    pub action: ReconcileAction,
    /// Worker limit the run used
    pub workers: usize,
    /// Per-file tallies and failures
    pub result: RunResult,
    /// Actions skipped because of dry-run, in request order
    pub skipped_actions: Vec<PlannedAction>,
}

/// A single polysplit run with its collaborators
pub struct Session {
    options: SessionOptions,
    probe: Arc<dyn MediaProbe>,
    engine: Arc<dyn MediaEngine>,
}

impl Session {
    /// Create a session using ffprobe and ffmpeg
    ///
    /// Runs the startup checks first, so a missing tool fails before any
    /// output folder is touched.
    pub fn new(options: SessionOptions, tools: &ToolsConfig) -> Result<Self, SplitError> {
        options.validate()?;
        run_startup_checks(tools)?;

        Ok(Self::with_collaborators(
            options,
            Arc::new(FfprobeProbe::new(tools.ffprobe.clone())),
            Arc::new(FfmpegEngine::new(tools.ffmpeg.clone())),
        ))
    }

    /// Create a session with explicit probe and engine, without startup checks
    pub fn with_collaborators(
        options: SessionOptions,
        probe: Arc<dyn MediaProbe>,
        engine: Arc<dyn MediaEngine>,
    ) -> Self {
        Self {
            options,
            probe,
            engine,
        }
    }

    /// Get the session options
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Run the session once
    ///
    /// Order of operations:
    /// 1. Validate options
    /// 2. Load the label file
    /// 3. Reconcile the output root (the only step that may move or delete it)
    /// 4. Discover inputs lazily, skipping the output root
    /// 5. Plan and split every input with bounded concurrency
    pub async fn run(&self, confirmer: &dyn Confirmer) -> Result<SessionReport, SplitError> {
        let options = &self.options;
        options.validate()?;

        // Before reconcile, so a bad label file never costs the old outputs
        let labels: Arc<[String]> = load_labels(&options.labels_path)?.into();
        info!(
            "Loaded {} channel label(s) from {}",
            labels.len(),
            options.labels_path.display()
        );

        let actions = Arc::new(FsActions::new(options.dry_run));
        if actions.is_dry_run() {
            info!("Dry run: nothing will be written, moved or deleted");
        }

        let outcome = reconcile(
            &options.out,
            options.mode,
            options.assume_yes,
            confirmer,
            &actions,
        )?;
        info!("Writing outputs to {}", outcome.root.display());

        let concurrency = ConcurrencyPlan::derive(options.workers);
        let workers = concurrency.max_concurrent_files;
        info!(
            "Processing with {} worker(s) ({} cores detected)",
            workers, concurrency.total_cores
        );

        let settings = PlanSettings {
            out_root: outcome.root.clone(),
            layout: options.layout,
            mode: options.mode,
            pad_width: options.pad_width,
        };
        let scheduler = WorkScheduler::new(
            concurrency,
            labels,
            settings,
            self.probe.clone(),
            self.engine.clone(),
            actions.clone(),
        );

        let exclude = comparable(&outcome.root);
        let src = comparable(&options.src);
        let inputs = discover_inputs(&src, Some(&exclude));
        let result = scheduler.run(inputs).await?;

        if result.total() == 0 {
            warn!("No audio files found under {}", options.src.display());
        }

        Ok(SessionReport {
            root: outcome.root,
            action: outcome.action,
            workers,
            result,
            skipped_actions: actions.journal(),
        })
    }
}

/// Absolute form of `path` so the source walk and the output root compare equal
fn comparable(path: &Path) -> PathBuf {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{Confirmation, ReconcileError};
    use crate::testing::{touch, FakeProbe, RecordingEngine, StubConfirmer};
    use std::fs;
    use tempfile::TempDir;

    struct Workspace {
        temp_dir: TempDir,
    }

    impl Workspace {
        fn new(inputs: &[&str], labels: &str) -> Self {
            let temp_dir = TempDir::new().unwrap();
            fs::create_dir_all(temp_dir.path().join("src")).unwrap();
            for name in inputs {
                touch(&temp_dir.path().join("src"), name);
            }
            fs::write(temp_dir.path().join("channels.txt"), labels).unwrap();
            Self { temp_dir }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.temp_dir.path().join(rel)
        }

        fn options(&self, mode: ReconcileMode) -> SessionOptions {
            SessionOptions {
                src: self.path("src"),
                out: self.path("out"),
                labels_path: self.path("channels.txt"),
                mode,
                workers: Some(2),
                ..SessionOptions::default()
            }
        }
    }

    fn session(
        options: SessionOptions,
        probe: FakeProbe,
        engine: Arc<RecordingEngine>,
    ) -> Session {
        Session::with_collaborators(options, Arc::new(probe), engine)
    }

    #[tokio::test]
    async fn test_fresh_run_writes_every_channel() {
        let ws = Workspace::new(&["Song1.wav", "Song2.aiff"], "Kick\nSnare Top\n");
        let engine = Arc::new(RecordingEngine::new());
        let session = session(
            ws.options(ReconcileMode::New),
            FakeProbe::with_channels(2),
            engine.clone(),
        );

        let report = session
            .run(&StubConfirmer::new(Confirmation::Unavailable))
            .await
            .unwrap();

        assert_eq!(report.root, ws.path("out"));
        assert_eq!(report.action, ReconcileAction::KeepAsIs);
        assert_eq!(report.result.planned, 2);
        assert_eq!(report.workers, 2);
        assert!(ws.path("out/Song1_01_KICK.wav").exists());
        assert!(ws.path("out/Song1_02_SNARE_TOP.wav").exists());
        assert!(ws.path("out/Song2_02_SNARE_TOP.wav").exists());
        assert!(report.skipped_actions.is_empty());
    }

    #[tokio::test]
    async fn test_new_mode_picks_unique_sibling() {
        let ws = Workspace::new(&["a.wav"], "L\nR\n");
        touch(&ws.path("out"), "old.wav");
        let engine = Arc::new(RecordingEngine::new());
        let session = session(
            ws.options(ReconcileMode::New),
            FakeProbe::with_channels(2),
            engine,
        );

        let report = session
            .run(&StubConfirmer::new(Confirmation::Unavailable))
            .await
            .unwrap();

        assert_eq!(report.root, ws.path("out_2"));
        assert!(ws.path("out_2/a_01_L.wav").exists());
        assert!(ws.path("out/old.wav").exists());
        assert!(!ws.path("out/a_01_L.wav").exists());
    }

    #[tokio::test]
    async fn test_mismatch_is_fatal() {
        let ws = Workspace::new(&["a.wav"], "L\nR\n");
        let engine = Arc::new(RecordingEngine::new());
        let session = session(
            ws.options(ReconcileMode::New),
            FakeProbe::with_channels(3),
            engine.clone(),
        );

        let err = session
            .run(&StubConfirmer::new(Confirmation::Unavailable))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SplitError::ChannelCountMismatch {
                labels: 2,
                channels: 3,
                ..
            }
        ));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_without_confirmation_keeps_root() {
        let ws = Workspace::new(&["a.wav"], "L\n");
        let kept = touch(&ws.path("out"), "precious.wav");
        let engine = Arc::new(RecordingEngine::new());
        let session = session(
            ws.options(ReconcileMode::Overwrite),
            FakeProbe::with_channels(1),
            engine.clone(),
        );

        let err = session
            .run(&StubConfirmer::new(Confirmation::Unavailable))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SplitError::Reconcile(ReconcileError::ConfirmationRequired(_))
        ));
        assert!(kept.exists());
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_with_yes_replaces_root() {
        let ws = Workspace::new(&["a.wav"], "L\n");
        let stale = touch(&ws.path("out"), "stale.wav");
        let mut options = ws.options(ReconcileMode::Overwrite);
        options.assume_yes = true;
        let session = session(
            options,
            FakeProbe::with_channels(1),
            Arc::new(RecordingEngine::new()),
        );
        let confirmer = StubConfirmer::new(Confirmation::Declined);

        let report = session.run(&confirmer).await.unwrap();

        assert_eq!(report.action, ReconcileAction::DeleteExisting);
        assert_eq!(confirmer.asked(), 0);
        assert!(!stale.exists());
        assert!(ws.path("out/a_01_L.wav").exists());
    }

    #[tokio::test]
    async fn test_missing_labels_leaves_existing_root_alone() {
        let ws = Workspace::new(&["a.wav"], "L\n");
        let kept = touch(&ws.path("out"), "precious.wav");
        let mut options = ws.options(ReconcileMode::Backup);
        options.labels_path = ws.path("missing.txt");
        let session = session(
            options,
            FakeProbe::with_channels(1),
            Arc::new(RecordingEngine::new()),
        );

        let err = session
            .run(&StubConfirmer::new(Confirmation::Confirmed))
            .await
            .unwrap_err();

        assert!(matches!(err, SplitError::Labels(_)));
        assert!(kept.exists());
    }

    #[tokio::test]
    async fn test_resume_twice_second_run_is_noop() {
        let ws = Workspace::new(&["a.wav", "b.wav"], "L\nR\n");
        let first = session(
            ws.options(ReconcileMode::Resume),
            FakeProbe::with_channels(2),
            Arc::new(RecordingEngine::new()),
        );
        first
            .run(&StubConfirmer::new(Confirmation::Unavailable))
            .await
            .unwrap();

        let engine = Arc::new(RecordingEngine::new());
        let second = session(
            ws.options(ReconcileMode::Resume),
            FakeProbe::with_channels(2),
            engine.clone(),
        );
        let report = second
            .run(&StubConfirmer::new(Confirmation::Unavailable))
            .await
            .unwrap();

        assert_eq!(report.result.skipped, 2);
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_output_root_inside_src_is_not_rescanned() {
        let ws = Workspace::new(&["a.wav"], "L\nR\n");
        let mut options = ws.options(ReconcileMode::Resume);
        options.out = ws.path("src/split");
        touch(&ws.path("src/split"), "a_01_L.wav");
        let engine = Arc::new(RecordingEngine::new());
        let session = session(options, FakeProbe::with_channels(2), engine.clone());

        let report = session
            .run(&StubConfirmer::new(Confirmation::Unavailable))
            .await
            .unwrap();

        assert_eq!(report.result.total(), 1);
        assert_eq!(engine.calls().len(), 1);
        assert_eq!(engine.calls()[0].input, comparable(&ws.path("src/a.wav")));
    }

    #[tokio::test]
    async fn test_dry_run_backup_reports_without_touching_disk() {
        let ws = Workspace::new(&["a.wav"], "L\nR\n");
        let kept = touch(&ws.path("out"), "old.wav");
        let mut options = ws.options(ReconcileMode::Backup);
        options.dry_run = true;
        let engine = Arc::new(RecordingEngine::new());
        let session = session(options, FakeProbe::with_channels(2), engine.clone());

        let report = session
            .run(&StubConfirmer::new(Confirmation::Unavailable))
            .await
            .unwrap();

        assert_eq!(report.root, ws.path("out"));
        assert!(matches!(report.action, ReconcileAction::RelocateExisting { .. }));
        assert!(engine.calls().is_empty());
        assert!(kept.exists());
        assert!(!ws.path("out/a_01_L.wav").exists());
        assert!(report
            .skipped_actions
            .iter()
            .any(|a| matches!(a, PlannedAction::Rename { .. })));
        assert_eq!(
            report
                .skipped_actions
                .iter()
                .filter(|a| matches!(a, PlannedAction::WriteFile(_)))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_dry_run_new_mode_plans_sibling_root_once() {
        let ws = Workspace::new(&["a.wav", "b.wav", "c.wav"], "L\n");
        touch(&ws.path("out"), "old.wav");
        let mut options = ws.options(ReconcileMode::New);
        options.dry_run = true;
        let session = session(
            options,
            FakeProbe::with_channels(1),
            Arc::new(RecordingEngine::new()),
        );

        let report = session
            .run(&StubConfirmer::new(Confirmation::Unavailable))
            .await
            .unwrap();

        assert_eq!(report.root, ws.path("out_2"));
        assert!(!ws.path("out_2").exists());
        let created: Vec<&PlannedAction> = report
            .skipped_actions
            .iter()
            .filter(|a| matches!(a, PlannedAction::CreateDir(_)))
            .collect();
        assert_eq!(created, vec![&PlannedAction::CreateDir(ws.path("out_2"))]);
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let ws = Workspace::new(&[], "L\n");
        let good = ws.options(ReconcileMode::New);
        assert!(good.validate().is_ok());

        let mut missing_src = good.clone();
        missing_src.src = ws.path("nope");
        assert!(matches!(missing_src.validate(), Err(SplitError::Config(_))));

        let mut zero_pad = good.clone();
        zero_pad.pad_width = 0;
        assert!(zero_pad.validate().is_err());

        let mut zero_workers = good;
        zero_workers.workers = Some(0);
        assert!(zero_workers.validate().is_err());
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.output.layout = LayoutMode::Folders;
        config.output.pad_width = 3;
        config.run.mode = ReconcileMode::Resume;
        config.run.workers = 0;

        let options = SessionOptions::from_config(
            &config,
            PathBuf::from("/src"),
            PathBuf::from("/out"),
            PathBuf::from("/channels.txt"),
        );

        assert_eq!(options.layout, LayoutMode::Folders);
        assert_eq!(options.pad_width, 3);
        assert_eq!(options.mode, ReconcileMode::Resume);
        assert_eq!(options.workers, None);

        config.run.workers = 6;
        let options = SessionOptions::from_config(
            &config,
            PathBuf::from("/src"),
            PathBuf::from("/out"),
            PathBuf::from("/channels.txt"),
        );
        assert_eq!(options.workers, Some(6));
    }
}

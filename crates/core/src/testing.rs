//! Test doubles for the external collaborators.

use crate::engine::{EngineError, MediaEngine};
use crate::planner::JobPlan;
use crate::probe::{MediaInfo, MediaProbe, ProbeError};
use crate::reconcile::{Confirmation, Confirmer};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Probe returning a fixed channel count, overridable per file name.
/// An override of `None` makes probing that file fail.
pub struct FakeProbe {
    default_channels: usize,
    overrides: HashMap<String, Option<usize>>,
}

impl FakeProbe {
    pub fn with_channels(channels: usize) -> Self {
        Self {
            default_channels: channels,
            overrides: HashMap::new(),
        }
    }

    pub fn set(mut self, name: &str, channels: Option<usize>) -> Self {
        self.overrides.insert(name.to_string(), channels);
        self
    }
}

impl MediaProbe for FakeProbe {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let channels = match self.overrides.get(&file_name(path)) {
            Some(Some(channels)) => *channels,
            Some(None) => return Err(ProbeError::NoAudio),
            None => self.default_channels,
        };
        Ok(MediaInfo {
            channel_count: channels,
            sample_format: Some("s32".to_string()),
            bits_per_sample: Some(24),
        })
    }
}

/// Engine that writes a small file per planned output and records every call.
#[derive(Default)]
pub struct RecordingEngine {
    delay: Duration,
    failing: HashSet<String>,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<JobPlan>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each call for `delay` so calls overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call for the source file named `name`.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<JobPlan> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_inputs(&self) -> HashSet<PathBuf> {
        self.calls().into_iter().map(|plan| plan.input).collect()
    }

    /// Highest number of calls that were running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl MediaEngine for RecordingEngine {
    fn execute(&self, plan: &JobPlan) -> Result<(), EngineError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(plan.clone());

        std::thread::sleep(self.delay);

        let result = if self.failing.contains(&file_name(&plan.input)) {
            Err(EngineError::Failed(1))
        } else {
            plan.outputs
                .iter()
                .try_for_each(|output| fs::write(&output.path, b"RIFF"))
                .map_err(EngineError::from)
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Confirmer with a fixed answer that counts how often it was asked.
pub struct StubConfirmer {
    answer: Confirmation,
    asked: AtomicUsize,
}

impl StubConfirmer {
    pub fn new(answer: Confirmation) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl Confirmer for StubConfirmer {
    fn confirm(&self, _prompt: &str, _expected: &str) -> Confirmation {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}

/// Creates `name` under `dir` with placeholder content, returning its path.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, b"RIFF").unwrap();
    path
}

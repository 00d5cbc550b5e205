//! Per-file job planning.
//!
//! Turns one input file into the list of mono outputs that still have to be
//! produced for it, after probing the file and checking it against the label set.

use crate::codec::{select_encoding, EncodingSpec};
use crate::config::{LayoutMode, ReconcileMode};
use crate::naming::{destination_path, output_dir_for};
use crate::probe::{MediaProbe, ProbeError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for planning a single file.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The file's media facts could not be determined.
    #[error("could not probe {}: {source}", .file.display())]
    Probe {
        file: PathBuf,
        #[source]
        source: ProbeError,
    },

    /// The label set does not match the file's channel count.
    #[error(
        "channel count mismatch for {}: {labels} labels but {channels} channels",
        .file.display()
    )]
    ChannelCountMismatch {
        file: PathBuf,
        labels: usize,
        channels: usize,
    },

    /// The file name has no usable stem to name outputs after.
    #[error("cannot derive an output name from {}", .0.display())]
    InvalidInputName(PathBuf),
}

impl PlanError {
    /// Whether this error must stop the whole run rather than just this file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlanError::ChannelCountMismatch { .. })
    }
}

/// One mono output still to be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    /// 0-based source channel index.
    pub channel: usize,
    /// Destination file.
    pub path: PathBuf,
}

/// Everything needed to materialize the missing outputs of one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPlan {
    /// Source file.
    pub input: PathBuf,
    /// Directory the outputs are written into.
    pub output_dir: PathBuf,
    /// Encoding of every output.
    pub encoding: EncodingSpec,
    /// Channel count of the source.
    pub total_channels: usize,
    /// Outputs still required, in channel order.
    pub outputs: Vec<PlannedOutput>,
    /// Outputs skipped because a previous run already produced them.
    pub already_done: usize,
}

impl JobPlan {
    /// True when nothing remains to be produced for this file.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Settings shared by every file of a run.
#[derive(Debug, Clone)]
pub struct PlanSettings {
    /// Root directory receiving all outputs.
    pub out_root: PathBuf,
    /// Output layout.
    pub layout: LayoutMode,
    /// Reconcile mode of the run; only `Resume` changes planning.
    pub mode: ReconcileMode,
    /// Zero-pad width of the channel index.
    pub pad_width: usize,
}

/// A destination counts as done when it exists and is non-empty.
pub fn is_satisfied(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Computes the job plan for one input file.
pub fn plan_job(
    input: &Path,
    labels: &[String],
    settings: &PlanSettings,
    probe: &dyn MediaProbe,
) -> Result<JobPlan, PlanError> {
    let info = probe.probe(input).map_err(|source| PlanError::Probe {
        file: input.to_path_buf(),
        source,
    })?;

    if labels.len() != info.channel_count {
        return Err(PlanError::ChannelCountMismatch {
            file: input.to_path_buf(),
            labels: labels.len(),
            channels: info.channel_count,
        });
    }

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PlanError::InvalidInputName(input.to_path_buf()))?;

    let encoding = select_encoding(info.sample_format.as_deref(), info.bits_per_sample);
    let resume = settings.mode == ReconcileMode::Resume;

    let mut outputs = Vec::with_capacity(labels.len());
    let mut already_done = 0;
    for (channel, label) in labels.iter().enumerate() {
        let path = destination_path(
            settings.layout,
            &settings.out_root,
            stem,
            channel + 1,
            settings.pad_width,
            label,
        );
        if resume && is_satisfied(&path) {
            already_done += 1;
            continue;
        }
        outputs.push(PlannedOutput { channel, path });
    }

    Ok(JobPlan {
        input: input.to_path_buf(),
        output_dir: output_dir_for(settings.layout, &settings.out_root, stem),
        encoding,
        total_channels: info.channel_count,
        outputs,
        already_done,
    })
}

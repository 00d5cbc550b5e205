//! Media engine module for polysplit
//!
//! Materializes the outputs of a [`JobPlan`]. The real engine runs a single
//! ffmpeg invocation per source file that extracts every planned channel into
//! its own mono PCM file.

use crate::planner::JobPlan;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Error type for engine invocations
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine process exited with non-zero status
    #[error("ffmpeg failed with exit code: {0}")]
    Failed(i32),

    /// The engine process was terminated by signal
    #[error("ffmpeg process was terminated by signal")]
    Terminated,

    /// IO error while running the engine
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can produce every output listed in a job plan.
///
/// An implementation either produces all requested files or fails.
pub trait MediaEngine: Send + Sync {
    fn execute(&self, plan: &JobPlan) -> Result<(), EngineError>;
}

/// Build the `-filter_complex` graph extracting each planned channel.
///
/// Every planned output gets a `pan` filter selecting its source channel into
/// a mono stream labeled `[chN]`, N being the 0-based channel index.
pub fn channel_filter_graph(plan: &JobPlan) -> String {
    plan.outputs
        .iter()
        .map(|output| format!("[0:a]pan=mono|c0=c{0}[ch{0}]", output.channel))
        .collect::<Vec<_>>()
        .join(";")
}

/// [`MediaEngine`] backed by the ffmpeg executable.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    program: String,
}

impl FfmpegEngine {
    /// Create an engine that runs the given ffmpeg executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build the ffmpeg command for a job plan
    ///
    /// Creates a Command configured with:
    /// - Quiet, non-interactive operation that overwrites existing outputs
    /// - The source file as the only input
    /// - One pan filter per planned channel
    /// - One mapped output per planned channel, encoded with the plan's PCM codec
    pub fn build_command(&self, plan: &JobPlan) -> Command {
        let mut cmd = Command::new(&self.program);

        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y"]);
        cmd.arg("-i").arg(&plan.input);
        cmd.arg("-filter_complex").arg(channel_filter_graph(plan));

        for output in &plan.outputs {
            cmd.arg("-map").arg(format!("[ch{}]", output.channel));
            cmd.arg("-c:a").arg(plan.encoding.codec_name());
            cmd.arg(&output.path);
        }

        cmd
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl MediaEngine for FfmpegEngine {
    fn execute(&self, plan: &JobPlan) -> Result<(), EngineError> {
        if plan.is_empty() {
            return Ok(());
        }

        let mut cmd = self.build_command(plan);
        debug!("Running {:?}", cmd);
        let status = cmd.status()?;

        if status.success() {
            Ok(())
        } else {
            match status.code() {
                Some(code) => Err(EngineError::Failed(code)),
                None => Err(EngineError::Terminated),
            }
        }
    }
}

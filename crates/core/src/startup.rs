//! Startup checks module for polysplit
//!
//! Verifies that the external tools a run depends on can be executed before
//! any output folder is touched:
//! - ffprobe, used to read channel count and sample format
//! - ffmpeg, used to extract and encode the channels

use crate::config::ToolsConfig;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{tool} not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },
}

/// Parse a tool version string and extract the version token
///
/// Handles the FFmpeg family's formats:
/// - Standard: "ffmpeg version 7.1 ..."
/// - N-prefixed: "ffmpeg version n7.1-... ..."
/// - Git builds: "ffprobe version N-113000-g1234abcd ..."
pub fn parse_tool_version(version_output: &str, tool: &str) -> Option<String> {
    let marker = format!("{} version", tool.to_lowercase());

    let version_line = version_output
        .lines()
        .find(|line| line.to_lowercase().contains(&marker))?;

    let version = version_line
        .to_lowercase()
        .split(&marker)
        .nth(1)?
        .split_whitespace()
        .next()?
        .to_string();

    Some(version.trim_start_matches('n').to_string()).filter(|v| !v.is_empty())
}

/// Check that `program` runs and reports a version
///
/// `tool` is the name used in messages and version parsing ("ffmpeg", "ffprobe").
pub fn check_tool_available(program: &str, tool: &str) -> Result<String, StartupError> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .map_err(|e| StartupError::ToolUnavailable {
            tool: tool.to_string(),
            reason: format!("failed to run '{} -version'; is it installed and in PATH? ({})", program, e),
        })?;

    if !output.status.success() {
        return Err(StartupError::ToolUnavailable {
            tool: tool.to_string(),
            reason: format!("'{} -version' exited with {}", program, output.status),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = parse_tool_version(&stdout, tool).unwrap_or_else(|| "unknown".to_string());
    debug!("{} at {} reports version {}", tool, program, version);
    Ok(version)
}

/// Run all startup checks in order
///
/// Checks are run in the following order:
/// 1. ffprobe availability
/// 2. ffmpeg availability
pub fn run_startup_checks(tools: &ToolsConfig) -> Result<(), StartupError> {
    let ffprobe = check_tool_available(&tools.ffprobe, "ffprobe")?;
    let ffmpeg = check_tool_available(&tools.ffmpeg, "ffmpeg")?;
    info!("Using ffprobe {} and ffmpeg {}", ffprobe, ffmpeg);
    Ok(())
}

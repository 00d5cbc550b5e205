//! Media probing.
//!
//! The splitter needs three facts about each input: how many channels it has,
//! and its sample format and bit depth. [`MediaProbe`] abstracts where those
//! facts come from; [`FfprobeProbe`] asks ffprobe for them.

use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

/// Error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// ffprobe command failed to execute.
    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),

    /// Failed to parse ffprobe JSON output.
    #[error("Failed to parse ffprobe output: {0}")]
    ParseError(String),

    /// The file has no audio stream or reports zero channels.
    #[error("no audio channels found")]
    NoAudio,

    /// IO error during probe.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Facts about the first audio stream of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    /// Number of channels in the stream.
    pub channel_count: usize,
    /// Sample format name as reported by the prober (e.g. "s24", "fltp").
    pub sample_format: Option<String>,
    /// Bits per sample, when known.
    pub bits_per_sample: Option<u32>,
}

/// Source of media facts for one input file.
pub trait MediaProbe: Send + Sync {
    /// Probes `path`; the returned channel count is always non-zero.
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError>;
}

/// Raw ffprobe JSON structures for parsing.
mod ffprobe_json {
    use super::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct FfprobeOutput {
        pub streams: Option<Vec<Stream>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Stream {
        pub codec_type: Option<String>,
        pub channels: Option<u32>,
        pub sample_fmt: Option<String>,
        pub bits_per_sample: Option<u32>,
        pub bits_per_raw_sample: Option<String>,
    }
}

/// Parses ffprobe JSON output into [`MediaInfo`] for the first audio stream.
pub fn parse_ffprobe_output(json_str: &str) -> Result<MediaInfo, ProbeError> {
    let ffprobe: ffprobe_json::FfprobeOutput =
        serde_json::from_str(json_str).map_err(|e| ProbeError::ParseError(e.to_string()))?;

    let stream = ffprobe
        .streams
        .unwrap_or_default()
        .into_iter()
        .find(|s| s.codec_type.as_deref().map_or(true, |t| t == "audio"))
        .ok_or(ProbeError::NoAudio)?;

    let channel_count = stream.channels.unwrap_or(0) as usize;
    if channel_count == 0 {
        return Err(ProbeError::NoAudio);
    }

    // Some containers report 0 here and put the real depth in bits_per_raw_sample
    let bits_per_sample = stream
        .bits_per_sample
        .filter(|&bits| bits > 0)
        .or_else(|| {
            stream
                .bits_per_raw_sample
                .as_deref()
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .filter(|&bits| bits > 0)
        });

    Ok(MediaInfo {
        channel_count,
        sample_format: stream.sample_fmt.filter(|f| !f.is_empty()),
        bits_per_sample,
    })
}

/// [`MediaProbe`] backed by the ffprobe executable.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: String,
}

impl FfprobeProbe {
    /// Create a probe that runs the given ffprobe executable.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build the ffprobe command for `path`.
    pub fn build_command(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-select_streams",
            "a:0",
        ])
        .arg(path);
        cmd
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let output = self.build_command(path).output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::FfprobeFailed(format!(
                "ffprobe exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_ffprobe_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_24_bit_wav() {
        let json = r#"{
            "streams": [{
                "index": 0,
                "codec_name": "pcm_s24le",
                "codec_type": "audio",
                "sample_fmt": "s32",
                "channels": 8,
                "bits_per_sample": 24
            }]
        }"#;

        let info = parse_ffprobe_output(json).unwrap();
        assert_eq!(info.channel_count, 8);
        assert_eq!(info.sample_format.as_deref(), Some("s32"));
        assert_eq!(info.bits_per_sample, Some(24));
    }

    #[test]
    fn test_parse_raw_bits_fallback() {
        let json = r#"{
            "streams": [{
                "codec_type": "audio",
                "sample_fmt": "s32p",
                "channels": 2,
                "bits_per_sample": 0,
                "bits_per_raw_sample": "24"
            }]
        }"#;

        let info = parse_ffprobe_output(json).unwrap();
        assert_eq!(info.bits_per_sample, Some(24));
    }

    #[test]
    fn test_parse_float_stream() {
        let json = r#"{"streams": [{"codec_type": "audio", "sample_fmt": "flt", "channels": 4, "bits_per_sample": 32}]}"#;

        let info = parse_ffprobe_output(json).unwrap();
        assert_eq!(info.channel_count, 4);
        assert_eq!(info.sample_format.as_deref(), Some("flt"));
    }

    #[test]
    fn test_parse_skips_non_audio_streams() {
        let json = r#"{"streams": [
            {"codec_type": "video", "channels": 0},
            {"codec_type": "audio", "sample_fmt": "s16", "channels": 6, "bits_per_sample": 16}
        ]}"#;

        let info = parse_ffprobe_output(json).unwrap();
        assert_eq!(info.channel_count, 6);
    }

    #[test]
    fn test_parse_no_audio() {
        assert!(matches!(
            parse_ffprobe_output(r#"{"streams": []}"#),
            Err(ProbeError::NoAudio)
        ));
        assert!(matches!(
            parse_ffprobe_output(r#"{}"#),
            Err(ProbeError::NoAudio)
        ));
        assert!(matches!(
            parse_ffprobe_output(r#"{"streams": [{"codec_type": "audio", "channels": 0}]}"#),
            Err(ProbeError::NoAudio)
        ));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_ffprobe_output("not json"),
            Err(ProbeError::ParseError(_))
        ));
    }

    #[test]
    fn test_ffprobe_command_args() {
        let probe = FfprobeProbe::new("/opt/bin/ffprobe");
        let cmd = probe.build_command(Path::new("/media/take.wav"));
        let args: Vec<String> = cmd
            .get_args()
            .filter_map(|a| a.to_str().map(String::from))
            .collect();

        assert_eq!(cmd.get_program(), "/opt/bin/ffprobe");
        assert!(args.windows(2).any(|w| w[0] == "-select_streams" && w[1] == "a:0"));
        assert_eq!(args.last().map(String::as_str), Some("/media/take.wav"));
    }

    #[test]
    fn test_missing_ffprobe_is_io_error() {
        let probe = FfprobeProbe::new("/nonexistent/ffprobe-binary");
        let result = probe.probe(Path::new("/tmp/none.wav"));
        assert!(matches!(result, Err(ProbeError::Io(_))));
    }
}

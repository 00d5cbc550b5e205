//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// How output files are arranged under the output root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Every output in one directory, prefixed by the source stem
    #[default]
    Flat,
    /// One subdirectory per source file, names suffixed by the source stem
    Folders,
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutMode::Flat => write!(f, "flat"),
            LayoutMode::Folders => write!(f, "folders"),
        }
    }
}

impl FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Ok(LayoutMode::Flat),
            "folders" => Ok(LayoutMode::Folders),
            other => Err(format!("unknown layout '{}' (expected flat or folders)", other)),
        }
    }
}

/// How a pre-existing output root is treated at the start of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// Move the existing root aside to a timestamped backup
    Backup,
    /// Delete the existing root after confirmation
    Overwrite,
    /// Write into a fresh sibling root when the requested one exists
    #[default]
    New,
    /// Keep the existing root and only produce missing outputs
    Resume,
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileMode::Backup => write!(f, "backup"),
            ReconcileMode::Overwrite => write!(f, "overwrite"),
            ReconcileMode::New => write!(f, "new"),
            ReconcileMode::Resume => write!(f, "resume"),
        }
    }
}

impl FromStr for ReconcileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backup" => Ok(ReconcileMode::Backup),
            "overwrite" => Ok(ReconcileMode::Overwrite),
            "new" => Ok(ReconcileMode::New),
            "resume" => Ok(ReconcileMode::Resume),
            other => Err(format!(
                "unknown mode '{}' (expected backup, overwrite, new or resume)",
                other
            )),
        }
    }
}

/// Output naming configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Output layout (default flat)
    #[serde(default)]
    pub layout: LayoutMode,
    /// Zero-pad width of the channel index in file names (default 2)
    #[serde(default = "default_pad_width")]
    pub pad_width: usize,
}

fn default_pad_width() -> usize {
    2
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            layout: LayoutMode::default(),
            pad_width: default_pad_width(),
        }
    }
}

/// Run behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunConfig {
    /// Output root reconciliation mode (default new)
    #[serde(default)]
    pub mode: ReconcileMode,
    /// Maximum concurrent files (0 = auto-derive)
    #[serde(default)]
    pub workers: u32,
}

/// External tool locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsConfig {
    /// ffmpeg executable (default "ffmpeg" from PATH)
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    /// ffprobe executable (default "ffprobe" from PATH)
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - POLYSPLIT_LAYOUT -> output.layout
    /// - POLYSPLIT_PAD_WIDTH -> output.pad_width
    /// - POLYSPLIT_MODE -> run.mode
    /// - POLYSPLIT_WORKERS -> run.workers
    /// - POLYSPLIT_FFMPEG -> tools.ffmpeg
    /// - POLYSPLIT_FFPROBE -> tools.ffprobe
    ///
    /// Values that fail to parse are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("POLYSPLIT_LAYOUT") {
            if let Ok(layout) = val.parse::<LayoutMode>() {
                self.output.layout = layout;
            }
        }

        if let Ok(val) = env::var("POLYSPLIT_PAD_WIDTH") {
            if let Ok(width) = val.parse::<usize>() {
                self.output.pad_width = width;
            }
        }

        if let Ok(val) = env::var("POLYSPLIT_MODE") {
            if let Ok(mode) = val.parse::<ReconcileMode>() {
                self.run.mode = mode;
            }
        }

        if let Ok(val) = env::var("POLYSPLIT_WORKERS") {
            if let Ok(workers) = val.parse::<u32>() {
                self.run.workers = workers;
            }
        }

        if let Ok(val) = env::var("POLYSPLIT_FFMPEG") {
            if !val.trim().is_empty() {
                self.tools.ffmpeg = val;
            }
        }

        if let Ok(val) = env::var("POLYSPLIT_FFPROBE") {
            if !val.trim().is_empty() {
                self.tools.ffprobe = val;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an optional file
    ///
    /// Without a file the defaults are used; environment overrides apply either way.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Self::default();
                config.apply_env_overrides();
                Ok(config)
            }
        }
    }
}

//! Channel label loading.
//!
//! A label file lists one channel name per line, in channel order. Blank
//! lines and `#` comments are ignored; every other line is sanitized into a
//! label usable inside a file name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Label used when a line sanitizes to nothing.
pub const FALLBACK_LABEL: &str = "CH";

/// Errors that can occur while loading a label file.
#[derive(Debug, Error)]
pub enum LabelError {
    /// The label file does not exist.
    #[error("channel label file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The label file exists but contains no labels.
    #[error("channel label file {} contains no labels", .0.display())]
    Empty(PathBuf),

    /// IO error while reading the label file.
    #[error("failed to read channel label file: {0}")]
    Io(#[from] io::Error),
}

/// Sanitizes one raw label into its file-name-safe form.
///
/// Uppercases, maps whitespace and any character outside `A-Z 0-9 - _` to `_`,
/// collapses runs of `_` and trims them from both ends.
pub fn sanitize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars().flat_map(char::to_uppercase) {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '-' {
            ch
        } else {
            '_'
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_LABEL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parses label file contents into the ordered label list.
pub fn parse_labels(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(sanitize_label)
        .collect()
}

/// Loads the ordered channel labels from `path`.
pub fn load_labels(path: &Path) -> Result<Vec<String>, LabelError> {
    if !path.is_file() {
        return Err(LabelError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let labels = parse_labels(&content);
    if labels.is_empty() {
        return Err(LabelError::Empty(path.to_path_buf()));
    }

    Ok(labels)
}

//! Output file naming.
//!
//! Names are a pure function of layout, source stem, channel index and label,
//! so a later resume run computes exactly the same paths.

use crate::config::LayoutMode;
use std::path::{Path, PathBuf};

/// Default zero-pad width of the channel index.
pub const DEFAULT_PAD_WIDTH: usize = 2;

/// Extension of every output file.
pub const OUTPUT_EXTENSION: &str = "wav";

/// File name of one output, without any directory.
///
/// `index` is 1-based.
pub fn output_file_name(
    layout: LayoutMode,
    stem: &str,
    index: usize,
    pad_width: usize,
    label: &str,
) -> String {
    match layout {
        LayoutMode::Flat => format!(
            "{stem}_{index:0pad_width$}_{label}.{OUTPUT_EXTENSION}"
        ),
        LayoutMode::Folders => format!(
            "{index:0pad_width$}_{label}_{stem}.{OUTPUT_EXTENSION}"
        ),
    }
}

/// Directory that receives a source file's outputs.
///
/// Flat layout shares the output root; folders layout gets one subdirectory per stem.
pub fn output_dir_for(layout: LayoutMode, out_root: &Path, stem: &str) -> PathBuf {
    match layout {
        LayoutMode::Flat => out_root.to_path_buf(),
        LayoutMode::Folders => out_root.join(stem),
    }
}

/// Full destination path of one output.
pub fn destination_path(
    layout: LayoutMode,
    out_root: &Path,
    stem: &str,
    index: usize,
    pad_width: usize,
    label: &str,
) -> PathBuf {
    output_dir_for(layout, out_root, stem).join(output_file_name(
        layout, stem, index, pad_width, label,
    ))
}

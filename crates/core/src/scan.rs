//! Scanner module for discovering multi-channel audio files under a source directory.
//!
//! Discovery is lazy: files are yielded while the directory tree is walked, so
//! processing can start before the walk finishes.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Audio file extensions accepted as inputs (case-insensitive matching).
pub const AUDIO_EXTENSIONS: &[&str] = &[".wav", ".aif", ".aiff"];

/// Checks if a file has an accepted audio extension (case-insensitive).
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = format!(".{}", ext.to_lowercase());
            AUDIO_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// Lazily discovers input files under `src`.
///
/// The walk:
/// - Recurses into subdirectories in sorted order
/// - Skips hidden directories (names starting with `.`)
/// - Skips everything beneath `exclude` (the output root, when it lives inside `src`)
/// - Yields only files with an accepted audio extension
///
/// Unreadable entries are skipped. The iterator is single-pass; a second
/// discovery needs a new call.
pub fn discover_inputs(src: &Path, exclude: Option<&Path>) -> impl Iterator<Item = PathBuf> {
    let exclude = exclude.map(Path::to_path_buf);

    WalkDir::new(src)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            if let Some(excluded) = &exclude {
                if entry.path().starts_with(excluded) {
                    return false;
                }
            }
            if entry.file_type().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if name.starts_with('.') {
                        return false;
                    }
                }
            }
            true
        })
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
        .map(|entry| entry.into_path())
}

//! Directory scanning for files eligible for ingestion.

use core::result::Result as CoreResult;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// A file found by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path of the file
    pub path: PathBuf,
    /// Modification time reported by the file system
    pub modified: SystemTime,
}

/// Whether `path` has one of `extensions` (compared case-insensitively, without the dot)
pub fn has_allowed_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|extension| extension.to_string_lossy().to_lowercase())
        .is_some_and(|extension| {
            extensions
                .iter()
                .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&extension))
        })
}

/// Every eligible file under `root` with its modification time, sorted by path.
///
/// Eligibility depends on the extension alone; hidden files and build-like
/// directory names are scanned like any other. Unreadable entries and files
/// whose metadata cannot be read are skipped.
pub fn collect_files(root: &Path, extensions: &[String]) -> Vec<ScannedFile> {
    let mut files: Vec<ScannedFile> = WalkDir::new(root)
        .into_iter()
        .filter_map(CoreResult::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| has_allowed_extension(entry.path(), extensions))
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some(ScannedFile {
                path: entry.into_path(),
                modified,
            })
        })
        .collect();

    files.sort_by(|first, second| first.path.cmp(&second.path));
    files
}

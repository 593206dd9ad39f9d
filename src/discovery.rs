//! Building the list of videos to inspect.
//!
//! Videos come either from a directory scan filtered by file extension or from
//! an explicit comma-separated list of paths/URLs.

use std::fs;
use std::path::Path;

use crate::error::PlaycheckError;

/// Extension scanned for when none is given.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// One video to inspect, identified by path or URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoTask {
    source: String,
}

impl VideoTask {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl From<&str> for VideoTask {
    fn from(source: &str) -> Self {
        VideoTask::new(source)
    }
}

impl From<String> for VideoTask {
    fn from(source: String) -> Self {
        VideoTask::new(source)
    }
}

/// List files in `folder` whose extension matches `extension`
/// (case-insensitive, leading dot optional). Not recursive.
///
/// Results are sorted by path so runs are reproducible.
///
/// # Errors
///
/// Returns [`PlaycheckError::IoError`] if the directory cannot be read.
pub fn scan_folder<P: AsRef<Path>>(
    folder: P,
    extension: &str,
) -> Result<Vec<VideoTask>, PlaycheckError> {
    let wanted = extension.trim_start_matches('.').to_ascii_lowercase();
    let mut paths = Vec::new();

    for entry in fs::read_dir(folder.as_ref())? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&wanted));
        if matches {
            paths.push(path);
        }
    }

    paths.sort();
    log::debug!(
        "found {} .{wanted} file(s) in {}",
        paths.len(),
        folder.as_ref().display()
    );

    Ok(paths
        .into_iter()
        .map(|path| VideoTask::new(path.to_string_lossy().into_owned()))
        .collect())
}

/// Split a comma-separated list of paths/URLs. Blank entries are dropped.
pub fn parse_source_list(list: &str) -> Vec<VideoTask> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(VideoTask::new)
        .collect()
}

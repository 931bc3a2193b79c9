//! Path resolution for viewer storage locations.
//!
//! This module resolves where the viewer keeps its own files (logs) and where
//! finished downloads land. Platform directories come from the `dirs` crate;
//! when a platform directory is unavailable, the system temp directory is used
//! so the viewer still works in stripped-down environments.

use std::path::{Path, PathBuf};

/// Returns the data directory for viewer storage.
///
/// Resolves to `<local data dir>/docviewer`, for example
/// `~/.local/share/docviewer` on Linux.
///
/// # Examples
///
/// ```
/// use docviewer::infrastructure::get_data_dir;
///
/// let data_dir = get_data_dir();
/// assert!(data_dir.ends_with("docviewer"));
/// ```
#[must_use]
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("docviewer")
}

/// Returns the directory downloads are copied into when no override is
/// configured.
#[must_use]
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
}

/// Expands a leading `~` to the user's home directory.
///
/// Paths without a tilde, and all paths when the home directory is unknown,
/// are returned unchanged.
///
/// # Examples
///
/// ```
/// use docviewer::infrastructure::expand_tilde;
///
/// assert_eq!(expand_tilde("/absolute/path"), std::path::PathBuf::from("/absolute/path"));
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (path, home) {
        ("~", Some(home)) => home,
        (path, Some(home)) if path.starts_with("~/") => home.join(&path[2..]),
        (path, _) => PathBuf::from(path),
    }
}

/// Returns the final path component for display, or the whole path if it has
/// none.
#[must_use]
pub fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

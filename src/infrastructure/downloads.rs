//! Hand-off of saved documents to the host's download mechanism.
//!
//! A download goes through three steps: the bytes are *staged* as a temporary
//! resource, the transfer is *triggered*, and some time later the staged
//! resource is *released*. Each staged resource is released exactly once.

use super::paths::default_download_dir;
use crate::domain::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::NamedTempFile;

/// Handle to one staged download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadId(u64);

impl DownloadId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Destination for saved documents.
pub trait DownloadTarget: Send + Sync {
    /// Stages `bytes` under `filename` and returns a handle to the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be created.
    fn stage(&self, filename: &str, bytes: &[u8]) -> Result<DownloadId>;

    /// Starts the transfer of a staged resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer cannot be started.
    fn trigger(&self, id: DownloadId) -> Result<()>;

    /// Frees a staged resource. Unknown ids are ignored.
    fn release(&self, id: DownloadId);
}

struct Staged {
    filename: String,
    file: NamedTempFile,
}

/// Downloads into a directory on the local filesystem.
///
/// Staged bytes live in a temporary file until released; triggering copies
/// them to the download directory under a name that does not overwrite an
/// existing file.
pub struct FsDownloads {
    dir: PathBuf,
    next_id: AtomicU64,
    staged: Mutex<HashMap<DownloadId, Staged>>,
}

impl std::fmt::Debug for FsDownloads {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsDownloads")
            .field("dir", &self.dir)
            .field("staged", &self.staged.lock().len())
            .finish_non_exhaustive()
    }
}

impl Default for FsDownloads {
    fn default() -> Self {
        Self::new(default_download_dir())
    }
}

impl FsDownloads {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_id: AtomicU64::new(1),
            staged: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of resources staged and not yet released.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.staged.lock().len()
    }
}

impl DownloadTarget for FsDownloads {
    fn stage(&self, filename: &str, bytes: &[u8]) -> Result<DownloadId> {
        use std::io::Write;

        let mut file = tempfile::Builder::new().prefix("docviewer-").tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        let id = DownloadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(id = id.0, filename, bytes = bytes.len(), "download staged");
        self.staged.lock().insert(
            id,
            Staged {
                filename: filename.to_string(),
                file,
            },
        );
        Ok(id)
    }

    fn trigger(&self, id: DownloadId) -> Result<()> {
        let (source, filename) = {
            let staged = self.staged.lock();
            let Some(entry) = staged.get(&id) else {
                tracing::warn!(id = id.0, "trigger for unknown download");
                return Ok(());
            };
            (entry.file.path().to_path_buf(), entry.filename.clone())
        };

        std::fs::create_dir_all(&self.dir)?;
        let destination = unique_destination(&self.dir, &filename);
        std::fs::copy(&source, &destination)?;
        tracing::info!(id = id.0, destination = %destination.display(), "download written");
        Ok(())
    }

    fn release(&self, id: DownloadId) {
        if self.staged.lock().remove(&id).is_some() {
            tracing::debug!(id = id.0, "download released");
        }
    }
}

/// Picks `dir/filename`, or `dir/stem (n).ext` when that name is taken.
fn unique_destination(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(filename);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    let ext = path.extension().and_then(|s| s.to_str());
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Download target that only records what happens to it.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingDownloads {
    next_id: AtomicU64,
    log: Mutex<DownloadLog>,
}

/// What a [`RecordingDownloads`] has seen.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadLog {
    pub staged: Vec<(DownloadId, String, Vec<u8>)>,
    pub triggered: Vec<DownloadId>,
    pub released: Vec<DownloadId>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingDownloads {
    #[must_use]
    pub fn log(&self) -> DownloadLog {
        self.log.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl DownloadTarget for RecordingDownloads {
    fn stage(&self, filename: &str, bytes: &[u8]) -> Result<DownloadId> {
        let id = DownloadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.log.lock().staged.push((id, filename.to_string(), bytes.to_vec()));
        Ok(id)
    }

    fn trigger(&self, id: DownloadId) -> Result<()> {
        self.log.lock().triggered.push(id);
        Ok(())
    }

    fn release(&self, id: DownloadId) {
        self.log.lock().released.push(id);
    }
}

//! Rotating log file with size-based rotation and backup retention.
//!
//! [`LogFile`] appends to a single file and, once the next write would push
//! it past the size limit, shifts it into numbered backups: the live file
//! becomes `<name>.1`, `<name>.1` becomes `<name>.2`, and so on, dropping the
//! oldest. This keeps disk usage bounded for long-running hosts.

use parking_lot::Mutex;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;

/// Maximum file size before rotation (10 MB).
const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Number of backup files to retain after rotation.
const MAX_BACKUP_FILES: usize = 3;

#[derive(Default)]
struct Sink {
    file: Option<File>,
    written: u64,
}

/// Thread-safe rotating log file.
///
/// The file is opened lazily on the first write, creating parent directories
/// as needed. Each write is flushed immediately.
///
/// # Example
///
/// ```rust
/// use docviewer::observability::LogFile;
///
/// let dir = tempfile::tempdir()?;
/// let log = LogFile::new(dir.path().join("viewer.log"));
/// log.write_bytes(b"viewer mounted\n")?;
/// assert_eq!(std::fs::read_to_string(log.path())?, "viewer mounted\n");
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct LogFile {
    path: PathBuf,
    max_bytes: u64,
    backups: usize,
    sink: Mutex<Sink>,
}

impl LogFile {
    /// Creates a log file at `path` with the default limits (10 MB, three
    /// backups).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_limits(path, MAX_FILE_SIZE_BYTES, MAX_BACKUP_FILES)
    }

    /// Creates a log file that rotates past `max_bytes` and keeps `backups`
    /// old files.
    #[must_use]
    pub fn with_limits(path: impl Into<PathBuf>, max_bytes: u64, backups: usize) -> Self {
        Self {
            path: path.into(),
            max_bytes,
            backups,
            sink: Mutex::new(Sink::default()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the `index`-th backup, 1 being the newest.
    #[must_use]
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    /// Appends `bytes`, rotating first if they would not fit.
    ///
    /// A single write larger than the limit still goes into a fresh file
    /// whole; records are never split across files.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from opening, rotating, or writing.
    pub fn write_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        let incoming = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        let mut sink = self.sink.lock();

        if sink.file.is_none() {
            *sink = self.open()?;
        }
        if sink.written > 0 && sink.written.saturating_add(incoming) > self.max_bytes {
            sink.file = None;
            self.rotate()?;
            *sink = self.open()?;
        }

        if let Some(file) = sink.file.as_mut() {
            file.write_all(bytes)?;
            file.flush()?;
        }
        sink.written = sink.written.saturating_add(incoming);
        Ok(())
    }

    fn open(&self) -> io::Result<Sink> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let written = file.metadata()?.len();
        Ok(Sink {
            file: Some(file),
            written,
        })
    }

    fn rotate(&self) -> io::Result<()> {
        if self.backups == 0 {
            return remove_if_exists(&self.path);
        }

        remove_if_exists(&self.backup_path(self.backups))?;
        for index in (1..self.backups).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        if self.path.exists() {
            fs::rename(&self.path, self.backup_path(1))?;
        }
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

impl std::fmt::Debug for LogFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFile")
            .field("path", &self.path)
            .field("max_bytes", &self.max_bytes)
            .field("backups", &self.backups)
            .finish_non_exhaustive()
    }
}

/// Writer handed out to the formatting layer for one event.
#[derive(Debug)]
pub struct LogFileWriter<'a> {
    file: &'a LogFile,
}

impl Write for LogFileWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogFileWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileWriter { file: self }
    }
}

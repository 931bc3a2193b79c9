//! Tracing subscriber setup.

use super::LogFile;
use crate::infrastructure::get_data_dir;
use crate::Config;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level used when neither `RUST_LOG` nor the config names one.
const DEFAULT_LEVEL: &str = "info";

/// Installs a global `tracing` subscriber for the viewer.
///
/// Filters with `RUST_LOG` if it is set and parses, otherwise with
/// `config.log_level`, otherwise at `info`. Events go to `config.log_file`
/// through a [`LogFile`] when one is configured, and to stderr otherwise. A
/// relative `log_file` is placed under the viewer's data directory.
///
/// # Initialization Behavior
///
/// Idempotent: if a global subscriber is already installed (by the host or an
/// earlier call) this does nothing.
///
/// # Example
///
/// ```rust
/// use docviewer::observability::init_tracing;
/// use docviewer::Config;
///
/// let config = Config {
///     log_level: Some("debug".to_string()),
///     ..Default::default()
/// };
///
/// init_tracing(&config);
///
/// tracing::debug!("tracing is now active");
/// ```
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.log_level.as_deref().unwrap_or(DEFAULT_LEVEL))
    });
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match &config.log_file {
        Some(path) => registry
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(LogFile::new(log_path(path))),
            )
            .try_init(),
        None => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(log_file = ?config.log_file, "tracing initialized");
    }
}

fn log_path(configured: &Path) -> PathBuf {
    if configured.is_relative() {
        get_data_dir().join(configured)
    } else {
        configured.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_log_file_lands_in_data_dir() {
        assert_eq!(log_path(Path::new("viewer.log")), get_data_dir().join("viewer.log"));
    }

    #[test]
    fn absolute_log_file_is_kept() {
        let dir = std::env::temp_dir().join("viewer.log");
        assert_eq!(log_path(&dir), dir);
    }
}

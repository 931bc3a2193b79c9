//! Infrastructure layer for filesystem and environment interactions.
//!
//! This module holds the adapters between the controller and the machine it
//! runs on: where document bytes come from, where saved documents go, and
//! which directories the viewer uses.
//!
//! - [`source`]: readable document content (files, in-memory buffers)
//! - [`downloads`]: staged download hand-off with delayed release
//! - [`paths`]: platform directory resolution

pub mod downloads;
pub mod paths;
pub mod source;

pub use downloads::{DownloadId, DownloadTarget, FsDownloads};
pub use paths::{default_download_dir, expand_tilde, get_data_dir};
pub use source::{DocumentSource, FileSource, MemorySource};

#[cfg(any(test, feature = "test-utils"))]
pub use downloads::{DownloadLog, RecordingDownloads};

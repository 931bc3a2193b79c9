//! Binary document content handed to the controller by the host.
//!
//! A source is read exactly once per open attempt. Reads are asynchronous so a
//! file-backed source never blocks the runtime; password retries reuse the
//! bytes already read instead of reading again.

use super::paths::display_name;
use crate::domain::Result;
use futures_util::future::BoxFuture;
use std::path::PathBuf;

/// MIME type assumed when the host does not provide one.
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// Readable document content with a display name.
pub trait DocumentSource: Send + Sync {
    /// Name shown to the user and reported in `documentLoaded`.
    fn name(&self) -> &str;

    fn mime_type(&self) -> &str {
        DEFAULT_MIME_TYPE
    }

    /// Reads the full content.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::Io`](crate::ViewerError::Io) if the content
    /// cannot be read.
    fn read(&self) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// Content backed by a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    mime_type: String,
}

impl FileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = display_name(&path);
        let mime_type = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xfdf") => "application/vnd.adobe.xfdf",
            _ => DEFAULT_MIME_TYPE,
        };
        Self {
            path,
            name,
            mime_type: mime_type.to_string(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl DocumentSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn read(&self) -> BoxFuture<'static, Result<Vec<u8>>> {
        let path = self.path.clone();
        Box::pin(async move {
            let bytes = tokio::fs::read(&path).await?;
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "document read");
            Ok(bytes)
        })
    }
}

/// Content already held in memory, such as a drag-and-dropped file.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    mime_type: String,
    bytes: std::sync::Arc<[u8]>,
}

impl MemorySource {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            bytes: bytes.into().into(),
        }
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

impl DocumentSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn read(&self) -> BoxFuture<'static, Result<Vec<u8>>> {
        let bytes = self.bytes.to_vec();
        Box::pin(async move { Ok(bytes) })
    }
}

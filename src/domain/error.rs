//! Error types for the viewer controller.
//!
//! This module defines the centralized error type [`ViewerError`] and a type alias
//! [`Result`] for convenient error handling throughout the crate. All errors are
//! implemented using the `thiserror` crate for automatic `Error` trait implementation.
//!
//! Unsaved-changes conflicts are deliberately absent: they are a confirmation
//! branch of the document lifecycle, not a failure.

use serde::Serialize;
use thiserror::Error;

/// The main error type for viewer controller operations.
///
/// Variants map one-to-one onto the states and events the host can observe.
/// Engine failures are never swallowed; each one ends up as exactly one of
/// these variants.
///
/// # Examples
///
/// ```
/// use docviewer::ViewerError;
///
/// let err = ViewerError::OpenFailed("not a PDF".to_string());
/// assert_eq!(err.code(), "open_failed");
/// assert_eq!(err.to_string(), "Failed to open document: not a PDF");
/// ```
#[derive(Debug, Error)]
pub enum ViewerError {
    /// A configuration option is unknown-valued, out of range, or missing its
    /// paired option.
    ///
    /// Raised synchronously while building [`Config`](crate::Config), never
    /// from the asynchronous lifecycle.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The controller was mounted without a container to render into.
    #[error("Viewer container is missing")]
    MissingContainer,

    /// The document is encrypted and the supplied password (if any) was rejected.
    ///
    /// Recoverable: the host re-prompts and retries with another password.
    #[error("Document requires a password")]
    PasswordRequired,

    /// Opening a document failed for a reason other than a missing password.
    ///
    /// Terminal for the attempt; the lifecycle returns to idle.
    #[error("Failed to open document: {0}")]
    OpenFailed(String),

    /// Serializing or handing off the current document failed.
    #[error("Failed to save document: {0}")]
    SaveFailed(String),

    /// Rendering a single page thumbnail failed.
    ///
    /// Reported per page; the thumbnail queue keeps processing other pages.
    #[error("Failed to render page {page}: {reason}")]
    RenderFailed {
        /// One-based page number.
        page: u32,
        /// Engine-provided reason.
        reason: String,
    },

    /// The engine rejected a request outside the open/save/render paths
    /// (for example the document outline).
    #[error("Engine error: {0}")]
    Engine(String),

    /// Filesystem or I/O operation failed.
    ///
    /// Wraps errors from standard library I/O operations. Automatically converts
    /// from `std::io::Error` using the `#[from]` attribute.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ViewerError {
    /// Returns a stable machine-readable code for host-side error reporting.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidOptions(_) => "invalid_options",
            Self::MissingContainer => "missing_container",
            Self::PasswordRequired => "password_required",
            Self::OpenFailed(_) => "open_failed",
            Self::SaveFailed(_) => "save_failed",
            Self::RenderFailed { .. } => "render_failed",
            Self::Engine(_) => "engine",
            Self::Io(_) => "io",
        }
    }

    /// Builds the cloneable report dispatched to host listeners.
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Cloneable snapshot of an error, as carried by UI state and host events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    /// Stable code from [`ViewerError::code`], or `"engine"` for raw engine errors.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ErrorReport {
    /// Wraps a raw error message reported by the engine's event stream.
    #[must_use]
    pub fn engine(message: impl Into<String>) -> Self {
        Self {
            code: "engine",
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for viewer operations.
///
/// This is a type alias for `std::result::Result<T, ViewerError>` that simplifies
/// function signatures throughout the codebase.
pub type Result<T> = std::result::Result<T, ViewerError>;

//! Domain layer for the viewer controller.
//!
//! This module contains the core value types and error definitions, independent
//! of the rendering engine and of the async runtime.
//!
//! # Organization
//!
//! - [`error`]: Error types and result aliases
//! - [`document`]: Document metadata, view settings, and thumbnail state

pub mod document;
pub mod error;

pub use document::{
    DocumentMetadata, FitMode, LayoutMode, OutlineNode, Rotation, Thumbnail, ThumbnailState,
    ViewState,
};
pub use error::{ErrorReport, Result, ViewerError};

//! Boundary to the external rendering engine.
//!
//! The engine decodes documents, rasterizes pages, runs searches and reports
//! view changes. The controller treats it as an opaque asynchronous service:
//! long-running calls return boxed futures, view commands are fire-and-forget,
//! and state changes come back as [`EngineEvent`]s over an unbounded channel.
//!
//! Engines are built by an [`EngineFactory`] when the viewer is mounted and
//! destroyed when it is unmounted; nothing outside the controller constructs
//! or tears one down.

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

use crate::domain::{FitMode, LayoutMode, OutlineNode, Result, Rotation};
use crate::Config;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failure reported by an engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The document is encrypted and the password was missing or wrong.
    #[error("password required")]
    PasswordRequired,
    /// Any other failure, with the engine's reason.
    #[error("{0}")]
    Failed(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Future returned by asynchronous engine calls.
pub type EngineFuture<T> = BoxFuture<'static, EngineResult<T>>;

/// Raw document bytes shared between the controller and the engine.
///
/// Kept reference-counted so a password retry can reuse the bytes that were
/// already read.
pub type DocumentBytes = Arc<[u8]>;

/// Result of rendering one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub page: u32,
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixels.
    pub image: Vec<u8>,
}

/// Events pushed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    AppLoaded,
    FirstVisiblePage(u32),
    LastVisiblePage(u32),
    Zoom(f32),
    FitMode(FitMode),
    PageLayoutMode(LayoutMode),
    Rotation(Rotation),
    BusyState(bool),
    PageChanged(u32),
    /// Page content was edited (annotations, form fields).
    DocumentModified { page: u32 },
    Error(String),
}

impl EngineEvent {
    /// Short name for log fields.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AppLoaded => "appLoaded",
            Self::FirstVisiblePage(_) => "firstVisiblePage",
            Self::LastVisiblePage(_) => "lastVisiblePage",
            Self::Zoom(_) => "zoom",
            Self::FitMode(_) => "fitMode",
            Self::PageLayoutMode(_) => "pageLayoutMode",
            Self::Rotation(_) => "rotation",
            Self::BusyState(_) => "busyState",
            Self::PageChanged(_) => "pageChanged",
            Self::DocumentModified { .. } => "documentModified",
            Self::Error(_) => "error",
        }
    }
}

/// Channel end the engine pushes its events into.
pub type EngineEventSink = mpsc::UnboundedSender<EngineEvent>;

/// Host element the engine renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container {
    pub width: u32,
    pub height: u32,
}

/// Capabilities the controller consumes from a rendering engine.
///
/// Synchronous methods must not block; they queue work inside the engine and
/// report the outcome through events.
pub trait RenderingEngine: Send + Sync {
    fn open(&self, document: DocumentBytes, password: Option<String>) -> EngineFuture<()>;

    /// Opens `document` together with an annotation/form-data overlay.
    fn open_with_companion(
        &self,
        document: DocumentBytes,
        companion: DocumentBytes,
        password: Option<String>,
    ) -> EngineFuture<()>;

    fn close(&self) -> EngineFuture<()>;

    /// Serializes the current document, optionally in the engine's alternate
    /// format (for example with annotations flattened).
    fn save(&self, alternate_format: bool) -> EngineFuture<Vec<u8>>;

    fn page_count(&self) -> u32;

    fn render_page(&self, page: u32, width: u32, height: u32) -> EngineFuture<RenderedPage>;

    fn set_zoom(&self, zoom: f32);
    fn zoom_in(&self);
    fn zoom_out(&self);

    fn set_page_number(&self, page: u32);
    fn next_page(&self);
    fn previous_page(&self);

    fn set_fit_mode(&self, mode: FitMode);
    fn set_page_layout_mode(&self, mode: LayoutMode);
    fn set_rotation(&self, rotation: Rotation);
    fn rotation(&self) -> Rotation;

    fn start_search(&self, query: &str);
    fn next_search_match(&self);
    fn previous_search_match(&self);
    fn end_search(&self);

    fn document_outline(&self) -> EngineFuture<Vec<OutlineNode>>;

    /// Starts pushing events into `sink`, replacing any previous sink.
    fn attach_events(&self, sink: EngineEventSink);

    /// Stops pushing events.
    fn detach_events(&self);

    /// Releases engine resources. Called once, on unmount.
    fn destroy(&self) {}
}

/// Builds an engine for a mounted container.
pub trait EngineFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the engine cannot be initialized for `container`.
    fn create(&self, config: &Config, container: &Container) -> Result<Arc<dyn RenderingEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(&Config, &Container) -> Result<Arc<dyn RenderingEngine>> + Send + Sync,
{
    fn create(&self, config: &Config, container: &Container) -> Result<Arc<dyn RenderingEngine>> {
        self(config, container)
    }
}

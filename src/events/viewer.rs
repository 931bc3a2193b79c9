//! Host-facing event kinds and payloads.

use super::hub::{EventHub, Listener};
use crate::domain::{DocumentMetadata, ErrorReport};

/// Event kinds a host application can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerEventKind {
    BusyState,
    AppLoaded,
    DocumentLoaded,
    Error,
}

impl ViewerEventKind {
    /// Name used by hosts that bridge events over string-keyed channels.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BusyState => "busyState",
            Self::AppLoaded => "appLoaded",
            Self::DocumentLoaded => "documentLoaded",
            Self::Error => "error",
        }
    }

    /// Parses a kind name as produced by [`name`](Self::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "busyState" => Some(Self::BusyState),
            "appLoaded" => Some(Self::AppLoaded),
            "documentLoaded" => Some(Self::DocumentLoaded),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Payload dispatched to host listeners. The variant always matches the kind
/// it was emitted under.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    BusyState(bool),
    AppLoaded,
    DocumentLoaded(DocumentMetadata),
    Error(ErrorReport),
}

impl ViewerEvent {
    #[must_use]
    pub const fn kind(&self) -> ViewerEventKind {
        match self {
            Self::BusyState(_) => ViewerEventKind::BusyState,
            Self::AppLoaded => ViewerEventKind::AppLoaded,
            Self::DocumentLoaded(_) => ViewerEventKind::DocumentLoaded,
            Self::Error(_) => ViewerEventKind::Error,
        }
    }
}

/// Hub carrying viewer events to the host.
pub type ViewerEvents = EventHub<ViewerEventKind, ViewerEvent>;

/// Listener registered through the host command surface.
pub type ViewerListener = Listener<ViewerEvent>;

/// Emits `event` under its own kind and logs listener failures.
pub(crate) fn dispatch(hub: &ViewerEvents, event: &ViewerEvent) {
    let kind = event.kind();
    for failure in hub.emit(kind, event) {
        tracing::warn!(
            event = kind.name(),
            position = failure.position,
            error = %failure.error,
            "event listener failed"
        );
    }
}

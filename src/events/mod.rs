//! Typed event dispatch between the controller and the host application.
//!
//! - [`hub`]: generic kind → ordered listeners registry
//! - [`viewer`]: the kinds and payloads hosts subscribe to

pub mod hub;
pub mod viewer;

pub use hub::{EventHub, Listener, ListenerError, ListenerFailure};
pub use viewer::{ViewerEvent, ViewerEventKind, ViewerEvents, ViewerListener};

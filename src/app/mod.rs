//! Application layer coordinating state, events, and effects.
//!
//! This module sits between the host (which issues commands and listens for
//! viewer events) and the rendering engine (which performs the work and pushes
//! engine events back).
//!
//! # Architecture
//!
//! Engine-driven changes follow a unidirectional flow:
//!
//! ```text
//! Engine Event → Handler → UiState Mutations → Effects → Timers / Queue / Listeners
//!      ↑                                                        ↓
//!      └──────────────────── Engine Commands ◄─────────────────┘
//! ```
//!
//! Host commands go through the [`ViewerController`], which serializes
//! document transitions with the [`lifecycle`] state machine.
//!
//! # Modules
//!
//! - [`actions`]: Effects emitted by the event handler
//! - [`controller`]: Command surface and task orchestration
//! - [`handler`]: Engine event processing
//! - [`lifecycle`]: Open/close/save transition state machine
//! - [`state`]: UI state store exposed to hosts
//!
//! # Example
//!
//! ```rust
//! use docviewer::app::{handle_engine_event, UiState};
//! use docviewer::engine::EngineEvent;
//!
//! let mut state = UiState::default();
//! let effects = handle_engine_event(&mut state, &EngineEvent::BusyState(true));
//! assert!(state.busy());
//! assert_eq!(effects.len(), 1);
//! ```

pub mod actions;
pub mod controller;
pub mod handler;
pub mod lifecycle;
pub mod state;

pub use actions::Effect;
pub use controller::{LifecycleOutcome, ViewerController};
pub use handler::handle_engine_event;
pub use lifecycle::{DocumentPhase, Lifecycle, OpenAttempt, OpenRequest, PendingRequest, UnsavedChoice};
pub use state::{NavigationPanel, PasswordPrompt, UiState};

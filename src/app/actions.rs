//! Side effects requested by the engine-event handler.
//!
//! [`handle_engine_event`](super::handle_engine_event) only mutates
//! [`UiState`](super::UiState); anything that touches timers, the thumbnail
//! queue or host listeners is returned as an [`Effect`] and executed by the
//! controller after the state lock is released.

use crate::events::ViewerEvent;

/// Commands produced by the handler for the controller to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// The visible page range moved; restart the viewport debounce timer.
    ScheduleScan {
        /// First visible page.
        from: u32,
        /// Last visible page.
        to: u32,
    },

    /// Re-render one page's thumbnail ahead of the rest of the queue.
    RefreshThumbnail(u32),

    /// Dispatch an event to host listeners.
    Emit(ViewerEvent),
}

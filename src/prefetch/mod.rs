//! Thumbnail prefetching for the navigation panel.
//!
//! - [`queue`]: sequential, generation-checked render queue
//! - [`debounce`]: coalesces visible-range changes into one delayed scan

pub mod debounce;
pub mod queue;

pub use debounce::{PageWindow, ScanCallback, ViewportDebouncer};
pub use queue::{Completion, ThumbnailJob, ThumbnailQueue};

//! Coalescing of rapid visible-range changes into a single thumbnail scan.
//!
//! While the user scrolls, the engine reports a new first/last visible page
//! many times per second. [`ViewportDebouncer`] keeps only the latest range and
//! fires one scan once the range has been quiet for the configured delay.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default quiet period before a scan fires.
pub const DEFAULT_SCAN_DELAY: Duration = Duration::from_millis(100);

/// Default number of pages added on each side of the visible range.
pub const DEFAULT_PREFETCH_MARGIN: u32 = 5;

/// Page range handed to the scan callback, already widened by the margin.
///
/// The upper bound is not clamped to the page count; the queue does that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub from: u32,
    pub to: u32,
}

impl PageWindow {
    /// Widens a visible range by `margin` pages on each side.
    #[must_use]
    pub fn around(from: u32, to: u32, margin: u32) -> Self {
        Self {
            from: from.saturating_sub(margin).max(1),
            to: to.saturating_add(margin),
        }
    }
}

/// Callback invoked when the debounce timer fires.
pub type ScanCallback = Arc<dyn Fn(PageWindow) + Send + Sync>;

/// Single-timer debouncer for viewport scans.
///
/// Must be used from within a tokio runtime; each [`notify`](Self::notify)
/// spawns the timer task.
pub struct ViewportDebouncer {
    delay: Duration,
    margin: u32,
    on_scan: ScanCallback,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ViewportDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportDebouncer")
            .field("delay", &self.delay)
            .field("margin", &self.margin)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

impl ViewportDebouncer {
    #[must_use]
    pub fn new(delay: Duration, margin: u32, on_scan: ScanCallback) -> Self {
        Self {
            delay,
            margin,
            on_scan,
            pending: Mutex::new(None),
        }
    }

    /// Records the latest visible range and restarts the timer.
    ///
    /// A timer that has not fired yet is aborted; only the most recent range
    /// survives.
    pub fn notify(&self, from: u32, to: u32) {
        let window = PageWindow::around(from, to, self.margin);
        let delay = self.delay;
        let on_scan = Arc::clone(&self.on_scan);

        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::trace!(from = window.from, to = window.to, "viewport scan fired");
            on_scan(window);
        }));
    }

    /// Drops the pending timer without firing it.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }

    /// Whether a timer is armed and has not fired yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ViewportDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! Sequential, de-duplicated thumbnail work queue.
//!
//! The queue itself is a synchronous state machine; the controller drives it
//! by asking for the next job, running the render, and reporting completion.
//! At most one job is in flight at a time.
//!
//! # Generations
//!
//! Every job carries the generation it was issued under. [`ThumbnailQueue::reset`]
//! bumps the generation, so a render that was already running when the
//! document changed completes as [`Completion::Stale`] and its result is
//! dropped instead of being applied to the new document.

use std::collections::VecDeque;

/// Pages requested when a range collapses to nothing after clamping.
pub const FALLBACK_WINDOW: u32 = 5;

/// A render the driver should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailJob {
    /// One-based page number.
    pub page: u32,
    /// Queue generation when the job was issued.
    pub generation: u64,
}

/// Outcome of reporting a finished render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The job belongs to the current generation; apply its result.
    Current,
    /// The queue was reset while the job ran; drop its result.
    Stale,
}

/// FIFO queue of pages waiting for a thumbnail render.
#[derive(Debug, Default)]
pub struct ThumbnailQueue {
    queue: VecDeque<u32>,
    in_flight: Option<u32>,
    generation: u64,
}

impl ThumbnailQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues the pages of `[from, to]` that still need a thumbnail.
    ///
    /// `from` is clamped to at least 1 and `to` to at most `page_count`. If the
    /// clamped range is empty, a window of [`FALLBACK_WINDOW`] pages anchored at
    /// `from` is used instead. Pages for which `is_cached` returns true, the
    /// page in flight, and pages already queued are skipped. New pages are
    /// appended in ascending order.
    ///
    /// Returns how many pages were enqueued.
    pub fn request_range<F>(&mut self, from: u32, to: u32, page_count: u32, is_cached: F) -> usize
    where
        F: Fn(u32) -> bool,
    {
        let Some((from, to)) = normalize_range(from, to, page_count) else {
            return 0;
        };

        let mut added = 0;
        for page in from..=to {
            if is_cached(page) || self.in_flight == Some(page) || self.queue.contains(&page) {
                continue;
            }
            self.queue.push_back(page);
            added += 1;
        }

        tracing::trace!(from, to, added, queued = self.queue.len(), "thumbnail range requested");
        added
    }

    /// Moves `page` to the head of the queue so it renders next.
    ///
    /// Used to refresh a single stale thumbnail. Returns false if the page is
    /// already being rendered.
    pub fn prioritize(&mut self, page: u32) -> bool {
        if self.in_flight == Some(page) {
            return false;
        }
        self.queue.retain(|&queued| queued != page);
        self.queue.push_front(page);
        true
    }

    /// Dequeues the next page if nothing is currently being rendered.
    pub fn next_job(&mut self) -> Option<ThumbnailJob> {
        if self.in_flight.is_some() {
            return None;
        }
        let page = self.queue.pop_front()?;
        self.in_flight = Some(page);
        Some(ThumbnailJob {
            page,
            generation: self.generation,
        })
    }

    /// Reports that `job` finished, successfully or not.
    pub fn complete(&mut self, job: ThumbnailJob) -> Completion {
        if job.generation != self.generation {
            return Completion::Stale;
        }
        if self.in_flight == Some(job.page) {
            self.in_flight = None;
        }
        Completion::Current
    }

    /// Drops all queued work and invalidates the in-flight render.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.in_flight = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Pages waiting to be rendered, in dispatch order.
    pub fn queued(&self) -> impl Iterator<Item = u32> + '_ {
        self.queue.iter().copied()
    }

    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub const fn in_flight(&self) -> Option<u32> {
        self.in_flight
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// True when nothing is queued or in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }
}

fn normalize_range(from: u32, to: u32, page_count: u32) -> Option<(u32, u32)> {
    if page_count == 0 {
        return None;
    }
    let from = from.clamp(1, page_count);
    let to = to.min(page_count);
    if to >= from {
        Some((from, to))
    } else {
        let to = from.saturating_add(FALLBACK_WINDOW - 1).min(page_count);
        Some((from, to))
    }
}

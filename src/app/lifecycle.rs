//! Document lifecycle state machine.
//!
//! [`Lifecycle`] decides *whether* and *when* an open, close or download may
//! run; the controller performs the actual I/O and reports back. Keeping the
//! decisions synchronous means every transition can be unit tested without a
//! runtime or an engine.
//!
//! # Phases
//!
//! ```text
//!            open                 ok
//!   Idle ──────────▶ Opening ──────────────▶ Open ◀─────────┐
//!    ▲                 │ │ password            │ unsaved     │ cancel / save failed
//!    │     failed      │ ▼                     ▼             │
//!    └─────────────────┘ PasswordRequired   AwaitingConfirmation
//!    ▲                        │ close              │ save
//!    │           ok           ▼                    ▼
//!    └──────── Closing ◀── close ── Open    Saving ──▶ pending request
//! ```
//!
//! Closing from `PasswordRequired` abandons the pending password attempt and
//! runs a full close, so the prompt and any partial state are torn down.
//!
//! # Tickets
//!
//! Starting a transition issues a [`Ticket`]. Continuations check their ticket
//! with [`Lifecycle::is_current`] after every suspension point; a transition
//! that was superseded (by an unmount, for example) must not apply its result.
//!
//! # Held requests
//!
//! Only one transition runs at a time. A request arriving while another is in
//! progress or awaiting confirmation is held in a single slot, replacing any
//! request already held, and handed back by [`Lifecycle::take_held`] once the
//! running transition settles.

use crate::engine::DocumentBytes;
use crate::infrastructure::DocumentSource;
use std::sync::Arc;

/// Where the current document is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentPhase {
    #[default]
    Idle,
    Opening,
    PasswordRequired,
    Open,
    AwaitingConfirmation,
    Closing,
    Saving,
}

impl DocumentPhase {
    /// A transition is running; new requests must wait.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Opening | Self::Closing | Self::Saving)
    }
}

/// Request to open a document.
#[derive(Clone)]
pub struct OpenRequest {
    pub source: Arc<dyn DocumentSource>,
    /// Annotation/form-data overlay opened together with the document.
    pub companion: Option<Arc<dyn DocumentSource>>,
    pub password: Option<String>,
}

impl std::fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRequest")
            .field("source", &self.source.name())
            .field("companion", &self.companion.as_ref().map(|c| c.name().to_string()))
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A lifecycle change requested by the host.
#[derive(Debug, Clone)]
pub enum PendingRequest {
    Open(OpenRequest),
    Close,
}

/// Content already read for an open attempt, kept for password retries.
#[derive(Clone)]
pub struct OpenAttempt {
    pub name: String,
    pub mime_type: String,
    pub document: DocumentBytes,
    pub companion: Option<DocumentBytes>,
    pub password: Option<String>,
}

impl std::fmt::Debug for OpenAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAttempt")
            .field("name", &self.name)
            .field("bytes", &self.document.len())
            .field("companion", &self.companion.as_ref().map(|c| c.len()))
            .finish_non_exhaustive()
    }
}

/// Identifies one started transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Answer to the unsaved-changes prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsavedChoice {
    /// Download the current document, then continue.
    Save,
    /// Continue without saving.
    Discard,
    /// Drop the request and keep the current document.
    Cancel,
}

/// What [`Lifecycle::admit`] decided.
#[derive(Debug)]
pub enum Admission {
    /// Run the request now.
    Proceed(PendingRequest, Ticket),
    /// Ask the user about unsaved changes first.
    Confirm,
    /// Another transition is in progress; the request waits.
    Held,
    /// Nothing to do, such as closing when no document is open.
    Ignored,
}

/// What [`Lifecycle::resolve`] decided.
#[derive(Debug)]
pub enum Resolution {
    Proceed(PendingRequest, Ticket),
    /// Download first, then report with [`Lifecycle::finish_save`].
    SaveFirst(Ticket),
    Cancelled,
    /// No confirmation was pending.
    Ignored,
}

/// Lifecycle bookkeeping for one mounted viewer.
#[derive(Debug, Default)]
pub struct Lifecycle {
    phase: DocumentPhase,
    seq: u64,
    awaiting: Option<PendingRequest>,
    after_save: Option<PendingRequest>,
    held: Option<PendingRequest>,
    retry: Option<OpenAttempt>,
    skip_unsaved_prompt: bool,
}

impl Lifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn phase(&self) -> DocumentPhase {
        self.phase
    }

    /// Whether "don't ask again" was chosen for this session.
    #[must_use]
    pub const fn skips_unsaved_prompt(&self) -> bool {
        self.skip_unsaved_prompt
    }

    #[must_use]
    pub const fn is_current(&self, ticket: Ticket) -> bool {
        self.seq == ticket.0
    }

    /// Decides what to do with a new request.
    pub fn admit(&mut self, request: PendingRequest, has_unsaved_changes: bool) -> Admission {
        if self.phase.is_busy() || self.phase == DocumentPhase::AwaitingConfirmation {
            tracing::debug!(phase = ?self.phase, "request held");
            self.held = Some(request);
            return Admission::Held;
        }

        if matches!(request, PendingRequest::Close) && self.phase != DocumentPhase::Open {
            if self.phase != DocumentPhase::PasswordRequired {
                return Admission::Ignored;
            }
            tracing::debug!("closing abandons password prompt");
            let ticket = self.begin(&request);
            return Admission::Proceed(request, ticket);
        }

        if self.phase == DocumentPhase::Open && has_unsaved_changes && !self.skip_unsaved_prompt {
            self.awaiting = Some(request);
            self.phase = DocumentPhase::AwaitingConfirmation;
            return Admission::Confirm;
        }

        let ticket = self.begin(&request);
        Admission::Proceed(request, ticket)
    }

    /// Applies the user's answer to the unsaved-changes prompt.
    ///
    /// `remember` suppresses the prompt for the rest of the session unless the
    /// choice is [`UnsavedChoice::Cancel`].
    pub fn resolve(&mut self, choice: UnsavedChoice, remember: bool) -> Resolution {
        if self.phase != DocumentPhase::AwaitingConfirmation {
            return Resolution::Ignored;
        }
        let Some(request) = self.awaiting.take() else {
            self.phase = DocumentPhase::Open;
            return Resolution::Ignored;
        };

        if remember && choice != UnsavedChoice::Cancel {
            self.skip_unsaved_prompt = true;
        }

        match choice {
            UnsavedChoice::Cancel => {
                self.phase = DocumentPhase::Open;
                Resolution::Cancelled
            }
            UnsavedChoice::Discard => {
                let ticket = self.begin(&request);
                Resolution::Proceed(request, ticket)
            }
            UnsavedChoice::Save => {
                self.after_save = Some(request);
                self.phase = DocumentPhase::Saving;
                Resolution::SaveFirst(self.next_ticket())
            }
        }
    }

    /// Starts a plain download. Only possible while a document is open and
    /// nothing else is running.
    pub fn begin_download(&mut self) -> Option<Ticket> {
        if self.phase != DocumentPhase::Open {
            return None;
        }
        self.phase = DocumentPhase::Saving;
        Some(self.next_ticket())
    }

    /// Reports the end of a save. After a confirmed save that succeeded, the
    /// request that was waiting on it is started and returned; after a failed
    /// one it is dropped.
    pub fn finish_save(&mut self, ticket: Ticket, saved: bool) -> Option<(PendingRequest, Ticket)> {
        if !self.is_current(ticket) {
            return None;
        }
        self.phase = DocumentPhase::Open;
        let request = self.after_save.take()?;
        if !saved {
            tracing::debug!("save failed, dropping pending request");
            return None;
        }
        let ticket = self.begin(&request);
        Some((request, ticket))
    }

    /// Reports the end of a plain download. Never starts a pending request.
    pub fn finish_download(&mut self, ticket: Ticket) -> bool {
        self.settle(ticket, DocumentPhase::Open)
    }

    /// The open for `ticket` succeeded.
    pub fn opened(&mut self, ticket: Ticket) -> bool {
        self.settle(ticket, DocumentPhase::Open)
    }

    /// The open for `ticket` needs a password. `attempt` is kept for
    /// [`submit_password`](Self::submit_password).
    pub fn password_required(&mut self, ticket: Ticket, attempt: OpenAttempt) -> bool {
        if !self.settle(ticket, DocumentPhase::PasswordRequired) {
            return false;
        }
        self.retry = Some(attempt);
        true
    }

    /// The open for `ticket` failed for good.
    pub fn open_failed(&mut self, ticket: Ticket) -> bool {
        self.settle(ticket, DocumentPhase::Idle)
    }

    /// The close for `ticket` finished.
    pub fn closed(&mut self, ticket: Ticket) -> bool {
        self.settle(ticket, DocumentPhase::Idle)
    }

    /// Restarts the password-protected open with `password`.
    pub fn submit_password(&mut self, password: String) -> Option<(OpenAttempt, Ticket)> {
        if self.phase != DocumentPhase::PasswordRequired {
            return None;
        }
        let mut attempt = self.retry.take()?;
        attempt.password = Some(password);
        self.phase = DocumentPhase::Opening;
        Some((attempt, self.next_ticket()))
    }

    /// Hands back the held request once nothing is running.
    pub fn take_held(&mut self) -> Option<PendingRequest> {
        if self.phase.is_busy() || self.phase == DocumentPhase::AwaitingConfirmation {
            return None;
        }
        self.held.take()
    }

    /// Forgets everything, including the session's "don't ask again" choice.
    /// Outstanding tickets become stale.
    pub fn reset(&mut self) {
        let seq = self.seq.wrapping_add(1);
        *self = Self::default();
        self.seq = seq;
    }

    fn begin(&mut self, request: &PendingRequest) -> Ticket {
        self.retry = None;
        self.phase = match request {
            PendingRequest::Open(_) => DocumentPhase::Opening,
            PendingRequest::Close => DocumentPhase::Closing,
        };
        self.next_ticket()
    }

    fn next_ticket(&mut self) -> Ticket {
        self.seq = self.seq.wrapping_add(1);
        Ticket(self.seq)
    }

    fn settle(&mut self, ticket: Ticket, phase: DocumentPhase) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.phase = phase;
        true
    }
}

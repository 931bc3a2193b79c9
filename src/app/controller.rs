//! Viewer controller: the composition root of the crate.
//!
//! [`ViewerController`] owns the engine handle, the lifecycle state machine,
//! the thumbnail queue, the viewport debouncer, the breakpoint resolver, the
//! UI state store and the host listener registry. Hosts drive it through the
//! command surface; the engine drives it through its event channel.
//!
//! # Tasks
//!
//! Three kinds of background task exist while mounted:
//!
//! - the **event pump**, draining the engine's event channel into
//!   [`handle_engine_event`] and executing the resulting [`Effect`]s
//! - at most one **thumbnail render**, started by the thumbnail pump whenever
//!   the queue has work and nothing is in flight
//! - **timers**: the viewport debounce timer and one release timer per
//!   download
//!
//! All of them hold only a weak reference to the controller.
//!
//! # Locking
//!
//! `inner` is always locked before `state`, and neither lock is held across
//! an `.await`.

use super::handler::handle_engine_event;
use super::lifecycle::{
    Admission, DocumentPhase, Lifecycle, OpenAttempt, OpenRequest, PendingRequest, Resolution,
    Ticket, UnsavedChoice,
};
use super::state::{NavigationPanel, PasswordPrompt, UiState};
use super::Effect;
use crate::domain::{
    DocumentMetadata, FitMode, LayoutMode, Result, Rotation, Thumbnail, ThumbnailState, ViewerError,
};
use crate::engine::{
    Container, EngineError, EngineEvent, EngineFactory, EngineResult, RenderedPage, RenderingEngine,
};
use crate::events::viewer::dispatch;
use crate::events::{ViewerEvent, ViewerEventKind, ViewerEvents, ViewerListener};
use crate::infrastructure::{DocumentSource, DownloadId, DownloadTarget, FsDownloads};
use crate::layout::BreakpointResolver;
use crate::prefetch::{Completion, PageWindow, ScanCallback, ThumbnailJob, ThumbnailQueue, ViewportDebouncer};
use crate::Config;
use futures_util::future::{try_join, BoxFuture};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// How a lifecycle command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    Opened,
    Closed,
    /// The document is encrypted; the password prompt is showing.
    PasswordRequired,
    /// The unsaved-changes prompt is showing.
    AwaitingConfirmation,
    /// Another transition was running; the request will run after it.
    Held,
    /// The user cancelled the unsaved-changes prompt.
    Cancelled,
    /// The viewer was unmounted or the request replaced while it ran.
    Superseded,
    /// Nothing to do.
    Unchanged,
    /// No engine is mounted.
    NotMounted,
}

enum EngineSlot {
    Unmounted,
    Mounted {
        engine: Arc<dyn RenderingEngine>,
        pump: JoinHandle<()>,
    },
}

impl EngineSlot {
    fn engine(&self) -> Option<Arc<dyn RenderingEngine>> {
        match self {
            Self::Unmounted => None,
            Self::Mounted { engine, .. } => Some(Arc::clone(engine)),
        }
    }

    const fn is_mounted(&self) -> bool {
        matches!(self, Self::Mounted { .. })
    }
}

struct Inner {
    engine: EngineSlot,
    lifecycle: Lifecycle,
    queue: ThumbnailQueue,
    breakpoints: BreakpointResolver,
    /// The engine holds a loaded document that must be closed before the
    /// viewer can report that it has none.
    engine_document: bool,
}

struct Shared {
    config: Config,
    factory: Box<dyn EngineFactory>,
    downloads: Arc<dyn DownloadTarget>,
    events: ViewerEvents,
    debouncer: ViewportDebouncer,
    inner: Mutex<Inner>,
    state: Mutex<UiState>,
}

/// Cloneable handle to one viewer instance.
#[derive(Clone)]
pub struct ViewerController {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ViewerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("ViewerController")
            .field("mounted", &inner.engine.is_mounted())
            .field("phase", &inner.lifecycle.phase())
            .finish_non_exhaustive()
    }
}

impl ViewerController {
    /// Creates an unmounted controller.
    #[must_use]
    pub fn new(config: Config, factory: Box<dyn EngineFactory>, downloads: Arc<dyn DownloadTarget>) -> Self {
        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let weak = weak.clone();
            let on_scan: ScanCallback = Arc::new(move |window: PageWindow| {
                if let Some(shared) = weak.upgrade() {
                    shared.request_range(window.from, window.to);
                }
            });

            Shared {
                debouncer: ViewportDebouncer::new(config.scan_delay, config.prefetch_margin, on_scan),
                inner: Mutex::new(Inner {
                    engine: EngineSlot::Unmounted,
                    lifecycle: Lifecycle::new(),
                    queue: ThumbnailQueue::new(),
                    breakpoints: BreakpointResolver::new(config.breakpoints.clone()),
                    engine_document: false,
                }),
                state: Mutex::new(UiState::new(config.theme)),
                events: ViewerEvents::new(),
                factory,
                downloads,
                config,
            }
        });
        Self { shared }
    }

    /// Creates an unmounted controller that downloads into the configured
    /// directory.
    #[must_use]
    pub fn with_fs_downloads(config: Config, factory: Box<dyn EngineFactory>) -> Self {
        let downloads = Arc::new(FsDownloads::new(config.download_dir()));
        Self::new(config, factory, downloads)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    // ---- mount ----------------------------------------------------------

    /// Builds the engine for `container` and starts listening to it.
    ///
    /// Mounting an already mounted controller does nothing. Must be called
    /// from within a Tokio runtime, since the event pump is spawned here.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::MissingContainer`] without a container, or the
    /// factory's error if the engine cannot be built.
    pub fn mount(&self, container: Option<Container>) -> Result<()> {
        let container = container.ok_or(ViewerError::MissingContainer)?;
        self.shared.mount(container)
    }

    /// Tears the engine down and returns to the unmounted state.
    ///
    /// Host listeners stay registered.
    pub fn unmount(&self) {
        self.shared.unmount();
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.shared.inner.lock().engine.is_mounted()
    }

    /// Applies the layout breakpoint for a new container size.
    pub fn resize(&self, width: u32, height: u32) {
        tracing::trace!(width, height, "resize");
        self.shared.apply_breakpoint(width);
    }

    // ---- lifecycle ------------------------------------------------------

    /// Opens `source`, asking about unsaved changes first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::OpenFailed`] if the content cannot be read or
    /// the engine rejects it. The failure is also recorded in the UI state
    /// and emitted as an `error` event.
    pub async fn open_file(
        &self,
        source: Arc<dyn DocumentSource>,
        password: Option<String>,
    ) -> Result<LifecycleOutcome> {
        let span = tracing::debug_span!("open_file", name = source.name());
        let request = PendingRequest::Open(OpenRequest {
            source,
            companion: None,
            password,
        });
        Arc::clone(&self.shared).submit(request).instrument(span).await
    }

    /// Opens `primary` together with an annotation/form-data `companion`.
    ///
    /// Both are read before the engine is called; if either read fails the
    /// engine is never invoked.
    ///
    /// # Errors
    ///
    /// As [`open_file`](Self::open_file).
    pub async fn open_with_companion(
        &self,
        primary: Arc<dyn DocumentSource>,
        companion: Arc<dyn DocumentSource>,
        password: Option<String>,
    ) -> Result<LifecycleOutcome> {
        let span = tracing::debug_span!(
            "open_with_companion",
            name = primary.name(),
            companion = companion.name()
        );
        let request = PendingRequest::Open(OpenRequest {
            source: primary,
            companion: Some(companion),
            password,
        });
        Arc::clone(&self.shared).submit(request).instrument(span).await
    }

    /// Closes the current document, asking about unsaved changes first if
    /// needed.
    ///
    /// # Errors
    ///
    /// Only if a held request fails; closing itself always succeeds.
    pub async fn close(&self) -> Result<LifecycleOutcome> {
        Arc::clone(&self.shared)
            .submit(PendingRequest::Close)
            .instrument(tracing::debug_span!("close"))
            .await
    }

    /// Answers the unsaved-changes prompt.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::SaveFailed`] if `Save` was chosen and the
    /// download failed (the pending request is dropped), or the error of the
    /// request that ran afterwards.
    pub async fn resolve_unsaved_changes(
        &self,
        choice: UnsavedChoice,
        remember: bool,
    ) -> Result<LifecycleOutcome> {
        self.shared
            .resolve_unsaved_changes(choice, remember)
            .instrument(tracing::debug_span!("resolve_unsaved_changes", ?choice, remember))
            .await
    }

    /// Retries the password-protected open with `password`.
    ///
    /// # Errors
    ///
    /// As [`open_file`](Self::open_file).
    pub async fn submit_password(&self, password: impl Into<String>) -> Result<LifecycleOutcome> {
        self.shared
            .submit_password(password.into())
            .instrument(tracing::debug_span!("submit_password"))
            .await
    }

    /// Dismisses the password prompt, abandons the open and closes whatever
    /// the engine loaded for it. Does nothing unless a password is pending.
    ///
    /// # Errors
    ///
    /// As [`close`](Self::close).
    pub async fn cancel_password_prompt(&self) -> Result<LifecycleOutcome> {
        if self.phase() != DocumentPhase::PasswordRequired {
            return Ok(LifecycleOutcome::Unchanged);
        }
        Arc::clone(&self.shared)
            .submit(PendingRequest::Close)
            .instrument(tracing::debug_span!("cancel_password_prompt"))
            .await
    }

    /// Saves the current document and hands it to the download target.
    ///
    /// Returns `None` when no document is open or another transition is
    /// running.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::SaveFailed`], also emitted as an `error` event.
    pub async fn download_file(&self) -> Result<Option<DownloadId>> {
        self.shared
            .download_file()
            .instrument(tracing::debug_span!("download_file"))
            .await
    }

    /// Returns the serialized document, or `None` without an engine or
    /// document.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::SaveFailed`], also emitted as an `error` event.
    pub async fn save_file(&self, alternate_format: bool) -> Result<Option<Vec<u8>>> {
        self.shared
            .save_file(alternate_format)
            .instrument(tracing::debug_span!("save_file", alternate_format))
            .await
    }

    // ---- view commands --------------------------------------------------

    pub fn set_zoom(&self, zoom: f32) -> bool {
        self.shared.with_engine("set_zoom", |engine| engine.set_zoom(zoom))
    }

    pub fn zoom_in(&self) -> bool {
        self.shared.with_engine("zoom_in", |engine| engine.zoom_in())
    }

    pub fn zoom_out(&self) -> bool {
        self.shared.with_engine("zoom_out", |engine| engine.zoom_out())
    }

    pub fn set_page_number(&self, page: u32) -> bool {
        self.shared.with_engine("set_page_number", |engine| engine.set_page_number(page))
    }

    pub fn next_page(&self) -> bool {
        self.shared.with_engine("next_page", |engine| engine.next_page())
    }

    pub fn previous_page(&self) -> bool {
        self.shared.with_engine("previous_page", |engine| engine.previous_page())
    }

    pub fn set_fit_mode(&self, mode: FitMode) -> bool {
        self.shared.with_engine("set_fit_mode", |engine| engine.set_fit_mode(mode))
    }

    pub fn set_page_layout_mode(&self, mode: LayoutMode) -> bool {
        self.shared
            .with_engine("set_page_layout_mode", |engine| engine.set_page_layout_mode(mode))
    }

    pub fn set_rotation(&self, rotation: Rotation) -> bool {
        self.shared.with_engine("set_rotation", |engine| engine.set_rotation(rotation))
    }

    /// Turns the pages a quarter turn clockwise from the engine's current
    /// rotation.
    pub fn rotate_clockwise(&self) -> bool {
        self.shared.with_engine("rotate_clockwise", |engine| {
            engine.set_rotation(engine.rotation().clockwise());
        })
    }

    pub fn rotate_counter_clockwise(&self) -> bool {
        self.shared.with_engine("rotate_counter_clockwise", |engine| {
            engine.set_rotation(engine.rotation().counter_clockwise());
        })
    }

    // ---- search ---------------------------------------------------------

    pub fn start_search(&self, query: &str) -> bool {
        let started = self.shared.with_engine("start_search", |engine| engine.start_search(query));
        if started {
            self.shared.state.lock().set_search(Some(query.to_string()));
        }
        started
    }

    pub fn next_search_match(&self) -> bool {
        self.shared.with_engine("next_search_match", |engine| engine.next_search_match())
    }

    pub fn previous_search_match(&self) -> bool {
        self.shared
            .with_engine("previous_search_match", |engine| engine.previous_search_match())
    }

    pub fn end_search(&self) -> bool {
        let ended = self.shared.with_engine("end_search", |engine| engine.end_search());
        if ended {
            self.shared.state.lock().set_search(None);
        }
        ended
    }

    // ---- navigation panel -----------------------------------------------

    /// Loads the document outline into the UI state.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::Engine`] if the engine cannot produce it.
    pub async fn load_outline(&self) -> Result<()> {
        self.shared
            .load_outline()
            .instrument(tracing::debug_span!("load_outline"))
            .await
    }

    /// Switches the navigation panel. Showing thumbnails requests the visible
    /// window at once; showing the outline loads it if it is not loaded yet.
    ///
    /// # Errors
    ///
    /// As [`load_outline`](Self::load_outline).
    pub async fn set_navigation_panel(&self, panel: NavigationPanel) -> Result<()> {
        self.shared.set_navigation_panel(panel).await
    }

    /// Queues thumbnails for pages `from..=to`.
    pub fn request_thumbnails(&self, from: u32, to: u32) {
        self.shared.request_range(from, to);
    }

    // ---- events & state -------------------------------------------------

    pub fn add_event_listener(&self, kind: ViewerEventKind, listener: ViewerListener) {
        self.shared.events.on(kind, listener);
    }

    pub fn remove_event_listener(&self, kind: ViewerEventKind, listener: &ViewerListener) {
        self.shared.events.off(kind, listener);
    }

    /// Snapshot of the UI state.
    #[must_use]
    pub fn ui_state(&self) -> UiState {
        self.shared.state.lock().clone()
    }

    #[must_use]
    pub fn phase(&self) -> DocumentPhase {
        self.shared.inner.lock().lifecycle.phase()
    }

    /// Page count of the open document, 0 without one.
    #[must_use]
    pub fn page_count(&self) -> u32 {
        self.shared.state.lock().document().map_or(0, |doc| doc.page_count)
    }
}

impl Shared {
    fn engine(&self) -> Option<Arc<dyn RenderingEngine>> {
        self.inner.lock().engine.engine()
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.inner.lock().lifecycle.is_current(ticket)
    }

    fn with_engine(&self, command: &'static str, forward: impl FnOnce(&dyn RenderingEngine)) -> bool {
        let Some(engine) = self.engine() else {
            tracing::trace!(command, "ignored, no engine");
            return false;
        };
        tracing::trace!(command, "forwarding to engine");
        forward(engine.as_ref());
        true
    }

    fn mount(self: &Arc<Self>, container: Container) -> Result<()> {
        let _span =
            tracing::debug_span!("mount", width = container.width, height = container.height).entered();

        if self.inner.lock().engine.is_mounted() {
            tracing::debug!("already mounted");
            return Ok(());
        }

        let engine = self.factory.create(&self.config, &container)?;
        let (sink, mut events) = mpsc::unbounded_channel::<EngineEvent>();
        engine.attach_events(sink);
        engine.set_fit_mode(self.config.fit_mode);
        engine.set_page_layout_mode(self.config.layout_mode);
        engine.set_rotation(self.config.rotation);

        let weak = Arc::downgrade(self);
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                shared.on_engine_event(&event);
            }
            tracing::trace!("engine event pump stopped");
        });

        self.inner.lock().engine = EngineSlot::Mounted { engine, pump };
        {
            let mut state = self.state.lock();
            state.set_theme(self.config.theme);
            self.apply_configured_view(&mut state);
        }
        self.apply_breakpoint(container.width);
        tracing::info!("viewer mounted");
        Ok(())
    }

    fn unmount(&self) {
        let _span = tracing::debug_span!("unmount").entered();

        self.debouncer.cancel();
        let slot = {
            let mut inner = self.inner.lock();
            inner.queue.reset();
            std::mem::replace(&mut inner.engine, EngineSlot::Unmounted)
        };
        if let EngineSlot::Mounted { engine, pump } = slot {
            engine.detach_events();
            pump.abort();
            engine.destroy();
            tracing::info!("viewer unmounted");
        }
        {
            let mut inner = self.inner.lock();
            inner.lifecycle.reset();
            inner.breakpoints.forget();
            inner.engine_document = false;
        }
        self.state.lock().reset();
    }

    fn apply_breakpoint(&self, width: u32) {
        let mut inner = self.inner.lock();
        if let Some(name) = inner.breakpoints.apply(width) {
            self.state.lock().set_breakpoint(name);
        }
    }

    fn apply_configured_view(&self, state: &mut UiState) {
        let config = &self.config;
        state.update_view(|view| {
            view.fit_mode = config.fit_mode;
            view.layout_mode = config.layout_mode;
            view.rotation = config.rotation;
        });
    }

    // ---- engine events --------------------------------------------------

    fn on_engine_event(self: &Arc<Self>, event: &EngineEvent) {
        let effects = {
            let mut state = self.state.lock();
            handle_engine_event(&mut state, event)
        };
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(self: &Arc<Self>, effect: Effect) {
        match effect {
            Effect::ScheduleScan { from, to } => self.debouncer.notify(from, to),
            Effect::RefreshThumbnail(page) => {
                {
                    let mut inner = self.inner.lock();
                    if !inner.engine.is_mounted() {
                        return;
                    }
                    inner.queue.prioritize(page);
                }
                self.pump_thumbnails();
            }
            Effect::Emit(event) => dispatch(&self.events, &event),
        }
    }

    // ---- thumbnails -----------------------------------------------------

    fn request_range(self: &Arc<Self>, from: u32, to: u32) {
        {
            let mut inner = self.inner.lock();
            if !inner.engine.is_mounted() {
                return;
            }
            let state = self.state.lock();
            let page_count = state.document().map_or(0, |doc| doc.page_count);
            inner
                .queue
                .request_range(from, to, page_count, |page| state.is_thumbnail_cached(page));
        }
        self.pump_thumbnails();
    }

    /// Starts the next render if nothing is in flight.
    fn pump_thumbnails(self: &Arc<Self>) {
        let (engine, job) = {
            let mut inner = self.inner.lock();
            let Some(engine) = inner.engine.engine() else {
                return;
            };
            let Some(job) = inner.queue.next_job() else {
                return;
            };
            (engine, job)
        };

        let render = engine.render_page(job.page, self.config.thumbnail_width, self.config.thumbnail_height);
        let weak = Arc::downgrade(self);
        tokio::spawn(
            async move {
                let result = render.await;
                if let Some(shared) = weak.upgrade() {
                    shared.finish_render(job, result);
                }
            }
            .instrument(tracing::trace_span!("render_thumbnail", page = job.page)),
        );
    }

    fn finish_render(self: &Arc<Self>, job: ThumbnailJob, result: EngineResult<RenderedPage>) {
        {
            let mut inner = self.inner.lock();
            match inner.queue.complete(job) {
                Completion::Stale => {
                    tracing::trace!(page = job.page, "dropping thumbnail from previous document");
                }
                Completion::Current => {
                    let entry = match result {
                        Ok(rendered) => ThumbnailState::Ready(Thumbnail {
                            width: rendered.width,
                            height: rendered.height,
                            pixels: rendered.image,
                        }),
                        Err(err) => {
                            let err = ViewerError::RenderFailed {
                                page: job.page,
                                reason: err.to_string(),
                            };
                            tracing::warn!(error = %err, "thumbnail render failed");
                            ThumbnailState::Failed(err.to_string())
                        }
                    };
                    self.state.lock().set_thumbnail(job.page, entry);
                }
            }
        }
        self.pump_thumbnails();
    }

    // ---- lifecycle ------------------------------------------------------

    fn submit(self: Arc<Self>, request: PendingRequest) -> BoxFuture<'static, Result<LifecycleOutcome>> {
        Box::pin(async move {
            let admission = {
                let mut inner = self.inner.lock();
                if !inner.engine.is_mounted() {
                    tracing::debug!("ignored, no engine");
                    return Ok(LifecycleOutcome::NotMounted);
                }
                let unsaved = self.state.lock().has_unsaved_changes();
                inner.lifecycle.admit(request, unsaved)
            };

            match admission {
                Admission::Proceed(request, ticket) => self.run(request, ticket).await,
                Admission::Confirm => {
                    self.state.lock().set_unsaved_prompt(true);
                    Ok(LifecycleOutcome::AwaitingConfirmation)
                }
                Admission::Held => Ok(LifecycleOutcome::Held),
                Admission::Ignored => Ok(LifecycleOutcome::Unchanged),
            }
        })
    }

    /// Runs a started request, then lets a held one through.
    async fn run(self: &Arc<Self>, request: PendingRequest, ticket: Ticket) -> Result<LifecycleOutcome> {
        let result = match request {
            PendingRequest::Open(open) => self.run_open(open, ticket).await,
            PendingRequest::Close => self.run_close(ticket).await,
        };
        self.release_held();
        result
    }

    fn release_held(self: &Arc<Self>) {
        let held = self.inner.lock().lifecycle.take_held();
        let Some(request) = held else {
            return;
        };
        tracing::debug!("starting held request");
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.submit(request).await {
                Ok(outcome) => tracing::debug!(?outcome, "held request finished"),
                Err(err) => tracing::debug!(error = %err, "held request failed"),
            }
        });
    }

    async fn run_open(self: &Arc<Self>, request: OpenRequest, ticket: Ticket) -> Result<LifecycleOutcome> {
        let OpenRequest {
            source,
            companion,
            password,
        } = request;

        self.prepare_for_new_document();

        let read = match &companion {
            Some(companion) => try_join(source.read(), companion.read())
                .await
                .map(|(document, extra)| (document, Some(extra))),
            None => source.read().await.map(|document| (document, None)),
        };
        let (document, companion) = match read {
            Ok(read) => read,
            Err(err) => {
                tracing::warn!(error = %err, "reading document failed");
                return self.fail_open(ticket, err.to_string()).await;
            }
        };
        if !self.is_current(ticket) {
            return Ok(LifecycleOutcome::Superseded);
        }

        let attempt = OpenAttempt {
            name: source.name().to_string(),
            mime_type: source.mime_type().to_string(),
            document: document.into(),
            companion: companion.map(Into::into),
            password,
        };
        self.open_attempt(attempt, ticket).await
    }

    fn prepare_for_new_document(&self) {
        self.debouncer.cancel();
        self.inner.lock().queue.reset();
        let mut state = self.state.lock();
        state.set_unsaved_prompt(false);
        state.set_password_prompt(None);
        state.set_error(None);
    }

    async fn open_attempt(self: &Arc<Self>, attempt: OpenAttempt, ticket: Ticket) -> Result<LifecycleOutcome> {
        let Some(engine) = self.engine() else {
            return Ok(LifecycleOutcome::NotMounted);
        };

        let opening = match &attempt.companion {
            Some(companion) => engine.open_with_companion(
                Arc::clone(&attempt.document),
                Arc::clone(companion),
                attempt.password.clone(),
            ),
            None => engine.open(Arc::clone(&attempt.document), attempt.password.clone()),
        };
        let result = opening.await;
        if !self.is_current(ticket) {
            return Ok(LifecycleOutcome::Superseded);
        }

        match result {
            Ok(()) => {
                let metadata = DocumentMetadata::new(attempt.name, attempt.mime_type, engine.page_count());
                {
                    let mut inner = self.inner.lock();
                    inner.lifecycle.opened(ticket);
                    inner.queue.reset();
                    inner.engine_document = true;
                    let mut state = self.state.lock();
                    state.load_document(metadata.clone());
                    self.apply_configured_view(&mut state);
                }
                tracing::info!(name = %metadata.filename, pages = metadata.page_count, "document opened");
                dispatch(&self.events, &ViewerEvent::DocumentLoaded(metadata));
                Ok(LifecycleOutcome::Opened)
            }
            Err(EngineError::PasswordRequired) => {
                let retry = attempt.password.is_some();
                let attempt = OpenAttempt {
                    password: None,
                    ..attempt
                };
                let accepted = self.inner.lock().lifecycle.password_required(ticket, attempt);
                if !accepted {
                    return Ok(LifecycleOutcome::Superseded);
                }
                tracing::debug!(retry, "password required");
                self.state.lock().set_password_prompt(Some(PasswordPrompt { retry }));
                Ok(LifecycleOutcome::PasswordRequired)
            }
            Err(EngineError::Failed(reason)) => self.fail_open(ticket, reason).await,
        }
    }

    /// Settles a failed open. A document the engine still holds from before
    /// the switch is closed first, while the phase keeps new requests held.
    async fn fail_open(&self, ticket: Ticket, reason: String) -> Result<LifecycleOutcome> {
        if !self.is_current(ticket) {
            return Ok(LifecycleOutcome::Superseded);
        }
        let stale = self.take_engine_document();
        if let Some(engine) = stale {
            tracing::debug!("closing previous document after failed switch");
            self.close_engine_document(engine).await;
        }

        let settled = self.inner.lock().lifecycle.open_failed(ticket);
        if !settled {
            return Ok(LifecycleOutcome::Superseded);
        }

        let err = ViewerError::OpenFailed(reason);
        let report = err.report();
        {
            let mut state = self.state.lock();
            self.clear_document(&mut state);
            state.set_error(Some(report.clone()));
        }
        tracing::warn!(error = %err, "open failed");
        dispatch(&self.events, &ViewerEvent::Error(report));
        Err(err)
    }

    async fn run_close(self: &Arc<Self>, ticket: Ticket) -> Result<LifecycleOutcome> {
        self.debouncer.cancel();
        self.inner.lock().queue.reset();

        let Some(engine) = self.engine() else {
            return Ok(LifecycleOutcome::NotMounted);
        };
        self.inner.lock().engine_document = false;
        self.close_engine_document(engine).await;

        let settled = self.inner.lock().lifecycle.closed(ticket);
        if !settled {
            return Ok(LifecycleOutcome::Superseded);
        }
        {
            let mut state = self.state.lock();
            self.clear_document(&mut state);
        }
        tracing::info!("document closed");
        Ok(LifecycleOutcome::Closed)
    }

    /// Hands out the engine if it still holds a loaded document, forgetting
    /// that it does.
    fn take_engine_document(&self) -> Option<Arc<dyn RenderingEngine>> {
        let mut inner = self.inner.lock();
        if !std::mem::take(&mut inner.engine_document) {
            return None;
        }
        inner.engine.engine()
    }

    /// Closes the engine's document. A failure leaves nothing to roll back,
    /// so it is reported as an `error` event and the close still completes.
    async fn close_engine_document(&self, engine: Arc<dyn RenderingEngine>) {
        let closing = engine.close();
        if let Err(err) = closing.await {
            let err = ViewerError::Engine(format!("close failed: {err}"));
            tracing::warn!(error = %err, "engine close failed");
            dispatch(&self.events, &ViewerEvent::Error(err.report()));
        }
    }

    /// Drops the document from the UI state and restores the configured view.
    fn clear_document(&self, state: &mut UiState) {
        state.clear_document();
        self.apply_configured_view(state);
    }

    async fn resolve_unsaved_changes(
        self: &Arc<Self>,
        choice: UnsavedChoice,
        remember: bool,
    ) -> Result<LifecycleOutcome> {
        let resolution = self.inner.lock().lifecycle.resolve(choice, remember);
        if !matches!(resolution, Resolution::Ignored) {
            self.state.lock().set_unsaved_prompt(false);
        }

        match resolution {
            Resolution::Ignored => Ok(LifecycleOutcome::Unchanged),
            Resolution::Cancelled => {
                self.release_held();
                Ok(LifecycleOutcome::Cancelled)
            }
            Resolution::Proceed(request, ticket) => self.run(request, ticket).await,
            Resolution::SaveFirst(ticket) => {
                let saved = self.save_and_download().await;
                let next = self.inner.lock().lifecycle.finish_save(ticket, saved.is_ok());
                match (saved, next) {
                    (Ok(_), Some((request, ticket))) => self.run(request, ticket).await,
                    (Ok(_), None) => {
                        self.release_held();
                        Ok(LifecycleOutcome::Superseded)
                    }
                    (Err(err), _) => {
                        self.release_held();
                        Err(err)
                    }
                }
            }
        }
    }

    async fn submit_password(self: &Arc<Self>, password: String) -> Result<LifecycleOutcome> {
        let retry = self.inner.lock().lifecycle.submit_password(password);
        let Some((attempt, ticket)) = retry else {
            return Ok(LifecycleOutcome::Unchanged);
        };
        self.state.lock().set_password_prompt(None);

        let result = self.open_attempt(attempt, ticket).await;
        self.release_held();
        result
    }

    // ---- save & download ------------------------------------------------

    async fn download_file(self: &Arc<Self>) -> Result<Option<DownloadId>> {
        let ticket = self.inner.lock().lifecycle.begin_download();
        let Some(ticket) = ticket else {
            tracing::debug!("nothing to download");
            return Ok(None);
        };

        let saved = self.save_and_download().await;
        let settled = self.inner.lock().lifecycle.finish_download(ticket);
        if !settled {
            tracing::debug!("download finished after the document changed");
        }
        self.release_held();
        saved.map(Some)
    }

    /// Saves, stages and triggers a download, reporting failures as `error`
    /// events.
    async fn save_and_download(&self) -> Result<DownloadId> {
        let result = self.try_download().await;
        if let Err(err) = &result {
            tracing::warn!(error = %err, "download failed");
            dispatch(&self.events, &ViewerEvent::Error(err.report()));
        }
        result
    }

    async fn try_download(&self) -> Result<DownloadId> {
        let engine = self
            .engine()
            .ok_or_else(|| ViewerError::SaveFailed("viewer is not mounted".to_string()))?;
        let filename = self
            .state
            .lock()
            .document()
            .map_or_else(|| "document.pdf".to_string(), |doc| doc.filename.clone());

        let saving = engine.save(false);
        let bytes = saving
            .await
            .map_err(|err| ViewerError::SaveFailed(err.to_string()))?;

        let id = self
            .downloads
            .stage(&filename, &bytes)
            .map_err(|err| ViewerError::SaveFailed(err.to_string()))?;
        if let Err(err) = self.downloads.trigger(id) {
            self.downloads.release(id);
            return Err(ViewerError::SaveFailed(err.to_string()));
        }

        let downloads = Arc::clone(&self.downloads);
        let delay = self.config.download_release;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            downloads.release(id);
        });
        Ok(id)
    }

    async fn save_file(&self, alternate_format: bool) -> Result<Option<Vec<u8>>> {
        let Some(engine) = self.engine() else {
            return Ok(None);
        };
        let has_document = self.state.lock().document().is_some();
        if !has_document {
            return Ok(None);
        }

        let saving = engine.save(alternate_format);
        match saving.await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) => {
                let err = ViewerError::SaveFailed(err.to_string());
                dispatch(&self.events, &ViewerEvent::Error(err.report()));
                Err(err)
            }
        }
    }

    // ---- navigation panel -----------------------------------------------

    async fn load_outline(&self) -> Result<()> {
        let Some(engine) = self.engine() else {
            return Ok(());
        };
        let loading = engine.document_outline();
        let outline = loading
            .await
            .map_err(|err| ViewerError::Engine(err.to_string()))?;
        tracing::debug!(entries = outline.len(), "outline loaded");
        self.state.lock().set_outline(outline);
        Ok(())
    }

    async fn set_navigation_panel(self: &Arc<Self>, panel: NavigationPanel) -> Result<()> {
        self.state.lock().set_navigation_panel(panel);
        match panel {
            NavigationPanel::Hidden => Ok(()),
            NavigationPanel::Thumbnails => {
                let (first, last) = {
                    let state = self.state.lock();
                    (state.view().first_visible_page, state.view().last_visible_page)
                };
                let window = PageWindow::around(first, last, self.config.prefetch_margin);
                self.request_range(window.from, window.to);
                Ok(())
            }
            NavigationPanel::Outline => {
                let loaded = !self.state.lock().outline().is_empty();
                if loaded {
                    Ok(())
                } else {
                    self.load_outline().await
                }
            }
        }
    }
}

//! Scriptable in-memory engine for tests.
//!
//! Available under `cfg(test)` and with the `test-utils` feature. Every call is
//! recorded, failures can be injected per operation, and thumbnail renders can
//! be held until the test releases them one by one.

use super::{
    Container, DocumentBytes, EngineError, EngineEvent, EngineEventSink, EngineFactory,
    EngineFuture, EngineResult, RenderedPage, RenderingEngine,
};
use crate::domain::{FitMode, LayoutMode, OutlineNode, Result, Rotation};
use crate::Config;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// A call received by [`FakeEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Open { bytes: Vec<u8>, password: Option<String> },
    OpenWithCompanion { bytes: Vec<u8>, companion: Vec<u8>, password: Option<String> },
    Close,
    Save { alternate_format: bool },
    Render { page: u32 },
    SetZoom(f32),
    ZoomIn,
    ZoomOut,
    SetPageNumber(u32),
    NextPage,
    PreviousPage,
    SetFitMode(FitMode),
    SetPageLayoutMode(LayoutMode),
    SetRotation(Rotation),
    StartSearch(String),
    NextSearchMatch,
    PreviousSearchMatch,
    EndSearch,
    Outline,
    AttachEvents,
    DetachEvents,
    Destroy,
}

#[derive(Default)]
struct Script {
    page_count: u32,
    password: Option<String>,
    open_failure: Option<String>,
    close_failure: Option<String>,
    save_failure: Option<String>,
    saved: Vec<u8>,
    render_failures: HashMap<u32, String>,
    hold_renders: bool,
    held: VecDeque<(u32, oneshot::Sender<()>)>,
    outline: Vec<OutlineNode>,
    rotation: Rotation,
    sink: Option<EngineEventSink>,
    calls: Vec<EngineCall>,
}

/// Recording engine double.
pub struct FakeEngine {
    script: Mutex<Script>,
    rendering: Arc<AtomicUsize>,
    max_rendering: Arc<AtomicUsize>,
}

impl std::fmt::Debug for FakeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeEngine")
            .field("calls", &self.script.lock().calls.len())
            .finish_non_exhaustive()
    }
}

impl FakeEngine {
    /// Creates an engine whose documents all have `page_count` pages.
    #[must_use]
    pub fn new(page_count: u32) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                page_count,
                saved: b"%PDF-fake".to_vec(),
                ..Script::default()
            }),
            rendering: Arc::new(AtomicUsize::new(0)),
            max_rendering: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Factory handing out this engine on every mount.
    #[must_use]
    pub fn factory(engine: &Arc<Self>) -> Box<dyn EngineFactory> {
        let engine = Arc::clone(engine);
        Box::new(move |_: &Config, _: &Container| -> Result<Arc<dyn RenderingEngine>> {
            Ok(Arc::clone(&engine) as Arc<dyn RenderingEngine>)
        })
    }

    pub fn set_page_count(&self, page_count: u32) {
        self.script.lock().page_count = page_count;
    }

    /// Rejects opens unless this password is supplied.
    pub fn require_password(&self, password: &str) {
        self.script.lock().password = Some(password.to_string());
    }

    /// Makes the next open fail with `reason`.
    pub fn fail_next_open(&self, reason: &str) {
        self.script.lock().open_failure = Some(reason.to_string());
    }

    pub fn fail_next_close(&self, reason: &str) {
        self.script.lock().close_failure = Some(reason.to_string());
    }

    /// Makes every save fail with `reason`, or succeed again with `None`.
    pub fn fail_saves(&self, reason: Option<&str>) {
        self.script.lock().save_failure = reason.map(str::to_string);
    }

    pub fn set_saved_bytes(&self, bytes: &[u8]) {
        self.script.lock().saved = bytes.to_vec();
    }

    pub fn fail_render(&self, page: u32, reason: &str) {
        self.script.lock().render_failures.insert(page, reason.to_string());
    }

    /// When enabled, renders wait for [`release_render`](Self::release_render).
    pub fn hold_renders(&self, hold: bool) {
        self.script.lock().hold_renders = hold;
    }

    /// Lets the oldest held render finish. Returns its page.
    pub fn release_render(&self) -> Option<u32> {
        let (page, gate) = self.script.lock().held.pop_front()?;
        let _ = gate.send(());
        Some(page)
    }

    /// Pages whose renders are currently held.
    #[must_use]
    pub fn held_renders(&self) -> Vec<u32> {
        self.script.lock().held.iter().map(|(page, _)| *page).collect()
    }

    pub fn set_outline(&self, outline: Vec<OutlineNode>) {
        self.script.lock().outline = outline;
    }

    /// Pushes an event as the real engine would. Returns false when no sink is
    /// attached.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.script
            .lock()
            .sink
            .as_ref()
            .is_some_and(|sink| sink.send(event).is_ok())
    }

    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.script.lock().calls.clone()
    }

    /// Pages rendered so far, in call order.
    #[must_use]
    pub fn rendered_pages(&self) -> Vec<u32> {
        self.script
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Render { page } => Some(*page),
                _ => None,
            })
            .collect()
    }

    /// Number of open calls, with or without companion.
    #[must_use]
    pub fn open_calls(&self) -> usize {
        self.script
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Open { .. } | EngineCall::OpenWithCompanion { .. }))
            .count()
    }

    /// Highest number of renders observed running at the same time.
    #[must_use]
    pub fn max_concurrent_renders(&self) -> usize {
        self.max_rendering.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn has_sink(&self) -> bool {
        self.script.lock().sink.is_some()
    }

    fn record(&self, call: EngineCall) {
        self.script.lock().calls.push(call);
    }

    fn check_open(&self, password: Option<&str>) -> EngineResult<()> {
        let mut script = self.script.lock();
        if let Some(reason) = script.open_failure.take() {
            return Err(EngineError::Failed(reason));
        }
        match script.password.as_deref() {
            Some(expected) if password != Some(expected) => Err(EngineError::PasswordRequired),
            _ => Ok(()),
        }
    }
}

impl RenderingEngine for FakeEngine {
    fn open(&self, document: DocumentBytes, password: Option<String>) -> EngineFuture<()> {
        self.record(EngineCall::Open {
            bytes: document.to_vec(),
            password: password.clone(),
        });
        let result = self.check_open(password.as_deref());
        Box::pin(async move { result })
    }

    fn open_with_companion(
        &self,
        document: DocumentBytes,
        companion: DocumentBytes,
        password: Option<String>,
    ) -> EngineFuture<()> {
        self.record(EngineCall::OpenWithCompanion {
            bytes: document.to_vec(),
            companion: companion.to_vec(),
            password: password.clone(),
        });
        let result = self.check_open(password.as_deref());
        Box::pin(async move { result })
    }

    fn close(&self) -> EngineFuture<()> {
        self.record(EngineCall::Close);
        let failure = self.script.lock().close_failure.take();
        let result = failure.map_or(Ok(()), |reason| Err(EngineError::Failed(reason)));
        Box::pin(async move { result })
    }

    fn save(&self, alternate_format: bool) -> EngineFuture<Vec<u8>> {
        self.record(EngineCall::Save { alternate_format });
        let script = self.script.lock();
        let result = match &script.save_failure {
            Some(reason) => Err(EngineError::Failed(reason.clone())),
            None => Ok(script.saved.clone()),
        };
        drop(script);
        Box::pin(async move { result })
    }

    fn page_count(&self) -> u32 {
        self.script.lock().page_count
    }

    fn render_page(&self, page: u32, width: u32, height: u32) -> EngineFuture<RenderedPage> {
        self.record(EngineCall::Render { page });
        let (gate, failure) = {
            let mut script = self.script.lock();
            let gate = script.hold_renders.then(|| {
                let (tx, rx) = oneshot::channel();
                script.held.push_back((page, tx));
                rx
            });
            (gate, script.render_failures.get(&page).cloned())
        };
        let rendering = Arc::clone(&self.rendering);
        let max_rendering = Arc::clone(&self.max_rendering);

        Box::pin(async move {
            let now = rendering.fetch_add(1, Ordering::SeqCst) + 1;
            max_rendering.fetch_max(now, Ordering::SeqCst);
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            rendering.fetch_sub(1, Ordering::SeqCst);

            match failure {
                Some(reason) => Err(EngineError::Failed(reason)),
                None => Ok(RenderedPage {
                    page,
                    width,
                    height,
                    image: vec![0; (width * height * 4) as usize],
                }),
            }
        })
    }

    fn set_zoom(&self, zoom: f32) {
        self.record(EngineCall::SetZoom(zoom));
    }

    fn zoom_in(&self) {
        self.record(EngineCall::ZoomIn);
    }

    fn zoom_out(&self) {
        self.record(EngineCall::ZoomOut);
    }

    fn set_page_number(&self, page: u32) {
        self.record(EngineCall::SetPageNumber(page));
    }

    fn next_page(&self) {
        self.record(EngineCall::NextPage);
    }

    fn previous_page(&self) {
        self.record(EngineCall::PreviousPage);
    }

    fn set_fit_mode(&self, mode: FitMode) {
        self.record(EngineCall::SetFitMode(mode));
    }

    fn set_page_layout_mode(&self, mode: LayoutMode) {
        self.record(EngineCall::SetPageLayoutMode(mode));
    }

    fn set_rotation(&self, rotation: Rotation) {
        self.record(EngineCall::SetRotation(rotation));
        self.script.lock().rotation = rotation;
    }

    fn rotation(&self) -> Rotation {
        self.script.lock().rotation
    }

    fn start_search(&self, query: &str) {
        self.record(EngineCall::StartSearch(query.to_string()));
    }

    fn next_search_match(&self) {
        self.record(EngineCall::NextSearchMatch);
    }

    fn previous_search_match(&self) {
        self.record(EngineCall::PreviousSearchMatch);
    }

    fn end_search(&self) {
        self.record(EngineCall::EndSearch);
    }

    fn document_outline(&self) -> EngineFuture<Vec<OutlineNode>> {
        self.record(EngineCall::Outline);
        let outline = self.script.lock().outline.clone();
        Box::pin(async move { Ok(outline) })
    }

    fn attach_events(&self, sink: EngineEventSink) {
        self.record(EngineCall::AttachEvents);
        self.script.lock().sink = Some(sink);
    }

    fn detach_events(&self) {
        self.record(EngineCall::DetachEvents);
        self.script.lock().sink = None;
    }

    fn destroy(&self) {
        self.record(EngineCall::Destroy);
    }
}

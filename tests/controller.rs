use docviewer::app::{DocumentPhase, LifecycleOutcome, NavigationPanel, UnsavedChoice, ViewerController};
use docviewer::domain::{FitMode, OutlineNode, Rotation, ThumbnailState};
use docviewer::engine::fake::{EngineCall, FakeEngine};
use docviewer::engine::{Container, EngineEvent};
use docviewer::events::{ListenerError, ViewerEvent, ViewerEventKind, ViewerListener};
use docviewer::infrastructure::{DocumentSource, FileSource, MemorySource, RecordingDownloads};
use docviewer::{Config, Result, ViewerError};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const CONTAINER: Container = Container {
    width: 1280,
    height: 800,
};

struct Harness {
    viewer: ViewerController,
    engine: Arc<FakeEngine>,
    downloads: Arc<RecordingDownloads>,
}

fn harness(pages: u32) -> Harness {
    harness_with(Config::default(), pages)
}

fn harness_with(config: Config, pages: u32) -> Harness {
    let engine = FakeEngine::new(pages);
    let downloads = Arc::new(RecordingDownloads::default());
    let viewer = ViewerController::new(config, FakeEngine::factory(&engine), downloads.clone());
    Harness {
        viewer,
        engine,
        downloads,
    }
}

fn source(name: &str, bytes: &[u8]) -> Arc<dyn DocumentSource> {
    Arc::new(MemorySource::new(name, bytes.to_vec()))
}

/// Lets spawned tasks run without firing timers that are further out.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn record(viewer: &ViewerController, kind: ViewerEventKind) -> (Arc<Mutex<Vec<ViewerEvent>>>, ViewerListener) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: ViewerListener = Arc::new(move |event: &ViewerEvent| -> std::result::Result<(), ListenerError> {
        sink.lock().push(event.clone());
        Ok(())
    });
    viewer.add_event_listener(kind, Arc::clone(&listener));
    (seen, listener)
}

async fn mounted_with_document(pages: u32) -> Harness {
    let h = harness(pages);
    h.viewer.mount(Some(CONTAINER)).unwrap();
    let outcome = h.viewer.open_file(source("a.pdf", b"%PDF-a"), None).await.unwrap();
    assert_eq!(outcome, LifecycleOutcome::Opened);
    h
}

/// Source whose read completes only after `delay`.
struct SlowSource {
    name: &'static str,
    bytes: Vec<u8>,
    delay: Duration,
}

impl DocumentSource for SlowSource {
    fn name(&self) -> &str {
        self.name
    }

    fn read(&self) -> BoxFuture<'static, Result<Vec<u8>>> {
        let bytes = self.bytes.clone();
        let delay = self.delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(bytes)
        })
    }
}

async fn modify(h: &Harness, page: u32) {
    assert!(h.engine.emit(EngineEvent::DocumentModified { page }));
    settle().await;
    assert!(h.viewer.ui_state().has_unsaved_changes());
}

// ---- mount ----------------------------------------------------------------

#[test]
fn mount_without_container_fails() {
    let h = harness(1);
    let err = h.viewer.mount(None).unwrap_err();
    assert!(matches!(err, ViewerError::MissingContainer));
    assert!(!h.viewer.is_mounted());
    assert!(h.engine.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn mount_applies_configured_view_and_breakpoint() {
    let config = Config {
        fit_mode: FitMode::ActualSize,
        rotation: Rotation::Deg180,
        ..Config::default()
    };
    let h = harness_with(config, 3);
    h.viewer.mount(Some(CONTAINER)).unwrap();

    assert!(h.viewer.is_mounted());
    assert!(h.engine.has_sink());
    let calls = h.engine.calls();
    assert!(calls.contains(&EngineCall::SetFitMode(FitMode::ActualSize)));
    assert!(calls.contains(&EngineCall::SetRotation(Rotation::Deg180)));

    let state = h.viewer.ui_state();
    assert_eq!(state.view().fit_mode, FitMode::ActualSize);
    assert_eq!(state.breakpoint(), Some("medium"));
}

#[tokio::test(start_paused = true)]
async fn commands_without_engine_do_nothing() {
    let h = harness(3);

    assert!(!h.viewer.zoom_in());
    assert!(!h.viewer.next_page());
    assert!(!h.viewer.start_search("needle"));
    assert_eq!(
        h.viewer.open_file(source("a.pdf", b"%PDF"), None).await.unwrap(),
        LifecycleOutcome::NotMounted
    );
    assert_eq!(h.viewer.download_file().await.unwrap(), None);
    assert_eq!(h.viewer.save_file(false).await.unwrap(), None);
    h.viewer.request_thumbnails(1, 3);
    settle().await;

    assert!(h.engine.calls().is_empty());
    assert!(h.viewer.ui_state().search().is_none());
}

#[tokio::test(start_paused = true)]
async fn resize_reports_breakpoint_transitions() {
    let h = harness(1);
    h.viewer.mount(Some(CONTAINER)).unwrap();

    let mut seen = vec![];
    let mut revisions = vec![];
    for width in [1500, 1450, 1200, 900] {
        h.viewer.resize(width, 800);
        let state = h.viewer.ui_state();
        seen.push(state.breakpoint().map(str::to_string));
        revisions.push(state.revision());
    }

    let expected: Vec<Option<String>> = ["wide", "wide", "medium", "narrow"]
        .into_iter()
        .map(|name| Some(name.to_string()))
        .collect();
    assert_eq!(seen, expected);
    // staying inside "wide" is not an update
    assert_eq!(revisions[0], revisions[1]);
    assert!(revisions[2] > revisions[1]);
    assert!(revisions[3] > revisions[2]);
}

#[tokio::test(start_paused = true)]
async fn unmount_tears_down_engine_and_keeps_listeners() {
    let h = mounted_with_document(4).await;
    let (loaded, _listener) = record(&h.viewer, ViewerEventKind::DocumentLoaded);

    h.viewer.unmount();

    assert!(!h.viewer.is_mounted());
    assert!(!h.engine.has_sink());
    let calls = h.engine.calls();
    assert!(calls.contains(&EngineCall::DetachEvents));
    assert!(calls.contains(&EngineCall::Destroy));
    assert_eq!(h.viewer.phase(), DocumentPhase::Idle);
    assert!(h.viewer.ui_state().document().is_none());

    h.viewer.mount(Some(CONTAINER)).unwrap();
    h.viewer.open_file(source("b.pdf", b"%PDF-b"), None).await.unwrap();
    assert_eq!(loaded.lock().len(), 1);
}

// ---- open / close ---------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn open_loads_metadata_and_notifies_listeners() {
    let h = harness(10);
    let (loaded, _listener) = record(&h.viewer, ViewerEventKind::DocumentLoaded);
    h.viewer.mount(Some(CONTAINER)).unwrap();

    let outcome = h.viewer.open_file(source("report.pdf", b"%PDF-1.7"), None).await.unwrap();

    assert_eq!(outcome, LifecycleOutcome::Opened);
    assert_eq!(h.viewer.phase(), DocumentPhase::Open);
    assert_eq!(h.viewer.page_count(), 10);
    let state = h.viewer.ui_state();
    let document = state.document().unwrap();
    assert_eq!(document.filename, "report.pdf");
    assert_eq!(document.mime_type, "application/pdf");
    assert!(!document.has_unsaved_changes);

    let loaded = loaded.lock();
    assert_eq!(loaded.len(), 1);
    assert!(matches!(&loaded[0], ViewerEvent::DocumentLoaded(meta) if meta.page_count == 10));
    assert!(h
        .engine
        .calls()
        .contains(&EngineCall::Open { bytes: b"%PDF-1.7".to_vec(), password: None }));
}

#[tokio::test(start_paused = true)]
async fn open_failure_records_error_and_returns_to_idle() {
    let h = harness(3);
    let (errors, _listener) = record(&h.viewer, ViewerEventKind::Error);
    h.viewer.mount(Some(CONTAINER)).unwrap();
    h.engine.fail_next_open("corrupt xref table");

    let err = h.viewer.open_file(source("bad.pdf", b"junk"), None).await.unwrap_err();

    assert!(matches!(err, ViewerError::OpenFailed(ref reason) if reason == "corrupt xref table"));
    assert_eq!(h.viewer.phase(), DocumentPhase::Idle);
    let state = h.viewer.ui_state();
    assert!(state.document().is_none());
    assert_eq!(state.error().map(|e| e.code), Some("open_failed"));
    assert_eq!(errors.lock().len(), 1);
    assert!(!h.engine.calls().contains(&EngineCall::Close));

    // the next open clears the error
    h.viewer.open_file(source("good.pdf", b"%PDF"), None).await.unwrap();
    assert!(h.viewer.ui_state().error().is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_switch_closes_previous_document() {
    let h = mounted_with_document(3).await;
    h.engine.fail_next_open("truncated file");

    let err = h.viewer.open_file(source("b.pdf", b"%PDF-b"), None).await.unwrap_err();

    assert!(matches!(err, ViewerError::OpenFailed(_)));
    assert_eq!(h.viewer.phase(), DocumentPhase::Idle);
    assert!(h.viewer.ui_state().document().is_none());
    let calls = h.engine.calls();
    let failed_open = calls
        .iter()
        .position(|call| matches!(call, EngineCall::Open { bytes, .. } if bytes == b"%PDF-b"))
        .unwrap();
    assert_eq!(calls[failed_open + 1..].iter().filter(|call| **call == EngineCall::Close).count(), 1);

    // nothing left to close
    assert_eq!(h.viewer.close().await.unwrap(), LifecycleOutcome::Unchanged);
    assert_eq!(h.engine.calls().iter().filter(|call| **call == EngineCall::Close).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn open_superseded_by_unmount_is_dropped() {
    let h = harness(4);
    h.viewer.mount(Some(CONTAINER)).unwrap();
    let slow: Arc<dyn DocumentSource> = Arc::new(SlowSource {
        name: "slow.pdf",
        bytes: b"%PDF-slow".to_vec(),
        delay: Duration::from_millis(100),
    });

    let viewer = h.viewer.clone();
    let opening = tokio::spawn(async move { viewer.open_file(slow, None).await });
    settle().await;
    assert_eq!(h.viewer.phase(), DocumentPhase::Opening);

    h.viewer.unmount();
    let outcome = opening.await.unwrap().unwrap();

    assert_eq!(outcome, LifecycleOutcome::Superseded);
    assert_eq!(h.engine.open_calls(), 0);
    assert_eq!(h.viewer.phase(), DocumentPhase::Idle);
    assert!(h.viewer.ui_state().document().is_none());
}

#[tokio::test(start_paused = true)]
async fn companion_is_passed_alongside_document() {
    let h = harness(2);
    h.viewer.mount(Some(CONTAINER)).unwrap();

    let outcome = h
        .viewer
        .open_with_companion(source("form.pdf", b"%PDF"), source("form.xfdf", b"<xfdf/>"), None)
        .await
        .unwrap();

    assert_eq!(outcome, LifecycleOutcome::Opened);
    assert!(h.engine.calls().contains(&EngineCall::OpenWithCompanion {
        bytes: b"%PDF".to_vec(),
        companion: b"<xfdf/>".to_vec(),
        password: None,
    }));
}

#[tokio::test(start_paused = true)]
async fn unreadable_companion_never_reaches_engine() {
    let h = harness(2);
    h.viewer.mount(Some(CONTAINER)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let missing: Arc<dyn DocumentSource> = Arc::new(FileSource::new(dir.path().join("missing.xfdf")));

    let err = h
        .viewer
        .open_with_companion(source("form.pdf", b"%PDF"), missing, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ViewerError::OpenFailed(_)));
    assert_eq!(h.engine.open_calls(), 0);
    assert_eq!(h.viewer.phase(), DocumentPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn close_clears_document() {
    let h = mounted_with_document(3).await;

    assert_eq!(h.viewer.close().await.unwrap(), LifecycleOutcome::Closed);

    assert_eq!(h.viewer.phase(), DocumentPhase::Idle);
    assert!(h.viewer.ui_state().document().is_none());
    assert!(h.engine.calls().contains(&EngineCall::Close));
    assert_eq!(h.viewer.close().await.unwrap(), LifecycleOutcome::Unchanged);
}

#[tokio::test(start_paused = true)]
async fn close_restores_configured_view() {
    let config = Config {
        fit_mode: FitMode::ActualSize,
        rotation: Rotation::Deg90,
        ..Config::default()
    };
    let h = harness_with(config, 3);
    h.viewer.mount(Some(CONTAINER)).unwrap();
    h.viewer.open_file(source("a.pdf", b"%PDF"), None).await.unwrap();

    h.viewer.close().await.unwrap();

    let state = h.viewer.ui_state();
    assert_eq!(state.view().fit_mode, FitMode::ActualSize);
    assert_eq!(state.view().rotation, Rotation::Deg90);
}

#[tokio::test(start_paused = true)]
async fn engine_close_failure_is_reported() {
    let h = mounted_with_document(3).await;
    let (errors, _listener) = record(&h.viewer, ViewerEventKind::Error);
    h.engine.fail_next_close("handle gone");

    assert_eq!(h.viewer.close().await.unwrap(), LifecycleOutcome::Closed);

    assert_eq!(h.viewer.phase(), DocumentPhase::Idle);
    assert!(h.viewer.ui_state().document().is_none());
    let errors = errors.lock();
    assert!(matches!(&errors[..], [ViewerEvent::Error(report)] if report.code == "engine" && report.message.contains("handle gone")));
}

#[tokio::test(start_paused = true)]
async fn close_cancels_pending_scan() {
    let h = mounted_with_document(40).await;
    h.engine.emit(EngineEvent::FirstVisiblePage(10));
    h.engine.emit(EngineEvent::LastVisiblePage(12));
    settle().await;

    h.viewer.close().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(h.engine.rendered_pages().is_empty());
}

// ---- password -------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn password_prompt_retries_with_same_bytes() {
    let h = harness(5);
    h.viewer.mount(Some(CONTAINER)).unwrap();
    h.engine.require_password("s3cret");

    let outcome = h.viewer.open_file(source("locked.pdf", b"%PDF-enc"), None).await.unwrap();
    assert_eq!(outcome, LifecycleOutcome::PasswordRequired);
    assert_eq!(h.viewer.phase(), DocumentPhase::PasswordRequired);
    assert_eq!(h.viewer.ui_state().password_prompt().map(|p| p.retry), Some(false));

    let outcome = h.viewer.submit_password("wrong").await.unwrap();
    assert_eq!(outcome, LifecycleOutcome::PasswordRequired);
    assert_eq!(h.viewer.ui_state().password_prompt().map(|p| p.retry), Some(true));

    let outcome = h.viewer.submit_password("s3cret").await.unwrap();
    assert_eq!(outcome, LifecycleOutcome::Opened);
    assert!(h.viewer.ui_state().password_prompt().is_none());
    assert_eq!(h.viewer.ui_state().document().map(|d| d.filename.as_str()), Some("locked.pdf"));

    let opens: Vec<_> = h
        .engine
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            EngineCall::Open { bytes, password } => Some((bytes, password)),
            _ => None,
        })
        .collect();
    assert_eq!(
        opens,
        vec![
            (b"%PDF-enc".to_vec(), None),
            (b"%PDF-enc".to_vec(), Some("wrong".to_string())),
            (b"%PDF-enc".to_vec(), Some("s3cret".to_string())),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn cancelling_password_prompt_returns_to_idle() {
    let h = harness(5);
    h.viewer.mount(Some(CONTAINER)).unwrap();
    h.engine.require_password("s3cret");
    h.viewer.open_file(source("locked.pdf", b"%PDF"), None).await.unwrap();

    assert_eq!(h.viewer.cancel_password_prompt().await.unwrap(), LifecycleOutcome::Closed);

    assert_eq!(h.viewer.phase(), DocumentPhase::Idle);
    assert!(h.viewer.ui_state().password_prompt().is_none());
    assert_eq!(h.viewer.submit_password("s3cret").await.unwrap(), LifecycleOutcome::Unchanged);
    assert_eq!(h.engine.open_calls(), 1);
    assert_eq!(h.viewer.cancel_password_prompt().await.unwrap(), LifecycleOutcome::Unchanged);
}

#[tokio::test(start_paused = true)]
async fn close_during_password_prompt_dismisses_it() {
    let h = harness(5);
    h.viewer.mount(Some(CONTAINER)).unwrap();
    h.engine.require_password("s3cret");
    let outcome = h.viewer.open_file(source("locked.pdf", b"%PDF"), None).await.unwrap();
    assert_eq!(outcome, LifecycleOutcome::PasswordRequired);

    assert_eq!(h.viewer.close().await.unwrap(), LifecycleOutcome::Closed);

    assert_eq!(h.viewer.phase(), DocumentPhase::Idle);
    let state = h.viewer.ui_state();
    assert!(state.password_prompt().is_none());
    assert!(state.document().is_none());
    assert!(h.engine.calls().contains(&EngineCall::Close));
    assert_eq!(h.viewer.submit_password("s3cret").await.unwrap(), LifecycleOutcome::Unchanged);
    assert_eq!(h.engine.open_calls(), 1);
}

// ---- unsaved changes ------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn unsaved_changes_prompt_then_discard() {
    let h = mounted_with_document(3).await;
    modify(&h, 1).await;

    let outcome = h.viewer.open_file(source("b.pdf", b"%PDF-b"), None).await.unwrap();
    assert_eq!(outcome, LifecycleOutcome::AwaitingConfirmation);
    assert!(h.viewer.ui_state().unsaved_prompt());
    assert_eq!(h.engine.open_calls(), 1);

    let outcome = h
        .viewer
        .resolve_unsaved_changes(UnsavedChoice::Discard, false)
        .await
        .unwrap();
    assert_eq!(outcome, LifecycleOutcome::Opened);
    let state = h.viewer.ui_state();
    assert!(!state.unsaved_prompt());
    assert!(!state.has_unsaved_changes());
    assert_eq!(state.document().map(|d| d.filename.as_str()), Some("b.pdf"));
    assert!(h.downloads.log().staged.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unsaved_changes_saved_before_proceeding() {
    let h = mounted_with_document(3).await;
    h.engine.set_saved_bytes(b"%PDF-edited");
    modify(&h, 2).await;
    h.viewer.close().await.unwrap();

    let outcome = h
        .viewer
        .resolve_unsaved_changes(UnsavedChoice::Save, false)
        .await
        .unwrap();

    assert_eq!(outcome, LifecycleOutcome::Closed);
    let log = h.downloads.log();
    assert_eq!(log.staged.len(), 1);
    assert_eq!(log.staged[0].1, "a.pdf");
    assert_eq!(log.staged[0].2, b"%PDF-edited".to_vec());
    assert_eq!(log.triggered, vec![log.staged[0].0]);
    assert!(h.viewer.ui_state().document().is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_save_drops_pending_request() {
    let h = mounted_with_document(3).await;
    let (errors, _listener) = record(&h.viewer, ViewerEventKind::Error);
    modify(&h, 1).await;
    h.engine.fail_saves(Some("disk full"));
    h.viewer.open_file(source("b.pdf", b"%PDF-b"), None).await.unwrap();

    let err = h
        .viewer
        .resolve_unsaved_changes(UnsavedChoice::Save, false)
        .await
        .unwrap_err();

    assert!(matches!(err, ViewerError::SaveFailed(_)));
    assert_eq!(h.viewer.phase(), DocumentPhase::Open);
    assert_eq!(h.engine.open_calls(), 1);
    assert_eq!(h.viewer.ui_state().document().map(|d| d.filename.as_str()), Some("a.pdf"));
    assert_eq!(errors.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_keeps_current_document() {
    let h = mounted_with_document(3).await;
    modify(&h, 1).await;
    h.viewer.open_file(source("b.pdf", b"%PDF-b"), None).await.unwrap();

    let outcome = h
        .viewer
        .resolve_unsaved_changes(UnsavedChoice::Cancel, true)
        .await
        .unwrap();

    assert_eq!(outcome, LifecycleOutcome::Cancelled);
    assert!(!h.viewer.ui_state().unsaved_prompt());
    assert!(h.viewer.ui_state().has_unsaved_changes());
    assert_eq!(h.engine.open_calls(), 1);

    // cancel never remembers, so the prompt shows again
    let outcome = h.viewer.open_file(source("b.pdf", b"%PDF-b"), None).await.unwrap();
    assert_eq!(outcome, LifecycleOutcome::AwaitingConfirmation);
}

#[tokio::test(start_paused = true)]
async fn remembered_choice_skips_later_prompts() {
    let h = mounted_with_document(3).await;
    modify(&h, 1).await;
    h.viewer.open_file(source("b.pdf", b"%PDF-b"), None).await.unwrap();
    h.viewer
        .resolve_unsaved_changes(UnsavedChoice::Discard, true)
        .await
        .unwrap();

    modify(&h, 2).await;
    let outcome = h.viewer.open_file(source("c.pdf", b"%PDF-c"), None).await.unwrap();

    assert_eq!(outcome, LifecycleOutcome::Opened);
    assert_eq!(h.engine.open_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn requests_during_prompt_are_held_latest_wins() {
    let h = mounted_with_document(3).await;
    modify(&h, 1).await;
    h.viewer.open_file(source("b.pdf", b"%PDF-b"), None).await.unwrap();

    assert_eq!(
        h.viewer.open_file(source("c.pdf", b"%PDF-c"), None).await.unwrap(),
        LifecycleOutcome::Held
    );
    assert_eq!(
        h.viewer.open_file(source("d.pdf", b"%PDF-d"), None).await.unwrap(),
        LifecycleOutcome::Held
    );

    h.viewer
        .resolve_unsaved_changes(UnsavedChoice::Cancel, false)
        .await
        .unwrap();
    settle().await;

    // the held open asks again, since the changes are still unsaved
    assert!(h.viewer.ui_state().unsaved_prompt());
    h.viewer
        .resolve_unsaved_changes(UnsavedChoice::Discard, false)
        .await
        .unwrap();

    assert_eq!(h.viewer.ui_state().document().map(|d| d.filename.as_str()), Some("d.pdf"));
    assert_eq!(h.engine.open_calls(), 2);
}

// ---- save & download ------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn download_releases_each_staged_file_once_after_delay() {
    let h = mounted_with_document(2).await;

    let first = h.viewer.download_file().await.unwrap().unwrap();
    let second = h.viewer.download_file().await.unwrap().unwrap();
    assert_ne!(first, second);
    assert_eq!(h.downloads.log().triggered, vec![first, second]);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(h.downloads.log().released.is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.downloads.log().released, vec![first, second]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.downloads.log().released.len(), 2);
    assert_eq!(h.viewer.phase(), DocumentPhase::Open);
}

#[tokio::test(start_paused = true)]
async fn download_without_document_is_noop() {
    let h = harness(2);
    h.viewer.mount(Some(CONTAINER)).unwrap();

    assert_eq!(h.viewer.download_file().await.unwrap(), None);
    assert!(h.downloads.log().staged.is_empty());
}

#[tokio::test(start_paused = true)]
async fn save_file_returns_bytes_in_requested_format() {
    let h = mounted_with_document(2).await;
    h.engine.set_saved_bytes(b"%PDF-flat");

    let bytes = h.viewer.save_file(true).await.unwrap();

    assert_eq!(bytes, Some(b"%PDF-flat".to_vec()));
    assert!(h.engine.calls().contains(&EngineCall::Save { alternate_format: true }));
    assert!(h.downloads.log().staged.is_empty());
}

// ---- thumbnails -----------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn thumbnails_render_one_at_a_time_in_order() {
    let h = mounted_with_document(10).await;

    h.viewer.request_thumbnails(1, 10);
    settle().await;

    assert_eq!(h.engine.rendered_pages(), (1..=10).collect::<Vec<_>>());
    assert_eq!(h.engine.max_concurrent_renders(), 1);
    let state = h.viewer.ui_state();
    assert_eq!(state.thumbnails().len(), 10);
    assert!(matches!(state.thumbnail(7), Some(ThumbnailState::Ready(t)) if t.width == 120 && t.height == 160));

    // cached pages are not rendered again
    h.viewer.request_thumbnails(3, 5);
    settle().await;
    assert_eq!(h.engine.rendered_pages().len(), 10);
}

#[tokio::test(start_paused = true)]
async fn failed_render_is_recorded_and_queue_moves_on() {
    let h = mounted_with_document(3).await;
    h.engine.fail_render(2, "bad stream");

    h.viewer.request_thumbnails(1, 3);
    settle().await;

    let state = h.viewer.ui_state();
    assert!(matches!(state.thumbnail(2), Some(ThumbnailState::Failed(reason)) if reason.contains("bad stream")));
    assert!(matches!(state.thumbnail(3), Some(ThumbnailState::Ready(_))));
}

#[tokio::test(start_paused = true)]
async fn render_from_previous_document_is_discarded() {
    let h = mounted_with_document(4).await;
    h.engine.hold_renders(true);
    h.viewer.request_thumbnails(1, 4);
    settle().await;
    assert_eq!(h.engine.held_renders(), vec![1]);

    h.viewer.open_file(source("b.pdf", b"%PDF-b"), None).await.unwrap();
    h.viewer.request_thumbnails(1, 2);
    settle().await;
    assert_eq!(h.engine.held_renders(), vec![1, 1]);

    assert_eq!(h.engine.release_render(), Some(1));
    settle().await;
    assert!(h.viewer.ui_state().thumbnail(1).is_none());
    assert_eq!(h.engine.held_renders(), vec![1]);

    h.engine.hold_renders(false);
    h.engine.release_render();
    settle().await;
    let state = h.viewer.ui_state();
    assert!(matches!(state.thumbnail(1), Some(ThumbnailState::Ready(_))));
    assert!(matches!(state.thumbnail(2), Some(ThumbnailState::Ready(_))));
    assert!(state.thumbnail(3).is_none());
}

#[tokio::test(start_paused = true)]
async fn scrolling_schedules_debounced_prefetch() {
    let h = mounted_with_document(40).await;

    h.engine.emit(EngineEvent::FirstVisiblePage(10));
    h.engine.emit(EngineEvent::LastVisiblePage(12));
    settle().await;
    assert!(h.engine.rendered_pages().is_empty());

    h.engine.emit(EngineEvent::FirstVisiblePage(20));
    h.engine.emit(EngineEvent::LastVisiblePage(21));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.engine.rendered_pages().is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.engine.rendered_pages(), (15..=26).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn edited_page_refreshes_when_shown_again() {
    let h = mounted_with_document(5).await;
    h.viewer.request_thumbnails(1, 3);
    settle().await;

    modify(&h, 2).await;
    assert!(h.viewer.ui_state().is_thumbnail_stale(2));

    h.engine.emit(EngineEvent::PageChanged(2));
    settle().await;

    assert_eq!(h.engine.rendered_pages(), vec![1, 2, 3, 2]);
    assert!(matches!(h.viewer.ui_state().thumbnail(2), Some(ThumbnailState::Ready(_))));
}

#[tokio::test(start_paused = true)]
async fn thumbnail_panel_requests_visible_window() {
    let h = mounted_with_document(10).await;

    h.viewer.set_navigation_panel(NavigationPanel::Thumbnails).await.unwrap();
    settle().await;

    assert_eq!(h.viewer.ui_state().navigation_panel(), NavigationPanel::Thumbnails);
    assert_eq!(h.engine.rendered_pages(), (1..=6).collect::<Vec<_>>());
}

// ---- outline, search, view ------------------------------------------------

#[tokio::test(start_paused = true)]
async fn outline_panel_loads_outline_once() {
    let h = mounted_with_document(10).await;
    h.engine.set_outline(vec![OutlineNode {
        title: "Introduction".to_string(),
        page: Some(1),
        children: vec![],
    }]);

    h.viewer.set_navigation_panel(NavigationPanel::Outline).await.unwrap();
    h.viewer.set_navigation_panel(NavigationPanel::Hidden).await.unwrap();
    h.viewer.set_navigation_panel(NavigationPanel::Outline).await.unwrap();

    assert_eq!(h.viewer.ui_state().outline()[0].title, "Introduction");
    let outline_calls = h.engine.calls().iter().filter(|c| **c == EngineCall::Outline).count();
    assert_eq!(outline_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn search_state_follows_commands() {
    let h = mounted_with_document(3).await;

    assert!(h.viewer.start_search("needle"));
    assert_eq!(h.viewer.ui_state().search(), Some("needle"));
    assert!(h.viewer.next_search_match());
    assert!(h.viewer.end_search());
    assert!(h.viewer.ui_state().search().is_none());

    let calls = h.engine.calls();
    assert!(calls.contains(&EngineCall::StartSearch("needle".to_string())));
    assert!(calls.contains(&EngineCall::NextSearchMatch));
    assert!(calls.contains(&EngineCall::EndSearch));
}

#[tokio::test(start_paused = true)]
async fn rotation_steps_from_engine_rotation() {
    let h = mounted_with_document(3).await;

    h.viewer.rotate_clockwise();
    h.viewer.rotate_clockwise();
    h.viewer.rotate_counter_clockwise();

    let rotations: Vec<_> = h
        .engine
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            EngineCall::SetRotation(rotation) => Some(rotation),
            _ => None,
        })
        .collect();
    assert_eq!(
        rotations,
        vec![Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg90]
    );
}

#[tokio::test(start_paused = true)]
async fn engine_view_events_update_state() {
    let h = mounted_with_document(3).await;

    h.engine.emit(EngineEvent::Zoom(2.0));
    h.engine.emit(EngineEvent::PageChanged(3));
    settle().await;

    let state = h.viewer.ui_state();
    assert!((state.view().zoom - 2.0).abs() < f32::EPSILON);
    assert_eq!(state.view().current_page, 3);
}

// ---- listeners ------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn removed_listener_stops_receiving() {
    let h = harness(1);
    h.viewer.mount(Some(CONTAINER)).unwrap();
    let (busy, listener) = record(&h.viewer, ViewerEventKind::BusyState);

    h.engine.emit(EngineEvent::BusyState(true));
    settle().await;
    h.viewer.remove_event_listener(ViewerEventKind::BusyState, &listener);
    h.engine.emit(EngineEvent::BusyState(false));
    settle().await;

    assert_eq!(*busy.lock(), vec![ViewerEvent::BusyState(true)]);
    assert!(!h.viewer.ui_state().busy());
}

#[tokio::test(start_paused = true)]
async fn engine_errors_reach_error_listeners() {
    let h = harness(1);
    h.viewer.mount(Some(CONTAINER)).unwrap();
    let (errors, _listener) = record(&h.viewer, ViewerEventKind::Error);

    h.engine.emit(EngineEvent::Error("font missing".to_string()));
    settle().await;

    let errors = errors.lock();
    assert!(matches!(&errors[..], [ViewerEvent::Error(report)] if report.code == "engine" && report.message == "font missing"));
}

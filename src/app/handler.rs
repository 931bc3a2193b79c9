//! Engine event handling and UI state transitions.
//!
//! This module translates [`EngineEvent`]s into [`UiState`] mutations and a
//! list of [`Effect`]s. It is a pure function of its inputs: no timers, no
//! engine calls and no listener dispatch happen here, which keeps every
//! transition testable without a runtime.
//!
//! # Event Mapping
//!
//! - **Visibility**: `FirstVisiblePage`, `LastVisiblePage` update the view and
//!   schedule a debounced thumbnail scan
//! - **View settings**: `Zoom`, `FitMode`, `PageLayoutMode`, `Rotation` only
//!   update the view
//! - **Navigation**: `PageChanged` updates the current page and refreshes any
//!   stale thumbnail in the spread now on screen
//! - **Editing**: `DocumentModified` raises the unsaved flag and marks the
//!   page's thumbnail stale
//! - **Host-facing**: `AppLoaded`, `BusyState`, `Error` are re-emitted to
//!   listeners

use super::{Effect, UiState};
use crate::domain::{ErrorReport, LayoutMode};
use crate::engine::EngineEvent;
use crate::events::ViewerEvent;

/// Applies `event` to `state` and returns the effects to execute, in order.
///
/// # Example
///
/// ```rust
/// use docviewer::app::{handle_engine_event, Effect, UiState};
/// use docviewer::engine::EngineEvent;
///
/// let mut state = UiState::default();
/// let effects = handle_engine_event(&mut state, &EngineEvent::FirstVisiblePage(4));
/// assert_eq!(effects, vec![Effect::ScheduleScan { from: 4, to: 4 }]);
/// ```
pub fn handle_engine_event(state: &mut UiState, event: &EngineEvent) -> Vec<Effect> {
    let _span = tracing::debug_span!("handle_engine_event", event = event.name()).entered();

    match event {
        EngineEvent::AppLoaded => {
            state.set_app_loaded(true);
            vec![Effect::Emit(ViewerEvent::AppLoaded)]
        }
        EngineEvent::FirstVisiblePage(page) => {
            state.update_view(|view| {
                view.first_visible_page = *page;
                view.last_visible_page = view.last_visible_page.max(*page);
            });
            scan_visible(state)
        }
        EngineEvent::LastVisiblePage(page) => {
            state.update_view(|view| {
                view.last_visible_page = *page;
                view.first_visible_page = view.first_visible_page.min(*page);
            });
            scan_visible(state)
        }
        EngineEvent::Zoom(zoom) => {
            state.update_view(|view| view.zoom = *zoom);
            vec![]
        }
        EngineEvent::FitMode(mode) => {
            state.update_view(|view| view.fit_mode = *mode);
            vec![]
        }
        EngineEvent::PageLayoutMode(mode) => {
            state.update_view(|view| view.layout_mode = *mode);
            vec![]
        }
        EngineEvent::Rotation(rotation) => {
            state.update_view(|view| view.rotation = *rotation);
            vec![]
        }
        EngineEvent::BusyState(busy) => {
            state.set_busy(*busy);
            vec![Effect::Emit(ViewerEvent::BusyState(*busy))]
        }
        EngineEvent::PageChanged(page) => {
            state.update_view(|view| view.current_page = *page);
            spread(*page, state.view().layout_mode)
                .into_iter()
                .filter(|&p| state.is_thumbnail_stale(p))
                .map(Effect::RefreshThumbnail)
                .collect()
        }
        EngineEvent::DocumentModified { page } => {
            if state.document().is_none() {
                tracing::debug!(page, "modification without an open document");
                return vec![];
            }
            state.mark_unsaved();
            state.mark_thumbnail_stale(*page);
            vec![]
        }
        EngineEvent::Error(message) => {
            tracing::warn!(%message, "engine reported an error");
            vec![Effect::Emit(ViewerEvent::Error(ErrorReport::engine(message.clone())))]
        }
    }
}

fn scan_visible(state: &UiState) -> Vec<Effect> {
    let view = state.view();
    vec![Effect::ScheduleScan {
        from: view.first_visible_page,
        to: view.last_visible_page,
    }]
}

/// Pages shown together with `page`, left page first.
///
/// Facing layouts show the first page alone and then pairs `(2, 3)`,
/// `(4, 5)`, and so on.
fn spread(page: u32, layout: LayoutMode) -> Vec<u32> {
    match layout {
        LayoutMode::Facing | LayoutMode::FacingContinuous if page > 1 => {
            let left = page - u32::from(page % 2 == 1);
            vec![left, left + 1]
        }
        _ => vec![page],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentMetadata, FitMode, Rotation, Thumbnail, ThumbnailState};

    fn thumb() -> ThumbnailState {
        ThumbnailState::Ready(Thumbnail {
            width: 1,
            height: 1,
            pixels: vec![0; 4],
        })
    }

    fn with_document(pages: u32) -> UiState {
        let mut state = UiState::default();
        state.load_document(DocumentMetadata::new("a.pdf", "application/pdf", pages));
        state
    }

    #[test]
    fn app_loaded_sets_flag_and_emits() {
        let mut state = UiState::default();
        let effects = handle_engine_event(&mut state, &EngineEvent::AppLoaded);
        assert!(state.app_loaded());
        assert_eq!(effects, vec![Effect::Emit(ViewerEvent::AppLoaded)]);
    }

    #[test]
    fn visible_range_changes_schedule_scans() {
        let mut state = UiState::default();
        handle_engine_event(&mut state, &EngineEvent::LastVisiblePage(9));
        let effects = handle_engine_event(&mut state, &EngineEvent::FirstVisiblePage(6));
        assert_eq!(effects, vec![Effect::ScheduleScan { from: 6, to: 9 }]);
        assert_eq!(state.view().first_visible_page, 6);
        assert_eq!(state.view().last_visible_page, 9);
    }

    #[test]
    fn first_page_beyond_last_drags_last_along() {
        let mut state = UiState::default();
        let effects = handle_engine_event(&mut state, &EngineEvent::FirstVisiblePage(12));
        assert_eq!(effects, vec![Effect::ScheduleScan { from: 12, to: 12 }]);
    }

    #[test]
    fn view_settings_update_state_without_effects() {
        let mut state = UiState::default();
        for event in [
            EngineEvent::Zoom(1.5),
            EngineEvent::FitMode(FitMode::ActualSize),
            EngineEvent::PageLayoutMode(LayoutMode::Facing),
            EngineEvent::Rotation(Rotation::Deg90),
        ] {
            assert!(handle_engine_event(&mut state, &event).is_empty());
        }
        let view = state.view();
        assert!((view.zoom - 1.5).abs() < f32::EPSILON);
        assert_eq!(view.fit_mode, FitMode::ActualSize);
        assert_eq!(view.layout_mode, LayoutMode::Facing);
        assert_eq!(view.rotation, Rotation::Deg90);
    }

    #[test]
    fn busy_state_is_mirrored_and_emitted() {
        let mut state = UiState::default();
        let effects = handle_engine_event(&mut state, &EngineEvent::BusyState(true));
        assert!(state.busy());
        assert_eq!(effects, vec![Effect::Emit(ViewerEvent::BusyState(true))]);
    }

    #[test]
    fn page_change_refreshes_only_stale_pages() {
        let mut state = with_document(10);
        state.set_thumbnail(3, thumb());
        assert!(handle_engine_event(&mut state, &EngineEvent::PageChanged(3)).is_empty());
        assert_eq!(state.view().current_page, 3);

        state.mark_thumbnail_stale(3);
        assert_eq!(
            handle_engine_event(&mut state, &EngineEvent::PageChanged(3)),
            vec![Effect::RefreshThumbnail(3)]
        );
    }

    #[test]
    fn facing_layout_refreshes_whole_spread() {
        let mut state = with_document(10);
        state.update_view(|v| v.layout_mode = LayoutMode::FacingContinuous);
        for page in [4, 5] {
            state.set_thumbnail(page, thumb());
            state.mark_thumbnail_stale(page);
        }
        assert_eq!(
            handle_engine_event(&mut state, &EngineEvent::PageChanged(5)),
            vec![Effect::RefreshThumbnail(4), Effect::RefreshThumbnail(5)]
        );
    }

    #[test]
    fn spreads_pair_even_with_following_odd() {
        assert_eq!(spread(1, LayoutMode::Facing), vec![1]);
        assert_eq!(spread(2, LayoutMode::Facing), vec![2, 3]);
        assert_eq!(spread(3, LayoutMode::Facing), vec![2, 3]);
        assert_eq!(spread(3, LayoutMode::Continuous), vec![3]);
    }

    #[test]
    fn modification_marks_unsaved_and_stale() {
        let mut state = with_document(4);
        state.set_thumbnail(2, thumb());

        let effects = handle_engine_event(&mut state, &EngineEvent::DocumentModified { page: 2 });
        assert!(effects.is_empty());
        assert!(state.has_unsaved_changes());
        assert!(state.is_thumbnail_stale(2));
    }

    #[test]
    fn modification_without_document_is_ignored() {
        let mut state = UiState::default();
        handle_engine_event(&mut state, &EngineEvent::DocumentModified { page: 1 });
        assert!(!state.has_unsaved_changes());
        assert_eq!(state.revision(), 0);
    }

    #[test]
    fn engine_error_is_emitted_but_not_stored() {
        let mut state = UiState::default();
        let effects = handle_engine_event(&mut state, &EngineEvent::Error("bad xref".into()));
        assert!(state.error().is_none());
        assert_eq!(
            effects,
            vec![Effect::Emit(ViewerEvent::Error(ErrorReport::engine("bad xref")))]
        );
    }
}

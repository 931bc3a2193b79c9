//! UI state store observed by the host's component tree.
//!
//! [`UiState`] is the single source of truth for what the toolbar, navigation
//! panel and modals display. Fields are private; every setter compares the new
//! value with the current one and bumps [`revision`](UiState::revision) only on
//! an actual change, so a host can re-render on revision changes alone.
//!
//! The controller hands out cloned snapshots; the live store is only mutated
//! by the controller and [`handle_engine_event`](super::handle_engine_event).

use crate::domain::{DocumentMetadata, ErrorReport, OutlineNode, ThumbnailState, ViewState};
use crate::Theme;
use std::collections::BTreeMap;

/// Which pane the navigation sidebar shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationPanel {
    #[default]
    Hidden,
    Outline,
    Thumbnails,
}

/// Password modal contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPrompt {
    /// A password was supplied and rejected; the modal shows a retry hint.
    pub retry: bool,
}

/// Snapshot-able UI state.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    revision: u64,
    app_loaded: bool,
    busy: bool,
    theme: Theme,
    breakpoint: Option<String>,
    navigation_panel: NavigationPanel,
    document: Option<DocumentMetadata>,
    view: ViewState,
    thumbnails: BTreeMap<u32, ThumbnailState>,
    outline: Vec<OutlineNode>,
    search: Option<String>,
    unsaved_prompt: bool,
    password_prompt: Option<PasswordPrompt>,
    error: Option<ErrorReport>,
}

/// Writes `value` into `field` and reports whether it changed.
fn replace<T: PartialEq>(field: &mut T, value: T, revision: &mut u64) -> bool {
    if *field == value {
        return false;
    }
    *field = value;
    *revision += 1;
    true
}

impl UiState {
    #[must_use]
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            ..Self::default()
        }
    }

    /// Monotonic change counter.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub const fn app_loaded(&self) -> bool {
        self.app_loaded
    }

    pub fn set_app_loaded(&mut self, loaded: bool) -> bool {
        replace(&mut self.app_loaded, loaded, &mut self.revision)
    }

    #[must_use]
    pub const fn busy(&self) -> bool {
        self.busy
    }

    pub fn set_busy(&mut self, busy: bool) -> bool {
        replace(&mut self.busy, busy, &mut self.revision)
    }

    #[must_use]
    pub const fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) -> bool {
        replace(&mut self.theme, theme, &mut self.revision)
    }

    #[must_use]
    pub fn breakpoint(&self) -> Option<&str> {
        self.breakpoint.as_deref()
    }

    pub fn set_breakpoint(&mut self, name: &str) -> bool {
        replace(&mut self.breakpoint, Some(name.to_string()), &mut self.revision)
    }

    #[must_use]
    pub const fn navigation_panel(&self) -> NavigationPanel {
        self.navigation_panel
    }

    pub fn set_navigation_panel(&mut self, panel: NavigationPanel) -> bool {
        replace(&mut self.navigation_panel, panel, &mut self.revision)
    }

    #[must_use]
    pub const fn document(&self) -> Option<&DocumentMetadata> {
        self.document.as_ref()
    }

    pub fn set_document(&mut self, document: Option<DocumentMetadata>) -> bool {
        replace(&mut self.document, document, &mut self.revision)
    }

    /// Flags the open document as edited. No-op without a document.
    pub fn mark_unsaved(&mut self) -> bool {
        match self.document.as_mut() {
            Some(doc) if !doc.has_unsaved_changes => {
                doc.has_unsaved_changes = true;
                self.revision += 1;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.document.as_ref().is_some_and(|doc| doc.has_unsaved_changes)
    }

    #[must_use]
    pub const fn view(&self) -> &ViewState {
        &self.view
    }

    /// Applies `update` to the view state, bumping the revision if anything
    /// changed.
    pub fn update_view(&mut self, update: impl FnOnce(&mut ViewState)) -> bool {
        let mut view = self.view.clone();
        update(&mut view);
        replace(&mut self.view, view, &mut self.revision)
    }

    #[must_use]
    pub fn thumbnail(&self, page: u32) -> Option<&ThumbnailState> {
        self.thumbnails.get(&page)
    }

    #[must_use]
    pub const fn thumbnails(&self) -> &BTreeMap<u32, ThumbnailState> {
        &self.thumbnails
    }

    /// True when `page` has a fresh thumbnail or a recorded failure.
    #[must_use]
    pub fn is_thumbnail_cached(&self, page: u32) -> bool {
        self.thumbnails.get(&page).is_some_and(ThumbnailState::is_cached)
    }

    #[must_use]
    pub fn is_thumbnail_stale(&self, page: u32) -> bool {
        self.thumbnails.get(&page).is_some_and(ThumbnailState::is_stale)
    }

    pub fn set_thumbnail(&mut self, page: u32, state: ThumbnailState) -> bool {
        if self.thumbnails.get(&page) == Some(&state) {
            return false;
        }
        self.thumbnails.insert(page, state);
        self.revision += 1;
        true
    }

    /// Marks a ready thumbnail as outdated. Returns false if there is nothing
    /// to mark.
    pub fn mark_thumbnail_stale(&mut self, page: u32) -> bool {
        let Some(current) = self.thumbnails.remove(&page) else {
            return false;
        };
        let changed = matches!(current, ThumbnailState::Ready(_));
        self.thumbnails.insert(page, current.into_stale());
        if changed {
            self.revision += 1;
        }
        changed
    }

    #[must_use]
    pub fn outline(&self) -> &[OutlineNode] {
        &self.outline
    }

    pub fn set_outline(&mut self, outline: Vec<OutlineNode>) -> bool {
        replace(&mut self.outline, outline, &mut self.revision)
    }

    /// Active search query, if a search is running.
    #[must_use]
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn set_search(&mut self, query: Option<String>) -> bool {
        replace(&mut self.search, query, &mut self.revision)
    }

    #[must_use]
    pub const fn unsaved_prompt(&self) -> bool {
        self.unsaved_prompt
    }

    pub fn set_unsaved_prompt(&mut self, visible: bool) -> bool {
        replace(&mut self.unsaved_prompt, visible, &mut self.revision)
    }

    #[must_use]
    pub const fn password_prompt(&self) -> Option<PasswordPrompt> {
        self.password_prompt
    }

    pub fn set_password_prompt(&mut self, prompt: Option<PasswordPrompt>) -> bool {
        replace(&mut self.password_prompt, prompt, &mut self.revision)
    }

    #[must_use]
    pub const fn error(&self) -> Option<&ErrorReport> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, error: Option<ErrorReport>) -> bool {
        replace(&mut self.error, error, &mut self.revision)
    }

    /// Installs a freshly opened document: new metadata, default view, and no
    /// thumbnails, outline, search, prompts or error left from the previous one.
    pub fn load_document(&mut self, document: DocumentMetadata) {
        self.clear_document();
        self.set_document(Some(document));
    }

    /// Removes everything tied to the current document.
    pub fn clear_document(&mut self) {
        self.set_document(None);
        self.update_view(|view| *view = ViewState::default());
        if !self.thumbnails.is_empty() {
            self.thumbnails.clear();
            self.revision += 1;
        }
        self.set_outline(Vec::new());
        self.set_search(None);
        self.set_unsaved_prompt(false);
        self.set_password_prompt(None);
        self.set_error(None);
    }

    /// Returns to the state of a freshly mounted viewer, keeping the theme and
    /// the revision counter.
    pub fn reset(&mut self) {
        let revision = self.revision + 1;
        *self = Self::new(self.theme);
        self.revision = revision;
    }
}

//! Document and view domain model.
//!
//! This module defines the value types shared between the engine boundary,
//! the UI state store, and the controller: document metadata, the view
//! settings the engine reports back, and per-page thumbnail state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metadata describing the currently open document.
///
/// Reset on every successful open. `has_unsaved_changes` is raised by the
/// engine's modification events and cleared by a successful open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub filename: String,
    pub mime_type: String,
    pub page_count: u32,
    pub has_unsaved_changes: bool,
}

impl DocumentMetadata {
    /// Creates metadata for a freshly opened document with no unsaved changes.
    #[must_use]
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, page_count: u32) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            page_count,
            has_unsaved_changes: false,
        }
    }
}

/// How the engine scales pages into the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    FitPage,
    #[default]
    FitWidth,
    ActualSize,
}

impl FitMode {
    /// Accepted option values, in the order they are documented.
    pub const NAMES: &'static [&'static str] = &["fit-page", "fit-width", "actual-size"];
}

impl FromStr for FitMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fit-page" => Ok(Self::FitPage),
            "fit-width" => Ok(Self::FitWidth),
            "actual-size" => Ok(Self::ActualSize),
            other => Err(format!("unknown fit mode '{other}'")),
        }
    }
}

/// How pages are arranged by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
    Single,
    #[default]
    Continuous,
    Facing,
    FacingContinuous,
}

impl LayoutMode {
    /// Accepted option values, in the order they are documented.
    pub const NAMES: &'static [&'static str] = &["single", "continuous", "facing", "facing-continuous"];
}

impl FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "continuous" => Ok(Self::Continuous),
            "facing" => Ok(Self::Facing),
            "facing-continuous" => Ok(Self::FacingContinuous),
            other => Err(format!("unknown layout mode '{other}'")),
        }
    }
}

/// Page rotation in quarter turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Accepted option values, in degrees.
    pub const NAMES: &'static [&'static str] = &["0", "90", "180", "270"];

    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Rotates a quarter turn clockwise.
    #[must_use]
    pub const fn clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }

    /// Rotates a quarter turn counter-clockwise.
    #[must_use]
    pub const fn counter_clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg270,
            Self::Deg90 => Self::Deg0,
            Self::Deg180 => Self::Deg90,
            Self::Deg270 => Self::Deg180,
        }
    }
}

impl FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "0" => Ok(Self::Deg0),
            "90" => Ok(Self::Deg90),
            "180" => Ok(Self::Deg180),
            "270" => Ok(Self::Deg270),
            other => Err(format!("unsupported rotation '{other}'")),
        }
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// View settings as last reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub zoom: f32,
    pub fit_mode: FitMode,
    pub layout_mode: LayoutMode,
    pub rotation: Rotation,
    pub current_page: u32,
    pub first_visible_page: u32,
    pub last_visible_page: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            fit_mode: FitMode::default(),
            layout_mode: LayoutMode::default(),
            rotation: Rotation::default(),
            current_page: 1,
            first_visible_page: 1,
            last_visible_page: 1,
        }
    }
}

/// A rendered page thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixel data, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

/// Cache entry for one page in the navigation panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailState {
    /// Rendered and up to date.
    Ready(Thumbnail),
    /// Rendered, but the page was modified since.
    Stale(Thumbnail),
    /// The last render failed; not retried automatically.
    Failed(String),
}

impl ThumbnailState {
    /// Whether the page should be skipped by range prefetching.
    ///
    /// Failed pages count as cached so that a broken page is not hammered on
    /// every scroll.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_))
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }

    /// Marks a rendered thumbnail stale; failed entries are left untouched.
    #[must_use]
    pub fn into_stale(self) -> Self {
        match self {
            Self::Ready(thumbnail) => Self::Stale(thumbnail),
            other => other,
        }
    }
}

/// Node of the document outline shown in the navigation panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineNode {
    pub title: String,
    /// Destination page, if the entry points into the document.
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineNode>,
}

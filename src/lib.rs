//! Docviewer: document lifecycle and thumbnail prefetch controller for
//! embeddable PDF viewers.
//!
//! Docviewer sits between a host UI (toolbar, navigation panel, modals) and an
//! opaque rendering engine that decodes and rasterizes documents. It provides:
//! - Asynchronous open/close/download with unsaved-changes confirmation
//! - Password prompts with retry on the bytes already read
//! - Typed, removable event listeners for host integration
//! - Sequential, debounced, cancellable thumbnail prefetching
//! - Responsive layout breakpoints derived from the container width

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! The crate follows a layered architecture pattern:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Host UI / component tree                           │  ← Caller
//! └─────────────────────────────────────────────────────┘
//!                        │ commands           ▲ events, UiState
//! ┌─────────────────────────────────────────────────────┐
//! │  Application Layer (app/)                           │  ← Controller
//! │  - Lifecycle state machine                          │
//! │  - Engine event → state + effects                   │
//! │  - UI state store                                   │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Prefetch      │   │ Events        │   │ Layout        │
//! │ (prefetch/)   │   │ (events/)     │   │ (layout/)     │
//! │ - Queue       │   │ - Hub         │   │ - Breakpoints │
//! │ - Debouncer   │   │ - Host kinds  │   │               │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Engine boundary (engine/)                          │  ← External
//! │  - RenderingEngine trait, EngineEvent channel       │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Infrastructure & Domain Layers                     │
//! │  - Sources, downloads, paths (infrastructure/)      │
//! │  - Errors and document types (domain/)              │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Observability (observability/)                     │
//! │  - tracing-subscriber with env filter               │
//! │  - Size-rotated log file                            │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`app`]: Controller, lifecycle state machine, engine event handling
//! - [`domain`]: Document types and errors
//! - [`engine`]: Rendering engine boundary
//! - [`events`]: Listener registry and host event kinds
//! - [`prefetch`]: Thumbnail queue and viewport debouncer
//! - [`layout`]: Breakpoint table and resolver
//! - [`infrastructure`]: Document sources, download targets, paths
//! - [`observability`]: Tracing initialization
//!
//! # Configuration
//!
//! Hosts pass options as a string map, or point at a TOML file:
//!
//! ```toml
//! [viewer]
//! fit_mode = "fit-width"
//! layout_mode = "continuous"
//! thumbnail_width = 120
//! thumbnail_height = 160
//! log_level = "debug"
//!
//! [[breakpoints]]
//! name = "desktop"
//! min_width = 1024
//!
//! [[breakpoints]]
//! name = "mobile"
//! min_width = 0
//! ```
//!
//! # Runtime
//!
//! The controller expects a tokio runtime, typically current-thread. Engine
//! calls, content reads, and timers are the only suspension points; no lock is
//! held across them.

pub mod app;
pub mod domain;
pub mod engine;
pub mod events;
pub mod infrastructure;
pub mod layout;
pub mod observability;
pub mod prefetch;

pub use app::{
    DocumentPhase, LifecycleOutcome, NavigationPanel, UiState, UnsavedChoice, ViewerController,
};
pub use domain::{Result, ViewerError};
pub use events::{ViewerEvent, ViewerEventKind, ViewerListener};

use domain::{FitMode, LayoutMode, Rotation};
use layout::{Breakpoint, BreakpointTable};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Color scheme requested by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
    /// Follow the host's system preference.
    #[default]
    Auto,
}

impl Theme {
    pub const NAMES: &'static [&'static str] = &["light", "dark", "auto"];
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

/// Accepted `log_level` values.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const KNOWN_OPTIONS: &[&str] = &[
    "fit_mode",
    "layout_mode",
    "rotation",
    "theme",
    "log_level",
    "log_file",
    "thumbnail_width",
    "thumbnail_height",
    "prefetch_margin",
    "scan_delay_ms",
    "download_release_ms",
    "download_dir",
];

const THUMBNAIL_SIZE: RangeInclusive<u32> = 16..=1024;
const PREFETCH_MARGIN: RangeInclusive<u32> = 0..=50;
const SCAN_DELAY_MS: RangeInclusive<u32> = 0..=5000;
const DOWNLOAD_RELEASE_MS: RangeInclusive<u32> = 0..=60_000;

/// Viewer configuration.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use docviewer::Config;
///
/// let mut options = BTreeMap::new();
/// options.insert("fit_mode".to_string(), "fit-page".to_string());
/// options.insert("prefetch_margin".to_string(), "3".to_string());
///
/// let config = Config::from_options(&options)?;
/// assert_eq!(config.prefetch_margin, 3);
/// # Ok::<(), docviewer::ViewerError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial fit mode. Default: `fit-width`
    pub fit_mode: FitMode,

    /// Initial page layout. Default: `continuous`
    pub layout_mode: LayoutMode,

    /// Initial rotation in degrees. Default: `0`
    pub rotation: Rotation,

    pub theme: Theme,

    /// Tracing level: `trace`, `debug`, `info`, `warn` or `error`.
    ///
    /// `RUST_LOG` takes precedence. Default: `info`
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr. Requires `log_level`.
    pub log_file: Option<PathBuf>,

    /// Thumbnail raster size in pixels. Default: 120 × 160
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,

    /// Pages prefetched on each side of the visible range. Default: 5
    pub prefetch_margin: u32,

    /// Quiet period before a viewport change triggers a scan. Default: 100 ms
    pub scan_delay: Duration,

    /// How long a staged download is kept before release. Default: 500 ms
    pub download_release: Duration,

    /// Download directory. Default: the platform download directory
    pub download_dir: Option<PathBuf>,

    pub breakpoints: BreakpointTable,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fit_mode: FitMode::default(),
            layout_mode: LayoutMode::default(),
            rotation: Rotation::default(),
            theme: Theme::default(),
            log_level: None,
            log_file: None,
            thumbnail_width: 120,
            thumbnail_height: 160,
            prefetch_margin: prefetch::debounce::DEFAULT_PREFETCH_MARGIN,
            scan_delay: prefetch::debounce::DEFAULT_SCAN_DELAY,
            download_release: Duration::from_millis(500),
            download_dir: None,
            breakpoints: BreakpointTable::default(),
        }
    }
}

/// On-disk layout of a TOML config file.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    viewer: BTreeMap<String, toml::Value>,
    #[serde(default)]
    breakpoints: Vec<Breakpoint>,
}

impl Config {
    /// Parses configuration from a string option map.
    ///
    /// # Parsing Rules
    ///
    /// - `fit_mode`, `layout_mode`, `rotation`, `theme`, `log_level`: one of the
    ///   allowed names
    /// - `thumbnail_width`, `thumbnail_height`: 16..=1024, and only together
    /// - `prefetch_margin`: 0..=50
    /// - `scan_delay_ms`: 0..=5000
    /// - `download_release_ms`: 0..=60000
    /// - `download_dir`, `log_file`: paths, `~` expanded; `log_file` requires
    ///   `log_level`
    ///
    /// Unknown keys are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::InvalidOptions`] for any value outside its
    /// allowed set or range, and for unpaired options.
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<Self> {
        for key in options.keys() {
            if !KNOWN_OPTIONS.contains(&key.as_str()) {
                tracing::warn!(option = %key, "ignoring unknown option");
            }
        }

        let defaults = Self::default();

        let (thumbnail_width, thumbnail_height) = match (
            parse_bounded(options, "thumbnail_width", THUMBNAIL_SIZE)?,
            parse_bounded(options, "thumbnail_height", THUMBNAIL_SIZE)?,
        ) {
            (Some(width), Some(height)) => (width, height),
            (None, None) => (defaults.thumbnail_width, defaults.thumbnail_height),
            _ => {
                return Err(ViewerError::InvalidOptions(
                    "thumbnail_width and thumbnail_height must be set together".to_string(),
                ))
            }
        };

        let log_level = match options.get("log_level") {
            Some(level) if LOG_LEVELS.contains(&level.as_str()) => Some(level.clone()),
            Some(level) => return Err(invalid("log_level", level, LOG_LEVELS)),
            None => None,
        };
        let log_file = options.get("log_file").map(|p| infrastructure::expand_tilde(p));
        if log_file.is_some() && log_level.is_none() {
            return Err(ViewerError::InvalidOptions(
                "log_file requires log_level".to_string(),
            ));
        }

        Ok(Self {
            fit_mode: parse_choice(options, "fit_mode", FitMode::NAMES)?.unwrap_or(defaults.fit_mode),
            layout_mode: parse_choice(options, "layout_mode", LayoutMode::NAMES)?
                .unwrap_or(defaults.layout_mode),
            rotation: parse_choice(options, "rotation", Rotation::NAMES)?.unwrap_or(defaults.rotation),
            theme: parse_choice(options, "theme", Theme::NAMES)?.unwrap_or(defaults.theme),
            log_level,
            log_file,
            thumbnail_width,
            thumbnail_height,
            prefetch_margin: parse_bounded(options, "prefetch_margin", PREFETCH_MARGIN)?
                .unwrap_or(defaults.prefetch_margin),
            scan_delay: parse_bounded(options, "scan_delay_ms", SCAN_DELAY_MS)?
                .map_or(defaults.scan_delay, |ms| Duration::from_millis(u64::from(ms))),
            download_release: parse_bounded(options, "download_release_ms", DOWNLOAD_RELEASE_MS)?
                .map_or(defaults.download_release, |ms| Duration::from_millis(u64::from(ms))),
            download_dir: options.get("download_dir").map(|p| infrastructure::expand_tilde(p)),
            breakpoints: defaults.breakpoints,
        })
    }

    /// Parses a TOML document with a `[viewer]` table of options and an
    /// optional `[[breakpoints]]` array.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::InvalidOptions`] for malformed TOML and for the
    /// same violations as [`from_options`](Self::from_options).
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(input).map_err(|e| ViewerError::InvalidOptions(e.to_string()))?;

        let options = file
            .viewer
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect::<BTreeMap<_, _>>();

        let mut config = Self::from_options(&options)?;
        if !file.breakpoints.is_empty() {
            config.breakpoints = BreakpointTable::new(file.breakpoints).ok_or_else(|| {
                ViewerError::InvalidOptions("breakpoint table is empty".to_string())
            })?;
        }
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let input = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&input)
    }

    /// Directory downloads are written to.
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(infrastructure::default_download_dir)
    }
}

fn invalid(key: &str, value: &str, allowed: &[&str]) -> ViewerError {
    ViewerError::InvalidOptions(format!(
        "{key} = '{value}' (expected one of: {})",
        allowed.join(", ")
    ))
}

fn parse_choice<T>(options: &BTreeMap<String, String>, key: &str, allowed: &[&str]) -> Result<Option<T>>
where
    T: FromStr,
{
    options
        .get(key)
        .map(|value| value.trim().parse::<T>().map_err(|_| invalid(key, value, allowed)))
        .transpose()
}

fn parse_bounded(
    options: &BTreeMap<String, String>,
    key: &str,
    range: RangeInclusive<u32>,
) -> Result<Option<u32>> {
    let Some(raw) = options.get(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u32>() {
        Ok(value) if range.contains(&value) => Ok(Some(value)),
        _ => Err(ViewerError::InvalidOptions(format!(
            "{key} = '{raw}' (expected {}..={})",
            range.start(),
            range.end()
        ))),
    }
}

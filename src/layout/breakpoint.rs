//! Named layout breakpoints selected from the container width.
//!
//! The toolbar and navigation panel collapse progressively as the container
//! narrows. Which tier applies is decided by [`BreakpointTable::resolve`], a
//! pure function; [`BreakpointResolver`] remembers the tier last applied so
//! that a resize within the same tier does not touch UI state.

use serde::Deserialize;

/// One tier of the table: active when the container is at least `min_width`
/// pixels wide.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Breakpoint {
    pub name: String,
    pub min_width: u32,
}

impl Breakpoint {
    #[must_use]
    pub fn new(name: impl Into<String>, min_width: u32) -> Self {
        Self {
            name: name.into(),
            min_width,
        }
    }
}

/// Breakpoints ordered widest-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointTable {
    entries: Vec<Breakpoint>,
}

impl Default for BreakpointTable {
    /// `wide` ≥ 1400, `medium` ≥ 1000, `narrow` ≥ 640, otherwise `compact`.
    fn default() -> Self {
        Self {
            entries: vec![
                Breakpoint::new("wide", 1400),
                Breakpoint::new("medium", 1000),
                Breakpoint::new("narrow", 640),
                Breakpoint::new("compact", 0),
            ],
        }
    }
}

impl BreakpointTable {
    /// Builds a table from entries in any order. Returns `None` for an empty
    /// table, which could never resolve.
    #[must_use]
    pub fn new(mut entries: Vec<Breakpoint>) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        entries.sort_by(|a, b| b.min_width.cmp(&a.min_width));
        Some(Self { entries })
    }

    /// Returns the name of the widest tier whose threshold fits in `width`,
    /// falling back to the narrowest tier.
    #[must_use]
    pub fn resolve(&self, width: u32) -> &str {
        self.entries
            .iter()
            .find(|bp| bp.min_width <= width)
            .or_else(|| self.entries.last())
            .map_or("", |bp| bp.name.as_str())
    }

    #[must_use]
    pub fn entries(&self) -> &[Breakpoint] {
        &self.entries
    }
}

/// Applies breakpoints on size changes, reporting only actual transitions.
#[derive(Debug, Clone, Default)]
pub struct BreakpointResolver {
    table: BreakpointTable,
    applied: Option<String>,
}

impl BreakpointResolver {
    #[must_use]
    pub const fn new(table: BreakpointTable) -> Self {
        Self {
            table,
            applied: None,
        }
    }

    /// Resolves `width` and returns the new tier name if it differs from the
    /// one applied last. Returns `None` when nothing changed.
    pub fn apply(&mut self, width: u32) -> Option<&str> {
        let resolved = self.table.resolve(width);
        if self.applied.as_deref() == Some(resolved) {
            return None;
        }
        tracing::debug!(width, breakpoint = resolved, "breakpoint changed");
        self.applied = Some(resolved.to_string());
        self.applied.as_deref()
    }

    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.applied.as_deref()
    }

    /// Forgets the applied tier so the next [`apply`](Self::apply) reports it.
    pub fn forget(&mut self) {
        self.applied = None;
    }
}

pub mod classifier;

pub use classifier::{classify, classify_final, Classified, Mode, Piece, PieceKind, ScanState};

use memchr::memmem;
use std::fmt;
use std::sync::{Arc, LazyLock};

pub const DEFAULT_START_MARKER: &str = "<think>";
pub const DEFAULT_END_MARKER: &str = "</think>";

static DEFAULT_MARKERS: LazyLock<Arc<ReasoningMarkers>> = LazyLock::new(|| {
    Arc::new(ReasoningMarkers::new(DEFAULT_START_MARKER, DEFAULT_END_MARKER))
});

/// The literal start/end delimiters of a reasoning segment, with prebuilt
/// substring finders.
///
/// Markers are immutable once built and are shared between transcoders
/// through an [`Arc`]. Both must be non-empty; configuration validation
/// enforces this before a `ReasoningMarkers` is built from user input.
pub struct ReasoningMarkers {
    start: Box<str>,
    end: Box<str>,
    start_finder: memmem::Finder<'static>,
    end_finder: memmem::Finder<'static>,
}

impl ReasoningMarkers {
    #[must_use]
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            start_finder: memmem::Finder::new(start.as_bytes()).into_owned(),
            end_finder: memmem::Finder::new(end.as_bytes()).into_owned(),
        }
    }

    /// Shared `<think>` / `</think>` markers.
    #[must_use]
    pub fn think() -> Arc<Self> {
        Arc::clone(&DEFAULT_MARKERS)
    }

    #[must_use]
    pub fn start(&self) -> &str {
        &self.start
    }

    #[must_use]
    pub fn end(&self) -> &str {
        &self.end
    }

    /// The marker that ends the current mode.
    #[inline]
    pub(crate) fn boundary(&self, mode: Mode) -> (&str, &memmem::Finder<'static>) {
        match mode {
            Mode::Normal => (&self.start, &self.start_finder),
            Mode::InReasoning => (&self.end, &self.end_finder),
        }
    }

    #[inline]
    pub(crate) fn contains_end(&self, text: &str) -> bool {
        self.end_finder.find(text.as_bytes()).is_some()
    }
}

impl Default for ReasoningMarkers {
    fn default() -> Self {
        Self::new(DEFAULT_START_MARKER, DEFAULT_END_MARKER)
    }
}

impl fmt::Debug for ReasoningMarkers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReasoningMarkers")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

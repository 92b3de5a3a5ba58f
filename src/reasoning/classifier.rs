use smallvec::SmallVec;

use super::ReasoningMarkers;

// Fragment classifier.
//
// A pure transition function over `(fragment, ScanState)`. It never buffers:
// a trailing partial marker is reported through `pending_len` and the caller
// prepends those bytes to the next fragment.
//
// Key invariants:
// - Pieces never span a marker; markers are scanned left to right, any number
//   per fragment.
// - One newline directly adjacent to a marker belongs to the marker's line
//   framing and is dropped, also when the marker and the newline arrive in
//   different fragments.
// - An end marker outside a reasoning segment (or a start marker inside one)
//   is literal text.

/// Which side of a reasoning segment the scanner is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    InReasoning,
}

impl Mode {
    #[inline]
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Mode::Normal => Mode::InReasoning,
            Mode::InReasoning => Mode::Normal,
        }
    }
}

/// Scanner state carried between fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanState {
    pub mode: Mode,
    /// The previous fragment ended exactly on a marker.
    pub at_marker_edge: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceKind {
    Reasoning,
    Visible,
}

/// A slice of a fragment on one side of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece<'a> {
    pub kind: PieceKind,
    pub text: &'a str,
    /// Set on the reasoning piece directly before an end marker. The text
    /// may be empty; the piece then only signals the segment close.
    pub closes_segment: bool,
}

impl<'a> Piece<'a> {
    #[inline]
    fn visible(text: &'a str) -> Self {
        Self {
            kind: PieceKind::Visible,
            text,
            closes_segment: false,
        }
    }

    #[inline]
    fn reasoning(text: &'a str, closes_segment: bool) -> Self {
        Self {
            kind: PieceKind::Reasoning,
            text,
            closes_segment,
        }
    }
}

/// Result of classifying one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified<'a> {
    pub pieces: SmallVec<[Piece<'a>; 4]>,
    pub state: ScanState,
    /// Number of trailing bytes of the input left unclassified because they
    /// may begin a marker completed by the next fragment.
    pub pending_len: usize,
    /// A visible piece contained the end marker.
    pub stray_end_marker: bool,
}

impl Classified<'_> {
    /// The unclassified tail of `input`, which must be the text that was
    /// classified.
    #[must_use]
    pub fn pending<'t>(&self, input: &'t str) -> &'t str {
        &input[input.len() - self.pending_len..]
    }

    #[must_use]
    pub fn closes_segment(&self) -> bool {
        self.pieces.iter().any(|piece| piece.closes_segment)
    }
}

/// Classify a mid-stream fragment.
#[must_use]
pub fn classify<'a>(
    fragment: &'a str,
    state: ScanState,
    markers: &ReasoningMarkers,
) -> Classified<'a> {
    scan(fragment, state, markers, true)
}

/// Classify the last text of a stream. Nothing is held back.
#[must_use]
pub fn classify_final<'a>(
    text: &'a str,
    state: ScanState,
    markers: &ReasoningMarkers,
) -> Classified<'a> {
    scan(text, state, markers, false)
}

fn scan<'a>(
    text: &'a str,
    state: ScanState,
    markers: &ReasoningMarkers,
    hold_partial: bool,
) -> Classified<'a> {
    let mut out = Classified {
        pieces: SmallVec::new(),
        state,
        pending_len: 0,
        stray_end_marker: false,
    };
    if text.is_empty() {
        return out;
    }

    let mut mode = state.mode;
    let mut at_marker_edge = false;
    let mut rest = if state.at_marker_edge {
        strip_leading_newline(text)
    } else {
        text
    };

    loop {
        let (marker, finder) = markers.boundary(mode);
        if let Some(pos) = finder.find(rest.as_bytes()) {
            let before = strip_trailing_newline(&rest[..pos]);
            match mode {
                Mode::Normal => {
                    if !before.is_empty() {
                        out.stray_end_marker |= markers.contains_end(before);
                        out.pieces.push(Piece::visible(before));
                    }
                }
                Mode::InReasoning => out.pieces.push(Piece::reasoning(before, true)),
            }
            mode = mode.flipped();
            rest = &rest[pos + marker.len()..];
            if rest.is_empty() {
                at_marker_edge = true;
                break;
            }
            rest = strip_leading_newline(rest);
            continue;
        }

        let held = if hold_partial {
            held_suffix_len(rest, marker)
        } else {
            0
        };
        let body = &rest[..rest.len() - held];
        if !body.is_empty() {
            match mode {
                Mode::Normal => {
                    out.stray_end_marker |= markers.contains_end(body);
                    out.pieces.push(Piece::visible(body));
                }
                Mode::InReasoning => out.pieces.push(Piece::reasoning(body, false)),
            }
        }
        out.pending_len = held;
        break;
    }

    out.state = ScanState {
        mode,
        at_marker_edge,
    };
    out
}

#[inline]
fn strip_leading_newline(text: &str) -> &str {
    text.strip_prefix('\n').unwrap_or(text)
}

#[inline]
fn strip_trailing_newline(text: &str) -> &str {
    text.strip_suffix('\n').unwrap_or(text)
}

/// Length of the longest suffix of `text` that could still grow into
/// `marker` (optionally preceded by its framing newline), or a lone trailing
/// newline.
///
/// The suffix always starts on a char boundary: it begins either with `\n`
/// or with the first byte of `marker`, which is a leading byte.
#[inline]
fn held_suffix_len(text: &str, marker: &str) -> usize {
    let bytes = text.as_bytes();
    let needle = marker.as_bytes();
    let longest = needle.len().saturating_sub(1).min(bytes.len());
    for len in (1..=longest).rev() {
        if bytes.ends_with(&needle[..len]) {
            let framed = bytes.len() > len && bytes[bytes.len() - len - 1] == b'\n';
            return len + usize::from(framed);
        }
    }
    usize::from(bytes.last() == Some(&b'\n'))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::fmt;

use geo::{coord, Rect};
use serde::Deserialize;
use tracing::debug;

use crate::logging::WORD_MATCHING;

/// A word on the page with its bounding box, origin at the top left.
#[derive(Debug, Clone, PartialEq)]
pub struct WordBox {
    pub text: String,
    pub bbox: Rect<f64>,
}

impl WordBox {
    pub fn new(text: impl Into<String>, x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        WordBox {
            text: text.into(),
            bbox: Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }),
        }
    }
}

impl fmt::Display for WordBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" ({:.2}, {:.2}, {:.2}, {:.2})",
            self.text,
            self.bbox.min().x,
            self.bbox.min().y,
            self.bbox.max().x,
            self.bbox.max().y
        )
    }
}

/// `(text, x0, y0, x1, y1)` as produced by word extraction tools.
#[derive(Debug, Clone, Deserialize)]
pub struct WordRecord(pub String, pub f64, pub f64, pub f64, pub f64);

impl From<WordRecord> for WordBox {
    fn from(WordRecord(text, x0, y0, x1, y1): WordRecord) -> Self {
        WordBox::new(text, x0, y0, x1, y1)
    }
}

/// Consecutive words sharing a highlighted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run<'a> {
    pub highlighted: bool,
    pub words: Vec<&'a str>,
}

impl Run<'_> {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Group words into maximal runs of equal highlighted state, in order.
pub fn group_runs<'a>(words: &[(&'a str, bool)]) -> Vec<Run<'a>> {
    words
        .chunk_by(|a, b| a.1 == b.1)
        .map(|chunk| Run {
            highlighted: chunk[0].1,
            words: chunk.iter().map(|(text, _)| *text).collect(),
        })
        .collect()
}

/// Merge highlighted runs separated by at most `max_skip_len` unhighlighted words.
///
/// Highlight strokes tend to wander off a word or two and come back; treating that as
/// one highlight, skipped words included, loses less than splitting it. Longer gaps end
/// a highlight. A short gap is kept only when a highlighted run follows it, so a short
/// gap at the start of the page is emitted but one after the last highlighted run is not.
pub fn merge_highlighted_runs(words: &[(&str, bool)], max_skip_len: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut pending_gap: Option<Vec<&str>> = None;

    for run in group_runs(words) {
        if run.highlighted {
            if let Some(gap) = pending_gap.take() {
                current.extend(gap);
            }
            current.extend(run.words);
        } else if run.len() <= max_skip_len {
            pending_gap = Some(run.words);
        } else {
            pending_gap = None;
            if !current.is_empty() {
                merged.push(current.join(" "));
                current.clear();
            }
        }
    }
    if !current.is_empty() {
        merged.push(current.join(" "));
    }

    debug!(
        target: WORD_MATCHING,
        words = words.len(),
        runs = merged.len(),
        max_skip_len,
        "Merged highlighted runs"
    );

    merged
}

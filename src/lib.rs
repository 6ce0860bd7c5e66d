pub mod classify;
pub mod clip;
pub mod config;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod logging;
pub mod matcher;
pub mod output;
pub mod parse;
#[cfg(feature = "render")]
pub mod render;
pub mod stroke;
pub mod tokenize;

use std::collections::BTreeMap;

use geo::MultiPolygon;
use lopdf::Document;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::classify::{classify_highlights, partition_regions};
use crate::clip::{clip_rects, ClipRect};
use crate::config::ExtractConfig;
use crate::error::Result;
use crate::geometry::{flip_y, merge_highlight_shapes};
use crate::layout::{merge_highlighted_runs, WordBox};
use crate::logging::HIGHLIGHT_STROKES;
use crate::matcher::{mark_highlighted_words, TextHighlight};
use crate::parse::{page_inputs, WordSource};
use crate::stroke::{contains_highlight_color, highlighter_shapes};

/// Everything the pipeline needs to know about one page.
#[derive(Debug, Clone, Default)]
pub struct PageInput {
    /// 1-based.
    pub page_number: u32,
    /// Value the y axis is flipped against, see [`parse::page_height`].
    pub page_height: f64,
    /// Raw content streams, each interpreted on its own.
    pub streams: Vec<Vec<u8>>,
    /// Words in reading order, origin top left.
    pub words: Vec<WordBox>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageHighlights {
    pub page_number: u32,
    pub text: Vec<String>,
    pub clips: Vec<ClipRect>,
}

/// Highlighted text and clips per 1-based page number.
///
/// Pages without highlights of a kind are absent from that map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Highlights {
    pub text: BTreeMap<u32, Vec<String>>,
    pub clips: BTreeMap<u32, Vec<ClipRect>>,
}

impl Highlights {
    pub fn insert(&mut self, page: PageHighlights) {
        if !page.text.is_empty() {
            self.text
                .entry(page.page_number)
                .or_default()
                .extend(page.text);
        }
        if !page.clips.is_empty() {
            self.clips
                .entry(page.page_number)
                .or_default()
                .extend(page.clips);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.clips.is_empty()
    }
}

/// Highlighter stroke shapes of a page, already in top-left page coordinates.
pub fn page_shapes(page: &PageInput) -> Result<Vec<MultiPolygon<f64>>> {
    let mut shapes = Vec::new();
    for content in &page.streams {
        if !contains_highlight_color(content) {
            continue;
        }
        shapes.extend(
            highlighter_shapes(content)?
                .iter()
                .map(|shape| flip_y(shape, page.page_height)),
        );
    }
    debug!(
        target: HIGHLIGHT_STROKES,
        page = page.page_number,
        shapes = shapes.len(),
        "Extracted highlighter shapes"
    );
    Ok(shapes)
}

pub fn process_page(page: &PageInput, config: &ExtractConfig) -> Result<PageHighlights> {
    let _span = info_span!("page", number = page.page_number).entered();

    let mut result = PageHighlights {
        page_number: page.page_number,
        ..Default::default()
    };

    let shapes = page_shapes(page)?;
    if shapes.is_empty() {
        return Ok(result);
    }

    let merged = merge_highlight_shapes(shapes)?;
    let regions = classify_highlights(merged, config.clip_area_threshold);
    let (textual, selections) = partition_regions(regions);

    result.clips = clip_rects(&selections);

    let highlight = TextHighlight::new(textual);
    if !highlight.is_empty() {
        let marked = mark_highlighted_words(&highlight, &page.words, config);
        result.text = merge_highlighted_runs(&marked, config.max_skip_len);
    }

    info!(
        text_highlights = result.text.len(),
        clips = result.clips.len(),
        "Processed page"
    );

    Ok(result)
}

/// Run the pipeline over independent pages, in parallel, failing on the first error.
pub fn extract_highlights(pages: Vec<PageInput>, config: &ExtractConfig) -> Result<Highlights> {
    config.validate()?;

    let results = pages
        .into_par_iter()
        .map(|page| process_page(&page, config))
        .collect::<Result<Vec<_>>>()?;

    let mut highlights = Highlights::default();
    for page in results {
        highlights.insert(page);
    }
    Ok(highlights)
}

/// Extract highlights from a loaded PDF, taking words from `words`.
pub fn extract_pdf_highlights(
    doc: &Document,
    words: &dyn WordSource,
    config: &ExtractConfig,
) -> Result<Highlights> {
    config.validate()?;
    let pages = page_inputs(doc, words)?;
    extract_highlights(pages, config)
}

use geo::{Area, Polygon};
use serde::Serialize;
use tracing::debug;

use crate::logging::HIGHLIGHT_GEOMETRY;

/// What a merged highlight shape was drawn to mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HighlightKind {
    /// Strokes over lines of text.
    Textual,
    /// A closed loop around a region to clip out as an image.
    Selection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightRegion {
    pub kind: HighlightKind,
    pub shape: Polygon<f64>,
}

/// A shape is a selection when it encloses exactly one hole larger than the threshold.
///
/// Smaller holes are gaps between sloppy strokes rather than a drawn loop.
pub fn classify_highlight(shape: &Polygon<f64>, clip_area_threshold: f64) -> HighlightKind {
    match shape.interiors() {
        [hole] => {
            let hole_area = Polygon::new(hole.clone(), vec![]).unsigned_area();
            if hole_area > clip_area_threshold {
                HighlightKind::Selection
            } else {
                HighlightKind::Textual
            }
        }
        _ => HighlightKind::Textual,
    }
}

pub fn classify_highlights(
    shapes: Vec<Polygon<f64>>,
    clip_area_threshold: f64,
) -> Vec<HighlightRegion> {
    shapes
        .into_iter()
        .map(|shape| {
            let kind = classify_highlight(&shape, clip_area_threshold);
            debug!(
                target: HIGHLIGHT_GEOMETRY,
                kind = ?kind,
                holes = shape.interiors().len(),
                "Classified highlight"
            );
            HighlightRegion { kind, shape }
        })
        .collect()
}

/// Split regions into textual and selection shapes, keeping their order.
pub fn partition_regions(regions: Vec<HighlightRegion>) -> (Vec<Polygon<f64>>, Vec<Polygon<f64>>) {
    let mut textual = Vec::new();
    let mut selections = Vec::new();
    for region in regions {
        match region.kind {
            HighlightKind::Textual => textual.push(region.shape),
            HighlightKind::Selection => selections.push(region.shape),
        }
    }
    (textual, selections)
}

use geo::{Area, BooleanOps, Intersects, MultiPolygon, Point, Polygon, Rect};
use tracing::{debug, trace};

use crate::config::{ExtractConfig, WordSelectionMethod};
use crate::layout::WordBox;
use crate::logging::WORD_MATCHING;

/// Combined textual highlight geometry of a page.
///
/// A word may be touched by several separate stroke fragments, so words are always
/// tested against all of them at once.
#[derive(Debug, Clone)]
pub struct TextHighlight {
    geometry: MultiPolygon<f64>,
}

impl TextHighlight {
    pub fn new(polygons: Vec<Polygon<f64>>) -> Self {
        TextHighlight {
            geometry: MultiPolygon::new(polygons),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }

    /// The box centre lies in or on the boundary of the highlight.
    pub fn contains_centroid(&self, word_box: &Rect<f64>) -> bool {
        self.geometry.intersects(&Point::from(word_box.center()))
    }

    /// Fraction of the box covered by the highlight; zero for degenerate boxes.
    pub fn coverage(&self, word_box: &Rect<f64>) -> f64 {
        let box_area = word_box.unsigned_area();
        if box_area <= 0.0 {
            return 0.0;
        }
        let word = MultiPolygon::new(vec![word_box.to_polygon()]);
        self.geometry.intersection(&word).unsigned_area() / box_area
    }

    pub fn selects(&self, word_box: &Rect<f64>, config: &ExtractConfig) -> bool {
        match config.word_selection_method {
            WordSelectionMethod::Centroid => self.contains_centroid(word_box),
            WordSelectionMethod::AreaRatio => self.coverage(word_box) > config.area_ratio,
        }
    }
}

/// Pair every word with whether the highlight selects it, keeping reading order.
pub fn mark_highlighted_words<'a>(
    highlight: &TextHighlight,
    words: &'a [WordBox],
    config: &ExtractConfig,
) -> Vec<(&'a str, bool)> {
    let marked: Vec<(&str, bool)> = words
        .iter()
        .map(|word| {
            let selected = highlight.selects(&word.bbox, config);
            trace!(target: WORD_MATCHING, word = %word, selected);
            (word.text.as_str(), selected)
        })
        .collect();

    debug!(
        target: WORD_MATCHING,
        method = %config.word_selection_method,
        words = words.len(),
        selected = marked.iter().filter(|(_, selected)| *selected).count(),
        "Matched words against highlights"
    );

    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, LineString};

    fn highlight() -> TextHighlight {
        let exterior = LineString::from(vec![
            (0.0, 0.0),
            (100.0, 0.0),
            (100.0, 20.0),
            (0.0, 20.0),
            (0.0, 0.0),
        ]);
        TextHighlight::new(vec![Polygon::new(exterior, vec![])])
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 })
    }

    #[test]
    fn centroid_inside_on_boundary_and_outside() {
        let hl = highlight();
        assert!(hl.contains_centroid(&rect(10.0, 5.0, 30.0, 15.0)));
        // centre at (50, 20), exactly on the top edge
        assert!(hl.contains_centroid(&rect(40.0, 15.0, 60.0, 25.0)));
        assert!(!hl.contains_centroid(&rect(10.0, 30.0, 30.0, 40.0)));
    }

    #[test]
    fn area_ratio_needs_more_than_half() {
        let hl = highlight();
        let config = ExtractConfig {
            word_selection_method: WordSelectionMethod::AreaRatio,
            ..Default::default()
        };
        // 60% covered
        assert!(hl.selects(&rect(10.0, 14.0, 20.0, 24.0), &config));
        // 40% covered
        assert!(!hl.selects(&rect(10.0, 16.0, 20.0, 26.0), &config));
        assert!(!hl.selects(&rect(10.0, 30.0, 20.0, 40.0), &config));
        assert!((hl.coverage(&rect(10.0, 14.0, 20.0, 24.0)) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn degenerate_boxes_are_never_covered() {
        assert_eq!(highlight().coverage(&rect(10.0, 10.0, 10.0, 15.0)), 0.0);
    }

    #[test]
    fn marks_words_in_order() {
        let words = vec![
            WordBox::new("in", 10.0, 5.0, 30.0, 15.0),
            WordBox::new("out", 10.0, 30.0, 30.0, 40.0),
            WordBox::new("in-again", 50.0, 5.0, 90.0, 15.0),
        ];
        let marked = mark_highlighted_words(&highlight(), &words, &ExtractConfig::default());
        assert_eq!(marked, vec![("in", true), ("out", false), ("in-again", true)]);
    }

    #[test]
    fn separate_fragments_count_together() {
        let piece = |x0: f64, x1: f64| {
            Polygon::new(
                LineString::from(vec![(x0, 0.0), (x1, 0.0), (x1, 10.0), (x0, 10.0), (x0, 0.0)]),
                vec![],
            )
        };
        let hl = TextHighlight::new(vec![piece(0.0, 5.0), piece(5.5, 12.0)]);
        let config = ExtractConfig {
            word_selection_method: WordSelectionMethod::AreaRatio,
            ..Default::default()
        };
        assert!(hl.selects(&rect(2.0, 0.0, 10.0, 10.0), &config));
    }
}

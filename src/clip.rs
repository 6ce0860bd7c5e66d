use geo::{BoundingRect, Polygon};
use image::RgbaImage;
use serde::Serialize;

use crate::error::Result;

/// Page region to rasterise for a selection, in whole page units, origin top left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClipRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl ClipRect {
    /// Smallest whole-unit rectangle containing the given bounds.
    pub fn round_out(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        ClipRect {
            x0: x0.floor(),
            y0: y0.floor(),
            x1: x1.ceil(),
            y1: y1.ceil(),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// Bounding rectangle of a selection's outer ring. The hole is not masked out.
pub fn clip_rect(selection: &Polygon<f64>) -> Option<ClipRect> {
    selection
        .exterior()
        .bounding_rect()
        .map(|rect| ClipRect::round_out(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
}

pub fn clip_rects(selections: &[Polygon<f64>]) -> Vec<ClipRect> {
    selections.iter().filter_map(clip_rect).collect()
}

/// Produces pixels for a clip of a page.
pub trait ClipRenderer {
    fn render_clip(&self, page_number: u32, clip: &ClipRect, zoom: f64) -> Result<RgbaImage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    #[test]
    fn rounds_outward() {
        let rect = ClipRect::round_out(10.2, 20.7, 30.1, 40.0);
        assert_eq!(
            rect,
            ClipRect {
                x0: 10.0,
                y0: 20.0,
                x1: 31.0,
                y1: 40.0
            }
        );
        assert_eq!(rect.width(), 21.0);
        assert_eq!(rect.height(), 20.0);
    }

    #[test]
    fn uses_the_exterior_bounds() {
        let square = |x: f64, y: f64, side: f64| {
            LineString::from(vec![
                (x, y),
                (x + side, y),
                (x + side, y + side),
                (x, y + side),
                (x, y),
            ])
        };
        let loop_shape = Polygon::new(square(5.5, 6.5, 100.0), vec![square(20.0, 20.0, 50.0)]);
        assert_eq!(
            clip_rects(&[loop_shape]),
            vec![ClipRect {
                x0: 5.0,
                y0: 6.0,
                x1: 106.0,
                y1: 107.0
            }]
        );
    }
}

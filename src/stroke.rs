use geo::{Coord, MultiPolygon};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::geometry::{buffer_polyline, CapStyle, JoinStyle};
use crate::logging::{HIGHLIGHT_STROKES, PDF_OPERATIONS};
use crate::tokenize::{decode_content, tokenize_graphics, Operation};

/// Stroking colour the annotation tool uses for its highlighter.
///
/// Compared as strings: the tool always writes exactly these digits.
pub const HIGHLIGHTER_COLOR: [&str; 3] = ["1", "0.952941", "0.658824"];

const IDENTITY_MATRIX: [&str; 6] = ["1", "0", "0", "1", "0", "0"];

/// Cheap test for whether a content stream can contain any highlighter stroke at all.
pub fn contains_highlight_color(content: &[u8]) -> bool {
    let needle = format!("{} RG", HIGHLIGHTER_COLOR.join(" "));
    let needle = needle.as_bytes();
    content.windows(needle.len()).any(|window| window == needle)
}

/// A straight segment polyline drawn in the highlighter colour.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub points: Vec<Coord<f64>>,
    /// Total width, not the distance from the centre line.
    pub width: f64,
    pub cap: CapStyle,
    pub join: JoinStyle,
}

impl Stroke {
    /// The area covered by the stroke.
    pub fn buffer(&self) -> MultiPolygon<f64> {
        buffer_polyline(&self.points, self.width / 2.0, self.cap, self.join)
    }
}

/// State of one open `RG ... S` bracket.
#[derive(Debug, Default)]
struct OpenStroke {
    start: Option<Coord<f64>>,
    points: Vec<Coord<f64>>,
    width: Option<f64>,
    cap: Option<CapStyle>,
    join: Option<JoinStyle>,
}

impl OpenStroke {
    fn finish(self) -> Result<Stroke> {
        let width = self
            .width
            .ok_or_else(|| malformed("expected a width before the stroke ends"))?;
        let cap = self
            .cap
            .ok_or_else(|| malformed("expected a cap style before the stroke ends"))?;
        let join = self
            .join
            .ok_or_else(|| malformed("expected a join style before the stroke ends"))?;
        let start = self
            .start
            .ok_or_else(|| malformed("line segments without a starting point"))?;
        if self.points.is_empty() {
            return Err(malformed("not enough points"));
        }

        let mut points = Vec::with_capacity(self.points.len() + 1);
        points.push(start);
        points.extend(self.points);
        Ok(Stroke {
            points,
            width,
            cap,
            join,
        })
    }
}

fn malformed(reason: &str) -> Error {
    Error::MalformedStroke(reason.to_string())
}

fn operand<'a>(op: &Operation<'a>, index: usize) -> Result<&'a str> {
    op.operands.get(index).copied().ok_or_else(|| {
        Error::MalformedStroke(format!(
            "operator {} is missing operand {}",
            op.operator, index
        ))
    })
}

fn number(op: &Operation, index: usize) -> Result<f64> {
    let raw = operand(op, index)?;
    raw.parse::<f64>().map_err(|_| {
        Error::MalformedStroke(format!("operator {} has non-numeric operand {raw:?}", op.operator))
    })
}

fn integer(op: &Operation, index: usize) -> Result<i64> {
    let raw = operand(op, index)?;
    raw.parse::<i64>().map_err(|_| {
        Error::MalformedStroke(format!("operator {} has non-integer operand {raw:?}", op.operator))
    })
}

fn width(op: &Operation) -> Result<f64> {
    let width = number(op, 0)?;
    if !(width.is_finite() && width > 0.0) {
        return Err(Error::MalformedStroke(format!("line width must be positive, got {width}")));
    }
    Ok(width)
}

fn point(op: &Operation) -> Result<Coord<f64>> {
    Ok(Coord {
        x: number(op, 0)?,
        y: number(op, 1)?,
    })
}

/// Reconstruct every highlighter stroke of a content stream.
///
/// Only the small subset of path construction the annotation tool emits is understood:
///
/// ```text
/// 1 0.952941 0.658824 RG   -- stroking colour, opens a stroke
/// 12.5480766 w             -- total line width
/// 1 J                      -- cap style
/// 1 j                      -- join style
/// 1 0 0 1 0 0 cm           -- must be the identity
/// 0 0 m                    -- the last move before the first line wins
/// 397.95938 614.77747 m
/// 397.48959 615.17413 l    -- straight segments only
/// S                        -- stroke, closes the bracket
/// ```
///
/// Everything outside an open bracket, and every other operator inside one, is ignored.
pub fn highlighter_strokes(content: &[u8]) -> Result<Vec<Stroke>> {
    let content = decode_content(content);
    let mut strokes = Vec::new();
    let mut open: Option<OpenStroke> = None;

    for op in tokenize_graphics(&content) {
        trace!(target: PDF_OPERATIONS, operator = op.operator, operands = ?op.operands);

        if op.operator == "RG" && op.operands_are(&HIGHLIGHTER_COLOR) {
            // Re-arming starts a new path but keeps the line style already set.
            open = Some(match open.take() {
                Some(previous) => OpenStroke {
                    width: previous.width,
                    cap: previous.cap,
                    join: previous.join,
                    ..Default::default()
                },
                None => OpenStroke::default(),
            });
            continue;
        }
        if op.operator == "S" {
            if let Some(finished) = open.take() {
                let stroke = finished.finish()?;
                debug!(
                    target: HIGHLIGHT_STROKES,
                    points = stroke.points.len(),
                    width = stroke.width,
                    cap = ?stroke.cap,
                    join = ?stroke.join,
                    "Highlighter stroke"
                );
                strokes.push(stroke);
            }
            continue;
        }
        let Some(stroke) = open.as_mut() else {
            continue;
        };

        match op.operator {
            "m" => stroke.start = Some(point(&op)?),
            "l" => stroke.points.push(point(&op)?),
            "w" => stroke.width = Some(width(&op)?),
            "J" => stroke.cap = Some(CapStyle::try_from(integer(&op, 0)?)?),
            "j" => stroke.join = Some(JoinStyle::try_from(integer(&op, 0)?)?),
            "cm" => {
                if !op.operands_are(&IDENTITY_MATRIX) {
                    return Err(Error::UnsupportedTransform(op.operands.join(" ")));
                }
            }
            _ => {}
        }
    }

    Ok(strokes)
}

/// Highlighter strokes of a content stream, thickened to the area they cover.
pub fn highlighter_shapes(content: &[u8]) -> Result<Vec<MultiPolygon<f64>>> {
    Ok(highlighter_strokes(content)?
        .iter()
        .map(Stroke::buffer)
        .filter(|shape| !shape.0.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, Area, BoundingRect};

    const STROKE: &str = "q 1 0.952941 0.658824 RG 10 w 1 J 1 j /FXE2 gs 1 0 0 1 0 0 cm \
                          0 0 m 0 0 m 10 0 l S Q";

    #[test]
    fn detects_highlight_color() {
        assert!(contains_highlight_color(STROKE.as_bytes()));
        assert!(!contains_highlight_color(b"1 0.952941 0.658825 RG"));
        assert!(!contains_highlight_color(b""));
    }

    #[test]
    fn reconstructs_a_stroke() {
        let strokes = highlighter_strokes(STROKE.as_bytes()).unwrap();
        assert_eq!(
            strokes,
            vec![Stroke {
                points: vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 0.0 }],
                width: 10.0,
                cap: CapStyle::Round,
                join: JoinStyle::Round,
            }]
        );

        let shapes = highlighter_shapes(STROKE.as_bytes()).unwrap();
        assert_eq!(shapes.len(), 1);
        let bounds = shapes[0].bounding_rect().unwrap();
        assert!((bounds.min().x + 5.0).abs() < 1e-6);
        assert!((bounds.max().x - 15.0).abs() < 1e-6);
        assert!((bounds.max().y - 5.0).abs() < 1e-6);
        let area = shapes[0].unsigned_area();
        assert!((area - (100.0 + std::f64::consts::PI * 25.0)).abs() < 0.5);
    }

    #[test]
    fn later_move_replaces_the_start() {
        let content = "1 0.952941 0.658824 RG 2 w 2 J 3 j 5 5 m 0 0 m 1 0 l 1 1 l S";
        let strokes = highlighter_strokes(content.as_bytes()).unwrap();
        assert_eq!(strokes[0].points[0], coord! { x: 0.0, y: 0.0 });
        assert_eq!(strokes[0].points.len(), 3);
        assert_eq!(strokes[0].cap, CapStyle::Flat);
        assert_eq!(strokes[0].join, JoinStyle::Bevel);
    }

    #[test]
    fn other_colors_are_ignored() {
        let content = STROKE.replace("0.658824", "0.65882");
        assert!(highlighter_strokes(content.as_bytes()).unwrap().is_empty());

        let numerically_equal = STROKE.replace("1 0.952941", "1.0 0.952941");
        assert!(highlighter_strokes(numerically_equal.as_bytes())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn operators_outside_a_stroke_are_inert() {
        let content = format!("2 0 0 2 0 0 cm 0 0 m 5 5 l S {STROKE} 9 9 m S 0.5 0 0 1 0 0 cm");
        assert_eq!(highlighter_strokes(content.as_bytes()).unwrap().len(), 1);
    }

    #[test]
    fn multiple_strokes() {
        let content = format!("{STROKE} 0 0 1 RG 1 w S {STROKE}");
        assert_eq!(highlighter_strokes(content.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn rejects_transforms() {
        let content = STROKE.replace("1 0 0 1 0 0 cm", "1 0 0 1 0 792 cm");
        let err = highlighter_strokes(content.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTransform(m) if m == "1 0 0 1 0 792"));
    }

    #[test]
    fn rejects_incomplete_strokes() {
        for content in [
            "1 0.952941 0.658824 RG 1 J 1 j 0 0 m 1 1 l S",
            "1 0.952941 0.658824 RG 1 w 1 j 0 0 m 1 1 l S",
            "1 0.952941 0.658824 RG 1 w 1 J 0 0 m 1 1 l S",
            "1 0.952941 0.658824 RG 1 w 1 J 1 j 0 0 m S",
            "1 0.952941 0.658824 RG 1 w 1 J 1 j 1 1 l S",
            "1 0.952941 0.658824 RG 1 w 0 J 1 j 0 0 m 1 1 l S",
            "1 0.952941 0.658824 RG w 1 J 1 j 0 0 m 1 1 l S",
            "1 0.952941 0.658824 RG -10 w 1 J 1 j 0 0 m 1 1 l S",
            "1 0.952941 0.658824 RG 0 w 1 J 1 j 0 0 m 1 1 l S",
            "1 0.952941 0.658824 RG NaN w 1 J 1 j 0 0 m 1 1 l S",
        ] {
            let err = highlighter_strokes(content.as_bytes()).unwrap_err();
            assert!(matches!(err, Error::MalformedStroke(_)), "{content}: {err}");
        }
    }

    #[test]
    fn rearming_keeps_the_line_style() {
        let content = "1 0.952941 0.658824 RG 4 w 1 J 3 j 7 7 m 8 8 l \
                       1 0.952941 0.658824 RG 0 0 m 10 0 l S";
        let strokes = highlighter_strokes(content.as_bytes()).unwrap();
        assert_eq!(
            strokes,
            vec![Stroke {
                points: vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 0.0 }],
                width: 4.0,
                cap: CapStyle::Round,
                join: JoinStyle::Bevel,
            }]
        );
    }
}

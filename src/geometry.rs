use geo::{
    BooleanOps, BoundingRect, Coord, Geometry, LineString, MapCoords, MultiPolygon, Polygon,
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::logging::HIGHLIGHT_GEOMETRY;

/// Segments used per full circle when approximating round caps and joins.
const CIRCLE_SEGMENTS: usize = 64;

/// Longest allowed mitre, as a multiple of the half width, before falling back to bevel.
const MITRE_LIMIT: f64 = 5.0;

const EPSILON: f64 = 1e-9;

/// Line end shape, numbered the way the annotation tool writes `J`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapStyle {
    Round,
    Flat,
    Square,
}

impl TryFrom<i64> for CapStyle {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            1 => Ok(CapStyle::Round),
            2 => Ok(CapStyle::Flat),
            3 => Ok(CapStyle::Square),
            other => Err(Error::MalformedStroke(format!("unknown cap style {other}"))),
        }
    }
}

/// Corner shape, numbered the way the annotation tool writes `j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStyle {
    Round,
    Mitre,
    Bevel,
}

impl TryFrom<i64> for JoinStyle {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            1 => Ok(JoinStyle::Round),
            2 => Ok(JoinStyle::Mitre),
            3 => Ok(JoinStyle::Bevel),
            other => Err(Error::MalformedStroke(format!("unknown join style {other}"))),
        }
    }
}

fn sub(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    Coord {
        x: a.x - b.x,
        y: a.y - b.y,
    }
}

fn add(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    Coord {
        x: a.x + b.x,
        y: a.y + b.y,
    }
}

fn scale(a: Coord<f64>, k: f64) -> Coord<f64> {
    Coord {
        x: a.x * k,
        y: a.y * k,
    }
}

fn cross(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

fn length(a: Coord<f64>) -> f64 {
    a.x.hypot(a.y)
}

fn polygon(points: Vec<Coord<f64>>) -> Polygon<f64> {
    Polygon::new(LineString::new(points), vec![])
}

pub fn disc(center: Coord<f64>, radius: f64) -> Polygon<f64> {
    let points = (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect();
    polygon(points)
}

/// Thicken a polyline into the area covered by a stroke of total width `2 * radius`.
///
/// The result is the union of one rectangle per segment, a join piece at every
/// interior vertex and a cap piece at both ends.
pub fn buffer_polyline(
    points: &[Coord<f64>],
    radius: f64,
    cap: CapStyle,
    join: JoinStyle,
) -> MultiPolygon<f64> {
    let mut path: Vec<Coord<f64>> = Vec::with_capacity(points.len());
    for &point in points {
        if path.last().map_or(true, |last| length(sub(point, *last)) > EPSILON) {
            path.push(point);
        }
    }

    let Some(&first) = path.first() else {
        return MultiPolygon::new(vec![]);
    };
    if path.len() == 1 {
        return match cap {
            CapStyle::Round => MultiPolygon::new(vec![disc(first, radius)]),
            CapStyle::Square => MultiPolygon::new(vec![polygon(vec![
                Coord { x: first.x - radius, y: first.y - radius },
                Coord { x: first.x + radius, y: first.y - radius },
                Coord { x: first.x + radius, y: first.y + radius },
                Coord { x: first.x - radius, y: first.y + radius },
            ])]),
            CapStyle::Flat => MultiPolygon::new(vec![]),
        };
    }

    let directions: Vec<Coord<f64>> = path
        .windows(2)
        .map(|pair| {
            let delta = sub(pair[1], pair[0]);
            scale(delta, 1.0 / length(delta))
        })
        .collect();
    let lengths: Vec<f64> = path
        .windows(2)
        .map(|pair| length(sub(pair[1], pair[0])))
        .collect();
    let last_segment = directions.len() - 1;

    let mut pieces = Vec::with_capacity(path.len() * 2);

    for (i, (pair, &dir)) in path.windows(2).zip(&directions).enumerate() {
        let normal = scale(Coord { x: -dir.y, y: dir.x }, radius);
        let mut start = pair[0];
        let mut end = pair[1];
        if cap == CapStyle::Square {
            if i == 0 {
                start = sub(start, scale(dir, radius));
            }
            if i == last_segment {
                end = add(end, scale(dir, radius));
            }
        }
        pieces.push(polygon(vec![
            add(start, normal),
            add(end, normal),
            sub(end, normal),
            sub(start, normal),
        ]));
    }

    for (i, vertex) in path.iter().enumerate().skip(1).take(last_segment) {
        let inset = (radius / 4.0).min(lengths[i - 1] / 2.0).min(lengths[i] / 2.0);
        if let Some(piece) =
            join_piece(*vertex, directions[i - 1], directions[i], radius, inset, join)
        {
            pieces.push(piece);
        }
    }

    if cap == CapStyle::Round {
        pieces.push(disc(first, radius));
        pieces.push(disc(path[path.len() - 1], radius));
    }

    union_all(pieces.into_iter().map(|p| MultiPolygon::new(vec![p])).collect())
}

/// Corner piece filling the outside of a turn at `vertex`.
///
/// Mitre and bevel pieces are anchored `inset` inside the overlap of the two segment
/// rectangles rather than at the vertex itself, so they overlap the rectangles with
/// positive area instead of touching them along an edge.
fn join_piece(
    vertex: Coord<f64>,
    incoming: Coord<f64>,
    outgoing: Coord<f64>,
    radius: f64,
    inset: f64,
    join: JoinStyle,
) -> Option<Polygon<f64>> {
    if join == JoinStyle::Round {
        return Some(disc(vertex, radius));
    }

    let turn = cross(incoming, outgoing);
    if turn.abs() < EPSILON && incoming.x * outgoing.x + incoming.y * outgoing.y > 0.0 {
        // Straight continuation, the segment rectangles already meet.
        return None;
    }

    // The outside of the corner is to the right of a left turn and vice versa.
    let side = if turn > 0.0 { -1.0 } else { 1.0 };
    let n_in = scale(Coord { x: -incoming.y, y: incoming.x }, side);
    let n_out = scale(Coord { x: -outgoing.y, y: outgoing.x }, side);
    let a = add(vertex, scale(n_in, radius));
    let b = add(vertex, scale(n_out, radius));

    let bisector = add(n_in, n_out);
    let bisector_len_sq = bisector.x * bisector.x + bisector.y * bisector.y;
    if bisector_len_sq <= EPSILON {
        // Full reversal: the outside edges are collinear and the rectangles cover the turn.
        return None;
    }
    let inner = sub(vertex, scale(bisector, inset / bisector_len_sq.sqrt()));

    if join == JoinStyle::Mitre {
        // |n_in + n_out| = 2 cos(half angle), mitre length = radius / cos(half angle)
        let mitre = scale(bisector, 2.0 * radius / bisector_len_sq);
        if length(mitre) <= MITRE_LIMIT * radius {
            return Some(polygon(vec![inner, a, add(vertex, mitre), b]));
        }
    }

    Some(polygon(vec![inner, a, b]))
}

/// Union a set of shapes with a balanced pairwise reduction.
pub fn union_all(mut shapes: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    if shapes.is_empty() {
        return MultiPolygon::new(vec![]);
    }
    while shapes.len() > 1 {
        let mut next = Vec::with_capacity(shapes.len() / 2 + 1);
        let mut iter = shapes.into_iter();
        while let Some(left) = iter.next() {
            match iter.next() {
                Some(right) => next.push(left.union(&right)),
                None => next.push(left),
            }
        }
        shapes = next;
    }
    shapes.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

/// Map between PDF user space (origin bottom left) and page space (origin top left).
///
/// Applying it twice returns the original geometry.
pub fn flip_y<G>(geometry: &G, page_height: f64) -> G
where
    G: MapCoords<f64, f64, Output = G>,
{
    geometry.map_coords(|Coord { x, y }| Coord {
        x,
        y: page_height - y,
    })
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Treat a single polygon and a multi-polygon alike as a list of polygons.
pub fn into_polygons(geometry: Geometry<f64>) -> Result<Vec<Polygon<f64>>> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(vec![polygon]),
        Geometry::MultiPolygon(multi) => Ok(multi.0),
        other => Err(Error::UnexpectedGeometryKind(geometry_kind(&other))),
    }
}

/// Union every stroke shape of a page and split the result into disjoint polygons,
/// ordered top to bottom, then left to right.
pub fn merge_highlight_shapes(shapes: Vec<MultiPolygon<f64>>) -> Result<Vec<Polygon<f64>>> {
    let stroke_count = shapes.len();
    let union = union_all(shapes);
    let mut polygons = into_polygons(Geometry::MultiPolygon(union))?;

    polygons.sort_by(|a, b| {
        let (a, b) = (a.bounding_rect(), b.bounding_rect());
        let key = |r: Option<geo::Rect<f64>>| r.map(|r| (r.min().y, r.min().x));
        match (key(a), key(b)) {
            (Some(a), Some(b)) => a
                .0
                .partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)),
            (a, b) => a.is_some().cmp(&b.is_some()),
        }
    });

    debug!(
        target: HIGHLIGHT_GEOMETRY,
        strokes = stroke_count,
        polygons = polygons.len(),
        "Merged highlight strokes"
    );

    Ok(polygons)
}

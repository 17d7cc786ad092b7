//! Planar geometry tests for `$geoWithin` / `$geoIntersects`
//!
//! Coordinates are treated as a flat plane. Boundary points count as inside.

use serde_json::Value;

type Point = [f64; 2];

/// A geometry read from a document or a query region
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Shape {
    Point(Point),
    LineString(Vec<Point>),
    Polygon(Vec<Vec<Point>>),
    MultiPolygon(Vec<Vec<Vec<Point>>>),
}

impl Shape {
    /// Reads a GeoJSON geometry or a legacy `[x, y]` pair
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(_) => point(value).map(Shape::Point),
            Value::Object(map) => {
                let coordinates = map.get("coordinates")?;
                match map.get("type")?.as_str()? {
                    "Point" => point(coordinates).map(Shape::Point),
                    "LineString" => line(coordinates).map(Shape::LineString),
                    "Polygon" => rings(coordinates).map(Shape::Polygon),
                    "MultiPolygon" => coordinates
                        .as_array()?
                        .iter()
                        .map(rings)
                        .collect::<Option<Vec<_>>>()
                        .map(Shape::MultiPolygon),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Reads the `{"$geometry": ...}` operand of a geo operator
    pub(crate) fn from_operand(operand: &Value) -> Option<Self> {
        Self::from_value(operand.get("$geometry")?)
    }

    fn vertices(&self) -> Vec<Point> {
        match self {
            Shape::Point(p) => vec![*p],
            Shape::LineString(points) => points.clone(),
            Shape::Polygon(rings) => rings.iter().flatten().copied().collect(),
            Shape::MultiPolygon(polygons) => polygons.iter().flatten().flatten().copied().collect(),
        }
    }

    fn segments(&self) -> Vec<(Point, Point)> {
        let chains: Vec<&Vec<Point>> = match self {
            Shape::Point(_) => Vec::new(),
            Shape::LineString(points) => vec![points],
            Shape::Polygon(rings) => rings.iter().collect(),
            Shape::MultiPolygon(polygons) => polygons.iter().flatten().collect(),
        };
        chains
            .into_iter()
            .flat_map(|chain| chain.windows(2).map(|w| (w[0], w[1])))
            .collect()
    }

    fn polygons(&self) -> Vec<&[Vec<Point>]> {
        match self {
            Shape::Polygon(rings) => vec![rings.as_slice()],
            Shape::MultiPolygon(polygons) => polygons.iter().map(Vec::as_slice).collect(),
            _ => Vec::new(),
        }
    }

    fn contains_point(&self, p: Point) -> bool {
        match self {
            Shape::Point(q) => *q == p,
            Shape::LineString(points) => points.windows(2).any(|w| on_segment(p, w[0], w[1])),
            _ => self.polygons().iter().any(|rings| polygon_contains(rings, p)),
        }
    }
}

/// Every vertex of `shape` lies inside the polygonal `region` and no edge of
/// `shape` crosses the region boundary. Touching the boundary is allowed.
pub(crate) fn within(shape: &Shape, region: &Shape) -> bool {
    if region.polygons().is_empty() {
        return false;
    }
    let vertices = shape.vertices();
    if vertices.is_empty() || !vertices.into_iter().all(|p| region.contains_point(p)) {
        return false;
    }
    let boundary = region.segments();
    !shape
        .segments()
        .into_iter()
        .any(|(p1, p2)| boundary.iter().any(|&(q1, q2)| segments_cross_properly(p1, p2, q1, q2)))
}

/// The two shapes share at least one point
pub(crate) fn intersects(a: &Shape, b: &Shape) -> bool {
    if a.vertices().into_iter().any(|p| b.contains_point(p))
        || b.vertices().into_iter().any(|p| a.contains_point(p))
    {
        return true;
    }
    let b_segments = b.segments();
    a.segments()
        .into_iter()
        .any(|(p1, p2)| b_segments.iter().any(|&(q1, q2)| segments_cross(p1, p2, q1, q2)))
}

fn point(value: &Value) -> Option<Point> {
    match value.as_array()?.as_slice() {
        [x, y] => Some([x.as_f64()?, y.as_f64()?]),
        _ => None,
    }
}

fn line(value: &Value) -> Option<Vec<Point>> {
    value.as_array()?.iter().map(point).collect()
}

fn rings(value: &Value) -> Option<Vec<Vec<Point>>> {
    value.as_array()?.iter().map(line).collect()
}

/// Outer ring contains `p` and no hole strictly contains it
fn polygon_contains(rings: &[Vec<Point>], p: Point) -> bool {
    let Some((outer, holes)) = rings.split_first() else {
        return false;
    };
    if !ring_contains(outer, p) {
        return false;
    }
    !holes
        .iter()
        .any(|hole| ring_contains(hole, p) && !on_ring(hole, p))
}

fn on_ring(ring: &[Point], p: Point) -> bool {
    ring.windows(2).any(|w| on_segment(p, w[0], w[1]))
}

/// Ray casting, boundary inclusive
fn ring_contains(ring: &[Point], p: Point) -> bool {
    if on_ring(ring, p) {
        return true;
    }
    let mut inside = false;
    for w in ring.windows(2) {
        let ([xi, yi], [xj, yj]) = (w[0], w[1]);
        if (yi > p[1]) != (yj > p[1]) {
            let x_cross = xi + (p[1] - yi) * (xj - xi) / (yj - yi);
            if p[0] < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    orientation(a, b, p) == 0.0
        && p[0] >= a[0].min(b[0])
        && p[0] <= a[0].max(b[0])
        && p[1] >= a[1].min(b[1])
        && p[1] <= a[1].max(b[1])
}

/// Interiors intersect at a single point; shared endpoints do not count
fn segments_cross_properly(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

fn segments_cross(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    if segments_cross_properly(p1, p2, q1, q2) {
        return true;
    }
    on_segment(p1, q1, q2) || on_segment(p2, q1, q2) || on_segment(q1, p1, p2) || on_segment(q2, p1, p2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(min: f64, max: f64) -> Shape {
        Shape::Polygon(vec![vec![
            [min, min],
            [min, max],
            [max, max],
            [max, min],
            [min, min],
        ]])
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(Shape::from_value(&json!([1, 2])), Some(Shape::Point([1.0, 2.0])));
        assert_eq!(
            Shape::from_value(&json!({"type": "Point", "coordinates": [3, 4]})),
            Some(Shape::Point([3.0, 4.0]))
        );
        assert!(Shape::from_value(&json!({"type": "Circle", "coordinates": [0, 0]})).is_none());
        assert!(Shape::from_value(&json!("nowhere")).is_none());
    }

    #[test]
    fn test_point_within_square() {
        let region = square(0.0, 10.0);
        assert!(within(&Shape::Point([5.0, 5.0]), &region));
        assert!(within(&Shape::Point([0.0, 5.0]), &region));
        assert!(!within(&Shape::Point([11.0, 5.0]), &region));
    }

    #[test]
    fn test_hole_excludes_points() {
        let region = Shape::Polygon(vec![
            vec![[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]],
            vec![[4.0, 4.0], [4.0, 6.0], [6.0, 6.0], [6.0, 4.0], [4.0, 4.0]],
        ]);
        assert!(!within(&Shape::Point([5.0, 5.0]), &region));
        assert!(within(&Shape::Point([2.0, 2.0]), &region));
    }

    #[test]
    fn test_polygon_within_polygon() {
        assert!(within(&square(2.0, 3.0), &square(0.0, 10.0)));
        assert!(!within(&square(5.0, 15.0), &square(0.0, 10.0)));
    }

    #[test]
    fn test_overlapping_squares_intersect() {
        assert!(intersects(&square(5.0, 15.0), &square(0.0, 10.0)));
        assert!(!intersects(&square(20.0, 30.0), &square(0.0, 10.0)));
    }

    #[test]
    fn test_crossing_line_intersects() {
        let line = Shape::LineString(vec![[-5.0, 5.0], [15.0, 5.0]]);
        assert!(intersects(&line, &square(0.0, 10.0)));
        assert!(!within(&line, &square(0.0, 10.0)));
    }

    #[test]
    fn test_within_needs_polygonal_region() {
        assert!(!within(&Shape::Point([0.0, 0.0]), &Shape::Point([0.0, 0.0])));
    }

    #[test]
    fn test_within_concave_region_rejects_crossing_edges() {
        // U shape: a notch cut down from the top between x=1 and x=3
        let region = Shape::Polygon(vec![vec![
            [0.0, 0.0],
            [4.0, 0.0],
            [4.0, 4.0],
            [3.0, 4.0],
            [3.0, 1.0],
            [1.0, 1.0],
            [1.0, 4.0],
            [0.0, 4.0],
            [0.0, 0.0],
        ]]);
        let across_notch = Shape::LineString(vec![[0.5, 3.0], [3.5, 3.0]]);
        assert!(!within(&across_notch, &region));

        let along_base = Shape::LineString(vec![[0.5, 0.5], [3.5, 0.5]]);
        assert!(within(&along_base, &region));

        let inner_edge = Shape::LineString(vec![[1.0, 1.0], [3.0, 1.0]]);
        assert!(within(&inner_edge, &region));
    }
}

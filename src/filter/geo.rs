//! Geometry regions for geo predicates
//!
//! A region is built either from typed coordinates or from raw JSON
//! coordinates plus a shape-kind tag. Rings are always stored closed
//! (first position == last position).

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use super::errors::{FilterError, FilterResult};

/// An (x, y) coordinate pair
pub type Position = [f64; 2];

/// A linear ring of positions
pub type Ring = Vec<Position>;

/// Minimum positions in a closed ring
const MIN_RING_LEN: usize = 4;

/// How raw coordinates should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// One polygon: a single ring or a list of rings
    Polygon,
    /// A list of polygons
    MultiPolygon,
    /// `[min_x, min_y, max_x, max_y]`
    BBox,
}

impl ShapeKind {
    /// Returns the tag name
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Polygon => "polygon",
            ShapeKind::MultiPolygon => "multipolygon",
            ShapeKind::BBox => "bbox",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShapeKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "polygon" => Ok(ShapeKind::Polygon),
            "multipolygon" => Ok(ShapeKind::MultiPolygon),
            "bbox" => Ok(ShapeKind::BBox),
            other => Err(FilterError::InvalidGeometry(format!(
                "unknown shape kind '{}'",
                other
            ))),
        }
    }
}

/// A polygonal region used by `$geoWithin` and `$geoIntersects`
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Outer ring followed by holes
    Polygon(Vec<Ring>),
    /// Several polygons
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// Builds the rectangle (min_x,min_y)→(min_x,max_y)→(max_x,max_y)→(max_x,min_y)→(min_x,min_y)
    pub fn bbox(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> FilterResult<Self> {
        let corners = [min_x, min_y, max_x, max_y];
        if corners.iter().any(|c| !c.is_finite()) {
            return Err(FilterError::InvalidGeometry(
                "bbox coordinates must be finite".to_string(),
            ));
        }

        let ring = vec![
            [min_x, min_y],
            [min_x, max_y],
            [max_x, max_y],
            [max_x, min_y],
            [min_x, min_y],
        ];
        Ok(Geometry::Polygon(vec![ring]))
    }

    /// Builds a polygon, closing any ring that is left open
    pub fn polygon(rings: Vec<Ring>) -> FilterResult<Self> {
        Ok(Geometry::Polygon(close_polygon(rings)?))
    }

    /// Builds a multipolygon, closing any ring that is left open
    pub fn multi_polygon(polygons: Vec<Vec<Ring>>) -> FilterResult<Self> {
        if polygons.is_empty() {
            return Err(FilterError::InvalidGeometry(
                "multipolygon needs at least one polygon".to_string(),
            ));
        }
        let polygons = polygons
            .into_iter()
            .map(close_polygon)
            .collect::<FilterResult<Vec<_>>>()?;
        Ok(Geometry::MultiPolygon(polygons))
    }

    /// Builds a region from raw JSON coordinates interpreted by `kind`
    pub fn from_coordinates(kind: ShapeKind, coordinates: &Value) -> FilterResult<Self> {
        match kind {
            ShapeKind::BBox => {
                let values = parse_numbers(coordinates)?;
                match values.as_slice() {
                    [min_x, min_y, max_x, max_y] => Self::bbox(*min_x, *min_y, *max_x, *max_y),
                    _ => Err(FilterError::InvalidGeometry(format!(
                        "bbox needs 4 numbers, got {}",
                        values.len()
                    ))),
                }
            }
            ShapeKind::Polygon => {
                let rings = if is_single_ring(coordinates) {
                    vec![parse_ring(coordinates)?]
                } else {
                    parse_rings(coordinates)?
                };
                Self::polygon(rings)
            }
            ShapeKind::MultiPolygon => {
                let polygons = as_array(coordinates, "multipolygon")?
                    .iter()
                    .map(parse_rings)
                    .collect::<FilterResult<Vec<_>>>()?;
                Self::multi_polygon(polygons)
            }
        }
    }

    /// Returns the GeoJSON type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Returns the rings of every polygon
    pub fn polygons(&self) -> Vec<&[Ring]> {
        match self {
            Geometry::Polygon(rings) => vec![rings.as_slice()],
            Geometry::MultiPolygon(polygons) => polygons.iter().map(Vec::as_slice).collect(),
        }
    }

    /// Serializes as a GeoJSON geometry object
    pub fn to_geojson(&self) -> Value {
        let coordinates = match self {
            Geometry::Polygon(rings) => json!(rings),
            Geometry::MultiPolygon(polygons) => json!(polygons),
        };
        json!({
            "type": self.type_name(),
            "coordinates": coordinates,
        })
    }

    /// Wraps the geometry as the operand of a geo operator
    pub fn to_operand(&self) -> Value {
        json!({ "$geometry": self.to_geojson() })
    }
}

fn close_polygon(rings: Vec<Ring>) -> FilterResult<Vec<Ring>> {
    if rings.is_empty() {
        return Err(FilterError::InvalidGeometry(
            "polygon needs at least one ring".to_string(),
        ));
    }
    rings.into_iter().map(close_ring).collect()
}

fn close_ring(mut ring: Ring) -> FilterResult<Ring> {
    if ring.iter().flatten().any(|c| !c.is_finite()) {
        return Err(FilterError::InvalidGeometry(
            "ring coordinates must be finite".to_string(),
        ));
    }
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    if ring.len() < MIN_RING_LEN {
        return Err(FilterError::InvalidGeometry(format!(
            "ring needs at least {} positions once closed, got {}",
            MIN_RING_LEN,
            ring.len()
        )));
    }
    Ok(ring)
}

fn as_array<'a>(value: &'a Value, what: &str) -> FilterResult<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| FilterError::InvalidGeometry(format!("{} coordinates must be an array", what)))
}

fn parse_numbers(value: &Value) -> FilterResult<Vec<f64>> {
    as_array(value, "bbox")?
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| FilterError::InvalidGeometry(format!("'{}' is not a number", v)))
        })
        .collect()
}

fn parse_position(value: &Value) -> FilterResult<Position> {
    match value.as_array().map(Vec::as_slice) {
        Some([x, y]) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok([x, y]),
            _ => Err(FilterError::InvalidGeometry(format!(
                "position {} must hold two numbers",
                value
            ))),
        },
        _ => Err(FilterError::InvalidGeometry(format!(
            "position {} must be an [x, y] pair",
            value
        ))),
    }
}

fn parse_ring(value: &Value) -> FilterResult<Ring> {
    as_array(value, "ring")?.iter().map(parse_position).collect()
}

fn parse_rings(value: &Value) -> FilterResult<Vec<Ring>> {
    as_array(value, "polygon")?.iter().map(parse_ring).collect()
}

/// `[[x, y], ...]` rather than `[[[x, y], ...], ...]`
fn is_single_ring(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|ring| ring.first())
        .and_then(Value::as_array)
        .and_then(|position| position.first())
        .is_some_and(Value::is_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_ring_order() {
        let geometry = Geometry::from_coordinates(ShapeKind::BBox, &json!([0, 0, 10, 10])).unwrap();
        assert_eq!(
            geometry,
            Geometry::Polygon(vec![vec![
                [0.0, 0.0],
                [0.0, 10.0],
                [10.0, 10.0],
                [10.0, 0.0],
                [0.0, 0.0],
            ]])
        );
    }

    #[test]
    fn test_open_ring_is_closed() {
        let geometry =
            Geometry::from_coordinates(ShapeKind::Polygon, &json!([[0, 0], [0, 5], [5, 5]])).unwrap();
        let Geometry::Polygon(rings) = geometry else {
            panic!("expected polygon");
        };
        assert_eq!(rings[0].len(), 4);
        assert_eq!(rings[0].first(), rings[0].last());
    }

    #[test]
    fn test_closed_ring_untouched() {
        let ring = vec![[0.0, 0.0], [0.0, 5.0], [5.0, 5.0], [0.0, 0.0]];
        let geometry = Geometry::polygon(vec![ring.clone()]).unwrap();
        assert_eq!(geometry, Geometry::Polygon(vec![ring]));
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        let result = Geometry::polygon(vec![vec![[0.0, 0.0], [1.0, 1.0]]]);
        assert!(matches!(result, Err(FilterError::InvalidGeometry(_))));
    }

    #[test]
    fn test_bbox_needs_four_numbers() {
        let result = Geometry::from_coordinates(ShapeKind::BBox, &json!([0, 0, 10]));
        assert!(matches!(result, Err(FilterError::InvalidGeometry(_))));

        let result = Geometry::from_coordinates(ShapeKind::BBox, &json!([0, "a", 10, 10]));
        assert!(result.is_err());
    }

    #[test]
    fn test_multipolygon_from_coordinates() {
        let coords = json!([
            [[[0, 0], [0, 1], [1, 1], [0, 0]]],
            [[[5, 5], [5, 6], [6, 6]]]
        ]);
        let geometry = Geometry::from_coordinates(ShapeKind::MultiPolygon, &coords).unwrap();
        assert_eq!(geometry.polygons().len(), 2);
        assert_eq!(geometry.type_name(), "MultiPolygon");
    }

    #[test]
    fn test_shape_kind_parse() {
        assert_eq!("bbox".parse::<ShapeKind>().unwrap(), ShapeKind::BBox);
        assert_eq!("MultiPolygon".parse::<ShapeKind>().unwrap(), ShapeKind::MultiPolygon);
        assert!("circle".parse::<ShapeKind>().is_err());
    }

    #[test]
    fn test_geojson_operand() {
        let geometry = Geometry::bbox(0.0, 0.0, 1.0, 1.0).unwrap();
        let operand = geometry.to_operand();
        assert_eq!(operand["$geometry"]["type"], "Polygon");
        assert_eq!(operand["$geometry"]["coordinates"][0][1], json!([0.0, 1.0]));
    }
}

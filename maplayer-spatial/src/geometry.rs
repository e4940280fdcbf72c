//! Geometry classification, WKT parsing and construction helpers.
//!
//! Geometry construction is injected through the [`GeometryFactory`] trait
//! rather than shared global state, so the builder and query engine can be
//! handed a different factory (e.g. one with precision snapping) without
//! touching either.

use crate::envelope::Envelope;
use crate::error::{Result, SpatialError};
use geo::CoordsIter;
use geo_types::{Geometry, Point};
use serde::{Deserialize, Serialize};

/// Geometry type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GeometryKind {
    Point = 0,
    LineString = 1,
    Polygon = 2,
    MultiPoint = 3,
    MultiLineString = 4,
    MultiPolygon = 5,
    GeometryCollection = 6,
    /// Line, Rect and Triangle.
    Other = 7,
}

impl GeometryKind {
    /// Classify a geo-types Geometry.
    pub fn of(geom: &Geometry<f64>) -> Self {
        match geom {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::LineString(_) => GeometryKind::LineString,
            Geometry::Polygon(_) => GeometryKind::Polygon,
            Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
            Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryKind::GeometryCollection,
            Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => GeometryKind::Other,
        }
    }

    /// Check if this is a point type.
    pub fn is_point(&self) -> bool {
        matches!(self, GeometryKind::Point | GeometryKind::MultiPoint)
    }

    /// Check if this is a collection of sub-geometries.
    pub fn is_multi_part(&self) -> bool {
        matches!(
            self,
            GeometryKind::MultiPoint
                | GeometryKind::MultiLineString
                | GeometryKind::MultiPolygon
                | GeometryKind::GeometryCollection
        )
    }
}

/// Parse WKT string to geo-types Geometry.
pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    use std::str::FromStr;
    wkt::Wkt::from_str(wkt)
        .map_err(|e| SpatialError::WktParse(format!("{:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| SpatialError::WktParse(format!("{:?}", e)))
        })
}

/// True when every coordinate of the geometry is finite.
pub fn has_finite_coords(geom: &Geometry<f64>) -> bool {
    geom.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite())
}

/// Envelopes of the direct parts of a multi-part geometry.
///
/// Returns `None` for single-part geometries. Nested collections are not
/// flattened: each direct member contributes its whole envelope. Empty
/// parts are dropped.
pub fn part_envelopes(geom: &Geometry<f64>) -> Option<Vec<Envelope>> {
    let parts: Vec<Envelope> = match geom {
        Geometry::MultiPoint(mp) => mp
            .iter()
            .map(|p| Envelope::from_point(p.x(), p.y()))
            .collect(),
        Geometry::MultiLineString(mls) => mls
            .iter()
            .map(|ls| Envelope::from_geometry(&Geometry::LineString(ls.clone())))
            .collect(),
        Geometry::MultiPolygon(mp) => mp
            .iter()
            .map(|poly| Envelope::from_geometry(&Geometry::Polygon(poly.clone())))
            .collect(),
        Geometry::GeometryCollection(gc) => gc.iter().map(Envelope::from_geometry).collect(),
        _ => return None,
    };
    Some(parts.into_iter().filter(|e| !e.is_null()).collect())
}

/// Builds the geometries the query path needs from plain envelopes.
pub trait GeometryFactory: std::fmt::Debug {
    /// Geometry covering exactly `envelope`, or `None` for the null envelope.
    fn to_geometry(&self, envelope: &Envelope) -> Option<Geometry<f64>>;

    /// Envelope of `geom`.
    fn envelope(&self, geom: &Geometry<f64>) -> Envelope {
        Envelope::from_geometry(geom)
    }
}

/// Planar factory: rectangles become `Rect` geometries, zero-size
/// envelopes become points.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarGeometryFactory;

impl GeometryFactory for PlanarGeometryFactory {
    fn to_geometry(&self, envelope: &Envelope) -> Option<Geometry<f64>> {
        if envelope.is_null() {
            return None;
        }
        if envelope.width() == 0.0 && envelope.height() == 0.0 {
            return Some(Geometry::Point(Point::new(envelope.min_x, envelope.min_y)));
        }
        envelope.to_rect().map(Geometry::Rect)
    }
}

//! Coordinate transforms applied to feature geometry before indexing and
//! intersection tests.
//!
//! A transform is a pure function from one geometry to another. The layer
//! holds at most one; no transform means identity. Transformed geometries
//! are never cached: every build and every refinement re-applies the
//! transform.

use geo::{AffineOps, AffineTransform, MapCoords};
use geo_types::{Coord, Geometry};
use std::borrow::Cow;
use std::f64::consts::PI;

/// Maps geometry from the store's coordinate system into the layer's.
pub trait CoordinateTransform {
    fn apply(&self, geom: &Geometry<f64>) -> Geometry<f64>;
}

impl<F> CoordinateTransform for F
where
    F: Fn(&Geometry<f64>) -> Geometry<f64>,
{
    fn apply(&self, geom: &Geometry<f64>) -> Geometry<f64> {
        self(geom)
    }
}

impl std::fmt::Debug for dyn CoordinateTransform + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CoordinateTransform")
    }
}

/// Apply an optional transform, borrowing the input when there is none.
pub fn apply_transform<'a>(
    transform: Option<&dyn CoordinateTransform>,
    geom: &'a Geometry<f64>,
) -> Cow<'a, Geometry<f64>> {
    match transform {
        Some(t) => Cow::Owned(t.apply(geom)),
        None => Cow::Borrowed(geom),
    }
}

/// Affine transform (scale, rotate, translate, skew).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineCoordinateTransform {
    inner: AffineTransform<f64>,
}

impl AffineCoordinateTransform {
    pub fn new(inner: AffineTransform<f64>) -> Self {
        Self { inner }
    }

    /// Pure translation.
    pub fn translate(dx: f64, dy: f64) -> Self {
        Self::new(AffineTransform::translate(dx, dy))
    }

    /// Scale about the origin.
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(AffineTransform::scale(sx, sy, Coord { x: 0.0, y: 0.0 }))
    }
}

impl CoordinateTransform for AffineCoordinateTransform {
    fn apply(&self, geom: &Geometry<f64>) -> Geometry<f64> {
        geom.affine_transform(&self.inner)
    }
}

/// Spherical Web Mercator: WGS84 longitude/latitude degrees to EPSG:3857
/// metres.
///
/// Latitudes are clamped to the projection's valid band.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WebMercator;

impl WebMercator {
    pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;
    pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

    /// Project a single lon/lat pair.
    pub fn project(lon: f64, lat: f64) -> Coord<f64> {
        let lat = lat.clamp(-Self::MAX_LATITUDE, Self::MAX_LATITUDE);
        let x = Self::EARTH_RADIUS_METERS * lon.to_radians();
        let y = Self::EARTH_RADIUS_METERS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
        Coord { x, y }
    }
}

impl CoordinateTransform for WebMercator {
    fn apply(&self, geom: &Geometry<f64>) -> Geometry<f64> {
        geom.map_coords(|c| Self::project(c.x, c.y))
    }
}

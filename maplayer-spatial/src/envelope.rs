//! Axis-aligned envelopes.
//!
//! An [`Envelope`] is either a box with `min <= max` on both axes or the
//! null envelope, which has no extent. The null envelope is encoded as
//! `min = +inf, max = -inf` so that it is absorbed by unions and never
//! intersects anything.

use geo::BoundingRect;
use geo_types::{coord, Geometry, Rect};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create an envelope from two corners, in any order.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// The envelope with no extent.
    pub const fn null() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Envelope of a single point.
    pub fn from_point(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    /// Compute from a geo-types Geometry. Empty geometries give the null envelope.
    pub fn from_geometry(geom: &Geometry<f64>) -> Self {
        geom.bounding_rect()
            .map(Self::from_rect)
            .unwrap_or_else(Self::null)
    }

    /// Convert a geo-types Rect.
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        }
    }

    /// Convert to a geo-types Rect. `None` for the null envelope.
    pub fn to_rect(&self) -> Option<Rect<f64>> {
        if self.is_null() {
            return None;
        }
        Some(Rect::new(
            coord! { x: self.min_x, y: self.min_y },
            coord! { x: self.max_x, y: self.max_y },
        ))
    }

    /// True for the envelope with no extent.
    pub fn is_null(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// True when the envelope is non-null and every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        !self.is_null()
            && self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    pub fn width(&self) -> f64 {
        if self.is_null() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_null() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    /// The larger of width and height.
    pub fn max_extent(&self) -> f64 {
        self.width().max(self.height())
    }

    /// True when culling at `min_size` removes this envelope: its larger
    /// dimension is below a positive threshold. A zero, negative or NaN
    /// threshold culls nothing.
    pub fn is_smaller_than(&self, min_size: f64) -> bool {
        min_size > 0.0 && self.max_extent() < min_size
    }

    /// Center point, `None` for the null envelope.
    pub fn center(&self) -> Option<(f64, f64)> {
        if self.is_null() {
            return None;
        }
        Some((
            self.min_x + (self.max_x - self.min_x) / 2.0,
            self.min_y + (self.max_y - self.min_y) / 2.0,
        ))
    }

    /// Grow to include `other`. Null envelopes are ignored.
    pub fn expand_to_include(&mut self, other: &Envelope) {
        if other.is_null() {
            return;
        }
        if self.is_null() {
            *self = *other;
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Smallest envelope containing both.
    pub fn union(&self, other: &Envelope) -> Envelope {
        let mut out = *self;
        out.expand_to_include(other);
        out
    }

    /// Check if this envelope intersects another (touching counts).
    pub fn intersects(&self, other: &Envelope) -> bool {
        !self.is_null()
            && !other.is_null()
            && self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Check if this envelope fully contains another.
    pub fn contains(&self, other: &Envelope) -> bool {
        !self.is_null()
            && !other.is_null()
            && self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Split into four equal quadrants: NW, NE, SW, SE.
    ///
    /// The quadrants share their inner edges and together cover exactly
    /// this envelope.
    pub fn quadrants(&self) -> [Envelope; 4] {
        let mid_x = self.min_x + (self.max_x - self.min_x) / 2.0;
        let mid_y = self.min_y + (self.max_y - self.min_y) / 2.0;
        [
            Envelope::new(self.min_x, mid_y, mid_x, self.max_y),
            Envelope::new(mid_x, mid_y, self.max_x, self.max_y),
            Envelope::new(self.min_x, self.min_y, mid_x, mid_y),
            Envelope::new(mid_x, self.min_y, self.max_x, mid_y),
        ]
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::null()
    }
}

impl From<Rect<f64>> for Envelope {
    fn from(rect: Rect<f64>) -> Self {
        Self::from_rect(rect)
    }
}

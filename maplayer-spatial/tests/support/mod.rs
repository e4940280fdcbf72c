//! Shared fixtures for maplayer-spatial integration tests.

// Not every test crate uses every helper.
#![allow(dead_code)]

pub mod span_capture;

use geo::Intersects;
use geo_types::Geometry;
use maplayer_spatial::{
    Attributes, CoordinateTransform, Envelope, FeatureCollection, FeatureStore, Layer,
    QueryOptions,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

// =============================================================================
// Geometry builders
// =============================================================================

/// WKT for an axis-aligned square centred at (cx, cy).
pub fn square_wkt(cx: f64, cy: f64, size: f64) -> String {
    let h = size / 2.0;
    format!(
        "POLYGON(({} {}, {} {}, {} {}, {} {}, {} {}))",
        cx - h,
        cy - h,
        cx + h,
        cy - h,
        cx + h,
        cy + h,
        cx - h,
        cy + h,
        cx - h,
        cy - h,
    )
}

/// WKT for a hexagon centred at (cx, cy).
pub fn hexagon_wkt(cx: f64, cy: f64, size: f64) -> String {
    let r = size / 2.0;
    let mut coords = Vec::with_capacity(7);
    for i in 0..6 {
        let angle = (i as f64) * std::f64::consts::PI / 3.0;
        coords.push(format!("{} {}", cx + r * angle.cos(), cy + r * angle.sin()));
    }
    coords.push(coords[0].clone());
    format!("POLYGON(({}))", coords.join(", "))
}

fn named(name: &str) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("NAME".to_string(), json!(name));
    attrs
}

// =============================================================================
// Stores
// =============================================================================

/// Four 1x1 squares centred at (0,0), (10,0), (0,10), (10,10), in that order.
pub fn four_squares() -> FeatureCollection {
    let mut store = FeatureCollection::new();
    for (name, cx, cy) in [
        ("sw", 0.0, 0.0),
        ("se", 10.0, 0.0),
        ("nw", 0.0, 10.0),
        ("ne", 10.0, 10.0),
    ] {
        store.add_wkt(&square_wkt(cx, cy, 1.0), named(name)).unwrap();
    }
    store
}

/// `count` random features inside `[0, extent]²`: squares, hexagons, points
/// and lines, with a few two-part multipolygons mixed in.
pub fn random_store(seed: u64, count: usize, extent: f64) -> FeatureCollection {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut store = FeatureCollection::new();
    for i in 0..count {
        let cx = rng.gen_range(0.0..extent);
        let cy = rng.gen_range(0.0..extent);
        let size = rng.gen_range(0.01..extent / 10.0);
        let wkt = match i % 5 {
            0 => square_wkt(cx, cy, size),
            1 => hexagon_wkt(cx, cy, size),
            2 => format!("POINT({} {})", cx, cy),
            3 => format!("LINESTRING({} {}, {} {})", cx, cy, cx + size, cy - size),
            _ => {
                let ox = rng.gen_range(0.0..extent);
                let oy = rng.gen_range(0.0..extent);
                format!(
                    "MULTIPOLYGON(({}),({}))",
                    ring(cx, cy, size),
                    ring(ox, oy, size)
                )
            }
        };
        store.add_wkt(&wkt, named(&format!("f{i}"))).unwrap();
    }
    store
}

fn ring(cx: f64, cy: f64, size: f64) -> String {
    let square = square_wkt(cx, cy, size);
    square["POLYGON(".len()..square.len() - 1].to_string()
}

/// A random query rectangle inside `[-extent/10, extent * 1.1]²`.
pub fn random_region(rng: &mut SmallRng, extent: f64) -> Envelope {
    let lo = -extent / 10.0;
    let hi = extent * 1.1;
    Envelope::new(
        rng.gen_range(lo..hi),
        rng.gen_range(lo..hi),
        rng.gen_range(lo..hi),
        rng.gen_range(lo..hi),
    )
}

// =============================================================================
// Query helpers
// =============================================================================

/// Sorted feature indices returned by a layer query.
pub fn query_indices<S: FeatureStore>(
    layer: &mut Layer<S>,
    region: Envelope,
    options: QueryOptions,
) -> Vec<usize> {
    let mut out: Vec<usize> = layer
        .query_region(region, options)
        .unwrap()
        .map(|f| f.index)
        .collect();
    out.sort_unstable();
    out
}

/// Reference answer: every feature whose (transformed) geometry intersects
/// `region`, found by brute force without any envelope shortcuts.
pub fn brute_force(
    store: &dyn FeatureStore,
    transform: Option<&dyn CoordinateTransform>,
    region: Envelope,
) -> Vec<usize> {
    let Some(rect) = region.to_rect() else {
        return Vec::new();
    };
    let rect = Geometry::Rect(rect);
    (0..store.count())
        .filter(|&i| match store.geometry_at(i).unwrap() {
            Some(geom) => match transform {
                Some(t) => t.apply(&geom).intersects(&rect),
                None => geom.intersects(&rect),
            },
            None => false,
        })
        .collect()
}

//! Region queries over a feature store.
//!
//! [`QueryEngine`] answers "which features intersect this region?" by one of
//! three paths:
//!
//! ```text
//!   custom supplier registered? ──yes──► supplier result, verbatim
//!            │ no
//!            ▼
//!   index available and wanted? ──yes──► SpatialIndex::query (candidates)
//!            │ no                                │
//!            ▼                                   │
//!   linear scan: transform + envelope test       │
//!            │                                   │
//!            └──────────────┬────────────────────┘
//!                           ▼
//!            exact refinement (unless fast path)
//!                           ▼
//!                    RegionQuery iterator
//! ```
//!
//! Results are produced lazily by [`RegionQuery`]. Each query reads the
//! store as it is while iterating; there is no snapshot isolation.

use crate::config::ResolvedQueryOptions;
use crate::envelope::Envelope;
use crate::geometry::{has_finite_coords, GeometryFactory, PlanarGeometryFactory};
use crate::quadtree::SpatialIndex;
use crate::store::{Feature, FeatureStore};
use crate::transform::{apply_transform, CoordinateTransform};
use geo::Intersects;
use geo_types::{Geometry, Polygon, Rect};
use std::ops::Range;

/// The area a query is asked about.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRegion {
    Envelope(Envelope),
    Geometry(Geometry<f64>),
}

impl QueryRegion {
    /// Bounding envelope of the region.
    pub fn envelope(&self) -> Envelope {
        match self {
            QueryRegion::Envelope(env) => *env,
            QueryRegion::Geometry(geom) => Envelope::from_geometry(geom),
        }
    }

    /// True when the region covers exactly its own envelope.
    pub fn is_rectangular(&self) -> bool {
        matches!(
            self,
            QueryRegion::Envelope(_) | QueryRegion::Geometry(Geometry::Rect(_))
        )
    }

    /// True when every coordinate of the region is finite. The null
    /// envelope counts as finite.
    pub fn is_finite(&self) -> bool {
        match self {
            QueryRegion::Envelope(env) => env.is_null() || env.is_finite(),
            QueryRegion::Geometry(geom) => has_finite_coords(geom),
        }
    }

    fn to_geometry(&self, factory: &dyn GeometryFactory) -> Option<Geometry<f64>> {
        match self {
            QueryRegion::Envelope(env) => factory.to_geometry(env),
            QueryRegion::Geometry(geom) => Some(geom.clone()),
        }
    }
}

impl From<Envelope> for QueryRegion {
    fn from(env: Envelope) -> Self {
        QueryRegion::Envelope(env)
    }
}

impl From<Rect<f64>> for QueryRegion {
    fn from(rect: Rect<f64>) -> Self {
        QueryRegion::Envelope(Envelope::from_rect(rect))
    }
}

impl From<Geometry<f64>> for QueryRegion {
    fn from(geom: Geometry<f64>) -> Self {
        QueryRegion::Geometry(geom)
    }
}

impl From<Polygon<f64>> for QueryRegion {
    fn from(poly: Polygon<f64>) -> Self {
        QueryRegion::Geometry(Geometry::Polygon(poly))
    }
}

/// Replaces the built-in query path entirely.
///
/// When a supplier is registered its result is returned as-is; the index
/// and store are not consulted afterwards.
pub trait FeatureSupplier {
    fn features(&self, region: &QueryRegion, store: &dyn FeatureStore) -> Vec<Feature>;
}

impl<F> FeatureSupplier for F
where
    F: Fn(&QueryRegion, &dyn FeatureStore) -> Vec<Feature>,
{
    fn features(&self, region: &QueryRegion, store: &dyn FeatureStore) -> Vec<Feature> {
        self(region, store)
    }
}

/// Which path answered a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPath {
    Supplier,
    Index,
    LinearScan,
}

/// Statistics from a region query, updated as the iterator advances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    /// Candidates produced by the index, or features visited by a scan.
    pub candidates: usize,

    /// Candidates that passed the envelope test (scan path only; index
    /// candidates have already passed it).
    pub passed_envelope: usize,

    /// Number of exact intersection checks performed.
    pub exact_checks: usize,

    /// Number of features yielded so far.
    pub result_count: usize,
}

enum Source {
    Empty,
    Supplied(std::vec::IntoIter<Feature>),
    Candidates(std::vec::IntoIter<usize>),
    Scan(Range<usize>),
}

/// Lazy, single-pass sequence of features matching a region.
pub struct RegionQuery<'a> {
    source: Source,
    path: QueryPath,
    store: &'a dyn FeatureStore,
    transform: Option<&'a dyn CoordinateTransform>,
    factory: &'a dyn GeometryFactory,
    region_envelope: Envelope,
    /// Present when exact refinement applies.
    region_geometry: Option<Geometry<f64>>,
    min_feature_size: f64,
    stats: QueryStats,
}

impl<'a> RegionQuery<'a> {
    /// Path that produced this sequence.
    pub fn path(&self) -> QueryPath {
        self.path
    }

    /// Whether candidates are tested against their exact geometry.
    pub fn is_refined(&self) -> bool {
        self.region_geometry.is_some()
    }

    /// Statistics gathered so far.
    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    fn fetch(&self, index: usize) -> Option<Feature> {
        match self.store.feature_at(index) {
            Ok(feature) => Some(feature),
            Err(e) => {
                tracing::warn!(feature_index = index, error = %e, "Feature vanished during query");
                None
            }
        }
    }

    /// Exact test of an already transformed geometry.
    fn refine(&mut self, geom: &Geometry<f64>) -> bool {
        match &self.region_geometry {
            Some(region) => {
                self.stats.exact_checks += 1;
                geom.intersects(region)
            }
            None => true,
        }
    }

    fn next_candidate(&mut self, index: usize) -> Option<Feature> {
        let feature = self.fetch(index)?;
        if self.region_geometry.is_some() {
            let source = feature.geometry.clone()?;
            let geom = apply_transform(self.transform, &source);
            if !self.refine(&geom) {
                return None;
            }
        }
        Some(feature)
    }

    fn next_scanned(&mut self, index: usize) -> Option<Feature> {
        let feature = self.fetch(index)?;
        let source = feature.geometry.clone()?;
        let geom = apply_transform(self.transform, &source);
        // Same skip rule as the index build: one bad vertex excludes the
        // feature even when its envelope is finite.
        if !has_finite_coords(&geom) {
            return None;
        }

        let envelope = self.factory.envelope(&geom);
        if !envelope.is_finite() || !envelope.intersects(&self.region_envelope) {
            return None;
        }
        if envelope.is_smaller_than(self.min_feature_size) {
            return None;
        }
        self.stats.passed_envelope += 1;

        if !self.refine(&geom) {
            return None;
        }
        Some(feature)
    }
}

impl Iterator for RegionQuery<'_> {
    type Item = Feature;

    fn next(&mut self) -> Option<Feature> {
        loop {
            let found = match &mut self.source {
                Source::Empty => return None,
                Source::Supplied(features) => features.next()?,
                Source::Candidates(candidates) => {
                    let index = candidates.next()?;
                    match self.next_candidate(index) {
                        Some(feature) => feature,
                        None => continue,
                    }
                }
                Source::Scan(range) => {
                    let index = range.next()?;
                    match self.next_scanned(index) {
                        Some(feature) => feature,
                        None => continue,
                    }
                }
            };
            self.stats.result_count += 1;
            return Some(found);
        }
    }
}

/// The query surface over a store, an optional transform and an optional
/// index.
///
/// The engine never builds anything: the caller decides whether an index
/// is passed in. With `use_index` set but no index, it scans.
#[derive(Clone, Copy)]
pub struct QueryEngine<'a> {
    store: &'a dyn FeatureStore,
    transform: Option<&'a dyn CoordinateTransform>,
    index: Option<&'a SpatialIndex>,
    factory: &'a dyn GeometryFactory,
    supplier: Option<&'a dyn FeatureSupplier>,
    extents: Envelope,
}

impl<'a> QueryEngine<'a> {
    /// Engine over `store` with no transform, index or supplier. The full
    /// extents default to the store's.
    pub fn new(store: &'a dyn FeatureStore) -> Self {
        Self {
            store,
            transform: None,
            index: None,
            factory: &PlanarGeometryFactory,
            supplier: None,
            extents: store.extents(),
        }
    }

    pub fn with_transform(mut self, transform: Option<&'a dyn CoordinateTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_index(mut self, index: Option<&'a SpatialIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn with_geometry_factory(mut self, factory: &'a dyn GeometryFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_supplier(mut self, supplier: Option<&'a dyn FeatureSupplier>) -> Self {
        self.supplier = supplier;
        self
    }

    /// Full extents in target coordinates, used to detect the fast path.
    pub fn with_extents(mut self, extents: Envelope) -> Self {
        self.extents = extents;
        self
    }

    /// Start a region query.
    pub fn query_region(
        &self,
        region: QueryRegion,
        options: &ResolvedQueryOptions,
    ) -> RegionQuery<'a> {
        let region_envelope = region.envelope();
        let mut query = RegionQuery {
            source: Source::Empty,
            path: QueryPath::LinearScan,
            store: self.store,
            transform: self.transform,
            factory: self.factory,
            region_envelope,
            region_geometry: None,
            min_feature_size: options.min_feature_size,
            stats: QueryStats::default(),
        };

        if let Some(supplier) = self.supplier {
            let features = supplier.features(&region, self.store);
            tracing::trace!(results = features.len(), "region query answered by supplier");
            query.path = QueryPath::Supplier;
            query.stats.candidates = features.len();
            query.source = Source::Supplied(features.into_iter());
            return query;
        }

        if region_envelope.is_null() {
            return query;
        }

        // Only a rectangle equal to the full extents is known to contain
        // every feature.
        let full_extent = region.is_rectangular() && region_envelope == self.extents;
        let refine = options.exact_refinement.unwrap_or(!full_extent);
        if refine {
            query.region_geometry = region.to_geometry(self.factory);
            if query.region_geometry.is_none() {
                return query;
            }
        }

        match self.index.filter(|_| options.use_index) {
            Some(index) => {
                let candidates = index.query(&region_envelope, options.min_feature_size);
                query.path = QueryPath::Index;
                query.stats.candidates = candidates.len();
                query.source = Source::Candidates(candidates.into_iter());
            }
            None => {
                let count = self.store.count();
                query.stats.candidates = count;
                query.source = Source::Scan(0..count);
            }
        }

        tracing::trace!(
            path = ?query.path,
            candidates = query.stats.candidates,
            refine,
            "region query started"
        );
        query
    }
}

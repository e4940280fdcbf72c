//! Spatial index builder.
//!
//! Builds a [`SpatialIndex`] from a [`FeatureStore`]. The builder:
//! 1. Reads every feature geometry from the store
//! 2. Applies the layer's coordinate transform, if any
//! 3. Computes one envelope per feature, or one per part when multi-part
//!    decomposition is enabled
//! 4. Grows the root envelope and hands the entries to the quad-tree
//!
//! # Usage
//!
//! ```ignore
//! let config = IndexConfig::default().with_decompose_multi_part(true);
//! let builder = SpatialIndexBuilder::new(&config).with_transform(Some(&WebMercator));
//! let result = builder.build(&store)?;
//! if let Some(index) = result.index {
//!     let candidates = index.query(&region, 0.0);
//! }
//! ```
//!
//! Features without geometry, with empty geometry or with non-finite
//! coordinates are logged and counted in [`BuildStats`], never returned as
//! errors.

use crate::config::IndexConfig;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::geometry::{
    has_finite_coords, part_envelopes, GeometryFactory, GeometryKind, PlanarGeometryFactory,
};
use crate::quadtree::{IndexEntry, SpatialIndex};
use crate::store::FeatureStore;
use crate::transform::{apply_transform, CoordinateTransform};

/// Statistics collected during index building.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildStats {
    /// Number of features read from the store.
    pub features_processed: u64,

    /// Number of features that produced at least one entry.
    pub features_indexed: u64,

    /// Number of features skipped (sum of the three reasons below).
    pub features_skipped: u64,

    /// Skipped: feature has no geometry.
    pub absent_geometry: u64,

    /// Skipped: geometry has no extent.
    pub empty_geometry: u64,

    /// Skipped: geometry has a NaN or infinite coordinate.
    pub non_finite: u64,

    /// Total index entries generated.
    pub entries: u64,

    /// Features inserted as several part entries.
    pub multi_part_features: u64,

    /// Number of points (single or multi).
    pub point_count: u64,

    /// Number of polygons (single or multi).
    pub polygon_count: u64,

    /// Number of other geometry types.
    pub other_count: u64,
}

/// Result of an index build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// The index, or `None` when the root envelope came out non-finite and
    /// no usable tree can be built.
    pub index: Option<SpatialIndex>,

    /// Union of all entry envelopes (null when nothing was indexed).
    pub root_bounds: Envelope,

    /// Build statistics.
    pub stats: BuildStats,
}

impl BuildResult {
    /// True when the build could not produce a tree because of the extent.
    pub fn is_invalid_extent(&self) -> bool {
        self.index.is_none()
    }
}

/// Builder for spatial indexes.
///
/// Holds the build configuration plus the transform and geometry factory
/// the build should use. It keeps no state between builds.
#[derive(Debug, Clone, Copy)]
pub struct SpatialIndexBuilder<'a> {
    config: &'a IndexConfig,
    transform: Option<&'a dyn CoordinateTransform>,
    factory: &'a dyn GeometryFactory,
}

impl<'a> SpatialIndexBuilder<'a> {
    /// Create a builder with no transform and the planar geometry factory.
    pub fn new(config: &'a IndexConfig) -> Self {
        Self {
            config,
            transform: None,
            factory: &PlanarGeometryFactory,
        }
    }

    /// Set the coordinate transform applied to every geometry.
    pub fn with_transform(mut self, transform: Option<&'a dyn CoordinateTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Set the geometry factory used to compute envelopes.
    pub fn with_geometry_factory(mut self, factory: &'a dyn GeometryFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Get the configuration.
    pub fn config(&self) -> &IndexConfig {
        self.config
    }

    /// Build an index over every feature in `store`.
    ///
    /// Fails only if the store rejects an index below its own `count()`.
    pub fn build<S: FeatureStore + ?Sized>(&self, store: &S) -> Result<BuildResult> {
        let feature_count = store.count();
        let _span = tracing::debug_span!(
            "build_spatial_index",
            feature_count,
            decompose_multi_part = self.config.decompose_multi_part,
            transformed = self.transform.is_some()
        )
        .entered();

        let mut stats = BuildStats::default();
        let mut entries: Vec<IndexEntry> = Vec::with_capacity(feature_count);
        let mut root_bounds = Envelope::null();
        let mut detected_point: Option<bool> = None;

        for index in 0..feature_count {
            stats.features_processed += 1;

            let Some(source) = store.geometry_at(index)? else {
                stats.features_skipped += 1;
                stats.absent_geometry += 1;
                tracing::debug!(feature_index = index, "Skipping feature without geometry");
                continue;
            };

            let geom = apply_transform(self.transform, &source);
            if !has_finite_coords(&geom) {
                stats.features_skipped += 1;
                stats.non_finite += 1;
                tracing::debug!(feature_index = index, "Skipping non-finite geometry");
                continue;
            }

            let kind = GeometryKind::of(&geom);
            let decompose = self.config.decompose_multi_part && kind.is_multi_part();
            let envelopes = match decompose.then(|| part_envelopes(&geom)).flatten() {
                Some(parts) => parts,
                None => vec![self.factory.envelope(&geom)],
            };
            if envelopes.is_empty() || envelopes.iter().any(Envelope::is_null) {
                stats.features_skipped += 1;
                stats.empty_geometry += 1;
                tracing::debug!(feature_index = index, "Skipping empty geometry");
                continue;
            }

            if detected_point.is_none() {
                detected_point = Some(kind.is_point());
            }
            match kind {
                GeometryKind::Point | GeometryKind::MultiPoint => stats.point_count += 1,
                GeometryKind::Polygon | GeometryKind::MultiPolygon => stats.polygon_count += 1,
                _ => stats.other_count += 1,
            }
            if envelopes.len() > 1 {
                stats.multi_part_features += 1;
            }

            stats.features_indexed += 1;
            stats.entries += envelopes.len() as u64;
            for bounds in envelopes {
                root_bounds.expand_to_include(&bounds);
                entries.push(IndexEntry::new(index, bounds));
            }
        }

        let point_optimized = self
            .config
            .point_optimized
            .unwrap_or(detected_point.unwrap_or(false));

        if !root_bounds.is_null()
            && !(root_bounds.width().is_finite() && root_bounds.height().is_finite())
        {
            tracing::warn!(
                min_x = root_bounds.min_x,
                min_y = root_bounds.min_y,
                max_x = root_bounds.max_x,
                max_y = root_bounds.max_y,
                "Root envelope is not finite; no index built"
            );
            return Ok(BuildResult {
                index: None,
                root_bounds,
                stats,
            });
        }

        let index = SpatialIndex::build(
            entries,
            root_bounds,
            point_optimized,
            self.config.leaf_capacity,
        );

        tracing::info!(
            features_processed = stats.features_processed,
            features_indexed = stats.features_indexed,
            features_skipped = stats.features_skipped,
            entries = stats.entries,
            max_depth = index.max_depth(),
            point_optimized,
            "spatial index built"
        );

        Ok(BuildResult {
            index: Some(index),
            root_bounds,
            stats,
        })
    }
}

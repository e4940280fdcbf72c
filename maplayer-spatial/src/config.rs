//! Index and layer configuration types.
//!
//! Configuration is plain serde data with builder-style setters. Query-time
//! options are resolved against the owning layer's configuration, so a
//! default [`QueryOptions`] simply follows the layer.

use crate::error::{Result, SpatialError};
use serde::{Deserialize, Serialize};

/// Default bucket size before a node is split, for non-point datasets.
pub const DEFAULT_LEAF_CAPACITY: usize = 8;

/// Default fraction of a pixel below which features are culled.
pub const DEFAULT_SMALL_FEATURE_RATIO: f64 = 0.9;

/// Configuration for building a spatial index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Insert one entry per part of a multi-part geometry instead of one
    /// entry for the whole envelope.
    /// Default: false
    pub decompose_multi_part: bool,

    /// Force (or forbid) point-optimized subdivision.
    /// `None` detects it from the first valid feature.
    pub point_optimized: Option<bool>,

    /// Number of entries a node holds before it is split into quadrants.
    /// Ignored for point-optimized indexes, which always subdivide.
    /// Default: 8
    pub leaf_capacity: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            decompose_multi_part: false,
            point_optimized: None,
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
        }
    }
}

impl IndexConfig {
    /// Enable or disable multi-part decomposition.
    pub fn with_decompose_multi_part(mut self, decompose: bool) -> Self {
        self.decompose_multi_part = decompose;
        self
    }

    /// Override point-optimization detection.
    pub fn with_point_optimized(mut self, point_optimized: Option<bool>) -> Self {
        self.point_optimized = point_optimized;
        self
    }

    /// Set the split threshold for non-point indexes.
    pub fn with_leaf_capacity(mut self, leaf_capacity: usize) -> Self {
        self.leaf_capacity = leaf_capacity;
        self
    }
}

/// Configuration for a feature layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Answer region queries through the spatial index.
    /// Default: true
    pub use_index: bool,

    /// Cull features smaller than a fraction of a pixel.
    /// Default: false
    pub skip_small_features: bool,

    /// Fraction of the pixel size used as the culling threshold.
    /// Default: 0.9
    pub small_feature_ratio: f64,

    /// Index build configuration.
    pub index: IndexConfig,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            use_index: true,
            skip_small_features: false,
            small_feature_ratio: DEFAULT_SMALL_FEATURE_RATIO,
            index: IndexConfig::default(),
        }
    }
}

impl LayerConfig {
    /// Enable or disable the spatial index.
    pub fn with_use_index(mut self, use_index: bool) -> Self {
        self.use_index = use_index;
        self
    }

    /// Enable or disable small-feature culling.
    pub fn with_skip_small_features(mut self, skip: bool) -> Self {
        self.skip_small_features = skip;
        self
    }

    /// Set the index build configuration.
    pub fn with_index_config(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    /// Check the configuration for values no layer can work with.
    pub fn validate(&self) -> Result<()> {
        if !self.small_feature_ratio.is_finite() || self.small_feature_ratio < 0.0 {
            return Err(SpatialError::Config(format!(
                "small_feature_ratio must be a finite, non-negative number, got {}",
                self.small_feature_ratio
            )));
        }
        Ok(())
    }
}

/// Per-query options. `None` fields inherit the layer's setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Use the spatial index (`Some(false)` forces a linear scan).
    pub use_index: Option<bool>,

    /// Test candidates against their exact geometry.
    /// `None` refines unless the region equals the layer's full extents.
    pub exact_refinement: Option<bool>,

    /// Cull candidates whose larger envelope dimension is below this size.
    /// `Some(0.0)` disables culling regardless of the layer setting.
    pub min_feature_size: Option<f64>,
}

impl QueryOptions {
    /// Force the index on or off for this query.
    pub fn with_use_index(mut self, use_index: bool) -> Self {
        self.use_index = Some(use_index);
        self
    }

    /// Force exact refinement on or off for this query.
    pub fn with_exact_refinement(mut self, refine: bool) -> Self {
        self.exact_refinement = Some(refine);
        self
    }

    /// Set an explicit culling threshold for this query.
    pub fn with_min_feature_size(mut self, size: f64) -> Self {
        self.min_feature_size = Some(size);
        self
    }
}

/// Query options after resolution against a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedQueryOptions {
    pub use_index: bool,
    pub exact_refinement: Option<bool>,
    pub min_feature_size: f64,
}

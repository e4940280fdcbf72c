//! Layer orchestration: owns the store, the transform and the index state.
//!
//! The index is never rebuilt behind a getter. The query path calls
//! [`Layer::rebuild_index`] explicitly when the state is not
//! [`IndexState::Ready`], and every change that could make the tree lie
//! (new store, new transform, new build policy, store mutation) moves the
//! state to [`IndexState::Stale`] first.
//!
//! ```text
//!            query (use_index)                  invalidate
//!   Absent ─────────────────────► Ready ───────────────────────► Stale
//!     ▲                             ▲                              │
//!     │ root extent not finite      └──────────────────────────────┘
//!     └── (queries scan until the       query (use_index) rebuilds
//!          next invalidation)
//! ```

use crate::builder::{BuildStats, SpatialIndexBuilder};
use crate::config::{LayerConfig, QueryOptions, ResolvedQueryOptions};
use crate::envelope::Envelope;
use crate::error::{Result, SpatialError};
use crate::geometry::{has_finite_coords, GeometryFactory, PlanarGeometryFactory};
use crate::query::{FeatureSupplier, QueryEngine, QueryRegion, RegionQuery};
use crate::quadtree::SpatialIndex;
use crate::store::{FeatureCollection, FeatureStore};
use crate::transform::CoordinateTransform;
use std::cell::Cell;
use std::fmt;

/// Lifecycle state of a layer's spatial index.
#[derive(Debug, Clone, Default)]
pub enum IndexState {
    /// No tree exists.
    #[default]
    Absent,
    /// The tree reflects the current store and transform.
    Ready(Box<SpatialIndex>),
    /// A tree exists but must be rebuilt before use.
    Stale(Box<SpatialIndex>),
}

impl IndexState {
    pub fn is_absent(&self) -> bool {
        matches!(self, IndexState::Absent)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, IndexState::Ready(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, IndexState::Stale(_))
    }

    /// The tree, only if it can be trusted.
    pub fn index(&self) -> Option<&SpatialIndex> {
        match self {
            IndexState::Ready(index) => Some(&**index),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            IndexState::Absent => "absent",
            IndexState::Ready(_) => "ready",
            IndexState::Stale(_) => "stale",
        }
    }
}

/// A queryable set of features with an on-demand spatial index.
///
/// Not safe for concurrent use; a layer is driven from one thread.
pub struct Layer<S: FeatureStore = FeatureCollection> {
    store: S,
    config: LayerConfig,
    transform: Option<Box<dyn CoordinateTransform>>,
    factory: Box<dyn GeometryFactory>,
    supplier: Option<Box<dyn FeatureSupplier>>,
    /// Size of one output pixel in target units. Drives small-feature
    /// culling.
    pixel_size: f64,
    state: IndexState,
    /// Store revision the current tree (or fallback decision) was made at.
    indexed_revision: u64,
    /// The last build found a non-finite root extent; queries scan until the
    /// next invalidation.
    extent_fallback: bool,
    /// Transformed extents computed by a scan, keyed by store revision.
    /// Cleared whenever the index is invalidated.
    transformed_extents: Cell<Option<(u64, Envelope)>>,
    last_build: Option<BuildStats>,
    build_count: u64,
}

impl<S: FeatureStore> Layer<S> {
    /// Create a layer with the default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: LayerConfig::default(),
            transform: None,
            factory: Box::new(PlanarGeometryFactory),
            supplier: None,
            pixel_size: 0.0,
            state: IndexState::Absent,
            indexed_revision: 0,
            extent_fallback: false,
            transformed_extents: Cell::new(None),
            last_build: None,
            build_count: 0,
        }
    }

    /// Create a layer with an explicit configuration.
    pub fn with_config(store: S, config: LayerConfig) -> Result<Self> {
        config.validate()?;
        let mut layer = Self::new(store);
        layer.config = config;
        Ok(layer)
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable access to the store. The index is invalidated up front since
    /// not every store reports its changes through a revision.
    pub fn store_mut(&mut self) -> &mut S {
        self.invalidate("store borrowed mutably");
        &mut self.store
    }

    /// Replace the store, returning the previous one.
    pub fn set_store(&mut self, store: S) -> S {
        self.invalidate("store replaced");
        std::mem::replace(&mut self.store, store)
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn transform(&self) -> Option<&dyn CoordinateTransform> {
        self.transform.as_deref()
    }

    /// Replace the coordinate transform (`None` is identity).
    pub fn set_transform(&mut self, transform: Option<Box<dyn CoordinateTransform>>) {
        self.transform = transform;
        self.invalidate("transform replaced");
    }

    /// Replace the geometry factory used for envelopes and region shapes.
    pub fn set_geometry_factory(&mut self, factory: Box<dyn GeometryFactory>) {
        self.factory = factory;
        self.invalidate("geometry factory replaced");
    }

    /// Register (or remove) a supplier that answers every region query in
    /// place of the index and store.
    pub fn set_feature_supplier(&mut self, supplier: Option<Box<dyn FeatureSupplier>>) {
        self.supplier = supplier;
    }

    pub fn has_feature_supplier(&self) -> bool {
        self.supplier.is_some()
    }

    pub fn use_index(&self) -> bool {
        self.config.use_index
    }

    /// Turning the index off keeps any built tree for later use.
    pub fn set_use_index(&mut self, use_index: bool) {
        self.config.use_index = use_index;
    }

    pub fn skip_small_features(&self) -> bool {
        self.config.skip_small_features
    }

    pub fn set_skip_small_features(&mut self, skip: bool) {
        self.config.skip_small_features = skip;
    }

    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// Set the size of one output pixel in target units.
    pub fn set_pixel_size(&mut self, pixel_size: f64) -> Result<()> {
        if !pixel_size.is_finite() || pixel_size < 0.0 {
            return Err(SpatialError::Config(format!(
                "pixel size must be a finite, non-negative number, got {pixel_size}"
            )));
        }
        self.pixel_size = pixel_size;
        Ok(())
    }

    /// Switch between whole-envelope and per-part insertion.
    pub fn set_decompose_multi_part(&mut self, decompose: bool) {
        if self.config.index.decompose_multi_part != decompose {
            self.config.index.decompose_multi_part = decompose;
            self.invalidate("decomposition policy changed");
        }
    }

    /// Mark the index as untrustworthy. The next indexed query rebuilds it.
    pub fn invalidate_index(&mut self) {
        self.invalidate("explicit request");
    }

    pub fn index_state(&self) -> &IndexState {
        &self.state
    }

    /// Whether queries currently scan because the last build found a
    /// non-finite extent.
    pub fn is_extent_fallback(&self) -> bool {
        self.extent_fallback
    }

    /// Statistics of the most recent build.
    pub fn last_build_stats(&self) -> Option<&BuildStats> {
        self.last_build.as_ref()
    }

    /// Number of builds run by this layer.
    pub fn build_count(&self) -> u64 {
        self.build_count
    }

    /// Build a fresh index from the current store and transform, replacing
    /// whatever state the layer was in.
    pub fn rebuild_index(&mut self) -> Result<()> {
        let result = SpatialIndexBuilder::new(&self.config.index)
            .with_transform(self.transform.as_deref())
            .with_geometry_factory(self.factory.as_ref())
            .build(&self.store)?;

        self.indexed_revision = self.store.revision();
        self.build_count += 1;
        self.last_build = Some(result.stats);

        match result.index {
            Some(index) => {
                self.state = IndexState::Ready(Box::new(index));
                self.extent_fallback = false;
            }
            None => {
                self.state = IndexState::Absent;
                self.extent_fallback = true;
                tracing::debug!(
                    revision = self.indexed_revision,
                    "Extent fallback engaged; region queries scan until invalidated"
                );
            }
        }
        Ok(())
    }

    /// Extents of the layer in target coordinates.
    ///
    /// Without a transform this is the store's extents. With one, it is the
    /// root of a ready index, or else the union of every transformed
    /// envelope. The scanned union is cached until the store revision
    /// changes or the index is invalidated.
    pub fn extents(&self) -> Envelope {
        let Some(transform) = self.transform.as_deref() else {
            return self.store.extents();
        };
        let revision = self.store.revision();
        if let IndexState::Ready(index) = &self.state {
            if revision == self.indexed_revision {
                return *index.root_bounds();
            }
        }
        if let Some((cached_revision, extents)) = self.transformed_extents.get() {
            if cached_revision == revision {
                return extents;
            }
        }

        let mut extents = Envelope::null();
        for i in 0..self.store.count() {
            let Ok(Some(geom)) = self.store.geometry_at(i) else {
                continue;
            };
            let geom = transform.apply(&geom);
            if !has_finite_coords(&geom) {
                continue;
            }
            let envelope = self.factory.envelope(&geom);
            if envelope.is_finite() {
                extents.expand_to_include(&envelope);
            }
        }
        self.transformed_extents.set(Some((revision, extents)));
        extents
    }

    /// Resolve per-query options against the layer's settings.
    ///
    /// A `min_feature_size` override must be finite and non-negative.
    pub fn resolve_options(&self, options: &QueryOptions) -> Result<ResolvedQueryOptions> {
        let layer_min_size = if self.config.skip_small_features {
            self.pixel_size * self.config.small_feature_ratio
        } else {
            0.0
        };
        if let Some(size) = options.min_feature_size {
            if !size.is_finite() || size < 0.0 {
                return Err(SpatialError::Config(format!(
                    "min_feature_size must be finite and non-negative, got {size}"
                )));
            }
        }
        Ok(ResolvedQueryOptions {
            use_index: options.use_index.unwrap_or(self.config.use_index),
            exact_refinement: options.exact_refinement,
            min_feature_size: options.min_feature_size.unwrap_or(layer_min_size),
        })
    }

    /// Features intersecting `region`, in target coordinates.
    ///
    /// Builds the index first when it is wanted and not ready. The returned
    /// sequence is lazy and reads the store while it is consumed.
    pub fn query_region(
        &mut self,
        region: impl Into<QueryRegion>,
        options: QueryOptions,
    ) -> Result<RegionQuery<'_>> {
        let region = region.into();
        if !region.is_finite() {
            return Err(SpatialError::InvalidGeometry(
                "query region has non-finite coordinates".to_string(),
            ));
        }
        let resolved = self.resolve_options(&options)?;

        if self.supplier.is_none() && resolved.use_index {
            self.ensure_index()?;
        }

        let extents = if self.supplier.is_none() && resolved.exact_refinement.is_none() {
            self.extents()
        } else {
            Envelope::null()
        };

        let engine = QueryEngine::new(&self.store)
            .with_transform(self.transform.as_deref())
            .with_index(self.state.index())
            .with_geometry_factory(self.factory.as_ref())
            .with_supplier(self.supplier.as_deref())
            .with_extents(extents);
        Ok(engine.query_region(region, &resolved))
    }

    fn ensure_index(&mut self) -> Result<()> {
        if self.store.revision() != self.indexed_revision
            && (self.state.is_ready() || self.extent_fallback)
        {
            self.invalidate("store revision changed");
        }
        if self.extent_fallback || self.state.is_ready() {
            return Ok(());
        }
        self.rebuild_index()
    }

    fn invalidate(&mut self, cause: &'static str) {
        let previous = self.state.name();
        self.state = match std::mem::take(&mut self.state) {
            IndexState::Ready(index) | IndexState::Stale(index) => IndexState::Stale(index),
            IndexState::Absent => IndexState::Absent,
        };
        self.extent_fallback = false;
        self.transformed_extents.set(None);
        tracing::debug!(cause, previous, "Spatial index invalidated");
    }
}

impl<S: FeatureStore> fmt::Debug for Layer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("feature_count", &self.store.count())
            .field("config", &self.config)
            .field("transformed", &self.transform.is_some())
            .field("supplier", &self.supplier.is_some())
            .field("pixel_size", &self.pixel_size)
            .field("state", &self.state.name())
            .field("extent_fallback", &self.extent_fallback)
            .finish()
    }
}

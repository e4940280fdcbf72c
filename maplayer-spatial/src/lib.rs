//! Spatial indexing and region queries for map feature layers.
//!
//! This crate answers "which features intersect this area?" over feature
//! collections of thousands of geometries, optionally reprojected on the fly.
//! It provides:
//!
//! - **An adaptive loose quad-tree** whose depth follows dataset size
//! - **Indexed or linear-scan queries** with exact refinement via `geo`
//! - **Explicit index lifecycle** (absent, ready, stale) owned by a [`Layer`]
//! - **Coordinate transforms** applied before indexing and intersection tests
//!
//! # Architecture
//!
//! A layer owns a feature store and, once a query asks for it, a spatial
//! index over the store's (transformed) envelopes. Queries produce index
//! candidates and refine them against exact geometry.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                                Layer                                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  FeatureStore  │  CoordinateTransform  │  IndexState  │  Supplier   │
//! └─────────────────────────────────────────────────────────────────────┘
//!          │                   │                  ▲
//!          └─────────┬─────────┘                  │ rebuild when not Ready
//!                    ▼                            │
//!          SpatialIndexBuilder ───────────────────┘
//!                    │
//!                    ▼
//!          QueryEngine ─── SpatialIndex::query (candidates)
//!                    │     or linear scan (envelope test)
//!                    ▼
//!          Exact intersects refine (geo crate)
//!                    │
//!                    ▼
//!          RegionQuery (lazy results)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut store = FeatureCollection::new();
//! store.add_wkt("POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))", Attributes::new())?;
//!
//! let mut layer = Layer::new(store);
//! for feature in layer.query_region(Envelope::new(0.0, 0.0, 5.0, 5.0), QueryOptions::default())? {
//!     println!("{}", feature.index);
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Index, layer and query configuration
//! - [`envelope`]: Axis-aligned bounding boxes
//! - [`geometry`]: WKT parsing, part decomposition, geometry factories
//! - [`store`]: Feature store trait and the in-memory collection
//! - [`transform`]: Coordinate transforms
//! - [`quadtree`]: The quad-tree index
//! - [`builder`]: Index construction from a store
//! - [`query`]: Region queries
//! - [`layer`]: Index lifecycle and the query entry point
//! - [`error`]: Error types

pub mod builder;
pub mod config;
pub mod envelope;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod quadtree;
pub mod query;
pub mod store;
pub mod transform;

// Re-export key types
pub use builder::{BuildResult, BuildStats, SpatialIndexBuilder};
pub use config::{IndexConfig, LayerConfig, QueryOptions, ResolvedQueryOptions};
pub use envelope::Envelope;
pub use error::{Result, SpatialError};
pub use geometry::{parse_wkt, GeometryFactory, GeometryKind, PlanarGeometryFactory};
pub use layer::{IndexState, Layer};
pub use quadtree::{IndexStats, NodeInfo, SpatialIndex};
pub use query::{FeatureSupplier, QueryEngine, QueryPath, QueryRegion, QueryStats, RegionQuery};
pub use store::{Attributes, Feature, FeatureCollection, FeatureStore};
pub use transform::{AffineCoordinateTransform, CoordinateTransform, WebMercator};

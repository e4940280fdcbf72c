//! Error types for the spatial index and layer queries.
//!
//! Only contract violations and unusable input become errors. Malformed
//! feature data is skipped and counted during index builds instead.

use thiserror::Error;

/// Spatial index errors.
#[derive(Error, Debug)]
pub enum SpatialError {
    /// WKT parsing error.
    #[error("WKT parse error: {0}")]
    WktParse(String),

    /// Geometry that cannot be used where it was supplied.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A caller asked a store for a feature it does not hold.
    #[error("Feature index {index} out of range (store holds {count} features)")]
    FeatureIndexOutOfRange { index: usize, count: usize },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for spatial operations.
pub type Result<T> = std::result::Result<T, SpatialError>;

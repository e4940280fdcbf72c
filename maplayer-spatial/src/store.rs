//! Feature storage.
//!
//! The spatial index never owns geometry. It reads features through the
//! [`FeatureStore`] trait and keeps only indices and envelopes.
//! [`FeatureCollection`] is the in-memory store used by default.

use crate::envelope::Envelope;
use crate::error::{Result, SpatialError};
use crate::geometry::parse_wkt;
use geo_types::Geometry;
use std::cell::Cell;
use std::sync::Arc;

/// Feature attributes, keyed by column name.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A feature as handed out by a store.
///
/// `index` is the feature's position in the store it came from; geometry
/// and attributes are shared with the store, not copied.
#[derive(Debug, Clone)]
pub struct Feature {
    pub index: usize,
    pub geometry: Option<Arc<Geometry<f64>>>,
    pub attributes: Arc<Attributes>,
}

impl Feature {
    /// Envelope of the feature's geometry; null when it has none.
    pub fn envelope(&self) -> Envelope {
        self.geometry
            .as_deref()
            .map(Envelope::from_geometry)
            .unwrap_or_else(Envelope::null)
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }
}

/// Read access to a feature dataset.
///
/// Accessors taking an index return [`SpatialError::FeatureIndexOutOfRange`]
/// for `index >= count()`.
pub trait FeatureStore {
    /// Number of features.
    fn count(&self) -> usize;

    /// Feature at `index`.
    fn feature_at(&self, index: usize) -> Result<Feature>;

    /// Geometry at `index`; `None` when the feature has no geometry.
    fn geometry_at(&self, index: usize) -> Result<Option<Arc<Geometry<f64>>>>;

    /// Envelope of the geometry at `index`.
    fn bounds_at(&self, index: usize) -> Result<Envelope>;

    /// Union of all feature envelopes.
    fn extents(&self) -> Envelope;

    /// Changes whenever the store's contents change.
    ///
    /// Layers compare this against the revision their index was built at.
    /// Stores that never report changes must be invalidated explicitly.
    fn revision(&self) -> u64 {
        0
    }
}

impl<S: FeatureStore + ?Sized> FeatureStore for Box<S> {
    fn count(&self) -> usize {
        (**self).count()
    }

    fn feature_at(&self, index: usize) -> Result<Feature> {
        (**self).feature_at(index)
    }

    fn geometry_at(&self, index: usize) -> Result<Option<Arc<Geometry<f64>>>> {
        (**self).geometry_at(index)
    }

    fn bounds_at(&self, index: usize) -> Result<Envelope> {
        (**self).bounds_at(index)
    }

    fn extents(&self) -> Envelope {
        (**self).extents()
    }

    fn revision(&self) -> u64 {
        (**self).revision()
    }
}

impl<S: FeatureStore + ?Sized> FeatureStore for Arc<S> {
    fn count(&self) -> usize {
        (**self).count()
    }

    fn feature_at(&self, index: usize) -> Result<Feature> {
        (**self).feature_at(index)
    }

    fn geometry_at(&self, index: usize) -> Result<Option<Arc<Geometry<f64>>>> {
        (**self).geometry_at(index)
    }

    fn bounds_at(&self, index: usize) -> Result<Envelope> {
        (**self).bounds_at(index)
    }

    fn extents(&self) -> Envelope {
        (**self).extents()
    }

    fn revision(&self) -> u64 {
        (**self).revision()
    }
}

#[derive(Debug, Clone)]
struct FeatureRecord {
    geometry: Option<Arc<Geometry<f64>>>,
    attributes: Arc<Attributes>,
}

/// In-memory feature store.
///
/// Every mutation bumps [`FeatureStore::revision`] and clears the cached
/// extents.
#[derive(Debug, Default)]
pub struct FeatureCollection {
    records: Vec<FeatureRecord>,
    revision: u64,
    extents: Cell<Option<Envelope>>,
}

impl FeatureCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from geometries without attributes.
    pub fn from_geometries(geometries: impl IntoIterator<Item = Geometry<f64>>) -> Self {
        let mut collection = Self::new();
        for geom in geometries {
            collection.add(Some(geom), Attributes::new());
        }
        collection
    }

    /// Append a feature, returning its index.
    pub fn add(&mut self, geometry: Option<Geometry<f64>>, attributes: Attributes) -> usize {
        self.records.push(FeatureRecord {
            geometry: geometry.map(Arc::new),
            attributes: Arc::new(attributes),
        });
        self.touch();
        self.records.len() - 1
    }

    /// Parse a WKT geometry and append it as a feature.
    pub fn add_wkt(&mut self, wkt: &str, attributes: Attributes) -> Result<usize> {
        let geom = parse_wkt(wkt)?;
        Ok(self.add(Some(geom), attributes))
    }

    /// Replace the geometry of an existing feature.
    pub fn set_geometry(&mut self, index: usize, geometry: Option<Geometry<f64>>) -> Result<()> {
        let record = self.record_mut(index)?;
        record.geometry = geometry.map(Arc::new);
        self.touch();
        Ok(())
    }

    /// Replace the attributes of an existing feature.
    pub fn set_attributes(&mut self, index: usize, attributes: Attributes) -> Result<()> {
        let record = self.record_mut(index)?;
        record.attributes = Arc::new(attributes);
        self.touch();
        Ok(())
    }

    /// Remove a feature. Later features shift down by one index.
    pub fn remove(&mut self, index: usize) -> Result<Feature> {
        self.check_index(index)?;
        let record = self.records.remove(index);
        self.touch();
        Ok(Feature {
            index,
            geometry: record.geometry,
            attributes: record.attributes,
        })
    }

    /// Remove every feature.
    pub fn clear(&mut self) {
        self.records.clear();
        self.touch();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all features in index order.
    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| Feature {
                index,
                geometry: record.geometry.clone(),
                attributes: record.attributes.clone(),
            })
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.extents.set(None);
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.records.len() {
            return Err(SpatialError::FeatureIndexOutOfRange {
                index,
                count: self.records.len(),
            });
        }
        Ok(())
    }

    fn record(&self, index: usize) -> Result<&FeatureRecord> {
        self.check_index(index)?;
        Ok(&self.records[index])
    }

    fn record_mut(&mut self, index: usize) -> Result<&mut FeatureRecord> {
        self.check_index(index)?;
        Ok(&mut self.records[index])
    }
}

impl FeatureStore for FeatureCollection {
    fn count(&self) -> usize {
        self.records.len()
    }

    fn feature_at(&self, index: usize) -> Result<Feature> {
        let record = self.record(index)?;
        Ok(Feature {
            index,
            geometry: record.geometry.clone(),
            attributes: record.attributes.clone(),
        })
    }

    fn geometry_at(&self, index: usize) -> Result<Option<Arc<Geometry<f64>>>> {
        Ok(self.record(index)?.geometry.clone())
    }

    fn bounds_at(&self, index: usize) -> Result<Envelope> {
        Ok(self
            .record(index)?
            .geometry
            .as_deref()
            .map(Envelope::from_geometry)
            .unwrap_or_else(Envelope::null))
    }

    fn extents(&self) -> Envelope {
        if let Some(cached) = self.extents.get() {
            return cached;
        }
        let mut extents = Envelope::null();
        for record in &self.records {
            if let Some(geom) = &record.geometry {
                extents.expand_to_include(&Envelope::from_geometry(geom));
            }
        }
        self.extents.set(Some(extents));
        extents
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

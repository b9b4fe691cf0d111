// Track map state shared with whatever draws it

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::track_map::{Coordinate, DistanceSample, SectorIndices};

/// Handle to the published track map, written by the recorder session and read by renderers
pub type SharedMapping = Arc<RwLock<MappingOutput>>;

pub fn shared_mapping() -> SharedMapping {
    Arc::new(RwLock::new(MappingOutput::default()))
}

/// Hash of a sequence of pairs, stable within one process run.
///
/// Consumers compare hashes to notice a new map without walking the sequences.
pub fn content_hash(pairs: &[(f64, f64)]) -> u64 {
    let mut hasher = DefaultHasher::new();
    pairs.len().hash(&mut hasher);
    for (a, b) in pairs {
        a.to_bits().hash(&mut hasher);
        b.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

/// A complete published map. All fields are set together.
#[derive(Clone, Debug, PartialEq)]
pub struct PublishedMap {
    pub coordinates: Arc<[Coordinate]>,
    pub coordinates_hash: u64,
    pub elevation_profile: Arc<[DistanceSample]>,
    pub elevation_profile_hash: u64,
    pub sector_indices: SectorIndices,
}

impl PublishedMap {
    pub fn new(
        coordinates: &[Coordinate],
        elevation_profile: &[DistanceSample],
        sector_indices: SectorIndices,
    ) -> Self {
        Self {
            coordinates: Arc::from(coordinates),
            coordinates_hash: content_hash(coordinates),
            elevation_profile: Arc::from(elevation_profile),
            elevation_profile_hash: content_hash(elevation_profile),
            sector_indices,
        }
    }
}

/// Versioned published state; `version` moves on every publish or clear
#[derive(Clone, Debug, Default)]
pub struct MappingOutput {
    version: u64,
    map: Option<PublishedMap>,
}

impl MappingOutput {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn map(&self) -> Option<&PublishedMap> {
        self.map.as_ref()
    }

    pub fn publish(&mut self, map: PublishedMap) {
        self.map = Some(map);
        self.version += 1;
    }

    pub fn clear(&mut self) {
        self.map = None;
        self.version += 1;
    }
}

/// Read the shared state, recovering the data if a writer panicked
pub fn read_mapping(shared: &SharedMapping) -> RwLockReadGuard<'_, MappingOutput> {
    shared.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn write_mapping(shared: &SharedMapping) -> RwLockWriteGuard<'_, MappingOutput> {
    shared.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

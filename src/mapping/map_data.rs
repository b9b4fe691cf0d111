// In-memory track map being recorded, validated or loaded

use log::{debug, error, info, warn};

use crate::track_map::{
    Coordinate, DistanceSample, PathAsset, PathStore, SectorIndices, VIEW_BOX_MARGIN, ViewBox,
};

/// Snapshot of a finished lap held while its lap time is validated.
///
/// Only readable from outside the buffer, so a new recording cannot touch it.
#[derive(Clone, Debug, PartialEq)]
pub struct StagedLap {
    coordinates: Vec<Coordinate>,
    distance_profile: Vec<DistanceSample>,
    sector_indices: SectorIndices,
}

impl StagedLap {
    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn distance_profile(&self) -> &[DistanceSample] {
        &self.distance_profile
    }

    pub fn sector_indices(&self) -> SectorIndices {
        self.sector_indices
    }
}

/// Recorded path of one lap plus the store it is loaded from and saved to.
///
/// `coordinates` and `distance_profile` always have the same length.
pub struct MapBuffer<S: PathStore> {
    exists: bool,
    coordinates: Vec<Coordinate>,
    distance_profile: Vec<DistanceSample>,
    sector_indices: SectorIndices,
    staged: Option<StagedLap>,
    track_id: String,
    store: S,
}

impl<S: PathStore> MapBuffer<S> {
    pub fn new(store: S) -> Self {
        Self {
            exists: false,
            coordinates: Vec::new(),
            distance_profile: Vec::new(),
            sector_indices: [0, 0],
            staged: None,
            track_id: String::new(),
            store,
        }
    }

    /// Whether a usable map is held
    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn distance_profile(&self) -> &[DistanceSample] {
        &self.distance_profile
    }

    pub fn sector_indices(&self) -> SectorIndices {
        self.sector_indices
    }

    pub fn staged(&self) -> Option<&StagedLap> {
        self.staged.as_ref()
    }

    /// Track the map was last loaded for, and is saved under
    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Clear the active map, keeping any staged lap
    pub fn reset(&mut self) {
        self.exists = false;
        self.coordinates.clear();
        self.distance_profile.clear();
        self.sector_indices = [0, 0];
    }

    /// Snapshot the active map into the staged lap. No-op when nothing was recorded.
    pub fn copy(&mut self) {
        if self.coordinates.is_empty() {
            return;
        }
        self.staged = Some(StagedLap {
            coordinates: self.coordinates.clone(),
            distance_profile: self.distance_profile.clone(),
            sector_indices: self.sector_indices,
        });
    }

    /// Drop the staged lap without committing it
    pub fn discard_staged(&mut self) {
        if self.staged.take().is_some() {
            debug!("Discarded staged lap");
        }
    }

    /// Promote the staged lap to the active map and persist it.
    ///
    /// Returns `false` when there was no staged lap. A failed save is logged and otherwise
    /// ignored: the map stays usable in memory for the rest of the session.
    pub fn commit(&mut self) -> bool {
        let Some(staged) = self.staged.take() else {
            warn!("Commit requested without a staged lap");
            return false;
        };

        self.coordinates = staged.coordinates;
        self.distance_profile = staged.distance_profile;
        self.sector_indices = staged.sector_indices;
        self.exists = true;
        info!(
            "Track map recorded for {} ({} samples)",
            self.track_id,
            self.coordinates.len()
        );

        self.persist();
        true
    }

    fn persist(&mut self) {
        if self.track_id.is_empty() {
            warn!("No track id for the recorded map, not saving it");
            return;
        }
        let Some(view_box) = ViewBox::from_coordinates(&self.coordinates, VIEW_BOX_MARGIN) else {
            return;
        };

        let asset = PathAsset::new(
            self.track_id.clone(),
            self.coordinates.clone(),
            self.distance_profile.clone(),
            view_box,
            self.sector_indices,
        );
        if let Err(e) = self.store.save_path(&asset) {
            error!("Could not save track map for {}: {}", self.track_id, e);
        }
    }

    /// Replace the active map with the one stored for `track_id`.
    ///
    /// A missing or unreadable map leaves `exists` false, it is never an error. A map committed
    /// for the same track but never saved stays active.
    pub fn load(&mut self, track_id: &str) {
        let same_track = self.track_id == track_id;
        self.track_id = track_id.to_string();

        let asset = match self.store.load_path(track_id) {
            Ok(asset) => asset,
            Err(e) => {
                warn!("Could not load track map for {}: {}", track_id, e);
                None
            }
        };

        match asset {
            Some(asset) if !asset.is_empty() => {
                debug!(
                    "Loaded track map for {} ({} samples)",
                    track_id,
                    asset.coordinates.len()
                );
                self.coordinates = asset.coordinates;
                self.distance_profile = asset.distance_profile;
                self.sector_indices = asset.sector_indices;
                self.exists = true;
            }
            _ if self.exists && same_track => {
                debug!("No stored track map for {}, keeping the recorded one", track_id);
            }
            _ => {
                debug!("No track map for {}", track_id);
                self.exists = false;
            }
        }
    }

    pub(crate) fn push_sample(&mut self, coordinate: Coordinate, distance: DistanceSample) {
        self.coordinates.push(coordinate);
        self.distance_profile.push(distance);
    }

    /// Mark the most recent sample as the start of sector 2 (`slot` 0) or sector 3 (`slot` 1)
    pub(crate) fn mark_sector_start(&mut self, slot: usize) {
        self.sector_indices[slot] = self.coordinates.len().saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MapperError;
    use crate::track_map::MemoryPathStore;

    /// Store whose saves always fail
    #[derive(Default)]
    struct FailingStore;

    impl PathStore for FailingStore {
        fn save_path(&mut self, _asset: &PathAsset) -> Result<(), MapperError> {
            Err(MapperError::PathStoreError {
                reason: "disk full".to_string(),
            })
        }

        fn load_path(&mut self, _track_id: &str) -> Result<Option<PathAsset>, MapperError> {
            Err(MapperError::PathStoreError {
                reason: "unreadable".to_string(),
            })
        }

        fn list_available_tracks(&self) -> Result<Vec<String>, MapperError> {
            Ok(Vec::new())
        }

        fn delete_path(&mut self, _track_id: &str) -> Result<(), MapperError> {
            Ok(())
        }

        fn path_exists(&self, _track_id: &str) -> Result<bool, MapperError> {
            Ok(false)
        }
    }

    fn record(buffer: &mut MapBuffer<impl PathStore>, count: usize) {
        for i in 0..count {
            let d = i as f64 * 10.0;
            buffer.push_sample((d, d / 2.0), (d, 100.0 + i as f64));
        }
    }

    fn stored_asset(track_id: &str, count: usize) -> PathAsset {
        let coordinates: Vec<Coordinate> = (0..count).map(|i| (i as f64, i as f64 * 2.0)).collect();
        let distances: Vec<DistanceSample> = (0..count).map(|i| (i as f64 * 5.0, 1.0)).collect();
        let view_box = ViewBox::from_coordinates(&coordinates, VIEW_BOX_MARGIN).unwrap();
        PathAsset::new(track_id.to_string(), coordinates, distances, view_box, [10, 30])
    }

    #[test]
    fn test_reset_clears_map() {
        let mut buffer = MapBuffer::new(MemoryPathStore::new());
        record(&mut buffer, 3);
        buffer.mark_sector_start(0);

        buffer.reset();
        assert!(!buffer.exists());
        assert!(buffer.is_empty());
        assert!(buffer.distance_profile().is_empty());
        assert_eq!(buffer.sector_indices(), [0, 0]);
    }

    #[test]
    fn test_copy_of_empty_buffer_is_noop() {
        let mut buffer = MapBuffer::new(MemoryPathStore::new());
        buffer.copy();
        assert!(buffer.staged().is_none());
    }

    #[test]
    fn test_snapshot_isolation() {
        let mut buffer = MapBuffer::new(MemoryPathStore::new());
        record(&mut buffer, 4);
        buffer.mark_sector_start(0);
        buffer.copy();

        buffer.reset();
        record(&mut buffer, 2);
        buffer.mark_sector_start(1);

        let staged = buffer.staged().unwrap();
        assert_eq!(staged.coordinates().len(), 4);
        assert_eq!(staged.distance_profile().len(), 4);
        assert_eq!(staged.coordinates()[3], (30.0, 15.0));
        assert_eq!(staged.sector_indices(), [3, 0]);
    }

    #[test]
    fn test_commit_promotes_and_saves() {
        let mut buffer = MapBuffer::new(MemoryPathStore::new());
        buffer.load("Monza_2024");
        assert!(!buffer.exists());

        record(&mut buffer, 5);
        buffer.copy();
        buffer.reset();

        assert!(buffer.commit());
        assert!(buffer.exists());
        assert_eq!(buffer.len(), 5);
        assert!(buffer.staged().is_none());

        let saved = buffer.store_mut().load_path("Monza_2024").unwrap().unwrap();
        assert_eq!(saved.coordinates, buffer.coordinates());
        assert_eq!(saved.view_box.min_x, -20.0);
        assert_eq!(saved.view_box.width, 40.0 + 40.0);
    }

    #[test]
    fn test_commit_without_snapshot() {
        let mut buffer = MapBuffer::new(MemoryPathStore::new());
        assert!(!buffer.commit());
        assert!(!buffer.exists());
        assert_eq!(buffer.store().save_count(), 0);
    }

    #[test]
    fn test_commit_survives_save_failure() {
        let mut buffer = MapBuffer::new(FailingStore);
        buffer.load("spa");
        record(&mut buffer, 3);
        buffer.copy();

        assert!(buffer.commit());
        assert!(buffer.exists());
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_load_success() {
        let mut store = MemoryPathStore::new();
        store.save_path(&stored_asset("Monza_2024", 50)).unwrap();

        let mut buffer = MapBuffer::new(store);
        buffer.load("Monza_2024");

        assert!(buffer.exists());
        assert_eq!(buffer.len(), 50);
        assert_eq!(buffer.distance_profile().len(), 50);
        assert_eq!(buffer.sector_indices(), [10, 30]);
        assert_eq!(buffer.track_id(), "Monza_2024");
    }

    #[test]
    fn test_load_miss_and_read_error() {
        let mut buffer = MapBuffer::new(MemoryPathStore::new());
        buffer.load("nowhere");
        assert!(!buffer.exists());

        let mut failing = MapBuffer::new(FailingStore);
        failing.load("spa");
        assert!(!failing.exists());
    }

    #[test]
    fn test_load_keeps_unsaved_map_for_same_track() {
        let mut buffer = MapBuffer::new(FailingStore);
        buffer.load("spa");
        record(&mut buffer, 4);
        buffer.copy();
        assert!(buffer.commit());

        buffer.load("spa");
        assert!(buffer.exists());
        assert_eq!(buffer.len(), 4);

        // another track never inherits it
        buffer.load("monza");
        assert!(!buffer.exists());
    }

    #[test]
    fn test_sector_mark_on_empty_buffer() {
        let mut buffer = MapBuffer::new(MemoryPathStore::new());
        buffer.mark_sector_start(1);
        assert_eq!(buffer.sector_indices(), [0, 0]);
    }
}

// Core data structures for recorded track maps

use itertools::{Itertools, MinMaxResult};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Ground position (x, y)
pub type Coordinate = (f64, f64);
/// Lap distance and elevation at one recorded sample
pub type DistanceSample = (f64, f64);
/// Sample indices where sector 2 and sector 3 begin
pub type SectorIndices = [usize; 2];

/// Current on-disk format version
pub const PATH_ASSET_VERSION: u32 = 1;

/// Bounding box of a path, used as the SVG view box
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    /// Bounding box of `coordinates` grown by `margin` on every side.
    ///
    /// Returns `None` for an empty path.
    pub fn from_coordinates(coordinates: &[Coordinate], margin: f64) -> Option<Self> {
        let (min_x, max_x) = match coordinates.iter().map(|c| c.0).minmax() {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(x) => (x, x),
            MinMaxResult::MinMax(min, max) => (min, max),
        };
        let (min_y, max_y) = match coordinates.iter().map(|c| c.1).minmax() {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(y) => (y, y),
            MinMaxResult::MinMax(min, max) => (min, max),
        };

        Some(Self {
            min_x: min_x - margin,
            min_y: min_y - margin,
            width: max_x - min_x + margin * 2.0,
            height: max_y - min_y + margin * 2.0,
        })
    }
}

impl std::fmt::Display for ViewBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.4} {:.4} {:.4} {:.4}",
            self.min_x, self.min_y, self.width, self.height
        )
    }
}

/// A recorded lap kept as a reusable track map: driving line, distance/elevation profile and
/// sector boundaries
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PathAsset {
    /// Track identifier the asset is stored under
    pub track_id: String,
    /// Ground positions in recording order
    pub coordinates: Vec<Coordinate>,
    /// (lap distance, elevation) pairs, index-aligned with `coordinates`
    pub distance_profile: Vec<DistanceSample>,
    /// Indices into `coordinates` where sector 2 and sector 3 begin, 0 when unknown
    pub sector_indices: SectorIndices,
    pub view_box: ViewBox,
    pub created_at: SystemTime,
    /// Version number for format compatibility
    pub version: u32,
}

impl PathAsset {
    pub fn new(
        track_id: String,
        coordinates: Vec<Coordinate>,
        distance_profile: Vec<DistanceSample>,
        view_box: ViewBox,
        sector_indices: SectorIndices,
    ) -> Self {
        Self {
            track_id,
            coordinates,
            distance_profile,
            sector_indices,
            view_box,
            created_at: SystemTime::now(),
            version: PATH_ASSET_VERSION,
        }
    }

    /// An asset is only usable when both sequences carry data
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty() || self.distance_profile.is_empty()
    }

    /// Check that the sequences are index-aligned and sector indices point inside them
    pub fn validate(&self) -> Result<(), String> {
        if self.coordinates.len() != self.distance_profile.len() {
            return Err(format!(
                "Coordinates ({}) and distance profile ({}) lengths differ",
                self.coordinates.len(),
                self.distance_profile.len()
            ));
        }

        for index in self.sector_indices {
            if index != 0 && index >= self.coordinates.len() {
                return Err(format!(
                    "Sector index {} out of range for {} samples",
                    index,
                    self.coordinates.len()
                ));
            }
        }

        if self
            .coordinates
            .iter()
            .chain(self.distance_profile.iter())
            .any(|(a, b)| !a.is_finite() || !b.is_finite())
        {
            return Err("Path contains non-finite values".to_string());
        }

        Ok(())
    }

    /// Total recorded lap distance
    pub fn length(&self) -> f64 {
        match (self.distance_profile.first(), self.distance_profile.last()) {
            (Some(first), Some(last)) => last.0 - first.0,
            _ => 0.,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Coordinate> {
        vec![(0.0, 0.0), (100.0, 0.0), (100.0, 50.0), (0.0, 50.0)]
    }

    #[test]
    fn test_view_box_with_margin() {
        let view_box = ViewBox::from_coordinates(&square(), 20.0).unwrap();

        assert_eq!(view_box.min_x, -20.0);
        assert_eq!(view_box.min_y, -20.0);
        assert_eq!(view_box.width, 140.0);
        assert_eq!(view_box.height, 90.0);
        assert_eq!(view_box.to_string(), "-20.0000 -20.0000 140.0000 90.0000");
    }

    #[test]
    fn test_view_box_single_point_and_empty() {
        let view_box = ViewBox::from_coordinates(&[(5.0, -5.0)], 20.0).unwrap();
        assert_eq!(view_box.width, 40.0);
        assert_eq!(view_box.height, 40.0);
        assert_eq!(view_box.min_y, -25.0);

        assert!(ViewBox::from_coordinates(&[], 20.0).is_none());
    }

    #[test]
    fn test_path_asset_validation() {
        let coordinates = square();
        let distances = vec![(0.0, 1.0), (100.0, 1.5), (150.0, 2.0), (250.0, 1.0)];
        let view_box = ViewBox::from_coordinates(&coordinates, 20.0).unwrap();

        let asset = PathAsset::new(
            "test_track".to_string(),
            coordinates.clone(),
            distances.clone(),
            view_box,
            [1, 3],
        );
        assert!(asset.validate().is_ok());
        assert_eq!(asset.length(), 250.0);
        assert_eq!(asset.version, PATH_ASSET_VERSION);

        let misaligned = PathAsset::new(
            "test_track".to_string(),
            coordinates.clone(),
            distances[..2].to_vec(),
            view_box,
            [0, 0],
        );
        assert!(misaligned.validate().is_err());

        let bad_sector = PathAsset::new(
            "test_track".to_string(),
            coordinates,
            distances,
            view_box,
            [1, 4],
        );
        assert!(bad_sector.validate().is_err());
    }

    #[test]
    fn test_path_asset_is_empty() {
        let asset = PathAsset::new(
            "empty".to_string(),
            Vec::new(),
            Vec::new(),
            ViewBox {
                min_x: 0.,
                min_y: 0.,
                width: 0.,
                height: 0.,
            },
            [0, 0],
        );
        assert!(asset.is_empty());
        assert_eq!(asset.length(), 0.);
    }
}

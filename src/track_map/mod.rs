// Track map assets: the persisted form of a recorded lap, its storage and SVG export

pub mod storage;
pub mod svg_generator;
pub mod types;

// Re-export commonly used types
pub use storage::{FileBasedPathStore, MemoryPathStore, PathStore, normalize_track_id};
pub use svg_generator::{TrackMapConfig, TrackMapRenderer, VIEW_BOX_MARGIN};
pub use types::{Coordinate, DistanceSample, PathAsset, SectorIndices, ViewBox};

// Track map recording: lap detection, the in-memory map and its publication

pub mod map_data;
pub mod output;
pub mod recorder;
pub mod session;

pub use map_data::{MapBuffer, StagedLap};
pub use output::{
    MappingOutput, PublishedMap, SharedMapping, content_hash, read_mapping, shared_mapping,
};
pub use recorder::{LapRecorder, round4};
pub use session::RecorderSession;

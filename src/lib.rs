// Library interface for trackmap
// This allows integration tests and benches to access internal modules

pub mod config;
pub mod errors;
pub mod mapping;
pub mod telemetry;
pub mod track_map;
pub mod writer;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::MapperError;
pub use mapping::{LapRecorder, MapBuffer, RecorderSession, SharedMapping};
pub use telemetry::{SessionInfo, TelemetryOutput, TelemetrySample, TelemetrySource};
pub use track_map::{FileBasedPathStore, MemoryPathStore, PathAsset, PathStore, TrackMapRenderer};

pub mod collector;
pub mod producer;

pub use collector::collect_telemetry;
pub use producer::{MockTelemetrySource, TelemetrySource};

#[cfg(windows)]
pub use producer::IRacingTelemetrySource;

use serde::{Deserialize, Serialize};

/// One poll of the simulator state that the track map recorder cares about.
///
/// Times are in seconds on the simulator session clock, distances and positions in meters.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySample {
    /// Player is in a live session and driving on track
    pub on_track: bool,
    /// Session time at which the current lap started
    pub lap_start_time: f64,
    /// Current session time
    pub lap_elapsed_time: f64,
    /// Last lap time, zero or negative when the lap was invalid or not yet timed
    pub last_lap_time: f64,
    /// Current sector: 0, 1 or 2
    pub sector_index: i32,
    /// Meters traveled from S/F this lap
    pub lap_distance: f64,
    /// Ground position along the world longitudinal axis
    pub position_longitudinal: f64,
    /// Ground position along the world lateral axis
    pub position_lateral: f64,
    /// Elevation
    pub position_vertical: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionInfo {
    /// Stable identifier for the track and layout, used as the track map asset key
    pub track_id: String,
    pub track_name: String,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            track_id: "unknown".to_string(),
            track_name: "Unknown".to_string(),
        }
    }
}

/// Line format of recorded telemetry files
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum TelemetryOutput {
    DataPoint(Box<TelemetrySample>),
    SessionChange(SessionInfo),
}

// Lap recorder: samples one clean lap of driving line per track

use log::{debug, info};

use crate::telemetry::TelemetrySample;
use crate::track_map::PathStore;

use super::map_data::MapBuffer;

/// Validation waits at least this long after the line before trusting the lap time
const MIN_VALIDATION_S: f64 = 1.0;
/// Last moment a valid lap time can still commit the lap
const MAX_VALIDATION_S: f64 = 8.0;
/// After this the staged lap is abandoned
const VALIDATION_TIMEOUT_S: f64 = 10.0;

const UNSET: f64 = -1.0;
const NO_SECTOR: i32 = -1;

/// Round to 4 decimal places so repeated polls of an unchanged value compare equal
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Per-tick state machine that detects lap boundaries, records the driving line while a lap
/// is in progress and commits the finished lap once the simulator confirms a valid lap time.
///
/// Recording starts at the first lap boundary seen, so a lap joined halfway is never kept.
/// While a finished lap is being validated, the next lap is already recording.
pub struct LapRecorder<S: PathStore> {
    map: MapBuffer<S>,
    recording: bool,
    validating: bool,
    last_lap_start_time: f64,
    last_sector_index: i32,
    last_recorded_position: f64,
}

impl<S: PathStore> LapRecorder<S> {
    pub fn new(store: S) -> Self {
        Self {
            map: MapBuffer::new(store),
            recording: false,
            validating: false,
            last_lap_start_time: UNSET,
            last_sector_index: NO_SECTOR,
            last_recorded_position: 0.,
        }
    }

    pub fn map(&self) -> &MapBuffer<S> {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut MapBuffer<S> {
        &mut self.map
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_validating(&self) -> bool {
        self.validating
    }

    pub fn last_lap_start_time(&self) -> f64 {
        self.last_lap_start_time
    }

    pub fn last_sector_index(&self) -> i32 {
        self.last_sector_index
    }

    pub fn last_recorded_position(&self) -> f64 {
        self.last_recorded_position
    }

    /// Back to the initial state; the next update re-establishes the lap baseline
    pub fn reset(&mut self) {
        self.recording = false;
        self.validating = false;
        self.last_sector_index = NO_SECTOR;
        self.last_lap_start_time = UNSET;
        self.last_recorded_position = 0.;
    }

    /// Process one telemetry poll
    pub fn update(&mut self, sample: &TelemetrySample) {
        let position = round4(sample.lap_distance);
        let coordinate = (
            round4(sample.position_longitudinal),
            round4(sample.position_lateral),
        );
        let elevation = round4(sample.position_vertical);

        self.detect_lap_start(sample.lap_start_time);
        if self.validating {
            self.validate(sample.lap_elapsed_time, sample.last_lap_time);
        }
        if self.recording {
            self.record_sector(sample.sector_index);
            self.record_path(position, coordinate, elevation);
        }
    }

    fn detect_lap_start(&mut self, lap_start_time: f64) {
        if self.last_lap_start_time == UNSET {
            self.map.reset();
            self.last_lap_start_time = lap_start_time;
        }

        if lap_start_time > self.last_lap_start_time {
            self.end_lap();
            self.map.reset();
            self.last_lap_start_time = lap_start_time;
            self.last_recorded_position = 0.;
            self.recording = true;
            debug!("Recording lap started at {:.3}", lap_start_time);
        }
    }

    /// Stage the lap that just finished, if anything was recorded
    fn end_lap(&mut self) {
        if !self.map.is_empty() {
            self.map.copy();
            self.validating = true;
            debug!("Validating lap with {} samples", self.map.len());
        }
    }

    fn validate(&mut self, lap_elapsed_time: f64, last_lap_time: f64) {
        let since_line = lap_elapsed_time - self.last_lap_start_time;

        if MIN_VALIDATION_S < since_line && since_line <= MAX_VALIDATION_S && last_lap_time > 0. {
            if self.map.commit() {
                info!("Lap validated with time {:.3}s", last_lap_time);
            }
            self.recording = false;
            self.validating = false;
        } else if MAX_VALIDATION_S < since_line && since_line < VALIDATION_TIMEOUT_S {
            debug!("No valid lap time after {:.1}s, dropping lap", since_line);
            self.map.discard_staged();
            self.validating = false;
        }
    }

    fn record_sector(&mut self, sector_index: i32) {
        if self.last_sector_index == sector_index {
            return;
        }
        match sector_index {
            1 => self.map.mark_sector_start(0),
            2 => self.map.mark_sector_start(1),
            _ => {}
        }
        self.last_sector_index = sector_index;
    }

    fn record_path(&mut self, position: f64, coordinate: (f64, f64), elevation: f64) {
        if position < 0. || position == self.last_recorded_position {
            return;
        }
        // only moving forward keeps the line ordered by distance
        if position > self.last_recorded_position {
            self.map.push_sample(coordinate, (position, elevation));
        }
        self.last_recorded_position = position;
    }
}

use std::path::Path;

use log::{debug, error};
#[cfg(windows)]
use log::warn;

use crate::MapperError;

use super::{SessionInfo, TelemetryOutput, TelemetrySample};

#[cfg(windows)]
const CONN_RETRY_WAIT_MS: u64 = 200;

/// A polled source of simulator telemetry.
///
/// # Lifecycle
///
/// 1. Call `start()` to initialize the connection to the game or data source
/// 2. Call `session_info()` to retrieve the current track identifier
/// 3. Call `telemetry()` once per tick to get the most recent sample
pub trait TelemetrySource {
    /// Initialize the telemetry source and establish connection to the data source.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn start(&mut self) -> Result<(), MapperError>;

    /// Retrieve the current session information.
    ///
    /// The track identifier may change between sessions, callers re-read it whenever the
    /// player returns to the track.
    fn session_info(&mut self) -> Result<SessionInfo, MapperError>;

    /// Get the most recent telemetry sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is not started, if the sample cannot be read, or
    /// [`MapperError::EndOfTelemetry`] when a replay source is exhausted.
    fn telemetry(&mut self) -> Result<TelemetrySample, MapperError>;
}

/// Live telemetry from iRacing.
///
/// iRacing exposes latitude, longitude and altitude rather than world coordinates, so the
/// ground position is projected onto a local plane anchored at the track's reference point
/// from the session info. Maps saved in one session then line up with the next one. Only when
/// the session info has no reference point is the first fix used instead.
#[cfg(windows)]
pub struct IRacingTelemetrySource {
    client: Option<simetry::iracing::Client>,
    runtime: Option<tokio::runtime::Runtime>,
    retry_wait_ms: u64,
    origin: Option<(f64, f64)>,
    last_lap_no: Option<i32>,
    lap_start_time: f64,
    sector_starts: Vec<f64>,
}

#[cfg(windows)]
impl Default for IRacingTelemetrySource {
    fn default() -> Self {
        IRacingTelemetrySource::new(CONN_RETRY_WAIT_MS)
    }
}

#[cfg(windows)]
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[cfg(windows)]
impl IRacingTelemetrySource {
    pub fn new(retry_wait_ms: u64) -> Self {
        Self {
            client: None,
            runtime: None,
            retry_wait_ms,
            origin: None,
            last_lap_no: None,
            lap_start_time: 0.,
            sector_starts: Vec::new(),
        }
    }

    fn next_state(&mut self) -> Result<simetry::iracing::SimState, MapperError> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or(MapperError::MissingIRacingSession)?;
        let client = self
            .client
            .as_mut()
            .ok_or(MapperError::MissingIRacingSession)?;
        runtime
            .block_on(client.next_sim_state())
            .ok_or(MapperError::TelemetrySourceError {
                description: "Could not retrieve iRacing state".to_string(),
            })
    }

    /// Anchor the projection at the track's `TrackLatitude`/`TrackLongitude`
    fn anchor_to_track(&mut self, state: &simetry::iracing::SimState) {
        let session_info = state.session_info();
        let weekend = &session_info["WeekendInfo"];
        let read = |key: &str| {
            let value = &weekend[key];
            value
                .as_f64()
                .or_else(|| value.as_str().and_then(parse_track_coordinate))
        };

        match (read("TrackLatitude"), read("TrackLongitude")) {
            (Some(lat), Some(lon)) => {
                if self.origin != Some((lat, lon)) {
                    debug!("Projecting positions around track origin {:.6}, {:.6}", lat, lon);
                }
                self.origin = Some((lat, lon));
            }
            _ => warn!("No track reference point in session info, anchoring at first fix"),
        }
    }

    /// Project a lat/lon fix onto the plane around the track origin.
    fn project(&mut self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let (lat0, lon0) = *self.origin.get_or_insert((lat_deg, lon_deg));
        let x = (lon_deg - lon0).to_radians() * lat0.to_radians().cos() * EARTH_RADIUS_M;
        let y = (lat_deg - lat0).to_radians() * EARTH_RADIUS_M;
        (x, y)
    }
}

/// Parse a session info coordinate such as `"45.618968 m"`, the unit suffix is optional.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_track_coordinate(text: &str) -> Option<f64> {
    let value = text.trim().trim_end_matches('m').trim_end();
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Map a lap percentage onto sector 0, 1 or 2 given the sector start percentages.
#[cfg_attr(not(windows), allow(dead_code))]
fn sector_for_pct(sector_starts: &[f64], lap_pct: f64) -> i32 {
    let passed = sector_starts
        .iter()
        .filter(|start| lap_pct >= **start)
        .count();
    (passed.saturating_sub(1)).min(2) as i32
}

#[cfg(windows)]
impl TelemetrySource for IRacingTelemetrySource {
    fn start(&mut self) -> Result<(), MapperError> {
        let retry_delay = std::time::Duration::from_millis(self.retry_wait_ms);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| MapperError::TelemetrySourceError {
                description: format!("Could not create async runtime: {}", e),
            })?;

        let client = runtime.block_on(simetry::iracing::Client::connect(retry_delay));
        self.client = Some(client);
        self.runtime = Some(runtime);
        Ok(())
    }

    fn session_info(&mut self) -> Result<SessionInfo, MapperError> {
        let state = self.next_state()?;
        self.anchor_to_track(&state);
        let session_info = state.session_info();

        let track_name = session_info["WeekendInfo"]["TrackDisplayName"]
            .as_str()
            .unwrap_or("Unknown")
            .to_string();
        let track_code = session_info["WeekendInfo"]["TrackName"]
            .as_str()
            .unwrap_or("unknown");
        let track_config = session_info["WeekendInfo"]["TrackConfigName"]
            .as_str()
            .unwrap_or("");
        let track_id = if track_config.is_empty() {
            track_code.to_string()
        } else {
            format!("{} {}", track_code, track_config)
        };

        self.sector_starts = session_info["SplitTimeInfo"]["Sectors"]
            .as_sequence()
            .map(|sectors| {
                sectors
                    .iter()
                    .filter_map(|s| s["SectorStartPct"].as_f64())
                    .collect()
            })
            .unwrap_or_default();
        debug!(
            "iRacing session on {} ({} sectors)",
            track_id,
            self.sector_starts.len()
        );

        Ok(SessionInfo {
            track_id,
            track_name,
        })
    }

    fn telemetry(&mut self) -> Result<TelemetrySample, MapperError> {
        let state = self.next_state()?;
        if self.origin.is_none() {
            self.anchor_to_track(&state);
        }

        let read_f64 = |name: &str| state.read_name::<f64>(name);
        let read_f32 = |name: &str| state.read_name::<f32>(name).map(f64::from);

        let session_time = read_f64("SessionTime").ok_or(MapperError::TelemetrySourceError {
            description: "Missing SessionTime".to_string(),
        })?;
        let lap_no = state.read_name::<i32>("Lap").unwrap_or(0);
        let current_lap_time = read_f32("LapCurrentLapTime").unwrap_or(0.);

        // latch the lap start whenever the lap counter moves so jitter in the
        // current lap time cannot look like a new lap
        if self.last_lap_no != Some(lap_no) {
            self.last_lap_no = Some(lap_no);
            self.lap_start_time = session_time - current_lap_time;
        }

        let (lat, lon) = match (read_f64("Lat"), read_f64("Lon")) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Err(MapperError::TelemetrySourceError {
                    description: "Missing GPS position".to_string(),
                });
            }
        };
        let (position_longitudinal, position_lateral) = self.project(lat, lon);
        let lap_pct = read_f32("LapDistPct").unwrap_or(0.);

        Ok(TelemetrySample {
            on_track: state.read_name::<bool>("IsOnTrack").unwrap_or(false),
            lap_start_time: self.lap_start_time,
            lap_elapsed_time: session_time,
            last_lap_time: read_f32("LapLastLapTime").unwrap_or(-1.),
            sector_index: sector_for_pct(&self.sector_starts, lap_pct),
            lap_distance: read_f32("LapDist").unwrap_or(-1.),
            position_longitudinal,
            position_lateral,
            position_vertical: read_f32("Alt").unwrap_or(0.),
        })
    }
}

/// A mock telemetry source for tests and offline replays.
///
/// Replays a list of samples in order, one per call to `telemetry()`. Samples can be built in
/// code or loaded from a JSON Lines file written by the telemetry writer during a live session.
pub struct MockTelemetrySource {
    cur_tick: usize,
    samples: Vec<TelemetrySample>,
    pub session: SessionInfo,
}

impl Default for MockTelemetrySource {
    fn default() -> Self {
        Self {
            cur_tick: 0,
            samples: Vec::new(),
            session: SessionInfo::default(),
        }
    }
}

impl MockTelemetrySource {
    pub fn from_samples(samples: Vec<TelemetrySample>) -> Self {
        Self {
            samples,
            ..Default::default()
        }
    }

    pub fn with_track(mut self, track_id: &str) -> Self {
        self.session = SessionInfo {
            track_id: track_id.to_string(),
            track_name: track_id.to_string(),
        };
        self
    }

    /// Load samples from a JSON Lines file of [`TelemetryOutput`] records.
    ///
    /// The last `SessionChange` record in the file sets the session info.
    pub fn from_file(file: &Path) -> Result<Self, MapperError> {
        if !file.exists() {
            return Err(MapperError::InvalidTelemetryFile {
                path: format!("{:?}", file),
            });
        }

        let lines = serde_jsonlines::json_lines::<TelemetryOutput, _>(file).map_err(|e| {
            MapperError::TelemetrySourceError {
                description: format!("Could not open telemetry file: {}", e),
            }
        })?;

        let mut source = Self::default();
        for line in lines {
            let output = line.map_err(|e| {
                error!("Could not parse JSON line: {}", e);
                MapperError::TelemetrySourceError {
                    description: format!("Could not parse JSON line: {}", e),
                }
            })?;

            match output {
                TelemetryOutput::DataPoint(sample) => source.samples.push(*sample),
                TelemetryOutput::SessionChange(session) => source.session = session,
            }
        }

        debug!(
            "Loaded {} telemetry samples for {}",
            source.samples.len(),
            source.session.track_id
        );
        Ok(source)
    }

    pub fn remaining(&self) -> usize {
        self.samples.len().saturating_sub(self.cur_tick)
    }
}

impl TelemetrySource for MockTelemetrySource {
    fn start(&mut self) -> Result<(), MapperError> {
        // Mock source doesn't need to connect to anything
        Ok(())
    }

    fn session_info(&mut self) -> Result<SessionInfo, MapperError> {
        Ok(self.session.clone())
    }

    fn telemetry(&mut self) -> Result<TelemetrySample, MapperError> {
        let sample = self
            .samples
            .get(self.cur_tick)
            .cloned()
            .ok_or(MapperError::EndOfTelemetry)?;
        self.cur_tick += 1;
        Ok(sample)
    }
}

// Recorder session: decides between loading a stored map and recording a new one

use std::time::Duration;

use log::{debug, info, warn};

use crate::config::AppConfig;
use crate::telemetry::{TelemetrySample, TelemetrySource};
use crate::track_map::PathStore;

use super::output::{PublishedMap, SharedMapping, write_mapping};
use super::recorder::LapRecorder;

/// Periodic driver of the track map.
///
/// On every activation (player back on track) the stored map for the current track is loaded
/// and published. Without one, the lap recorder runs on the active interval until it commits
/// a lap, which is then published from memory on the next tick whether or not the save worked.
pub struct RecorderSession<S: PathStore> {
    recorder: LapRecorder<S>,
    output: SharedMapping,
    activated: bool,
    publish_pending: bool,
    track_id: String,
    active_interval: Duration,
    idle_interval: Duration,
    interval: Duration,
}

impl<S: PathStore> RecorderSession<S> {
    pub fn new(
        store: S,
        output: SharedMapping,
        active_interval: Duration,
        idle_interval: Duration,
    ) -> Self {
        Self {
            recorder: LapRecorder::new(store),
            output,
            activated: false,
            publish_pending: false,
            track_id: String::new(),
            active_interval,
            idle_interval,
            interval: active_interval,
        }
    }

    pub fn from_config(store: S, output: SharedMapping, config: &AppConfig) -> Self {
        Self::new(
            store,
            output,
            Duration::from_millis(config.active_interval_ms),
            Duration::from_millis(config.idle_interval_ms),
        )
    }

    pub fn recorder(&self) -> &LapRecorder<S> {
        &self.recorder
    }

    pub fn output(&self) -> &SharedMapping {
        &self.output
    }

    /// Interval to wait before the next tick
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    /// Run one tick and return the interval to wait before the next one
    pub fn update<T: TelemetrySource + ?Sized>(
        &mut self,
        source: &mut T,
        sample: &TelemetrySample,
    ) -> Duration {
        if sample.on_track {
            if !self.activated {
                self.activated = true;
                self.interval = self.active_interval;
                self.refresh_track(source);
                self.load_and_publish();
            } else if self.publish_pending {
                self.publish_pending = false;
                self.publish();
            }

            if !self.recorder.map().exists() {
                self.recorder.update(sample);
                // the committed lap goes out next tick
                self.publish_pending = self.recorder.map().exists();
            }
        } else if self.activated {
            self.activated = false;
            self.publish_pending = false;
            self.interval = self.idle_interval;
        }

        self.interval
    }

    fn refresh_track<T: TelemetrySource + ?Sized>(&mut self, source: &mut T) {
        match source.session_info() {
            Ok(info) => {
                if info.track_id != self.track_id {
                    info!("Track map session on {}", info.track_id);
                }
                self.track_id = info.track_id;
            }
            Err(e) => warn!("Could not read session info, keeping {}: {}", self.track_id, e),
        }
    }

    fn load_and_publish(&mut self) {
        self.publish_pending = false;
        self.recorder.map_mut().load(&self.track_id);

        if self.recorder.map().exists() {
            self.publish();
        } else {
            write_mapping(&self.output).clear();
            self.recorder.reset();
            debug!("No track map for {}, recording", self.track_id);
        }
    }

    /// Publish the map held in memory and slow down to the idle interval
    fn publish(&mut self) {
        let map = self.recorder.map();
        write_mapping(&self.output).publish(PublishedMap::new(
            map.coordinates(),
            map.distance_profile(),
            map.sector_indices(),
        ));
        self.interval = self.idle_interval;
        debug!("Published track map for {}", self.track_id);
    }
}

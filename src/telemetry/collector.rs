use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
    thread,
};

use log::{debug, info};

use crate::{
    MapperError,
    mapping::RecorderSession,
    track_map::PathStore,
};

use super::{TelemetryOutput, producer::TelemetrySource};

/// Poll `source` and drive the recorder session until the source runs dry or `running` is
/// cleared. Every sample is also forwarded to the telemetry writer when one is attached.
///
/// With `realtime` the loop waits the session's interval between polls, replays run flat out.
/// Returns the number of samples processed.
pub fn collect_telemetry<S: PathStore>(
    mut source: impl TelemetrySource,
    session: &mut RecorderSession<S>,
    telemetry_writer_sender: Option<Sender<TelemetryOutput>>,
    running: &AtomicBool,
    realtime: bool,
) -> Result<usize, MapperError> {
    source.start()?;

    if let Some(ref writer_sender) = telemetry_writer_sender {
        writer_sender.send(TelemetryOutput::SessionChange(source.session_info()?))?;
    }

    let mut ticks = 0;
    while running.load(Ordering::Relaxed) {
        if realtime {
            thread::sleep(session.interval());
        }

        let sample = match source.telemetry() {
            Ok(sample) => sample,
            Err(MapperError::EndOfTelemetry) => {
                info!("Telemetry source exhausted after {} samples", ticks);
                break;
            }
            Err(e) => {
                // the simulator may simply not be running yet
                debug!("Skipping telemetry poll: {}", e);
                continue;
            }
        };

        if let Some(ref writer_sender) = telemetry_writer_sender {
            writer_sender.send(TelemetryOutput::DataPoint(Box::new(sample.clone())))?;
        }

        session.update(&mut source, &sample);
        ticks += 1;
    }

    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{read_mapping, shared_mapping};
    use crate::telemetry::{MockTelemetrySource, TelemetrySample};
    use crate::track_map::MemoryPathStore;
    use std::sync::mpsc;
    use std::time::Duration;

    fn session() -> RecorderSession<MemoryPathStore> {
        RecorderSession::new(
            MemoryPathStore::new(),
            shared_mapping(),
            Duration::from_millis(20),
            Duration::from_millis(400),
        )
    }

    fn lap_samples() -> Vec<TelemetrySample> {
        let tick = |lap_start_time: f64, now: f64, distance: f64| TelemetrySample {
            on_track: true,
            lap_start_time,
            lap_elapsed_time: now,
            lap_distance: distance,
            position_longitudinal: distance,
            position_lateral: distance * 0.5,
            ..Default::default()
        };

        let mut samples = vec![tick(0., 0., 0.), tick(5., 5., 0.)];
        samples.extend((1..=10).map(|i| tick(5., 5. + i as f64, i as f64 * 100.)));
        samples.push(tick(95., 95., 0.));
        let mut commit = tick(95., 97., 20.);
        commit.last_lap_time = 90.;
        samples.push(commit);
        samples.push(tick(95., 97.1, 25.));
        samples
    }

    #[test]
    fn test_replay_records_and_publishes() {
        let source = MockTelemetrySource::from_samples(lap_samples()).with_track("spa");
        let mut session = session();
        let running = AtomicBool::new(true);

        let ticks = collect_telemetry(source, &mut session, None, &running, false).unwrap();
        assert_eq!(ticks, 15);

        let output = read_mapping(session.output());
        assert_eq!(output.map().unwrap().coordinates.len(), 10);
        assert!(session.recorder().map().store().path_exists("spa").unwrap());
    }

    #[test]
    fn test_samples_are_forwarded_to_writer() {
        let source = MockTelemetrySource::from_samples(lap_samples()).with_track("spa");
        let mut session = session();
        let running = AtomicBool::new(true);
        let (tx, rx) = mpsc::channel();

        collect_telemetry(source, &mut session, Some(tx), &running, false).unwrap();

        let outputs: Vec<TelemetryOutput> = rx.iter().collect();
        assert_eq!(outputs.len(), 16);
        assert!(matches!(
            &outputs[0],
            TelemetryOutput::SessionChange(info) if info.track_id == "spa"
        ));
        assert!(matches!(&outputs[1], TelemetryOutput::DataPoint(_)));
    }

    #[test]
    fn test_stops_when_not_running() {
        let source = MockTelemetrySource::from_samples(lap_samples());
        let mut session = session();
        let running = AtomicBool::new(false);

        let ticks = collect_telemetry(source, &mut session, None, &running, false).unwrap();
        assert_eq!(ticks, 0);
        assert!(read_mapping(session.output()).map().is_none());
    }
}

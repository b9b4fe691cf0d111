use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
    },
    thread,
};

use clap::{Parser, Subcommand, arg};
use log::{error, info, warn};
#[cfg(windows)]
use trackmap::telemetry::IRacingTelemetrySource;
use trackmap::{
    AppConfig, FileBasedPathStore, MapperError, PathStore, RecorderSession, TelemetryOutput,
    TrackMapRenderer,
    mapping::{read_mapping, shared_mapping},
    telemetry::{MockTelemetrySource, collect_telemetry},
    writer,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a track map from live telemetry, or from a recorded telemetry file
    Record {
        /// Replay a telemetry file instead of reading the simulator
        #[arg(short, long)]
        replay: Option<PathBuf>,

        /// Also write every telemetry sample to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Track map directory
        #[arg(short, long)]
        storage: Option<PathBuf>,
    },
    /// List the tracks with a stored map
    List {
        #[arg(short, long)]
        storage: Option<PathBuf>,
    },
    /// Delete the stored map of a track
    Delete {
        #[arg(short, long)]
        track: String,

        #[arg(short, long)]
        storage: Option<PathBuf>,
    },
    /// Export the stored map of a track as SVG
    Export {
        #[arg(short, long)]
        track: String,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        storage: Option<PathBuf>,
    },
}

fn load_config() -> AppConfig {
    match AppConfig::from_local_file() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            warn!("Ignoring config file: {}", e);
            AppConfig::default()
        }
    }
}

fn open_store(storage: Option<PathBuf>, config: &AppConfig) -> Result<FileBasedPathStore, MapperError> {
    match storage.or_else(|| config.storage_dir.clone()) {
        Some(dir) => FileBasedPathStore::new(dir),
        None => FileBasedPathStore::new_default(),
    }
}

fn record(
    replay: Option<PathBuf>,
    output: Option<PathBuf>,
    storage: Option<PathBuf>,
) -> Result<(), MapperError> {
    let config = load_config();
    let store = open_store(storage, &config)?;
    let mapping = shared_mapping();
    let mut session = RecorderSession::from_config(store, mapping.clone(), &config);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("Exiting...");
        handler_flag.store(false, Ordering::Relaxed);
    }) {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    // the writer thread runs until the collector drops its sender
    let (telemetry_writer_tx, writer_handle) = match output {
        Some(output_file) => {
            let (tx, rx) = mpsc::channel::<TelemetryOutput>();
            let handle = thread::spawn(move || writer::write_telemetry(&output_file, rx));
            (Some(tx), Some(handle))
        }
        None => (None, None),
    };

    let collected = match replay {
        Some(input) => MockTelemetrySource::from_file(&input).and_then(|source| {
            collect_telemetry(source, &mut session, telemetry_writer_tx, &running, false)
        }),
        None => live(&mut session, telemetry_writer_tx, &running),
    };

    if let Some(handle) = writer_handle {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => error!("Telemetry writer thread panicked"),
        }
    }
    let ticks = collected?;

    match read_mapping(&mapping).map() {
        Some(map) => println!(
            "Track map for {} ready: {} points, sectors at {:?} ({} samples read)",
            session.track_id(),
            map.coordinates.len(),
            map.sector_indices,
            ticks
        ),
        None if session.recorder().map().exists() => println!(
            "Track map for {} recorded ({} samples read)",
            session.track_id(),
            ticks
        ),
        None => println!("No complete lap recorded ({} samples read)", ticks),
    }
    Ok(())
}

#[cfg(windows)]
fn live<S: PathStore>(
    session: &mut RecorderSession<S>,
    telemetry_writer_tx: Option<Sender<TelemetryOutput>>,
    running: &AtomicBool,
) -> Result<usize, MapperError> {
    collect_telemetry(
        IRacingTelemetrySource::default(),
        session,
        telemetry_writer_tx,
        running,
        true,
    )
}

#[cfg(not(windows))]
fn live<S: PathStore>(
    _session: &mut RecorderSession<S>,
    _telemetry_writer_tx: Option<Sender<TelemetryOutput>>,
    _running: &AtomicBool,
) -> Result<usize, MapperError> {
    Err(MapperError::LiveTelemetryUnsupported)
}

fn list(storage: Option<PathBuf>) -> Result<(), MapperError> {
    let store = open_store(storage, &load_config())?;
    let tracks = store.list_available_tracks()?;
    if tracks.is_empty() {
        println!("No track maps in {:?}", store.storage_path());
    }
    for track in tracks {
        println!("{}", track);
    }
    Ok(())
}

fn delete(track: &str, storage: Option<PathBuf>) -> Result<(), MapperError> {
    let mut store = open_store(storage, &load_config())?;
    if !store.path_exists(track)? {
        return Err(MapperError::InvalidUserInput {
            field: "track".to_string(),
            reason: format!("No track map for {}", track),
        });
    }
    store.delete_path(track)?;
    info!("Deleted track map for {}", track);
    Ok(())
}

fn export(track: &str, output: &Path, storage: Option<PathBuf>) -> Result<(), MapperError> {
    let mut store = open_store(storage, &load_config())?;
    let asset = store
        .load_path(track)?
        .ok_or_else(|| MapperError::InvalidUserInput {
            field: "track".to_string(),
            reason: format!("No track map for {}", track),
        })?;

    let svg = TrackMapRenderer::new().render(&asset)?;
    fs::write(output, svg).map_err(|e| MapperError::FileOperationError {
        operation: format!("write {:?}", output),
        reason: e.to_string(),
    })?;
    println!("Exported {} to {:?}", asset.track_id, output);
    Ok(())
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    let result = match cli.command {
        Commands::Record {
            replay,
            output,
            storage,
        } => record(replay, output, storage),
        Commands::List { storage } => list(storage),
        Commands::Delete { track, storage } => delete(&track, storage),
        Commands::Export {
            track,
            output,
            storage,
        } => export(&track, &output, storage),
    };

    if let Err(e) = result {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

use std::{fs::File, io::BufWriter, path::Path, sync::mpsc::Receiver};

use log::error;
use serde_jsonlines::JsonLinesWriter;

use crate::{MapperError, telemetry::TelemetryOutput};

/// Write every received telemetry record to `file` as JSON Lines until the channel closes.
pub fn write_telemetry(
    file: &Path,
    telemetry_receiver: Receiver<TelemetryOutput>,
) -> Result<(), MapperError> {
    let telemetry_file = File::create(file).map_err(|e| MapperError::WriterError { source: e })?;
    let mut telemetry_file_writer = JsonLinesWriter::new(BufWriter::new(telemetry_file));
    for output in &telemetry_receiver {
        if let Err(e) = telemetry_file_writer.write(&output) {
            error!("Error while writing telemetry sample to output file: {}", e);
        }
    }
    telemetry_file_writer
        .flush()
        .map_err(|e| MapperError::WriterError { source: e })?;
    Ok(())
}

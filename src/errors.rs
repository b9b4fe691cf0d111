// Error types for trackmap

use crate::telemetry::TelemetryOutput;
use snafu::Snafu;
use std::{io, sync::mpsc::SendError};

#[derive(Debug, Snafu)]
pub enum MapperError {
    // Errors for the iRacing client
    #[snafu(display("Missing iRacing client, session not initialized"))]
    MissingIRacingSession,
    #[snafu(display("Live telemetry is only available on Windows"))]
    LiveTelemetryUnsupported,

    // Errors while reading and forwarding telemetry samples
    #[snafu(display("Telemetry source error: {description}"))]
    TelemetrySourceError { description: String },
    #[snafu(display("No more telemetry samples to replay"))]
    EndOfTelemetry,
    #[snafu(display("Error forwarding telemetry sample to the writer"))]
    TelemetryBroadcastError {
        source: Box<SendError<TelemetryOutput>>,
    },

    // Errors for the telemetry writer
    #[snafu(display("Error writing telemetry file"))]
    WriterError { source: io::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // Path store errors
    #[snafu(display("Track map validation failed: {reason}"))]
    PathValidationError { reason: String },
    #[snafu(display("Track map storage error: {reason}"))]
    PathStoreError { reason: String },
    #[snafu(display("SVG generation failed: {reason}"))]
    SvgGenerationError { reason: String },

    // User input validation errors
    #[snafu(display("Invalid user input: {field} - {reason}"))]
    InvalidUserInput { field: String, reason: String },
    #[snafu(display("File operation failed: {operation} - {reason}"))]
    FileOperationError { operation: String, reason: String },

    #[snafu(display("Invalid telemetry file: {path}"))]
    InvalidTelemetryFile { path: String },
}

impl From<SendError<TelemetryOutput>> for MapperError {
    fn from(value: SendError<TelemetryOutput>) -> Self {
        MapperError::TelemetryBroadcastError {
            source: Box::new(value),
        }
    }
}

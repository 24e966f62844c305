// Error types for pitlane

use crate::strategy::StrategicRecommendation;
use snafu::Snafu;
use std::{io, sync::mpsc::SendError};

/// Errors raised at the I/O edges of the crate.
///
/// The analytics pipeline itself never fails: insufficient or implausible
/// telemetry degrades into retained values and lower confidence scores.
#[derive(Debug, Snafu)]
pub enum PitlaneError {
    // Errors while reading telemetry
    #[snafu(display("Unable to open telemetry replay file"))]
    NoReplayFile { source: io::Error },
    #[snafu(display("Telemetry producer error: {description}"))]
    TelemetryProducerError { description: String },
    #[snafu(display("Invalid telemetry file: {path}"))]
    InvalidTelemetryFile { path: String, source: io::Error },

    // Errors while broadcasting and writing recommendations
    #[snafu(display("Error broadcasting strategy recommendation"))]
    RecommendationBroadcastError {
        source: Box<SendError<StrategicRecommendation>>,
    },
    #[snafu(display("Error writing recommendation file"))]
    WriterError { source: io::Error },

    // Config management errors
    #[snafu(display("Could not find application config directory"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },
}

impl From<SendError<StrategicRecommendation>> for PitlaneError {
    fn from(value: SendError<StrategicRecommendation>) -> Self {
        PitlaneError::RecommendationBroadcastError {
            source: Box::new(value),
        }
    }
}

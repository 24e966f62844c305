// Library interface for pitlane
// The binary and the integration tests both build on these modules

pub mod config;
pub mod errors;
pub mod pit_stop;
pub mod strategy;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use config::{StrategyConfig, StrategyPolicy};
pub use errors::PitlaneError;
pub use pit_stop::{PitStopAnalysis, PitStopCalculator};
pub use strategy::{DerivedState, StrategicRecommendation, StrategyEngine, recompute};
pub use telemetry::{TelemetryHistory, TelemetrySnapshot};

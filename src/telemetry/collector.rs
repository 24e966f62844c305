use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::Sender,
};

use log::{error, info};

use crate::PitlaneError;
use crate::strategy::{StrategicRecommendation, StrategyEngine};

use super::producer::TelemetryProducer;

/// Feeds every snapshot from `producer` into the engine and broadcasts a
/// recommendation for every `every`th snapshot. Stops when the producer is
/// exhausted or `running` is cleared, returning the number of snapshots read.
pub fn collect_recommendations(
    mut producer: impl TelemetryProducer,
    engine: &mut StrategyEngine,
    recommendation_sender: Sender<StrategicRecommendation>,
    every: usize,
    running: Arc<AtomicBool>,
) -> Result<usize, PitlaneError> {
    producer.start()?;
    let every = every.max(1);
    let mut processed = 0;

    while running.load(Ordering::SeqCst) {
        let Some(snapshot) = producer.telemetry()? else {
            break;
        };
        processed += 1;

        if processed % every != 0 {
            engine.add_snapshot(snapshot);
            continue;
        }

        let recommendation = engine.generate_recommendation(snapshot);
        recommendation_sender.send(recommendation).map_err(|e| {
            error!("Could not send recommendation: {}", e);
            PitlaneError::from(e)
        })?;
    }

    info!(
        "Processed {} snapshots on {}",
        processed,
        producer
            .session_info()
            .map(|s| s.track_name)
            .unwrap_or_else(|_| "an empty session".to_string())
    );
    Ok(processed)
}

use std::{fs::File, io::BufWriter, path::Path, sync::mpsc::Receiver};

use log::warn;
use serde_jsonlines::JsonLinesWriter;

use crate::{PitlaneError, strategy::StrategicRecommendation};

/// Writes each received recommendation as one JSON line until the sender
/// side hangs up. Returns the number of lines written.
pub fn write_recommendations(
    file: &Path,
    recommendation_receiver: Receiver<StrategicRecommendation>,
) -> Result<usize, PitlaneError> {
    let output = File::create(file).map_err(|e| PitlaneError::WriterError { source: e })?;
    let mut writer = JsonLinesWriter::new(BufWriter::new(output));

    let mut written = 0;
    for recommendation in &recommendation_receiver {
        match writer.write(&recommendation) {
            Ok(()) => written += 1,
            Err(e) => warn!("Error while writing recommendation to output file: {}", e),
        }
    }

    writer
        .flush()
        .map_err(|e| PitlaneError::WriterError { source: e })?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyEngine;
    use crate::telemetry::TelemetrySnapshot;
    use std::sync::mpsc;

    #[test]
    fn test_writes_one_line_per_recommendation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recommendations.jsonl");
        let (sender, receiver) = mpsc::channel();

        let mut engine = StrategyEngine::default();
        for lap in 1..=3 {
            let mut snapshot = TelemetrySnapshot::default();
            snapshot.player.current_lap = lap;
            sender.send(engine.generate_recommendation(snapshot)).unwrap();
        }
        drop(sender);

        assert_eq!(write_recommendations(&path, receiver).unwrap(), 3);
        let lines: Vec<StrategicRecommendation> = serde_jsonlines::json_lines(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|r| r.pit_stop.is_some()));
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let (_sender, receiver) = mpsc::channel();
        let result = write_recommendations(Path::new("/nonexistent/dir/out.jsonl"), receiver);
        assert!(matches!(result, Err(PitlaneError::WriterError { .. })));
    }
}

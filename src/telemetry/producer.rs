use std::path::Path;

use log::{debug, info};

use crate::PitlaneError;

use super::{SessionState, TelemetrySnapshot};

/// Source of telemetry snapshots.
///
/// Implementations connect to a simulator or replay a recording. Snapshots
/// must be produced in arrival order; the strategy engine relies on that
/// ordering for every rolling statistic.
pub trait TelemetryProducer {
    /// Prepare the data source. Must be called before `telemetry()`.
    fn start(&mut self) -> Result<(), PitlaneError>;

    /// Session details of the most recent snapshot.
    fn session_info(&mut self) -> Result<SessionState, PitlaneError>;

    /// The next snapshot, or `None` once the source is exhausted.
    fn telemetry(&mut self) -> Result<Option<TelemetrySnapshot>, PitlaneError>;
}

/// Replays snapshots recorded as JSON Lines, or built in memory.
#[derive(Default)]
pub struct ReplayTelemetryProducer {
    cur_tick: usize,
    started: bool,
    snapshots: Vec<TelemetrySnapshot>,
}

impl ReplayTelemetryProducer {
    pub fn from_snapshots(snapshots: Vec<TelemetrySnapshot>) -> Self {
        Self {
            cur_tick: 0,
            started: false,
            snapshots,
        }
    }

    /// Load a recording with one `TelemetrySnapshot` per line.
    pub fn from_file(file: &Path) -> Result<Self, PitlaneError> {
        if !file.is_file() {
            return Err(PitlaneError::NoReplayFile {
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} is not a file", file.display()),
                ),
            });
        }

        let snapshots = serde_jsonlines::json_lines(file)
            .map_err(|e| PitlaneError::NoReplayFile { source: e })?
            .collect::<Result<Vec<TelemetrySnapshot>, std::io::Error>>()
            .map_err(|e| PitlaneError::InvalidTelemetryFile {
                path: file.display().to_string(),
                source: e,
            })?;

        info!(
            "Loaded {} telemetry snapshots from {}",
            snapshots.len(),
            file.display()
        );
        Ok(Self::from_snapshots(snapshots))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl TelemetryProducer for ReplayTelemetryProducer {
    fn start(&mut self) -> Result<(), PitlaneError> {
        debug!("Starting replay of {} snapshots", self.snapshots.len());
        self.cur_tick = 0;
        self.started = true;
        Ok(())
    }

    fn session_info(&mut self) -> Result<SessionState, PitlaneError> {
        let index = self.cur_tick.saturating_sub(1);
        self.snapshots
            .get(index)
            .map(|s| s.session.clone())
            .ok_or_else(|| PitlaneError::TelemetryProducerError {
                description: "Replay contains no snapshots".to_string(),
            })
    }

    fn telemetry(&mut self) -> Result<Option<TelemetrySnapshot>, PitlaneError> {
        if !self.started {
            return Err(PitlaneError::TelemetryProducerError {
                description: "Replay producer not started".to_string(),
            });
        }

        let snapshot = self.snapshots.get(self.cur_tick).cloned();
        if snapshot.is_some() {
            self.cur_tick += 1;
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn snapshot(lap: u32) -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::default();
        snapshot.session.track_name = "Monza".to_string();
        snapshot.player.current_lap = lap;
        snapshot
    }

    #[test]
    fn test_replay_in_order_then_exhausted() {
        let mut producer = ReplayTelemetryProducer::from_snapshots(vec![snapshot(1), snapshot(2)]);
        assert!(producer.telemetry().is_err());

        producer.start().unwrap();
        assert_eq!(producer.telemetry().unwrap().map(|s| s.player.current_lap), Some(1));
        assert_eq!(producer.session_info().unwrap().track_name, "Monza");
        assert_eq!(producer.telemetry().unwrap().map(|s| s.player.current_lap), Some(2));
        assert_eq!(producer.telemetry().unwrap(), None);
    }

    #[test]
    fn test_empty_replay_has_no_session() {
        let mut producer = ReplayTelemetryProducer::default();
        producer.start().unwrap();
        assert!(producer.session_info().is_err());
        assert_eq!(producer.telemetry().unwrap(), None);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for lap in 1..=3 {
            writeln!(file, "{}", serde_json::to_string(&snapshot(lap)).unwrap()).unwrap();
        }
        // fields omitted from a line take their defaults
        writeln!(file, r#"{{"player": {{"current_lap": 4}}}}"#).unwrap();
        file.flush().unwrap();

        let producer = ReplayTelemetryProducer::from_file(file.path()).unwrap();
        assert_eq!(producer.len(), 4);
    }

    #[test]
    fn test_from_file_errors() {
        let missing = ReplayTelemetryProducer::from_file(Path::new("/nonexistent/replay.jsonl"));
        assert!(matches!(missing, Err(PitlaneError::NoReplayFile { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();
        let invalid = ReplayTelemetryProducer::from_file(file.path());
        assert!(matches!(invalid, Err(PitlaneError::InvalidTelemetryFile { .. })));
    }
}

use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::LapPolicy;
use crate::telemetry::TelemetryHistory;

/// Direction lap times are moving in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapTrend {
    Improving,
    Stable,
    Degrading,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LapAnalysis {
    pub sample_count: usize,
    pub average_lap_time_s: f32,
    pub median_lap_time_s: f32,
    /// Mean absolute deviation from the average lap time
    pub variance_s: f32,
    /// 1.0 for perfectly repeatable laps, falling to 0.0 as variance grows
    pub consistency_score: f32,
    pub trend: Option<LapTrend>,
    pub predicted_lap_time_s: f32,
    pub optimal_lap_time_s: f32,
}

pub struct LapTimeAnalyzer {
    policy: LapPolicy,
}

impl Default for LapTimeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LapTimeAnalyzer {
    pub fn new() -> Self {
        Self::with_policy(LapPolicy::default())
    }

    pub fn with_policy(policy: LapPolicy) -> Self {
        Self { policy }
    }

    pub fn analyze(&self, history: &TelemetryHistory, previous: &LapAnalysis) -> LapAnalysis {
        // most recent first
        let samples: Vec<f32> = history
            .recent(history.len())
            .map(|s| s.player.last_lap_time_s)
            .filter(|t| *t > 0.)
            .take(self.policy.sample_count)
            .collect();

        if samples.len() < self.policy.min_samples {
            debug!(
                "Lap analysis skipped, {} lap samples available",
                samples.len()
            );
            return previous.clone();
        }

        let mut analysis = previous.clone();
        let average = mean(&samples);
        let variance = samples.iter().map(|t| (t - average).abs()).sum::<f32>() / samples.len() as f32;

        analysis.sample_count = samples.len();
        analysis.average_lap_time_s = average;
        analysis.median_lap_time_s = samples
            .iter()
            .copied()
            .sorted_by(|a, b| a.total_cmp(b))
            .nth(samples.len() / 2)
            .unwrap_or(average);
        analysis.variance_s = variance;
        if average > 0. {
            analysis.consistency_score =
                (1. - (variance / average) * self.policy.consistency_scale).max(0.);
        }

        if let Some(trend) = self.trend(&samples) {
            analysis.trend = Some(trend);
        }

        let adjustment = match analysis.trend {
            Some(LapTrend::Improving) => self.policy.improving_adjustment_s,
            Some(LapTrend::Degrading) => self.policy.degrading_adjustment_s,
            Some(LapTrend::Stable) | None => 0.,
        };
        analysis.predicted_lap_time_s = average + adjustment;

        if let Some(current) = history.latest() {
            if current.player.best_lap_time_s > 0. {
                analysis.optimal_lap_time_s = current.player.best_lap_time_s;
            }
        }

        analysis
    }

    /// Compares the oldest and newest laps of a most-recent-first sample set.
    fn trend(&self, samples: &[f32]) -> Option<LapTrend> {
        let window = self.policy.trend_window;
        if samples.len() < self.policy.trend_min_samples || samples.len() < window || window == 0 {
            return None;
        }

        let newer = mean(&samples[..window]);
        let older = mean(&samples[samples.len() - window..]);
        let delta = newer - older;

        Some(if delta < -self.policy.trend_threshold_s {
            LapTrend::Improving
        } else if delta > self.policy.trend_threshold_s {
            LapTrend::Degrading
        } else {
            LapTrend::Stable
        })
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

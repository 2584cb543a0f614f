//! Round outcomes and multi-round aggregates.

use crate::types::Tick;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// Bot 0's final score.
    pub score: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_coverage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticks_to_first_capture: Option<Tick>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beacon_utilization: Option<f64>,
}

impl RoundOutcome {
    pub fn score_only(score: u64) -> Self {
        Self {
            score,
            tile_coverage: None,
            ticks_to_first_capture: None,
            beacon_utilization: None,
        }
    }
}

/// `part / whole` as a percentage, truncated to two decimals.
/// `None` when `whole` is zero.
pub fn percent(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    Some(truncate2(part as f64 / whole as f64 * 100.0))
}

pub fn truncate2(x: f64) -> f64 {
    (x * 100.0).trunc() / 100.0
}

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

pub fn median(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    })
}

/// Population standard deviation over mean, as a percentage.
pub fn coefficient_of_variation(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    if m == 0.0 {
        return None;
    }
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    Some(var.sqrt() / m * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub rounds: usize,
    pub mean_utilization: Option<f64>,
    pub utilization_cv: Option<f64>,
    pub median_ticks_to_first_capture: Option<f64>,
    /// Percentage of rounds in which any beacon was captured. Rounds where
    /// beacons spawned but none was taken count against it on purpose.
    pub capture_rate: f64,
    pub mean_tile_coverage: Option<f64>,
}

impl RoundSummary {
    pub fn from_outcomes(outcomes: &[RoundOutcome]) -> Self {
        let utilization: Vec<f64> = outcomes.iter().filter_map(|o| o.beacon_utilization).collect();
        let first_capture: Vec<f64> = outcomes
            .iter()
            .filter_map(|o| o.ticks_to_first_capture)
            .map(|t| t as f64)
            .collect();
        let coverage: Vec<f64> = outcomes.iter().filter_map(|o| o.tile_coverage).collect();
        let capture_rate = if outcomes.is_empty() {
            0.0
        } else {
            first_capture.len() as f64 * 100.0 / outcomes.len() as f64
        };

        Self {
            rounds: outcomes.len(),
            mean_utilization: mean(&utilization),
            utilization_cv: coefficient_of_variation(&utilization),
            median_ticks_to_first_capture: median(&first_capture),
            capture_rate,
            mean_tile_coverage: mean(&coverage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(util: Option<f64>, ttfc: Option<Tick>, coverage: f64) -> RoundOutcome {
        RoundOutcome {
            score: 0,
            tile_coverage: Some(coverage),
            ticks_to_first_capture: ttfc,
            beacon_utilization: util,
        }
    }

    #[test]
    fn percent_truncates() {
        assert_eq!(percent(2, 3), Some(66.66));
        assert_eq!(percent(1, 1), Some(100.0));
        assert_eq!(percent(1, 0), None);
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn cv_of_constant_series_is_zero() {
        assert_eq!(coefficient_of_variation(&[5.0, 5.0, 5.0]), Some(0.0));
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), None);
        let cv = coefficient_of_variation(&[1.0, 3.0]).unwrap();
        assert!((cv - 50.0).abs() < 1e-9);
    }

    #[test]
    fn summary_aggregates_rounds() {
        let outcomes = vec![
            outcome(Some(10.0), Some(40), 50.0),
            outcome(Some(30.0), None, 70.0),
            outcome(None, Some(60), 90.0),
            outcome(Some(20.0), Some(100), 30.0),
        ];
        let s = RoundSummary::from_outcomes(&outcomes);
        assert_eq!(s.rounds, 4);
        assert_eq!(s.mean_utilization, Some(20.0));
        assert_eq!(s.median_ticks_to_first_capture, Some(60.0));
        assert_eq!(s.capture_rate, 75.0);
        assert_eq!(s.mean_tile_coverage, Some(60.0));
    }

    #[test]
    fn outcome_json_omits_missing_metrics() {
        let json = serde_json::to_string(&RoundOutcome::score_only(12)).unwrap();
        assert_eq!(json, r#"{"score":12}"#);
    }
}

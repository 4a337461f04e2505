// src/behavioral/scorer.rs - Statistical anomaly scoring
//
// Pure function of (features, profile, timestamp sequences): a
// normalized-distance score over the four profiled dimensions, blended
// with an independent temporal-irregularity score. Persisting the
// result onto a session row is the caller's responsibility.

use serde::{Deserialize, Serialize};

use super::features::{mean, std_dev, FeatureVector};
use super::profile::UserProfile;
use crate::models::Recommendation;

/// Score above which the live decision surface flags the session
pub const ANOMALY_THRESHOLD: f64 = 0.7;
/// Harder bar that forces re-authentication
pub const REAUTH_THRESHOLD: f64 = 0.8;
/// A deviation norm of 3 (three standard deviations on every axis
/// simultaneously) calibrates to a score of 1. Tunable, not derived.
const DISTANCE_CALIBRATION: f64 = 3.0;
const DISTANCE_WEIGHT: f64 = 0.8;
const TEMPORAL_WEIGHT: f64 = 0.2;
/// Minimum timestamps before a series contributes temporal signal
const MIN_TEMPORAL_SAMPLES: usize = 3;

/// Per-modality contribution, for explainability. All values are
/// non-negative absolute normalized deviations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyDetails {
    pub mouse_anomalies: f64,
    pub keystroke_anomalies: f64,
    pub touch_anomalies: f64,
    /// Temporal-irregularity score
    pub session_anomalies: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyResult {
    /// Clamped to [0, 1]
    pub anomaly_score: f64,
    pub is_anomalous: bool,
    pub threshold: f64,
    pub recommendation: Recommendation,
    pub details: AnomalyDetails,
}

impl AnomalyResult {
    /// Cold-start and fail-open result: score 0, not anomalous
    pub fn neutral() -> Self {
        AnomalyResult {
            anomaly_score: 0.0,
            is_anomalous: false,
            threshold: ANOMALY_THRESHOLD,
            recommendation: Recommendation::Continue,
            details: AnomalyDetails::default(),
        }
    }
}

/// Normalized deviation with a zero-std guard: a baseline that never
/// varied divides by 1 instead of 0
fn normalized_deviation(observed: f64, mean: f64, std: f64) -> f64 {
    let divisor = if std == 0.0 { 1.0 } else { std };
    (observed - mean) / divisor
}

/// Coefficient of variation of inter-event intervals, clamped to
/// [0, 1]. Series shorter than MIN_TEMPORAL_SAMPLES contribute 0.
pub fn temporal_irregularity(timestamps: &[u64]) -> f64 {
    if timestamps.len() < MIN_TEMPORAL_SAMPLES {
        return 0.0;
    }
    let intervals: Vec<f64> = timestamps
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]) as f64)
        .collect();
    let m = mean(&intervals);
    if m > 0.0 {
        (std_dev(&intervals) / m).min(1.0)
    } else {
        0.0
    }
}

/// Score a behavior window against the user's baseline.
///
/// Without a profile (cold start) this short-circuits to the neutral
/// result rather than failing. Deterministic: identical inputs always
/// produce the identical score.
pub fn score(
    features: &FeatureVector,
    profile: Option<&UserProfile>,
    mouse_timestamps: &[u64],
    keystroke_timestamps: &[u64],
) -> AnomalyResult {
    let profile = match profile {
        Some(p) => p,
        None => return AnomalyResult::neutral(),
    };

    let mouse_z = normalized_deviation(
        features.avg_mouse_velocity,
        profile.mouse_velocity_mean,
        profile.mouse_velocity_std,
    );
    let dwell_z = normalized_deviation(
        features.avg_dwell_time,
        profile.dwell_time_mean,
        profile.dwell_time_std,
    );
    let flight_z = normalized_deviation(
        features.avg_flight_time,
        profile.flight_time_mean,
        profile.flight_time_std,
    );
    let touch_z = normalized_deviation(
        features.avg_touch_pressure,
        profile.touch_pressure_mean,
        profile.touch_pressure_std,
    );

    let norm = (mouse_z.powi(2) + dwell_z.powi(2) + flight_z.powi(2) + touch_z.powi(2)).sqrt();
    let distance_score = (norm / DISTANCE_CALIBRATION).min(1.0);

    let temporal_score = (temporal_irregularity(mouse_timestamps)
        + temporal_irregularity(keystroke_timestamps))
        / 2.0;

    let final_score =
        (DISTANCE_WEIGHT * distance_score + TEMPORAL_WEIGHT * temporal_score).clamp(0.0, 1.0);

    let recommendation = if final_score > REAUTH_THRESHOLD {
        Recommendation::RequireReauth
    } else {
        Recommendation::Continue
    };

    AnomalyResult {
        anomaly_score: final_score,
        is_anomalous: final_score > ANOMALY_THRESHOLD,
        threshold: ANOMALY_THRESHOLD,
        recommendation,
        details: AnomalyDetails {
            mouse_anomalies: mouse_z.abs(),
            keystroke_anomalies: (dwell_z.abs() + flight_z.abs()) / 2.0,
            touch_anomalies: touch_z.abs(),
            session_anomalies: temporal_score,
        },
    }
}

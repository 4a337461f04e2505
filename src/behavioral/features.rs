// src/behavioral/features.rs - Statistical feature extraction
//
// Reduces the sampler's buffers into a fixed 8-dimension feature vector
// plus per-modality summary statistics. Extraction is a read-only pass:
// it never mutates the buffers, and every statistic of an empty buffer
// is 0, never NaN.

use serde::{Deserialize, Serialize};

use super::sampler::EventSampler;
use super::BehavioralError;

pub const FEATURE_DIMENSIONS: usize = 8;

/// Fixed-arity behavior descriptor. On the wire this is a plain JSON
/// array of 8 numbers; deserialization rejects any other arity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 8]", try_from = "Vec<f64>")]
pub struct FeatureVector {
    pub avg_mouse_velocity: f64,
    pub avg_dwell_time: f64,
    pub avg_flight_time: f64,
    pub avg_touch_pressure: f64,
    pub mouse_event_count: f64,
    pub keystroke_event_count: f64,
    pub touch_event_count: f64,
    pub session_duration_ms: f64,
}

impl From<FeatureVector> for [f64; 8] {
    fn from(v: FeatureVector) -> Self {
        [
            v.avg_mouse_velocity,
            v.avg_dwell_time,
            v.avg_flight_time,
            v.avg_touch_pressure,
            v.mouse_event_count,
            v.keystroke_event_count,
            v.touch_event_count,
            v.session_duration_ms,
        ]
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = BehavioralError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        if values.len() != FEATURE_DIMENSIONS {
            return Err(BehavioralError::InvalidFeatureVector {
                expected: FEATURE_DIMENSIONS,
                actual: values.len(),
            });
        }
        Ok(FeatureVector {
            avg_mouse_velocity: values[0],
            avg_dwell_time: values[1],
            avg_flight_time: values[2],
            avg_touch_pressure: values[3],
            mouse_event_count: values[4],
            keystroke_event_count: values[5],
            touch_event_count: values[6],
            session_duration_ms: values[7],
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseVelocityStats {
    pub mean: f64,
    pub std: f64,
    pub max: f64,
    pub min: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystrokeTimingStats {
    pub dwell_mean: f64,
    pub flight_mean: f64,
    /// Coefficient of variation of inter-keystroke gaps; higher means
    /// more irregular typing rhythm
    pub rhythm: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchPressureStats {
    pub mean: f64,
    pub std: f64,
    /// mean/std when std > 0; a constant signal reports 1
    pub consistency: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub duration_ms: f64,
    pub event_count: f64,
    /// Reserved, always 0
    pub error_rate: f64,
}

/// Per-modality summary bundle, pushed with metric reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralFeatures {
    pub mouse_velocity_stats: MouseVelocityStats,
    pub keystroke_timing_stats: KeystrokeTimingStats,
    pub touch_pressure_stats: TouchPressureStats,
    pub session_metrics: SessionMetrics,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Coefficient of variation of the gaps between consecutive timestamps,
/// 0 when there are fewer than two gaps or the mean gap is 0
fn interval_cv(timestamps: &[u64]) -> f64 {
    if timestamps.len() < 2 {
        return 0.0;
    }
    let intervals: Vec<f64> = timestamps
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]) as f64)
        .collect();
    let m = mean(&intervals);
    if m > 0.0 {
        std_dev(&intervals) / m
    } else {
        0.0
    }
}

fn mouse_stats(sampler: &EventSampler) -> MouseVelocityStats {
    // The first sample always carries velocity 0; zero velocities stay
    // in the raw buffer but are excluded from the statistic.
    let velocities: Vec<f64> = sampler
        .mouse_samples()
        .map(|m| m.velocity)
        .filter(|v| *v > 0.0)
        .collect();
    if velocities.is_empty() {
        return MouseVelocityStats::default();
    }
    MouseVelocityStats {
        mean: mean(&velocities),
        std: std_dev(&velocities),
        max: velocities.iter().cloned().fold(f64::MIN, f64::max),
        min: velocities.iter().cloned().fold(f64::MAX, f64::min),
    }
}

fn keystroke_stats(sampler: &EventSampler) -> KeystrokeTimingStats {
    let dwells: Vec<f64> = sampler.key_samples().map(|k| k.dwell_ms).collect();
    let flights: Vec<f64> = sampler.key_samples().map(|k| k.flight_ms).collect();
    KeystrokeTimingStats {
        dwell_mean: mean(&dwells),
        flight_mean: mean(&flights),
        rhythm: interval_cv(&sampler.keystroke_timestamps()),
    }
}

fn touch_stats(sampler: &EventSampler) -> TouchPressureStats {
    let pressures: Vec<f64> = sampler.touch_samples().map(|t| t.pressure).collect();
    if pressures.is_empty() {
        return TouchPressureStats::default();
    }
    let m = mean(&pressures);
    let s = std_dev(&pressures);
    TouchPressureStats {
        mean: m,
        std: s,
        consistency: if s > 0.0 { m / s } else { 1.0 },
    }
}

/// Reduce the current buffers into the feature vector and the
/// per-modality summary statistics, as of `now_ms`.
pub fn extract(sampler: &EventSampler, now_ms: u64) -> (FeatureVector, BehavioralFeatures) {
    let mouse = mouse_stats(sampler);
    let keystroke = keystroke_stats(sampler);
    let touch = touch_stats(sampler);
    let duration_ms = now_ms.saturating_sub(sampler.session_start_ms()) as f64;

    let features = BehavioralFeatures {
        mouse_velocity_stats: mouse,
        keystroke_timing_stats: keystroke,
        touch_pressure_stats: touch,
        session_metrics: SessionMetrics {
            duration_ms,
            event_count: sampler.total_event_count() as f64,
            error_rate: 0.0,
        },
    };

    let vector = FeatureVector {
        avg_mouse_velocity: mouse.mean,
        avg_dwell_time: keystroke.dwell_mean,
        avg_flight_time: keystroke.flight_mean,
        avg_touch_pressure: touch.mean,
        mouse_event_count: sampler.mouse_count() as f64,
        keystroke_event_count: sampler.keystroke_count() as f64,
        touch_event_count: sampler.touch_count() as f64,
        session_duration_ms: duration_ms,
    };

    (vector, features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffers_yield_zero_stats() {
        let sampler = EventSampler::new(1_000);
        let (vector, features) = extract(&sampler, 5_000);

        assert_eq!(vector.avg_mouse_velocity, 0.0);
        assert_eq!(vector.avg_dwell_time, 0.0);
        assert_eq!(vector.avg_flight_time, 0.0);
        assert_eq!(vector.avg_touch_pressure, 0.0);
        assert_eq!(vector.mouse_event_count, 0.0);
        assert_eq!(vector.session_duration_ms, 4_000.0);

        let arr: [f64; 8] = vector.into();
        assert!(arr.iter().all(|v| v.is_finite()));
        assert_eq!(features.touch_pressure_stats.consistency, 0.0);
        assert_eq!(features.session_metrics.error_rate, 0.0);
    }

    #[test]
    fn test_zero_velocities_excluded_from_mouse_stats() {
        let mut sampler = EventSampler::new(0);
        // First sample has velocity 0 and must not drag the mean down
        sampler.record_mouse_move(0.0, 0.0, 0, None);
        sampler.record_mouse_move(100.0, 0.0, 100, None);
        sampler.record_mouse_move(300.0, 0.0, 200, None);

        let (vector, features) = extract(&sampler, 200);
        assert!((features.mouse_velocity_stats.mean - 1.5).abs() < 1e-9);
        assert_eq!(features.mouse_velocity_stats.max, 2.0);
        assert_eq!(features.mouse_velocity_stats.min, 1.0);
        assert_eq!(vector.mouse_event_count, 3.0);
    }

    #[test]
    fn test_keystroke_rhythm_is_interval_cv() {
        let mut sampler = EventSampler::new(0);
        for (press, release) in [(0u64, 50u64), (100, 150), (200, 250)] {
            sampler.record_key_down("a", press);
            sampler.record_key_up("a", release, None);
        }
        let (_, features) = extract(&sampler, 300);
        // Perfectly even 100 ms cadence has zero variation
        assert_eq!(features.keystroke_timing_stats.rhythm, 0.0);
        assert_eq!(features.keystroke_timing_stats.dwell_mean, 50.0);
    }

    #[test]
    fn test_constant_touch_pressure_is_maximally_consistent() {
        let mut sampler = EventSampler::new(0);
        for i in 0..5u64 {
            sampler.record_touch(0.0, 0.0, i * 100, Some(0.6), None);
        }
        let (_, features) = extract(&sampler, 500);
        assert_eq!(features.touch_pressure_stats.std, 0.0);
        assert_eq!(features.touch_pressure_stats.consistency, 1.0);
    }

    #[test]
    fn test_feature_vector_wire_arity_enforced() {
        let ok: Result<FeatureVector, _> =
            serde_json::from_str("[1.0, 2.0, 3.0, 0.5, 10, 5, 2, 60000]");
        assert!(ok.is_ok());

        let short: Result<FeatureVector, _> =
            serde_json::from_str("[1.0, 2.0, 3.0, 0.5, 10, 5, 2]");
        assert!(short.is_err());

        let long: Result<FeatureVector, _> =
            serde_json::from_str("[1.0, 2.0, 3.0, 0.5, 10, 5, 2, 60000, 1]");
        assert!(long.is_err());
    }

    #[test]
    fn test_feature_vector_serializes_as_array() {
        let vector = FeatureVector {
            avg_mouse_velocity: 1.0,
            avg_dwell_time: 100.0,
            avg_flight_time: 50.0,
            avg_touch_pressure: 0.5,
            mouse_event_count: 10.0,
            keystroke_event_count: 5.0,
            touch_event_count: 2.0,
            session_duration_ms: 60_000.0,
        };
        let json = serde_json::to_string(&vector).unwrap();
        assert_eq!(json, "[1.0,100.0,50.0,0.5,10.0,5.0,2.0,60000.0]");
    }
}

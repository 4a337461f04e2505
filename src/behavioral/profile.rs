// src/behavioral/profile.rs - Per-user behavioral baseline
//
// The scoring core only ever reads profiles. Baselines are learned by
// an offline process outside this crate and refreshed by polling; a
// missing profile is the expected state for a new user, not an error.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Running mean/standard-deviation baseline for each profiled feature
/// dimension. Invariant: every std is >= 0; a std of 0 means the
/// dimension never varies and must not produce a division error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub mouse_velocity_mean: f64,
    pub mouse_velocity_std: f64,
    pub dwell_time_mean: f64,
    pub dwell_time_std: f64,
    pub flight_time_mean: f64,
    pub flight_time_std: f64,
    pub touch_pressure_mean: f64,
    pub touch_pressure_std: f64,
}

impl UserProfile {
    /// Baseline seeded for the demo account: relaxed desktop usage
    /// with moderate typing speed
    pub fn demo_baseline() -> Self {
        UserProfile {
            mouse_velocity_mean: 1.0,
            mouse_velocity_std: 0.2,
            dwell_time_mean: 100.0,
            dwell_time_std: 20.0,
            flight_time_mean: 50.0,
            flight_time_std: 10.0,
            touch_pressure_mean: 0.5,
            touch_pressure_std: 0.1,
        }
    }
}

/// Read boundary the scorer depends on
pub trait ProfileStore: Send + Sync {
    /// Absence is a valid, expected state for new users
    fn get_profile(&self, user_id: &str) -> Option<UserProfile>;
}

/// In-memory profile store served by the API. Writes only happen
/// through `upsert_profile`, which stands in for the offline learner.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_profile(&self, user_id: &str, profile: UserProfile) {
        self.profiles.write().insert(user_id.to_string(), profile);
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn get_profile(&self, user_id: &str) -> Option<UserProfile> {
        self.profiles.read().get(user_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn baseline_profile() -> UserProfile {
        UserProfile {
            mouse_velocity_mean: 1.0,
            mouse_velocity_std: 0.2,
            dwell_time_mean: 100.0,
            dwell_time_std: 20.0,
            flight_time_mean: 50.0,
            flight_time_std: 10.0,
            touch_pressure_mean: 0.5,
            touch_pressure_std: 0.1,
        }
    }

    #[test]
    fn test_absent_profile_is_none() {
        let store = InMemoryProfileStore::new();
        assert!(store.get_profile("new-user").is_none());
    }

    #[test]
    fn test_upsert_and_read_back() {
        let store = InMemoryProfileStore::new();
        store.upsert_profile("demo-user", baseline_profile());
        let profile = store.get_profile("demo-user").unwrap();
        assert_eq!(profile.dwell_time_mean, 100.0);

        let mut updated = baseline_profile();
        updated.dwell_time_mean = 110.0;
        store.upsert_profile("demo-user", updated);
        assert_eq!(store.get_profile("demo-user").unwrap().dwell_time_mean, 110.0);
    }

    #[test]
    fn test_profile_wire_format_is_camel_case() {
        let json = serde_json::to_value(baseline_profile()).unwrap();
        assert!(json.get("mouseVelocityMean").is_some());
        assert!(json.get("touchPressureStd").is_some());
    }
}

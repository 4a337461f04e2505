// src/behavioral/sampler.rs - Raw interaction capture with bounded ring buffers
//
// Capture is passive: recording an event only mutates the sampler's own
// buffers and never blocks or cancels the input that produced it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Mouse buffer holds the most recent 100 movements
pub const MOUSE_BUFFER_CAPACITY: usize = 100;
/// Keystroke buffer holds the most recent 50 completed key presses
pub const KEYSTROKE_BUFFER_CAPACITY: usize = 50;
/// Touch buffer holds the most recent 50 contacts
pub const TOUCH_BUFFER_CAPACITY: usize = 50;

/// Contact area reported when the device exposes no radii
const DEFAULT_TOUCH_AREA: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseSample {
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: u64,
    /// Pixels per millisecond since the previous sample, 0 for the first
    pub velocity: f64,
    /// Change in velocity since the previous sample, 0 for the first
    pub acceleration: f64,
    pub pressure: f64,
    /// True when pressure did not come from a hardware sensor
    pub simulated_pressure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeySample {
    pub key: String,
    /// Press timestamp
    pub timestamp_ms: u64,
    /// Hold duration: release - press
    pub dwell_ms: f64,
    /// Gap since the previous key's release, clamped at 0
    pub flight_ms: f64,
    pub pressure: f64,
    pub simulated_pressure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchSample {
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: u64,
    pub pressure: f64,
    pub simulated_pressure: bool,
    pub area: f64,
    pub duration_ms: f64,
}

/// A raw interaction primitive, as carried in metric reports
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InteractionEvent {
    MouseMove(MouseSample),
    KeyEvent(KeySample),
    TouchEvent(TouchSample),
}

#[derive(Debug, Clone)]
struct PendingKey {
    key: String,
    pressed_at_ms: u64,
}

/// Captures raw pointer, keyboard, and touch events into bounded FIFO
/// buffers and derives instantaneous kinematics on the way in.
#[derive(Debug)]
pub struct EventSampler {
    mouse: VecDeque<MouseSample>,
    keystrokes: VecDeque<KeySample>,
    touches: VecDeque<TouchSample>,
    pending_keys: Vec<PendingKey>,
    session_start_ms: u64,
}

impl EventSampler {
    pub fn new(session_start_ms: u64) -> Self {
        EventSampler {
            mouse: VecDeque::with_capacity(MOUSE_BUFFER_CAPACITY),
            keystrokes: VecDeque::with_capacity(KEYSTROKE_BUFFER_CAPACITY),
            touches: VecDeque::with_capacity(TOUCH_BUFFER_CAPACITY),
            pending_keys: Vec::new(),
            session_start_ms,
        }
    }

    pub fn session_start_ms(&self) -> u64 {
        self.session_start_ms
    }

    /// Record a pointer movement. Velocity is distance over elapsed time
    /// since the last sample (0 when the clock did not advance);
    /// acceleration is the change in velocity since the last sample.
    pub fn record_mouse_move(&mut self, x: f64, y: f64, timestamp_ms: u64, pressure: Option<f64>) {
        let (velocity, acceleration) = match self.mouse.back() {
            Some(last) => {
                let distance = ((x - last.x).powi(2) + (y - last.y).powi(2)).sqrt();
                let elapsed = timestamp_ms.saturating_sub(last.timestamp_ms) as f64;
                let velocity = if elapsed > 0.0 { distance / elapsed } else { 0.0 };
                (velocity, velocity - last.velocity)
            }
            None => (0.0, 0.0),
        };

        let (pressure, simulated) = match pressure {
            Some(p) => (p, false),
            None => (0.5, true),
        };

        self.mouse.push_back(MouseSample {
            x,
            y,
            timestamp_ms,
            velocity,
            acceleration,
            pressure,
            simulated_pressure: simulated,
        });
        while self.mouse.len() > MOUSE_BUFFER_CAPACITY {
            self.mouse.pop_front();
        }
    }

    /// Record a key press. The dwell start stays pending until the
    /// matching release arrives. Pending presses are bounded like the
    /// sample buffers: auto-repeat storms and releases that never
    /// arrive evict the oldest entry instead of growing the sampler.
    pub fn record_key_down(&mut self, key: &str, timestamp_ms: u64) {
        self.pending_keys.push(PendingKey {
            key: key.to_string(),
            pressed_at_ms: timestamp_ms,
        });
        if self.pending_keys.len() > KEYSTROKE_BUFFER_CAPACITY {
            self.pending_keys.remove(0);
        }
    }

    /// Record a key release. Matches the most recent pending press of
    /// the same key; an unmatched release is dropped. Flight time is
    /// measured from the previous completed key's release and floored
    /// at 0, which absorbs out-of-order or missing predecessors.
    pub fn record_key_up(&mut self, key: &str, timestamp_ms: u64, pressure: Option<f64>) {
        let pending_index = match self.pending_keys.iter().rposition(|p| p.key == key) {
            Some(i) => i,
            None => return,
        };
        let pending = self.pending_keys.remove(pending_index);

        let dwell_ms = timestamp_ms.saturating_sub(pending.pressed_at_ms) as f64;
        let flight_ms = match self.keystrokes.back() {
            Some(prev) => {
                (pending.pressed_at_ms as f64 - (prev.timestamp_ms as f64 + prev.dwell_ms)).max(0.0)
            }
            None => 0.0,
        };

        let (pressure, simulated) = match pressure {
            Some(p) => (p, false),
            None => (rand::thread_rng().gen_range(0.5..0.8), true),
        };

        self.keystrokes.push_back(KeySample {
            key: pending.key,
            timestamp_ms: pending.pressed_at_ms,
            dwell_ms,
            flight_ms,
            pressure,
            simulated_pressure: simulated,
        });
        while self.keystrokes.len() > KEYSTROKE_BUFFER_CAPACITY {
            self.keystrokes.pop_front();
        }
    }

    /// Record a touch contact. Pressure comes from the hardware force
    /// sensor when present, otherwise a simulated value in [0.3, 0.7)
    /// tagged as such. Area is the product of the contact radii.
    pub fn record_touch(
        &mut self,
        x: f64,
        y: f64,
        timestamp_ms: u64,
        force: Option<f64>,
        radii: Option<(f64, f64)>,
    ) {
        let (pressure, simulated) = match force {
            Some(f) => (f, false),
            None => (rand::thread_rng().gen_range(0.3..0.7), true),
        };
        let area = radii.map(|(rx, ry)| rx * ry).unwrap_or(DEFAULT_TOUCH_AREA);

        self.touches.push_back(TouchSample {
            x,
            y,
            timestamp_ms,
            pressure,
            simulated_pressure: simulated,
            area,
            duration_ms: 0.0,
        });
        while self.touches.len() > TOUCH_BUFFER_CAPACITY {
            self.touches.pop_front();
        }
    }

    /// Record the end of the most recent contact. Duration is measured
    /// from that contact's start; a release with no open contact, or a
    /// repeated release, is dropped.
    pub fn record_touch_end(&mut self, timestamp_ms: u64) {
        if let Some(touch) = self.touches.back_mut() {
            if touch.duration_ms == 0.0 {
                touch.duration_ms = timestamp_ms.saturating_sub(touch.timestamp_ms) as f64;
            }
        }
    }

    pub fn mouse_samples(&self) -> impl Iterator<Item = &MouseSample> {
        self.mouse.iter()
    }

    pub fn key_samples(&self) -> impl Iterator<Item = &KeySample> {
        self.keystrokes.iter()
    }

    pub fn touch_samples(&self) -> impl Iterator<Item = &TouchSample> {
        self.touches.iter()
    }

    pub fn mouse_count(&self) -> usize {
        self.mouse.len()
    }

    pub fn keystroke_count(&self) -> usize {
        self.keystrokes.len()
    }

    pub fn touch_count(&self) -> usize {
        self.touches.len()
    }

    pub fn total_event_count(&self) -> usize {
        self.mouse.len() + self.keystrokes.len() + self.touches.len()
    }

    /// Trailing slice of each buffer, newest last, for metric reports
    pub fn recent_events(&self, per_modality: usize) -> Vec<InteractionEvent> {
        let mut out = Vec::new();
        out.extend(
            self.mouse
                .iter()
                .rev()
                .take(per_modality)
                .rev()
                .cloned()
                .map(InteractionEvent::MouseMove),
        );
        out.extend(
            self.keystrokes
                .iter()
                .rev()
                .take(per_modality)
                .rev()
                .cloned()
                .map(InteractionEvent::KeyEvent),
        );
        out.extend(
            self.touches
                .iter()
                .rev()
                .take(per_modality)
                .rev()
                .cloned()
                .map(InteractionEvent::TouchEvent),
        );
        out
    }

    pub fn mouse_timestamps(&self) -> Vec<u64> {
        self.mouse.iter().map(|m| m.timestamp_ms).collect()
    }

    pub fn keystroke_timestamps(&self) -> Vec<u64> {
        self.keystrokes.iter().map(|k| k.timestamp_ms).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_buffer_bounded_and_ordered() {
        let mut sampler = EventSampler::new(0);
        for i in 0..150u64 {
            sampler.record_mouse_move(i as f64, 0.0, i * 10, None);
        }

        assert_eq!(sampler.mouse_count(), MOUSE_BUFFER_CAPACITY);
        let timestamps: Vec<u64> = sampler.mouse_timestamps();
        // The 100 most recent samples, in arrival order
        assert_eq!(timestamps.first(), Some(&500));
        assert_eq!(timestamps.last(), Some(&1490));
        assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_mouse_velocity_and_acceleration() {
        let mut sampler = EventSampler::new(0);
        sampler.record_mouse_move(0.0, 0.0, 0, None);
        sampler.record_mouse_move(30.0, 40.0, 100, None);
        sampler.record_mouse_move(30.0, 40.0, 100, None);

        let samples: Vec<&MouseSample> = sampler.mouse_samples().collect();
        assert_eq!(samples[0].velocity, 0.0);
        assert_eq!(samples[0].acceleration, 0.0);
        // 50 pixels over 100 ms
        assert!((samples[1].velocity - 0.5).abs() < 1e-9);
        assert!((samples[1].acceleration - 0.5).abs() < 1e-9);
        // Zero elapsed time never divides
        assert_eq!(samples[2].velocity, 0.0);
    }

    #[test]
    fn test_key_dwell_and_flight() {
        let mut sampler = EventSampler::new(0);
        sampler.record_key_down("a", 1000);
        sampler.record_key_up("a", 1080, None);
        sampler.record_key_down("b", 1200);
        sampler.record_key_up("b", 1260, None);

        let keys: Vec<&KeySample> = sampler.key_samples().collect();
        assert_eq!(keys[0].dwell_ms, 80.0);
        assert_eq!(keys[0].flight_ms, 0.0);
        assert_eq!(keys[1].dwell_ms, 60.0);
        // b pressed at 1200, a released at 1000 + 80
        assert_eq!(keys[1].flight_ms, 120.0);
    }

    #[test]
    fn test_flight_time_clamped_at_zero() {
        let mut sampler = EventSampler::new(0);
        sampler.record_key_down("a", 1000);
        sampler.record_key_up("a", 1500, None);
        // Overlapping press before the previous release
        sampler.record_key_down("b", 1100);
        sampler.record_key_up("b", 1600, None);

        let keys: Vec<&KeySample> = sampler.key_samples().collect();
        assert_eq!(keys[1].flight_ms, 0.0);
    }

    #[test]
    fn test_unmatched_key_up_is_dropped() {
        let mut sampler = EventSampler::new(0);
        sampler.record_key_up("x", 500, None);
        assert_eq!(sampler.keystroke_count(), 0);
    }

    #[test]
    fn test_repeated_key_matches_most_recent_press() {
        let mut sampler = EventSampler::new(0);
        sampler.record_key_down("a", 100);
        sampler.record_key_down("a", 300);
        sampler.record_key_up("a", 350, None);

        let keys: Vec<&KeySample> = sampler.key_samples().collect();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].timestamp_ms, 300);
        assert_eq!(keys[0].dwell_ms, 50.0);
    }

    #[test]
    fn test_pending_presses_bounded_under_auto_repeat() {
        let mut sampler = EventSampler::new(0);
        // Auto-repeat: a held key fires key-down over and over with a
        // single release at the end
        for i in 0..10_000u64 {
            sampler.record_key_down("shift", i);
        }
        assert!(sampler.pending_keys.len() <= KEYSTROKE_BUFFER_CAPACITY);

        // The release still matches the most recent press
        sampler.record_key_up("shift", 10_050, None);
        assert_eq!(sampler.keystroke_count(), 1);
        let key = sampler.key_samples().next().unwrap();
        assert_eq!(key.timestamp_ms, 9_999);
        assert!(sampler.pending_keys.len() < KEYSTROKE_BUFFER_CAPACITY);
    }

    #[test]
    fn test_abandoned_presses_evicted_oldest_first() {
        let mut sampler = EventSampler::new(0);
        sampler.record_key_down("a", 0);
        for i in 0..KEYSTROKE_BUFFER_CAPACITY as u64 {
            sampler.record_key_down("b", 100 + i);
        }
        // The original "a" press fell off the front; its release no
        // longer completes a keystroke
        sampler.record_key_up("a", 500, None);
        assert_eq!(sampler.keystroke_count(), 0);
    }

    #[test]
    fn test_touch_end_sets_contact_duration() {
        let mut sampler = EventSampler::new(0);
        sampler.record_touch(5.0, 5.0, 1_000, Some(0.6), None);
        sampler.record_touch_end(1_250);

        let touch = sampler.touch_samples().next().unwrap();
        assert_eq!(touch.duration_ms, 250.0);

        // A second release does not stretch the same contact
        sampler.record_touch_end(2_000);
        assert_eq!(sampler.touch_samples().next().unwrap().duration_ms, 250.0);
    }

    #[test]
    fn test_touch_end_without_contact_is_dropped() {
        let mut sampler = EventSampler::new(0);
        sampler.record_touch_end(500);
        assert_eq!(sampler.touch_count(), 0);
    }

    #[test]
    fn test_touch_simulated_pressure_tagged_and_bounded() {
        let mut sampler = EventSampler::new(0);
        for i in 0..10u64 {
            sampler.record_touch(5.0, 5.0, i * 100, None, None);
        }
        for t in sampler.touch_samples() {
            assert!(t.simulated_pressure);
            assert!(t.pressure >= 0.3 && t.pressure < 0.7);
            assert_eq!(t.area, DEFAULT_TOUCH_AREA);
        }
    }

    #[test]
    fn test_touch_hardware_force_not_tagged() {
        let mut sampler = EventSampler::new(0);
        sampler.record_touch(1.0, 2.0, 100, Some(0.85), Some((4.0, 5.0)));
        let t = sampler.touch_samples().next().unwrap();
        assert!(!t.simulated_pressure);
        assert_eq!(t.pressure, 0.85);
        assert_eq!(t.area, 20.0);
    }

    #[test]
    fn test_recent_events_trailing_slice() {
        let mut sampler = EventSampler::new(0);
        for i in 0..30u64 {
            sampler.record_mouse_move(i as f64, 0.0, i, None);
        }
        sampler.record_key_down("a", 40);
        sampler.record_key_up("a", 60, None);

        let recent = sampler.recent_events(10);
        let mouse: Vec<_> = recent
            .iter()
            .filter(|e| matches!(e, InteractionEvent::MouseMove(_)))
            .collect();
        assert_eq!(mouse.len(), 10);
        assert_eq!(
            recent
                .iter()
                .filter(|e| matches!(e, InteractionEvent::KeyEvent(_)))
                .count(),
            1
        );
    }
}

//! Recent motion and phase history of one aircraft

use std::collections::VecDeque;

use super::{ClassifiedPhase, FlightPhase};
use crate::config::PhaseConfig;
use crate::geo::{bearing_deg, haversine_m};

/// Snapshot kept in the history
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSample {
    pub at_ms: i64,
    pub lat: f64,
    pub lon: f64,
    pub groundspeed_kts: f64,
    pub on_ground: bool,
    /// Distance to the airport reference point, when there is an airport
    pub airport_distance_m: Option<f64>,
    pub phase: ClassifiedPhase,
}

/// Rolling window of snapshots plus the latest classified phase.
///
/// Snapshots are thinned to one per sample interval so the window length
/// does not depend on the frame rate.
#[derive(Debug, Clone)]
pub struct PhaseHistory {
    samples: VecDeque<PhaseSample>,
    current: Option<ClassifiedPhase>,
    sample_interval_ms: i64,
    window_ms: i64,
}

impl PhaseHistory {
    pub fn new(config: &PhaseConfig) -> Self {
        Self {
            samples: VecDeque::new(),
            current: None,
            sample_interval_ms: config.history_sample_interval_ms.max(1),
            window_ms: config.history_window_ms,
        }
    }

    /// Phase of the most recent classification
    pub fn current(&self) -> Option<&ClassifiedPhase> {
        self.current.as_ref()
    }

    pub fn current_phase(&self) -> Option<FlightPhase> {
        self.current.as_ref().map(|c| c.phase)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &PhaseSample> {
        self.samples.iter()
    }

    /// Record the outcome of a classification
    pub fn record(&mut self, sample: PhaseSample) {
        self.current = Some(sample.phase.clone());

        let due = self
            .samples
            .back()
            .map_or(true, |last| sample.at_ms - last.at_ms >= self.sample_interval_ms);
        let now_ms = sample.at_ms;
        if due {
            self.samples.push_back(sample);
        }

        while let Some(front) = self.samples.front() {
            if now_ms - front.at_ms > self.window_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Oldest sample no older than `window_ms` and at least one sample interval old
    fn baseline(&self, now_ms: i64, window_ms: i64) -> Option<&PhaseSample> {
        let min_span = self.sample_interval_ms / 2;
        self.samples
            .iter()
            .find(|s| now_ms - s.at_ms <= window_ms)
            .filter(|s| now_ms - s.at_ms >= min_span.max(1))
    }

    /// Groundspeed change in knots per second over the window
    pub fn speed_trend(&self, now_ms: i64, window_ms: i64, groundspeed_kts: f64) -> Option<f64> {
        let base = self.baseline(now_ms, window_ms)?;
        let dt_s = (now_ms - base.at_ms) as f64 / 1000.0;
        Some((groundspeed_kts - base.groundspeed_kts) / dt_s)
    }

    /// Change of distance to the airport over the window, positive when moving away
    pub fn distance_trend(&self, now_ms: i64, window_ms: i64, distance_m: f64) -> Option<f64> {
        let base = self.baseline(now_ms, window_ms)?;
        Some(distance_m - base.airport_distance_m?)
    }

    /// Direction of movement from the position-window baseline, `None` when it moved too little
    pub fn position_track(
        &self,
        now_ms: i64,
        window_ms: i64,
        lat: f64,
        lon: f64,
        min_distance_m: f64,
    ) -> Option<f64> {
        let base = self.baseline(now_ms, window_ms)?;
        if haversine_m(base.lat, base.lon, lat, lon) < min_distance_m {
            return None;
        }
        bearing_deg(base.lat, base.lon, lat, lon)
    }

    /// Most recent phase within the window matching `predicate`, the current phase included
    pub fn recent_phase<F>(&self, now_ms: i64, window_ms: i64, predicate: F) -> Option<&ClassifiedPhase>
    where
        F: Fn(FlightPhase) -> bool,
    {
        if let Some(current) = self.current.as_ref().filter(|c| predicate(c.phase)) {
            return Some(current);
        }
        self.samples
            .iter()
            .rev()
            .take_while(|s| now_ms - s.at_ms <= window_ms)
            .map(|s| &s.phase)
            .find(|p| predicate(p.phase))
    }

    /// Whether any sample in the window was airborne
    pub fn was_airborne_within(&self, now_ms: i64, window_ms: i64) -> bool {
        self.samples
            .iter()
            .rev()
            .take_while(|s| now_ms - s.at_ms <= window_ms)
            .any(|s| !s.on_ground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(at_ms: i64, gs: f64, phase: FlightPhase) -> PhaseSample {
        PhaseSample {
            at_ms,
            lat: 0.0,
            lon: 0.0,
            groundspeed_kts: gs,
            on_ground: true,
            airport_distance_m: Some(1_000.0),
            phase: ClassifiedPhase::new(phase),
        }
    }

    #[test]
    fn test_record_thins_and_expires() {
        let mut history = PhaseHistory::new(&PhaseConfig::default());
        for t in (0..=70_000).step_by(100) {
            history.record(sample(t, 0.0, FlightPhase::Stopped));
        }
        // One sample per 500 ms over 60 s
        assert_eq!(history.len(), 121);
        assert_eq!(history.samples().next().map(|s| s.at_ms), Some(10_000));
        assert_eq!(history.current_phase(), Some(FlightPhase::Stopped));
    }

    #[test]
    fn test_speed_trend() {
        let mut history = PhaseHistory::new(&PhaseConfig::default());
        for (i, t) in (0..=3_000).step_by(500).enumerate() {
            history.record(sample(t, i as f64 * 2.0, FlightPhase::Rolling));
        }
        let trend = history.speed_trend(3_500, 3_000, 14.0).unwrap();
        assert!((trend - 4.0).abs() < 1e-9);
        assert!(PhaseHistory::new(&PhaseConfig::default()).speed_trend(0, 3_000, 1.0).is_none());
    }

    #[test]
    fn test_position_track_needs_movement() {
        let mut history = PhaseHistory::new(&PhaseConfig::default());
        history.record(sample(0, 3.0, FlightPhase::Taxi));
        // 10 m south
        let south = -(10.0 / crate::geo::EARTH_RADIUS_M).to_degrees();
        let track = history.position_track(2_000, 3_000, south, 0.0, 2.0).unwrap();
        assert!((track - 180.0).abs() < 1e-6);
        assert!(history.position_track(2_000, 3_000, 0.0, 0.000001, 2.0).is_none());
    }

    #[test]
    fn test_recent_phase_includes_current() {
        let mut history = PhaseHistory::new(&PhaseConfig::default());
        history.record(sample(0, 140.0, FlightPhase::Final));
        history.record(sample(30_000, 140.0, FlightPhase::Climbing));
        assert!(history.recent_phase(30_000, 60_000, |p| p.is_approach()).is_some());
        assert!(history.recent_phase(30_000, 10_000, |p| p.is_approach()).is_none());
        assert_eq!(
            history.recent_phase(30_000, 10_000, |p| p == FlightPhase::Climbing).map(|c| c.phase),
            Some(FlightPhase::Climbing)
        );
    }
}

//! Ground contact resolution
//!
//! Decides whether an aircraft is on the ground and how far its pose should be
//! blended from "ground contact" toward "flying". The blend follows a smoothed
//! height above terrain, so a single noisy altitude report cannot pop the pose.

use serde::Serialize;

use crate::config::GroundConfig;
use crate::interpolator::KinematicState;

/// Ground contact of one aircraft at one render time
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundContact {
    pub on_ground: bool,

    /// 0 = ground contact pose, 1 = flying pose
    pub height_blend_factor: f64,

    /// Height above terrain, when terrain is known
    pub agl_m: Option<f64>,
}

/// Previous frame's corrected height, per aircraft
#[derive(Debug, Clone, Default)]
pub struct GroundContactState {
    corrected_height_m: Option<f64>,
    last_at_ms: i64,
}

impl GroundContactState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn corrected_height_m(&self) -> Option<f64> {
        self.corrected_height_m
    }
}

pub struct GroundContactResolver {
    config: GroundConfig,
}

impl GroundContactResolver {
    pub fn new(config: GroundConfig) -> Self {
        Self { config }
    }

    /// Resolve ground contact for `state` at `now_ms`.
    ///
    /// `terrain_m` is the terrain elevation under the aircraft if anything
    /// knows it. Without terrain the source's on-ground flag decides, and
    /// without that a low-speed, level-flight heuristic.
    pub fn resolve(
        &self,
        state: &KinematicState,
        terrain_m: Option<f64>,
        on_ground_hint: Option<bool>,
        memory: &mut GroundContactState,
        now_ms: i64,
    ) -> GroundContact {
        let threshold = self.config.ground_agl_threshold_m;
        let band = self.config.transition_band_m.max(f64::EPSILON);

        let (raw_height_m, on_ground, agl_m) = match terrain_m {
            Some(terrain) => {
                let agl = (state.altitude_msl_meters - terrain).max(0.0);
                (agl, agl < threshold, Some(agl))
            }
            None => {
                let on_ground = on_ground_hint.unwrap_or_else(|| {
                    state.groundspeed_kts < self.config.fallback_ground_speed_kts
                        && state.vertical_rate_ft_per_min.abs()
                            < self.config.fallback_vertical_rate_fpm
                });
                let height = if on_ground { 0.0 } else { threshold + band };
                (height, on_ground, None)
            }
        };

        let corrected = match memory.corrected_height_m {
            None => raw_height_m,
            Some(previous) => {
                let dt_ms = now_ms.saturating_sub(memory.last_at_ms).max(0) as f64;
                let alpha = if self.config.smoothing_time_ms > 0.0 {
                    1.0 - (-dt_ms / self.config.smoothing_time_ms).exp()
                } else {
                    1.0
                };
                previous + (raw_height_m - previous) * alpha
            }
        };
        memory.corrected_height_m = Some(corrected);
        memory.last_at_ms = memory.last_at_ms.max(now_ms);

        let height_blend_factor = crate::geo::smoothstep((corrected - threshold) / band);

        GroundContact {
            on_ground,
            height_blend_factor,
            agl_m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(altitude: f64, gs: f64, vr: f64) -> KinematicState {
        KinematicState {
            lat: 47.0,
            lon: 8.0,
            altitude_msl_meters: altitude,
            heading_deg: 0.0,
            track_deg: 0.0,
            groundspeed_kts: gs,
            vertical_rate_ft_per_min: vr,
            bank_deg: 0.0,
            is_extrapolated: false,
        }
    }

    fn resolver() -> GroundContactResolver {
        GroundContactResolver::new(GroundConfig::default())
    }

    #[test]
    fn test_low_agl_is_on_ground_even_at_rotation_speed() {
        let mut memory = GroundContactState::new();
        let contact = resolver().resolve(&state(432.0, 150.0, 0.0), Some(430.0), None, &mut memory, 0);
        assert!(contact.on_ground);
        assert_eq!(contact.height_blend_factor, 0.0);
        assert_eq!(contact.agl_m, Some(2.0));
    }

    #[test]
    fn test_high_agl_is_flying() {
        let mut memory = GroundContactState::new();
        let contact = resolver().resolve(&state(1_000.0, 20.0, 0.0), Some(430.0), None, &mut memory, 0);
        assert!(!contact.on_ground);
        assert_eq!(contact.height_blend_factor, 1.0);
    }

    #[test]
    fn test_blend_ramps_instead_of_popping() {
        let resolver = resolver();
        let mut memory = GroundContactState::new();
        resolver.resolve(&state(430.0, 150.0, 0.0), Some(430.0), None, &mut memory, 0);

        // Altitude jumps 100 m in one report
        let first = resolver.resolve(&state(530.0, 150.0, 0.0), Some(430.0), None, &mut memory, 33);
        assert!(!first.on_ground);
        assert!(first.height_blend_factor < 0.1, "popped to {}", first.height_blend_factor);

        let mut last = first.height_blend_factor;
        for frame in 2..=90 {
            let c = resolver.resolve(&state(530.0, 150.0, 0.0), Some(430.0), None, &mut memory, frame * 33);
            assert!(c.height_blend_factor >= last);
            last = c.height_blend_factor;
        }
        assert!(last > 0.99);
    }

    #[test]
    fn test_smoothing_is_frame_rate_independent() {
        let resolver = resolver();
        let run = |frame_ms: i64| {
            let mut memory = GroundContactState::new();
            resolver.resolve(&state(430.0, 0.0, 0.0), Some(430.0), None, &mut memory, 0);
            let mut t = 0;
            while t < 600 {
                t += frame_ms;
                resolver.resolve(&state(460.0, 0.0, 0.0), Some(430.0), None, &mut memory, t);
            }
            memory.corrected_height_m().unwrap_or_default()
        };
        let coarse = run(20);
        let fine = run(10);
        assert!((coarse - fine).abs() < 1e-9, "{} vs {}", coarse, fine);
    }

    #[test]
    fn test_fallback_without_terrain() {
        let resolver = resolver();

        let mut memory = GroundContactState::new();
        let taxiing = resolver.resolve(&state(100.0, 15.0, 0.0), None, None, &mut memory, 0);
        assert!(taxiing.on_ground);
        assert_eq!(taxiing.agl_m, None);

        let mut memory = GroundContactState::new();
        let cruising = resolver.resolve(&state(100.0, 250.0, 0.0), None, None, &mut memory, 0);
        assert!(!cruising.on_ground);
        assert_eq!(cruising.height_blend_factor, 1.0);

        // The source's flag wins over the heuristic
        let mut memory = GroundContactState::new();
        let flagged = resolver.resolve(&state(100.0, 15.0, 0.0), None, Some(false), &mut memory, 0);
        assert!(!flagged.on_ground);
    }
}

//! Engine configuration, with defaults and environment-variable overrides

use crate::observation::SourceTag;

/// Display delay per observation source, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceDelays {
    pub vatsim_ms: i64,
    pub vnas_ms: i64,
    pub real_traffic_ms: i64,
    pub replay_ms: i64,
}

impl SourceDelays {
    pub fn get(&self, source: SourceTag) -> i64 {
        match source {
            SourceTag::Vatsim => self.vatsim_ms,
            SourceTag::Vnas => self.vnas_ms,
            SourceTag::RealTraffic => self.real_traffic_ms,
            SourceTag::Replay => self.replay_ms,
        }
    }

    pub fn set(&mut self, source: SourceTag, delay_ms: i64) {
        let slot = match source {
            SourceTag::Vatsim => &mut self.vatsim_ms,
            SourceTag::Vnas => &mut self.vnas_ms,
            SourceTag::RealTraffic => &mut self.real_traffic_ms,
            SourceTag::Replay => &mut self.replay_ms,
        };
        *slot = delay_ms.max(0);
    }
}

impl Default for SourceDelays {
    fn default() -> Self {
        Self {
            vatsim_ms: 17_000,
            vnas_ms: 1_500,
            real_traffic_ms: 10_000,
            replay_ms: 17_000,
        }
    }
}

/// Display delay scheduling
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub delays: SourceDelays,

    /// Maximum change of the effective delay per millisecond of wall time
    pub delay_slew_rate: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            delays: SourceDelays::default(),
            delay_slew_rate: 0.5,
        }
    }
}

/// Per-aircraft observation retention
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Observations retained per aircraft
    pub max_entries: usize,

    /// Late arrivals up to this much older than the oldest entry are still inserted
    pub late_slack_ms: i64,

    /// Aircraft without an observation for this long are evicted
    pub eviction_timeout_ms: i64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            max_entries: 4,
            late_slack_ms: 1_000,
            eviction_timeout_ms: 30_000,
        }
    }
}

/// Interpolation and extrapolation policy
#[derive(Debug, Clone)]
pub struct InterpolatorConfig {
    /// Extrapolation stops advancing after this long past the newest observation
    pub max_extrapolation_ms: i64,

    /// An anchor older than this (relative to the render time) is not continued from
    pub reanchor_max_gap_ms: i64,

    /// Time to converge from the anchor onto a dead-reckoned path
    pub reanchor_blend_ms: i64,

    /// Limit for the estimated bank angle
    pub max_bank_deg: f64,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            max_extrapolation_ms: 20_000,
            reanchor_max_gap_ms: 5_000,
            reanchor_blend_ms: 2_000,
            max_bank_deg: 30.0,
        }
    }
}

/// Ground contact resolution
#[derive(Debug, Clone)]
pub struct GroundConfig {
    /// Below this height above terrain the aircraft is on the ground
    pub ground_agl_threshold_m: f64,

    /// Height band above the threshold over which the pose blends to flying
    pub transition_band_m: f64,

    /// Time constant of the corrected-height smoothing
    pub smoothing_time_ms: f64,

    /// Fallback heuristic when no height information exists
    pub fallback_ground_speed_kts: f64,
    pub fallback_vertical_rate_fpm: f64,
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            ground_agl_threshold_m: 10.0,
            transition_band_m: 30.0,
            smoothing_time_ms: 500.0,
            fallback_ground_speed_kts: 40.0,
            fallback_vertical_rate_fpm: 300.0,
        }
    }
}

/// Flight phase classification thresholds
#[derive(Debug, Clone)]
pub struct PhaseConfig {
    pub runway_alignment_tolerance_deg: f64,
    pub pushback_track_threshold_deg: f64,
    pub pushback_max_speed_kts: f64,
    pub stationary_speed_kts: f64,
    pub taxi_max_speed_kts: f64,
    pub accel_threshold_kts_per_s: f64,

    pub go_around_vertical_rate_fpm: f64,
    pub go_around_max_agl_m: f64,
    pub approach_memory_ms: i64,

    pub descent_rate_threshold_fpm: f64,
    pub climb_rate_threshold_fpm: f64,
    pub final_max_distance_m: f64,
    pub short_final_distance_m: f64,
    pub final_min_lateral_tolerance_m: f64,
    pub final_lateral_tolerance_deg: f64,

    pub runway_surface_margin_m: f64,
    pub hold_short_distance_m: f64,

    pub pattern_radius_m: f64,
    pub pattern_max_agl_m: f64,

    pub speed_trend_window_ms: i64,
    pub distance_trend_window_ms: i64,
    pub track_window_ms: i64,
    pub min_track_distance_m: f64,

    pub history_sample_interval_ms: i64,
    pub history_window_ms: i64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            runway_alignment_tolerance_deg: 15.0,
            pushback_track_threshold_deg: 90.0,
            pushback_max_speed_kts: 10.0,
            stationary_speed_kts: 2.0,
            taxi_max_speed_kts: 30.0,
            accel_threshold_kts_per_s: 0.3,

            go_around_vertical_rate_fpm: 500.0,
            go_around_max_agl_m: 900.0,
            approach_memory_ms: 60_000,

            descent_rate_threshold_fpm: 100.0,
            climb_rate_threshold_fpm: 300.0,
            final_max_distance_m: 18_520.0,
            short_final_distance_m: 3_704.0,
            final_min_lateral_tolerance_m: 150.0,
            final_lateral_tolerance_deg: 3.0,

            runway_surface_margin_m: 5.0,
            hold_short_distance_m: 100.0,

            pattern_radius_m: 9_260.0,
            pattern_max_agl_m: 760.0,

            speed_trend_window_ms: 3_000,
            distance_trend_window_ms: 10_000,
            track_window_ms: 3_000,
            min_track_distance_m: 2.0,

            history_sample_interval_ms: 500,
            history_window_ms: 60_000,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub timeline: TimelineConfig,
    pub interpolator: InterpolatorConfig,
    pub ground: GroundConfig,
    pub phase: PhaseConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        let delays = &mut config.scheduler.delays;
        delays.vatsim_ms = env_secs_ms("DELAY_VATSIM_SECS").unwrap_or(delays.vatsim_ms);
        delays.vnas_ms = env_secs_ms("DELAY_VNAS_SECS").unwrap_or(delays.vnas_ms);
        delays.real_traffic_ms =
            env_secs_ms("DELAY_REALTRAFFIC_SECS").unwrap_or(delays.real_traffic_ms);
        delays.replay_ms = env_secs_ms("DELAY_REPLAY_SECS").unwrap_or(delays.replay_ms);

        config.timeline.eviction_timeout_ms = env_secs_ms("AIRCRAFT_TIMEOUT_SECS")
            .unwrap_or(config.timeline.eviction_timeout_ms);

        config.timeline.max_entries = env_parse::<usize>("TIMELINE_MAX_ENTRIES")
            .filter(|n| *n >= 2)
            .unwrap_or(config.timeline.max_entries);

        config.interpolator.max_extrapolation_ms = env_secs_ms("MAX_EXTRAPOLATION_SECS")
            .unwrap_or(config.interpolator.max_extrapolation_ms);

        config.phase.runway_alignment_tolerance_deg =
            env_parse("RUNWAY_ALIGNMENT_TOLERANCE_DEG")
                .unwrap_or(config.phase.runway_alignment_tolerance_deg);

        config.phase.pushback_track_threshold_deg = env_parse("PUSHBACK_TRACK_THRESHOLD_DEG")
            .unwrap_or(config.phase.pushback_track_threshold_deg);

        config.ground.ground_agl_threshold_m = env_parse("GROUND_AGL_THRESHOLD_M")
            .unwrap_or(config.ground.ground_agl_threshold_m);

        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Read a (possibly fractional) number of seconds as milliseconds
fn env_secs_ms(name: &str) -> Option<i64> {
    env_parse::<f64>(name)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let delays = SourceDelays::default();
        assert_eq!(delays.get(SourceTag::Vatsim), 17_000);
        assert!(delays.get(SourceTag::Vnas) < delays.get(SourceTag::Vatsim));
    }

    #[test]
    fn test_set_delay_clamps_negative() {
        let mut delays = SourceDelays::default();
        delays.set(SourceTag::RealTraffic, -5);
        assert_eq!(delays.get(SourceTag::RealTraffic), 0);
        delays.set(SourceTag::Replay, 2_500);
        assert_eq!(delays.get(SourceTag::Replay), 2_500);
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("DELAY_VNAS_SECS", "2.25");
        std::env::set_var("TIMELINE_MAX_ENTRIES", "1");
        let config = EngineConfig::from_env();
        std::env::remove_var("DELAY_VNAS_SECS");
        std::env::remove_var("TIMELINE_MAX_ENTRIES");

        assert_eq!(config.scheduler.delays.vnas_ms, 2_250);
        // Fewer than two entries cannot bracket a render time
        assert_eq!(config.timeline.max_entries, 4);
    }
}

//! Ordered phase rules

use super::runway::{ApproachGeometry, RunwayGeometry};
use super::{ClassifiedPhase, FlightPhase, PhaseHistory};
use crate::config::PhaseConfig;
use crate::context::RunwayContext;
use crate::geo::angle_diff_deg;
use crate::ground::GroundContact;
use crate::interpolator::KinematicState;

/// Classifies kinematic states into flight phases.
///
/// Stateless apart from its configuration: everything time-dependent comes in
/// through [`PhaseHistory`], so the same inputs always give the same phase.
#[derive(Debug, Clone)]
pub struct PhaseClassifier {
    config: PhaseConfig,
}

impl PhaseClassifier {
    pub fn new(config: PhaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }

    /// Classify `state` at `at_ms`; the first matching rule wins
    pub fn classify(
        &self,
        state: &KinematicState,
        at_ms: i64,
        ground: &GroundContact,
        context: Option<&RunwayContext>,
        history: &PhaseHistory,
    ) -> ClassifiedPhase {
        let runways: Vec<RunwayGeometry<'_>> = context
            .map(|c| c.runways.iter().filter_map(RunwayGeometry::new).collect())
            .unwrap_or_default();

        if ground.on_ground {
            self.classify_ground(state, at_ms, &runways, history)
        } else {
            self.classify_airborne(state, at_ms, ground, context, &runways, history)
        }
    }

    fn classify_airborne(
        &self,
        state: &KinematicState,
        at_ms: i64,
        ground: &GroundContact,
        context: Option<&RunwayContext>,
        runways: &[RunwayGeometry<'_>],
        history: &PhaseHistory,
    ) -> ClassifiedPhase {
        let cfg = &self.config;
        let agl_m = ground
            .agl_m
            .or_else(|| context.map(|c| (state.altitude_msl_meters - c.elevation_m).max(0.0)));

        if state.vertical_rate_ft_per_min > cfg.go_around_vertical_rate_fpm
            && agl_m.map_or(true, |h| h < cfg.go_around_max_agl_m)
        {
            let recent = history.recent_phase(at_ms, cfg.approach_memory_ms, |p| {
                p.is_approach() || matches!(p, FlightPhase::RollOut | FlightPhase::GoAround)
            });
            if let Some(recent) = recent {
                return ClassifiedPhase {
                    phase: FlightPhase::GoAround,
                    runway: recent.runway.clone(),
                };
            }
        }

        if let Some(approach) = self.final_approach(state, runways, history) {
            return approach;
        }

        let Some(context) = context else {
            return if state.vertical_rate_ft_per_min >= 0.0 {
                ClassifiedPhase::new(FlightPhase::Climbing)
            } else {
                ClassifiedPhase::new(FlightPhase::Inbound)
            };
        };

        let distance_m = context.distance_m(state.lat, state.lon);
        let climbing = state.vertical_rate_ft_per_min > cfg.climb_rate_threshold_fpm;
        let moving_away = history
            .distance_trend(at_ms, cfg.distance_trend_window_ms, distance_m)
            .map_or(true, |d| d > 0.0);

        if climbing && moving_away {
            ClassifiedPhase::new(FlightPhase::Climbing)
        } else if distance_m <= cfg.pattern_radius_m
            && agl_m.map_or(false, |h| h < cfg.pattern_max_agl_m)
        {
            ClassifiedPhase::new(FlightPhase::Pattern)
        } else {
            ClassifiedPhase::new(FlightPhase::Inbound)
        }
    }

    /// Final or ShortFinal on the best aligned runway end, if any.
    ///
    /// Alignment uses ground track so a crabbing aircraft still matches. Among
    /// parallel runways the smallest lateral offset wins.
    fn final_approach(
        &self,
        state: &KinematicState,
        runways: &[RunwayGeometry<'_>],
        history: &PhaseHistory,
    ) -> Option<ClassifiedPhase> {
        let cfg = &self.config;
        let descending = state.vertical_rate_ft_per_min < -cfg.descent_rate_threshold_fpm;
        // Climbing slower than a go-around keeps the approach
        let continuing = history.current_phase().map_or(false, |p| p.is_approach())
            && state.vertical_rate_ft_per_min <= cfg.go_around_vertical_rate_fpm;
        if !(descending || continuing) {
            return None;
        }

        let glide_tan = cfg.final_lateral_tolerance_deg.to_radians().tan();
        let best: ApproachGeometry<'_> = runways
            .iter()
            .flat_map(|g| {
                let length_m = g.length_m();
                g.approaches(state.lat, state.lon)
                    .into_iter()
                    .filter(move |a| a.along_m <= length_m)
            })
            .filter(|a| {
                angle_diff_deg(a.end.true_heading_deg, state.track_deg).abs()
                    <= cfg.runway_alignment_tolerance_deg
            })
            .filter(|a| a.along_m >= -cfg.final_max_distance_m)
            .filter(|a| {
                let tolerance = cfg
                    .final_min_lateral_tolerance_m
                    .max(a.distance_to_threshold_m() * glide_tan);
                a.lateral_m.abs() <= tolerance
            })
            .min_by(|a, b| a.lateral_m.abs().total_cmp(&b.lateral_m.abs()))?;

        let phase = if best.distance_to_threshold_m() <= cfg.short_final_distance_m {
            FlightPhase::ShortFinal
        } else {
            FlightPhase::Final
        };
        Some(ClassifiedPhase::on_runway(phase, best.end.ident.clone()))
    }

    fn classify_ground(
        &self,
        state: &KinematicState,
        at_ms: i64,
        runways: &[RunwayGeometry<'_>],
        history: &PhaseHistory,
    ) -> ClassifiedPhase {
        let cfg = &self.config;
        let stationary = state.groundspeed_kts < cfg.stationary_speed_kts;

        let on_runway = runways
            .iter()
            .filter(|g| g.contains(state.lat, state.lon, cfg.runway_surface_margin_m))
            .min_by_key(|g| {
                g.aligned_end(state.heading_deg, cfg.runway_alignment_tolerance_deg)
                    .is_none()
            });
        if let Some(geometry) = on_runway {
            return self.classify_on_runway(state, at_ms, geometry, stationary, history);
        }

        if stationary {
            return self
                .hold_short(state, runways)
                .unwrap_or_else(|| ClassifiedPhase::new(FlightPhase::Stopped));
        }

        if state.groundspeed_kts < cfg.pushback_max_speed_kts {
            let track = history.position_track(
                at_ms,
                cfg.track_window_ms,
                state.lat,
                state.lon,
                cfg.min_track_distance_m,
            );
            let pushing = match track {
                Some(track) => {
                    angle_diff_deg(state.heading_deg, track).abs() > cfg.pushback_track_threshold_deg
                }
                // Too slow for a reliable track: stay in pushback once in it
                None => history.current_phase() == Some(FlightPhase::Pushback),
            };
            if pushing {
                return ClassifiedPhase::new(FlightPhase::Pushback);
            }
        }

        ClassifiedPhase::new(FlightPhase::Taxi)
    }

    fn classify_on_runway(
        &self,
        state: &KinematicState,
        at_ms: i64,
        geometry: &RunwayGeometry<'_>,
        stationary: bool,
        history: &PhaseHistory,
    ) -> ClassifiedPhase {
        let cfg = &self.config;
        let tolerance = cfg.runway_alignment_tolerance_deg;
        let aligned = geometry.aligned_end(state.heading_deg, tolerance);
        let ident = aligned
            .or_else(|| geometry.aligned_end(state.track_deg, tolerance))
            .map(|i| geometry.runway().ends[i].ident.clone())
            .unwrap_or_else(|| geometry.nearest_end(state.lat, state.lon).ident.clone());

        let previous = history.current_phase();
        let landed = previous == Some(FlightPhase::RollOut)
            || history.was_airborne_within(at_ms, cfg.approach_memory_ms)
            || history
                .recent_phase(at_ms, cfg.approach_memory_ms, |p| p.is_airborne())
                .is_some();

        if stationary {
            // Still occupying the runway after landing
            if landed {
                return ClassifiedPhase::on_runway(FlightPhase::RollOut, ident);
            }
            // Lined up only on the departure half of the runway
            let lined_up = aligned.filter(|&i| {
                geometry.relative_to(i, state.lat, state.lon).along_m <= geometry.length_m() / 2.0
            });
            return match lined_up {
                Some(i) => ClassifiedPhase::on_runway(
                    FlightPhase::LinedUp,
                    geometry.runway().ends[i].ident.clone(),
                ),
                None => ClassifiedPhase::new(FlightPhase::Stopped),
            };
        }

        let trend = history.speed_trend(at_ms, cfg.speed_trend_window_ms, state.groundspeed_kts);
        let accelerating = trend.map_or(false, |t| t > cfg.accel_threshold_kts_per_s);
        if accelerating {
            return ClassifiedPhase::on_runway(FlightPhase::Rolling, ident);
        }

        if landed {
            return ClassifiedPhase::on_runway(FlightPhase::RollOut, ident);
        }

        // Decelerating after a takeoff roll is a rejected takeoff, still Rolling
        if previous == Some(FlightPhase::Rolling)
            || state.groundspeed_kts > cfg.taxi_max_speed_kts
        {
            return ClassifiedPhase::on_runway(FlightPhase::Rolling, ident);
        }

        ClassifiedPhase::new(FlightPhase::Taxi)
    }

    /// Stopped alongside a runway, close enough to its centerline to be holding for it
    fn hold_short(
        &self,
        state: &KinematicState,
        runways: &[RunwayGeometry<'_>],
    ) -> Option<ClassifiedPhase> {
        let reach = self.config.hold_short_distance_m;
        runways
            .iter()
            .map(|g| (g, g.relative_to(0, state.lat, state.lon)))
            .filter(|(g, rel)| {
                rel.lateral_m.abs() <= reach
                    && rel.along_m >= -reach
                    && rel.along_m <= g.length_m() + reach
            })
            .min_by(|a, b| a.1.lateral_m.abs().total_cmp(&b.1.lateral_m.abs()))
            .map(|(g, _)| {
                ClassifiedPhase::on_runway(
                    FlightPhase::HoldShort,
                    g.nearest_end(state.lat, state.lon).ident.clone(),
                )
            })
    }
}

//! Motion engine: per-aircraft timelines, rendering and phase tracking
//!
//! Owns every piece of per-aircraft state (timeline, render clock, anchor,
//! ground smoothing, phase history). The caller drives it from a single tick
//! loop: ingest or drain observations, evaluate aircraft for the current wall
//! time, prune the ones that stopped reporting.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, SourceDelays};
use crate::context::{RunwayProvider, TerrainProvider};
use crate::ground::{GroundContact, GroundContactResolver, GroundContactState};
use crate::ingest::ObservationReceiver;
use crate::interpolator::{AnchorState, Interpolator, KinematicState};
use crate::observation::{validate, AircraftId, Observation, ObservationError, SourceTag};
use crate::phase::{ClassifiedPhase, PhaseClassifier, PhaseHistory, PhaseSample};
use crate::scheduler::{DisplayDelayScheduler, RenderClock};
use crate::timeline::TimelineBuffer;

pub use crate::timeline::IngestOutcome;

/// Everything produced for one aircraft at one render tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedAircraft {
    pub aircraft_id: AircraftId,
    pub render_time_ms: i64,
    pub source: SourceTag,
    pub state: KinematicState,
    pub ground: GroundContact,
    pub phase: ClassifiedPhase,
}

/// Result of evaluating one aircraft
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AircraftFrame {
    /// Not tracked
    #[serde(rename_all = "camelCase")]
    Unknown { aircraft_id: AircraftId },
    /// Fewer than two observations: held at the known point, not ready for display
    #[serde(rename_all = "camelCase")]
    InsufficientData {
        aircraft_id: AircraftId,
        state: KinematicState,
    },
    Ready(RenderedAircraft),
}

impl AircraftFrame {
    pub fn aircraft_id(&self) -> &str {
        match self {
            AircraftFrame::Unknown { aircraft_id } => aircraft_id,
            AircraftFrame::InsufficientData { aircraft_id, .. } => aircraft_id,
            AircraftFrame::Ready(rendered) => &rendered.aircraft_id,
        }
    }

    pub fn rendered(&self) -> Option<&RenderedAircraft> {
        match self {
            AircraftFrame::Ready(rendered) => Some(rendered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameStatus {
    Pending,
    Ready { extrapolated: bool },
}

/// Render-side state of one aircraft
struct TrackedAircraft {
    clock: RenderClock,
    anchor: Option<AnchorState>,
    ground: GroundContactState,
    history: PhaseHistory,
    status: FrameStatus,
}

impl TrackedAircraft {
    fn new(config: &EngineConfig) -> Self {
        Self {
            clock: RenderClock::new(),
            anchor: None,
            ground: GroundContactState::new(),
            history: PhaseHistory::new(&config.phase),
            status: FrameStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct IngestCounters {
    accepted: u64,
    source_switches: u64,
    /// Duplicate, too late, or from an inactive source
    discarded: u64,
    rejected: u64,
}

/// Engine statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub tracked_aircraft: usize,
    pub ready: usize,
    pub extrapolating: usize,
    pub observations_ingested: u64,
    pub observations_discarded: u64,
    pub observations_rejected: u64,
    pub source_switches: u64,
}

impl std::fmt::Display for EngineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Aircraft: {} tracked, {} ready, {} extrapolating | Observations: {} ingested, {} discarded, {} rejected, {} source switches",
            self.tracked_aircraft,
            self.ready,
            self.extrapolating,
            self.observations_ingested,
            self.observations_discarded,
            self.observations_rejected,
            self.source_switches
        )
    }
}

pub struct MotionEngine {
    config: EngineConfig,
    scheduler: DisplayDelayScheduler,
    timelines: TimelineBuffer,
    interpolator: Interpolator,
    ground: GroundContactResolver,
    classifier: PhaseClassifier,
    aircraft: HashMap<AircraftId, TrackedAircraft>,
    counters: IngestCounters,
}

impl MotionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            scheduler: DisplayDelayScheduler::new(&config.scheduler),
            timelines: TimelineBuffer::new(config.timeline.clone()),
            interpolator: Interpolator::new(config.interpolator.clone()),
            ground: GroundContactResolver::new(config.ground.clone()),
            classifier: PhaseClassifier::new(config.phase.clone()),
            aircraft: HashMap::new(),
            counters: IngestCounters::default(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timelines(&self) -> &TimelineBuffer {
        &self.timelines
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Validate an observation and add it to its aircraft's timeline.
    ///
    /// Invalid observations are logged and dropped; they never touch existing state.
    pub fn ingest(&mut self, observation: Observation) -> Result<IngestOutcome, ObservationError> {
        let aircraft_id = observation.aircraft_id.clone();
        let observation = match validate(observation) {
            Ok(observation) => observation,
            Err(e) => {
                self.counters.rejected += 1;
                warn!(aircraft = %aircraft_id, error = %e, "Dropping invalid observation");
                return Err(e);
            }
        };

        let delay_ms = self.scheduler.delay_for(observation.source);
        let outcome = self.timelines.ingest(observation, delay_ms);
        if outcome.is_accepted() {
            self.counters.accepted += 1;
        } else {
            self.counters.discarded += 1;
        }
        if let IngestOutcome::SourceSwitched { .. } = outcome {
            self.counters.source_switches += 1;
        }
        Ok(outcome)
    }

    /// Ingest everything currently queued; returns how many observations were taken
    pub fn drain(&mut self, receiver: &ObservationReceiver) -> usize {
        let mut taken = 0;
        while let Some(observation) = receiver.try_recv() {
            taken += 1;
            // Errors are already logged and counted by ingest
            let _ = self.ingest(observation);
        }
        taken
    }

    /// Render one aircraft for wall-clock time `now_ms`
    pub fn evaluate(
        &mut self,
        aircraft_id: &str,
        now_ms: i64,
        terrain: &dyn TerrainProvider,
        runways: &dyn RunwayProvider,
    ) -> AircraftFrame {
        let unknown = || AircraftFrame::Unknown {
            aircraft_id: aircraft_id.to_string(),
        };

        let Some(timeline) = self.timelines.get(aircraft_id) else {
            return unknown();
        };
        let tracked = self
            .aircraft
            .entry(aircraft_id.to_string())
            .or_insert_with(|| TrackedAircraft::new(&self.config));

        let Some(render_ms) = self.scheduler.render_time(&mut tracked.clock, timeline, now_ms) else {
            return unknown();
        };
        let Some((mut state, anchor)) =
            self.interpolator.evaluate(timeline, tracked.anchor.as_ref(), render_ms)
        else {
            return unknown();
        };
        tracked.anchor = Some(anchor);

        if !timeline.has_enough_data() {
            tracked.status = FrameStatus::Pending;
            return AircraftFrame::InsufficientData {
                aircraft_id: aircraft_id.to_string(),
                state,
            };
        }

        let terrain_m = terrain
            .terrain_height_m(state.lat, state.lon)
            .or_else(|| timeline.reported_terrain_m());
        let ground = self.ground.resolve(
            &state,
            terrain_m,
            timeline.on_ground_hint(),
            &mut tracked.ground,
            now_ms,
        );
        if ground.on_ground {
            state.bank_deg = 0.0;
        }

        let context = runways.runway_context(state.lat, state.lon);
        let phase = self
            .classifier
            .classify(&state, render_ms, &ground, context, &tracked.history);

        match tracked.history.current() {
            Some(previous) if *previous == phase => {}
            Some(previous) => info!(
                aircraft = %aircraft_id,
                from = %previous,
                to = %phase,
                description = phase.phase.description(),
                groundspeed_kts = state.groundspeed_kts,
                altitude_m = state.altitude_msl_meters,
                "Flight phase transition"
            ),
            None => debug!(aircraft = %aircraft_id, phase = %phase, "Initial flight phase"),
        }

        tracked.history.record(PhaseSample {
            at_ms: render_ms,
            lat: state.lat,
            lon: state.lon,
            groundspeed_kts: state.groundspeed_kts,
            on_ground: ground.on_ground,
            airport_distance_m: context.map(|c| c.distance_m(state.lat, state.lon)),
            phase: phase.clone(),
        });
        tracked.status = FrameStatus::Ready {
            extrapolated: state.is_extrapolated,
        };

        AircraftFrame::Ready(RenderedAircraft {
            aircraft_id: aircraft_id.to_string(),
            render_time_ms: render_ms,
            source: timeline.active_source(),
            state,
            ground,
            phase,
        })
    }

    /// Render every tracked aircraft, sorted by id
    pub fn tick(
        &mut self,
        now_ms: i64,
        terrain: &dyn TerrainProvider,
        runways: &dyn RunwayProvider,
    ) -> Vec<AircraftFrame> {
        self.timelines
            .ids()
            .into_iter()
            .map(|id| self.evaluate(&id, now_ms, terrain, runways))
            .collect()
    }

    /// Evict aircraft that stopped reporting; returns their ids
    pub fn prune(&mut self, now_ms: i64) -> Vec<AircraftId> {
        let removed = self.timelines.prune(now_ms);
        for id in &removed {
            self.aircraft.remove(id);
            debug!(aircraft = %id, "Aircraft timed out");
        }
        removed
    }

    /// Drop an aircraft immediately
    pub fn remove(&mut self, aircraft_id: &str) -> bool {
        self.aircraft.remove(aircraft_id);
        let removed = self.timelines.remove(aircraft_id);
        if removed {
            debug!(aircraft = %aircraft_id, "Aircraft removed");
        }
        removed
    }

    /// Display delays currently stamped on new observations
    pub fn source_delays(&self) -> &SourceDelays {
        self.scheduler.delays()
    }

    /// Change a source's display delay; only later observations are affected
    pub fn set_source_delay(&mut self, source: SourceTag, delay_ms: i64) {
        self.scheduler.set_delay(source, delay_ms);
        info!(%source, delay_ms = self.scheduler.delay_for(source), "Display delay changed");
    }

    pub fn stats(&self) -> EngineStats {
        let ready = self
            .aircraft
            .values()
            .filter(|a| matches!(a.status, FrameStatus::Ready { .. }))
            .count();
        let extrapolating = self
            .aircraft
            .values()
            .filter(|a| a.status == FrameStatus::Ready { extrapolated: true })
            .count();

        EngineStats {
            tracked_aircraft: self.timelines.len(),
            ready,
            extrapolating,
            observations_ingested: self.counters.accepted,
            observations_discarded: self.counters.discarded,
            observations_rejected: self.counters.rejected,
            source_switches: self.counters.source_switches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoGeoContext;
    use crate::ingest::ingest_channel;

    fn obs(id: &str, t_ms: i64, lon: f64) -> Observation {
        Observation::new(id, SourceTag::Vnas, t_ms, t_ms, 0.0, lon, 500.0, 120.0, 90.0)
    }

    #[test]
    fn test_invalid_observation_is_rejected_and_counted() {
        let mut engine = MotionEngine::new(EngineConfig::default());
        let mut bad = obs("N1", 0, 0.0);
        bad.lat = f64::NAN;
        assert!(engine.ingest(bad).is_err());
        assert!(engine.is_empty());
        assert_eq!(engine.stats().observations_rejected, 1);
    }

    #[test]
    fn test_out_of_range_timestamps_are_rejected_not_ingested() {
        let mut engine = MotionEngine::new(EngineConfig::default());
        let mut bad = obs("N1", 0, 0.0);
        bad.observed_at_ms = -9_000_000_000_000_000_000;
        bad.received_at_ms = 9_000_000_000_000_000_000;
        assert!(matches!(
            engine.ingest(bad),
            Err(ObservationError::TimestampOutOfRange { .. })
        ));
        assert!(engine.is_empty());
        assert_eq!(engine.stats().observations_rejected, 1);
    }

    #[test]
    fn test_single_observation_reports_insufficient_data() {
        let mut engine = MotionEngine::new(EngineConfig::default());
        engine.ingest(obs("N1", 0, 0.0)).unwrap();
        let frame = engine.evaluate("N1", 5_000, &NoGeoContext, &NoGeoContext);
        match frame {
            AircraftFrame::InsufficientData { state, .. } => assert_eq!(state.lon, 0.0),
            other => panic!("unexpected frame {:?}", other),
        }
        let unknown = engine.evaluate("ZZZ", 5_000, &NoGeoContext, &NoGeoContext);
        assert_eq!(unknown, AircraftFrame::Unknown { aircraft_id: "ZZZ".into() });
        assert_eq!(
            serde_json::to_string(&unknown).unwrap(),
            r#"{"status":"unknown","aircraftId":"ZZZ"}"#
        );
    }

    #[test]
    fn test_tick_renders_sorted_and_counts() {
        let mut engine = MotionEngine::new(EngineConfig::default());
        for id in ["UAL2", "AAL1"] {
            engine.ingest(obs(id, 0, 0.0)).unwrap();
            engine.ingest(obs(id, 1_000, 0.0006)).unwrap();
        }
        assert_eq!(engine.ingest(obs("AAL1", 1_000, 0.0006)).unwrap(), IngestOutcome::Duplicate);

        let frames = engine.tick(2_000, &NoGeoContext, &NoGeoContext);
        let ids: Vec<_> = frames.iter().map(|f| f.aircraft_id().to_string()).collect();
        assert_eq!(ids, vec!["AAL1", "UAL2"]);
        assert!(frames.iter().all(|f| f.rendered().is_some()));

        let stats = engine.stats();
        assert_eq!(stats.tracked_aircraft, 2);
        assert_eq!(stats.ready, 2);
        assert_eq!(stats.observations_ingested, 4);
        assert_eq!(stats.observations_discarded, 1);
    }

    #[test]
    fn test_drain_prune_and_remove() {
        let mut engine = MotionEngine::new(EngineConfig::default());
        let (tx, rx) = ingest_channel(8);
        tx.send(obs("N1", 0, 0.0));
        tx.send(obs("N2", 10_000, 0.0));
        assert_eq!(engine.drain(&rx), 2);
        assert_eq!(engine.len(), 2);

        assert_eq!(engine.prune(35_000), vec!["N1".to_string()]);
        assert!(engine.remove("N2"));
        assert!(!engine.remove("N2"));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_source_delay_change_applies_to_later_observations() {
        let mut engine = MotionEngine::new(EngineConfig::default());
        engine.ingest(obs("N1", 0, 0.0)).unwrap();
        engine.set_source_delay(SourceTag::Vnas, 4_000);
        assert_eq!(engine.source_delays().get(SourceTag::Vnas), 4_000);
        engine.ingest(obs("N1", 1_000, 0.0006)).unwrap();

        let entries = engine.timelines().get("N1").unwrap().entries();
        assert_eq!(entries[0].display_delay_ms, 1_500);
        assert_eq!(entries[1].display_delay_ms, 4_000);
    }

    #[test]
    fn test_bank_is_zero_on_ground() {
        let mut engine = MotionEngine::new(EngineConfig::default());
        engine.ingest(obs("N1", 0, 0.0).with_roll(20.0).with_on_ground(true)).unwrap();
        engine.ingest(obs("N1", 1_000, 0.0006).with_roll(20.0).with_on_ground(true)).unwrap();
        let frame = engine.evaluate("N1", 2_000, &NoGeoContext, &NoGeoContext);
        let rendered = frame.rendered().unwrap();
        assert!(rendered.ground.on_ground);
        assert_eq!(rendered.state.bank_deg, 0.0);
    }
}

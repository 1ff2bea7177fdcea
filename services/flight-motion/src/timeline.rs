//! Per-aircraft observation timelines
//!
//! Keeps the few most recent observations of every aircraft in time order so
//! the interpolator can find the pair bracketing a render time. Arrival order
//! does not matter: late reports are inserted at their sorted position,
//! duplicates are ignored, and aircraft that stop reporting are evicted.

use std::collections::HashMap;
use tracing::debug;

use crate::config::TimelineConfig;
use crate::observation::{AircraftId, Observation, SourceTag};

/// An observation as stored in a timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub observation: Observation,

    /// Sample time on the local clock: `observed_at_ms` shifted by the source's clock offset
    pub sample_ms: i64,

    /// Display delay of the source when this entry was ingested
    pub display_delay_ms: i64,
}

/// Result of offering an observation to a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    /// Same sample time as a retained entry
    Duplicate,
    /// Older than the retained window
    TooLate,
    /// From a lower-priority source while the active source is live
    IgnoredSource,
    /// Accepted and made its source the active one
    SourceSwitched { from: SourceTag, to: SourceTag },
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Inserted | Self::SourceSwitched { .. })
    }
}

/// Ordered recent observations of one aircraft
#[derive(Debug, Clone)]
pub struct AircraftTimeline {
    aircraft_id: AircraftId,
    entries: Vec<TimelineEntry>,
    active_source: SourceTag,
    /// Fixed per source at first sight: received - observed
    clock_offsets: HashMap<SourceTag, i64>,
    last_ingest_at_ms: i64,
    last_active_received_ms: i64,
    accepted: u64,
}

impl AircraftTimeline {
    pub fn new(aircraft_id: AircraftId, source: SourceTag) -> Self {
        Self {
            aircraft_id,
            entries: Vec::with_capacity(8),
            active_source: source,
            clock_offsets: HashMap::new(),
            last_ingest_at_ms: i64::MIN,
            last_active_received_ms: i64::MIN,
            accepted: 0,
        }
    }

    pub fn aircraft_id(&self) -> &str {
        &self.aircraft_id
    }

    /// Entries in ascending sample time
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest(&self) -> Option<&TimelineEntry> {
        self.entries.first()
    }

    pub fn newest(&self) -> Option<&TimelineEntry> {
        self.entries.last()
    }

    /// Two observations are needed before a render time can be bracketed
    pub fn has_enough_data(&self) -> bool {
        self.entries.len() >= 2
    }

    pub fn active_source(&self) -> SourceTag {
        self.active_source
    }

    pub fn last_ingest_at_ms(&self) -> i64 {
        self.last_ingest_at_ms
    }

    /// Number of observations accepted over the timeline's lifetime
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Terrain elevation implied by the newest report that carries its own AGL
    pub fn reported_terrain_m(&self) -> Option<f64> {
        self.entries.iter().rev().find_map(|e| {
            e.observation
                .altitude_agl_meters
                .map(|agl| e.observation.altitude_msl_meters - agl)
        })
    }

    /// On-ground flag of the newest report
    pub fn on_ground_hint(&self) -> Option<bool> {
        self.newest().and_then(|e| e.observation.on_ground_hint)
    }

    /// Check if the aircraft has stopped reporting
    pub fn is_stale(&self, now_ms: i64, timeout_ms: i64) -> bool {
        now_ms.saturating_sub(self.last_ingest_at_ms) > timeout_ms
    }

    /// Insert an observation at its sorted position.
    ///
    /// `display_delay_ms` is the delay configured for the observation's source
    /// right now; it is stamped on the entry and never revisited.
    pub fn ingest(
        &mut self,
        observation: Observation,
        display_delay_ms: i64,
        config: &TimelineConfig,
    ) -> IngestOutcome {
        let source = observation.source;
        let received = observation.received_at_ms;
        let mut outcome = IngestOutcome::Inserted;

        if source != self.active_source && !self.entries.is_empty() {
            if self.should_switch_to(source, received) {
                outcome = IngestOutcome::SourceSwitched {
                    from: self.active_source,
                    to: source,
                };
            } else {
                return IngestOutcome::IgnoredSource;
            }
        }

        let offset = *self
            .clock_offsets
            .entry(source)
            .or_insert_with(|| received.saturating_sub(observation.observed_at_ms));
        let sample_ms = observation.observed_at_ms.saturating_add(offset);

        if let IngestOutcome::SourceSwitched { .. } = outcome {
            // Reports of the old source that are not older than the first
            // report of the new source would interleave two clock domains
            self.entries
                .retain(|e| e.observation.source == source || e.sample_ms < sample_ms);
            self.active_source = source;
        }

        if let Some(oldest) = self.entries.first() {
            if sample_ms < oldest.sample_ms.saturating_sub(config.late_slack_ms) {
                return IngestOutcome::TooLate;
            }
        }

        let pos = match self.entries.binary_search_by_key(&sample_ms, |e| e.sample_ms) {
            Ok(_) => {
                // A repeated report still shows the aircraft is being heard
                self.last_ingest_at_ms = self.last_ingest_at_ms.max(received);
                return IngestOutcome::Duplicate;
            }
            Err(pos) => pos,
        };

        let max_entries = config.max_entries.max(2);
        if pos == 0 && self.entries.len() >= max_entries {
            // Would be evicted immediately as the oldest entry
            return IngestOutcome::TooLate;
        }

        self.entries.insert(
            pos,
            TimelineEntry {
                observation,
                sample_ms,
                display_delay_ms,
            },
        );
        if self.entries.len() > max_entries {
            let excess = self.entries.len() - max_entries;
            self.entries.drain(..excess);
        }

        self.last_ingest_at_ms = self.last_ingest_at_ms.max(received);
        self.last_active_received_ms = self.last_active_received_ms.max(received);
        self.accepted += 1;

        outcome
    }

    /// Higher priority always takes over; a lower one only once the active source went quiet
    fn should_switch_to(&self, source: SourceTag, received_ms: i64) -> bool {
        if source.priority() > self.active_source.priority() {
            return true;
        }

        let active_delay = self
            .entries
            .iter()
            .rev()
            .find(|e| e.observation.source == self.active_source)
            .map(|e| e.display_delay_ms)
            .unwrap_or(0);

        received_ms.saturating_sub(self.last_active_received_ms) > active_delay
    }
}

/// Timelines of all tracked aircraft
pub struct TimelineBuffer {
    timelines: HashMap<AircraftId, AircraftTimeline>,
    config: TimelineConfig,
}

impl TimelineBuffer {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            timelines: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Offer an observation, creating the aircraft's timeline on first sight
    pub fn ingest(&mut self, observation: Observation, display_delay_ms: i64) -> IngestOutcome {
        let config = &self.config;
        let timeline = self
            .timelines
            .entry(observation.aircraft_id.clone())
            .or_insert_with(|| {
                debug!(
                    aircraft = %observation.aircraft_id,
                    source = %observation.source,
                    "New aircraft tracked"
                );
                AircraftTimeline::new(observation.aircraft_id.clone(), observation.source)
            });

        let outcome = timeline.ingest(observation, display_delay_ms, config);
        if let IngestOutcome::SourceSwitched { from, to } = outcome {
            debug!(aircraft = %timeline.aircraft_id(), %from, %to, "Active source switched");
        }
        outcome
    }

    pub fn get(&self, aircraft_id: &str) -> Option<&AircraftTimeline> {
        self.timelines.get(aircraft_id)
    }

    /// Tracked aircraft ids in sorted order
    pub fn ids(&self) -> Vec<AircraftId> {
        let mut ids: Vec<AircraftId> = self.timelines.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Evict aircraft that have not reported within the timeout; returns their ids
    pub fn prune(&mut self, now_ms: i64) -> Vec<AircraftId> {
        let timeout = self.config.eviction_timeout_ms;
        let mut removed = Vec::new();
        self.timelines.retain(|id, timeline| {
            let stale = timeline.is_stale(now_ms, timeout);
            if stale {
                removed.push(id.clone());
            }
            !stale
        });
        if !removed.is_empty() {
            debug!(
                "Evicted {} stale aircraft, {} remaining",
                removed.len(),
                self.timelines.len()
            );
        }
        removed
    }

    /// Explicit disconnect
    pub fn remove(&mut self, aircraft_id: &str) -> bool {
        self.timelines.remove(aircraft_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(source: SourceTag, t_ms: i64) -> Observation {
        Observation::new("AAL1", source, t_ms, t_ms, 40.0, -73.0, 100.0, 20.0, 90.0)
    }

    fn sample_times(timeline: &AircraftTimeline) -> Vec<i64> {
        timeline.entries().iter().map(|e| e.sample_ms).collect()
    }

    #[test]
    fn test_out_of_order_insert_is_sorted() {
        let config = TimelineConfig::default();
        let mut timeline = AircraftTimeline::new("AAL1".into(), SourceTag::Vatsim);
        assert_eq!(timeline.ingest(obs(SourceTag::Vatsim, 1_000), 17_000, &config), IngestOutcome::Inserted);
        assert_eq!(timeline.ingest(obs(SourceTag::Vatsim, 3_000), 17_000, &config), IngestOutcome::Inserted);
        assert_eq!(timeline.ingest(obs(SourceTag::Vatsim, 2_000), 17_000, &config), IngestOutcome::Inserted);
        assert_eq!(sample_times(&timeline), vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn test_duplicate_is_ignored() {
        let config = TimelineConfig::default();
        let mut timeline = AircraftTimeline::new("AAL1".into(), SourceTag::Vatsim);
        timeline.ingest(obs(SourceTag::Vatsim, 1_000), 17_000, &config);
        assert_eq!(timeline.ingest(obs(SourceTag::Vatsim, 1_000), 17_000, &config), IngestOutcome::Duplicate);
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.accepted(), 1);
    }

    #[test]
    fn test_repeated_report_keeps_aircraft_alive() {
        let mut buffer = TimelineBuffer::new(TimelineConfig::default());
        buffer.ingest(obs(SourceTag::Vnas, 0), 1_500);
        // The feed keeps re-sending the same position report, received later each time
        for received in [10_000, 20_000, 30_000] {
            let mut repeat = obs(SourceTag::Vnas, 0);
            repeat.received_at_ms = received;
            assert_eq!(buffer.ingest(repeat, 1_500), IngestOutcome::Duplicate);
        }
        assert_eq!(buffer.get("AAL1").map(|t| t.last_ingest_at_ms()), Some(30_000));
        assert!(buffer.prune(45_000).is_empty());
        assert_eq!(buffer.prune(60_001), vec!["AAL1".to_string()]);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let config = TimelineConfig::default();
        let mut timeline = AircraftTimeline::new("AAL1".into(), SourceTag::Vatsim);
        let mut first = obs(SourceTag::Vatsim, -9_000_000_000_000_000_000);
        first.received_at_ms = 9_000_000_000_000_000_000;
        assert_eq!(timeline.ingest(first, 17_000, &config), IngestOutcome::Inserted);

        let mut second = obs(SourceTag::Vatsim, i64::MAX);
        second.received_at_ms = i64::MAX;
        assert_eq!(timeline.ingest(second, 17_000, &config), IngestOutcome::Inserted);
        assert_eq!(
            sample_times(&timeline),
            vec![i64::MAX - 9_000_000_000_000_000_000, i64::MAX]
        );
    }

    #[test]
    fn test_cap_keeps_newest() {
        let config = TimelineConfig::default();
        let mut timeline = AircraftTimeline::new("AAL1".into(), SourceTag::Vatsim);
        for t in 1..=6 {
            timeline.ingest(obs(SourceTag::Vatsim, t * 1_000), 17_000, &config);
        }
        assert_eq!(sample_times(&timeline), vec![3_000, 4_000, 5_000, 6_000]);
    }

    #[test]
    fn test_too_late_is_dropped() {
        let config = TimelineConfig::default();
        let mut timeline = AircraftTimeline::new("AAL1".into(), SourceTag::Vatsim);
        timeline.ingest(obs(SourceTag::Vatsim, 10_000), 17_000, &config);
        timeline.ingest(obs(SourceTag::Vatsim, 11_000), 17_000, &config);

        // Within slack: accepted
        assert_eq!(timeline.ingest(obs(SourceTag::Vatsim, 9_500), 17_000, &config), IngestOutcome::Inserted);
        // Far older than the oldest entry
        assert_eq!(timeline.ingest(obs(SourceTag::Vatsim, 5_000), 17_000, &config), IngestOutcome::TooLate);
        assert_eq!(sample_times(&timeline), vec![9_500, 10_000, 11_000]);
    }

    #[test]
    fn test_late_insert_into_full_timeline_is_dropped() {
        let config = TimelineConfig::default();
        let mut timeline = AircraftTimeline::new("AAL1".into(), SourceTag::Vatsim);
        for t in 1..=4 {
            timeline.ingest(obs(SourceTag::Vatsim, t * 1_000), 17_000, &config);
        }
        assert_eq!(timeline.ingest(obs(SourceTag::Vatsim, 500), 17_000, &config), IngestOutcome::TooLate);
        assert_eq!(timeline.len(), 4);
    }

    #[test]
    fn test_clock_offset_uses_local_receive_time() {
        let config = TimelineConfig::default();
        let mut timeline = AircraftTimeline::new("AAL1".into(), SourceTag::Vatsim);
        // Source clock runs 5 s behind the local clock
        let mut first = obs(SourceTag::Vatsim, 1_000);
        first.received_at_ms = 6_200;
        let mut second = obs(SourceTag::Vatsim, 16_000);
        second.received_at_ms = 21_900;
        timeline.ingest(first, 17_000, &config);
        timeline.ingest(second, 17_000, &config);
        assert_eq!(sample_times(&timeline), vec![6_200, 21_200]);
    }

    #[test]
    fn test_higher_priority_source_takes_over() {
        let config = TimelineConfig::default();
        let mut timeline = AircraftTimeline::new("AAL1".into(), SourceTag::Vatsim);
        timeline.ingest(obs(SourceTag::Vatsim, 0), 17_000, &config);
        timeline.ingest(obs(SourceTag::Vatsim, 15_000), 17_000, &config);

        let outcome = timeline.ingest(obs(SourceTag::Vnas, 10_000), 1_500, &config);
        assert_eq!(
            outcome,
            IngestOutcome::SourceSwitched { from: SourceTag::Vatsim, to: SourceTag::Vnas }
        );
        assert_eq!(timeline.active_source(), SourceTag::Vnas);
        // The VATSIM report newer than the switch point is discarded
        assert_eq!(sample_times(&timeline), vec![0, 10_000]);
    }

    #[test]
    fn test_lower_priority_source_ignored_while_active_is_live() {
        let config = TimelineConfig::default();
        let mut timeline = AircraftTimeline::new("AAL1".into(), SourceTag::Vnas);
        timeline.ingest(obs(SourceTag::Vnas, 0), 1_500, &config);
        timeline.ingest(obs(SourceTag::Vnas, 1_000), 1_500, &config);

        assert_eq!(timeline.ingest(obs(SourceTag::Vatsim, 1_500), 17_000, &config), IngestOutcome::IgnoredSource);

        // vNAS silent for longer than its display delay: VATSIM takes over
        let outcome = timeline.ingest(obs(SourceTag::Vatsim, 4_000), 17_000, &config);
        assert!(matches!(outcome, IngestOutcome::SourceSwitched { to: SourceTag::Vatsim, .. }));
    }

    #[test]
    fn test_reported_terrain_from_agl() {
        let config = TimelineConfig::default();
        let mut timeline = AircraftTimeline::new("AAL1".into(), SourceTag::Vnas);
        timeline.ingest(obs(SourceTag::Vnas, 0).with_agl(40.0), 1_500, &config);
        assert_eq!(timeline.reported_terrain_m(), Some(60.0));
    }

    #[test]
    fn test_buffer_prune_and_remove() {
        let mut buffer = TimelineBuffer::new(TimelineConfig::default());
        buffer.ingest(obs(SourceTag::Vatsim, 0), 17_000);
        let mut other = obs(SourceTag::Vatsim, 20_000);
        other.aircraft_id = "UAL2".into();
        buffer.ingest(other, 17_000);
        assert_eq!(buffer.ids(), vec!["AAL1".to_string(), "UAL2".to_string()]);

        assert!(buffer.prune(25_000).is_empty());
        assert_eq!(buffer.prune(30_001), vec!["AAL1".to_string()]);
        assert_eq!(buffer.len(), 1);

        assert!(buffer.remove("UAL2"));
        assert!(!buffer.remove("UAL2"));
        assert!(buffer.is_empty());
    }
}

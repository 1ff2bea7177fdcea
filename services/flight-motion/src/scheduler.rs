//! Display delay scheduling
//!
//! Every source is displayed a fixed delay behind real time so that the render
//! time usually lands between two buffered observations. The delay is stamped
//! on each observation at ingest; the per-aircraft [`RenderClock`] follows the
//! delay of the newest entry and slews between delays instead of jumping.

use crate::config::{SchedulerConfig, SourceDelays};
use crate::observation::SourceTag;
use crate::timeline::AircraftTimeline;

/// Per-source display delays in effect right now
#[derive(Debug, Clone)]
pub struct DisplayDelayScheduler {
    delays: SourceDelays,
    slew_rate: f64,
}

impl DisplayDelayScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            delays: config.delays,
            slew_rate: config.delay_slew_rate.max(0.0),
        }
    }

    pub fn delays(&self) -> &SourceDelays {
        &self.delays
    }

    /// Delay to stamp on an observation from `source` ingested now
    pub fn delay_for(&self, source: SourceTag) -> i64 {
        self.delays.get(source)
    }

    /// Change a source delay; entries already stamped keep their old delay
    pub fn set_delay(&mut self, source: SourceTag, delay_ms: i64) {
        self.delays.set(source, delay_ms);
    }

    /// `now - delay(source)` with the current configuration
    pub fn render_time_for(&self, source: SourceTag, now_ms: i64) -> i64 {
        now_ms - self.delay_for(source)
    }

    /// Advance an aircraft's render clock to `now_ms`.
    ///
    /// The target delay is the one stamped on the newest entry. Returns `None`
    /// for an empty timeline.
    pub fn render_time(
        &self,
        clock: &mut RenderClock,
        timeline: &AircraftTimeline,
        now_ms: i64,
    ) -> Option<i64> {
        let target = timeline.newest()?.display_delay_ms;
        Some(clock.advance(target, now_ms, self.slew_rate))
    }
}

/// Render time bookkeeping of one aircraft
#[derive(Debug, Clone, Default)]
pub struct RenderClock {
    effective_delay_ms: Option<f64>,
    last_now_ms: i64,
    last_render_ms: Option<i64>,
}

impl RenderClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effective_delay_ms(&self) -> Option<f64> {
        self.effective_delay_ms
    }

    pub fn last_render_ms(&self) -> Option<i64> {
        self.last_render_ms
    }

    /// Move the effective delay toward `target_delay_ms` and return the render time.
    ///
    /// Render time never decreases, even if the wall clock does.
    pub fn advance(&mut self, target_delay_ms: i64, now_ms: i64, slew_rate: f64) -> i64 {
        let target = target_delay_ms as f64;
        let effective = match self.effective_delay_ms {
            None => target,
            Some(previous) => {
                let elapsed = now_ms.saturating_sub(self.last_now_ms).max(0) as f64;
                let max_step = slew_rate * elapsed;
                previous + (target - previous).clamp(-max_step, max_step)
            }
        };

        let mut render_ms = now_ms - effective.round() as i64;
        if let Some(last) = self.last_render_ms {
            render_ms = render_ms.max(last);
        }

        self.effective_delay_ms = Some(effective);
        self.last_now_ms = self.last_now_ms.max(now_ms);
        self.last_render_ms = Some(render_ms);
        render_ms
    }
}

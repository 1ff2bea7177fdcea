//! Kinematic state interpolation and extrapolation
//!
//! The render time of an aircraft falls either before its first observation
//! (hold), between two observations (interpolate), or past the newest one
//! (extrapolate). Each of those is a segment. A segment starts either at its
//! first raw observation or, when the previous segment was left somewhere in
//! the middle, at the last rendered state: that is what keeps motion continuous
//! when late data or a source switch changes the bracketing observations.
//!
//! Position follows a cubic Hermite curve in a local east/north frame, with
//! tangents taken from ground track and groundspeed. Heading turns along the
//! shortest arc. Altitude, groundspeed and vertical rate are linear in time.

use serde::Serialize;

use crate::config::InterpolatorConfig;
use crate::geo::{
    angle_diff_deg, bearing_deg, bearing_of, haversine_m, lerp, lerp_heading, smoothstep,
    velocity_en, LocalFrame, FPM_TO_MPS, GRAVITY_MPS2, KTS_TO_MPS,
};
use crate::timeline::{AircraftTimeline, TimelineEntry};

/// Below this movement between observations a derived track is noise
const MIN_TRACK_MOVE_M: f64 = 1.0;

/// Displayed state of an aircraft at one render time
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KinematicState {
    pub lat: f64,
    pub lon: f64,
    pub altitude_msl_meters: f64,
    pub heading_deg: f64,
    /// Direction of travel over the ground
    pub track_deg: f64,
    pub groundspeed_kts: f64,
    pub vertical_rate_ft_per_min: f64,
    /// Positive right wing down
    pub bank_deg: f64,
    pub is_extrapolated: bool,
}

/// Portion of the timeline the render time currently falls in, keyed by sample times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Hold { at_ms: i64 },
    Interpolate { from_ms: i64, to_ms: i64 },
    Extrapolate { from_ms: i64 },
}

impl Segment {
    fn first_ms(&self) -> i64 {
        match *self {
            Segment::Hold { at_ms } => at_ms,
            Segment::Interpolate { from_ms, .. } => from_ms,
            Segment::Extrapolate { from_ms } => from_ms,
        }
    }

    fn ends_at(&self, ms: i64) -> bool {
        match *self {
            Segment::Hold { at_ms } => at_ms == ms,
            Segment::Interpolate { to_ms, .. } => to_ms == ms,
            Segment::Extrapolate { .. } => false,
        }
    }
}

/// Fixed starting point of the active segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStart {
    pub state: KinematicState,
    pub at_ms: i64,
    /// Started from a rendered state rather than a raw observation
    pub from_anchor: bool,
}

/// Where the aircraft was last displayed, and the segment that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorState {
    pub state: KinematicState,
    pub render_time_ms: i64,
    pub segment: Segment,
    pub start: SegmentStart,
}

#[derive(Debug, Clone, Copy)]
enum Bracket {
    Hold(usize),
    Interpolate(usize, usize),
    Extrapolate(usize),
}

pub struct Interpolator {
    config: InterpolatorConfig,
}

impl Interpolator {
    pub fn new(config: InterpolatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterpolatorConfig {
        &self.config
    }

    /// Compute the state at `render_ms` and the anchor for the next call.
    ///
    /// Pure in its inputs: the same timeline, anchor and render time always
    /// produce the same result. Returns `None` for an empty timeline.
    pub fn evaluate(
        &self,
        timeline: &AircraftTimeline,
        anchor: Option<&AnchorState>,
        render_ms: i64,
    ) -> Option<(KinematicState, AnchorState)> {
        let entries = timeline.entries();
        let bracket = bracket(entries, render_ms)?;
        let segment = match bracket {
            Bracket::Hold(i) => Segment::Hold { at_ms: entries[i].sample_ms },
            Bracket::Interpolate(a, b) => Segment::Interpolate {
                from_ms: entries[a].sample_ms,
                to_ms: entries[b].sample_ms,
            },
            Bracket::Extrapolate(n) => Segment::Extrapolate { from_ms: entries[n].sample_ms },
        };
        let first = match bracket {
            Bracket::Hold(i) | Bracket::Interpolate(i, _) | Bracket::Extrapolate(i) => i,
        };
        let start = self.segment_start(entries, first, segment, anchor, render_ms);

        let state = match bracket {
            Bracket::Hold(i) => self.entry_state(entries, i),
            Bracket::Interpolate(a, b) => self.interpolate(&start, entries, a, b, render_ms),
            Bracket::Extrapolate(n) => self.extrapolate(&start, entries, n, render_ms),
        };

        let anchor = AnchorState {
            state,
            render_time_ms: render_ms,
            segment,
            start,
        };
        Some((state, anchor))
    }

    fn segment_start(
        &self,
        entries: &[TimelineEntry],
        first: usize,
        segment: Segment,
        anchor: Option<&AnchorState>,
        render_ms: i64,
    ) -> SegmentStart {
        if let Some(anchor) = anchor {
            if anchor.segment == segment {
                return anchor.start;
            }
            // Re-evaluating the previous path at its end yields the raw observation
            let ended_at_first = anchor.segment.ends_at(segment.first_ms());
            let fresh = render_ms - anchor.render_time_ms <= self.config.reanchor_max_gap_ms;
            if !ended_at_first && fresh {
                return SegmentStart {
                    state: anchor.state,
                    at_ms: anchor.render_time_ms.min(render_ms),
                    from_anchor: true,
                };
            }
        }

        SegmentStart {
            state: self.entry_state(entries, first),
            at_ms: entries[first].sample_ms,
            from_anchor: false,
        }
    }

    /// State of a raw observation, with track and vertical rate filled in
    fn entry_state(&self, entries: &[TimelineEntry], i: usize) -> KinematicState {
        let obs = &entries[i].observation;
        KinematicState {
            lat: obs.lat,
            lon: obs.lon,
            altitude_msl_meters: obs.altitude_msl_meters,
            heading_deg: obs.heading_deg,
            track_deg: travel_track(entries, i),
            groundspeed_kts: obs.groundspeed_kts,
            vertical_rate_ft_per_min: vertical_rate(entries, i),
            bank_deg: self.clamp_bank(obs.roll_deg.unwrap_or(0.0)),
            is_extrapolated: false,
        }
    }

    fn interpolate(
        &self,
        start: &SegmentStart,
        entries: &[TimelineEntry],
        a: usize,
        b: usize,
        render_ms: i64,
    ) -> KinematicState {
        let end = self.entry_state(entries, b);
        let duration_ms = entries[b].sample_ms - start.at_ms;
        if duration_ms <= 0 {
            return end;
        }

        let u = ((render_ms - start.at_ms) as f64 / duration_ms as f64).clamp(0.0, 1.0);
        let duration_s = duration_ms as f64 / 1000.0;
        let s = &start.state;

        let frame = LocalFrame::new(s.lat, s.lon);
        let p1 = frame.to_local(end.lat, end.lon);
        let chord = p1.0.hypot(p1.1);
        let m0 = tangent(s.track_deg, s.groundspeed_kts, duration_s, chord);
        let m1 = tangent(end.track_deg, end.groundspeed_kts, duration_s, chord);
        let (pos, vel) = hermite(p1, m0, m1, u);
        let (lat, lon) = frame.to_geo(pos.0, pos.1);

        let track_deg = bearing_of(vel.0, vel.1)
            .unwrap_or_else(|| lerp_heading(s.track_deg, end.track_deg, u));
        let groundspeed_kts = lerp(s.groundspeed_kts, end.groundspeed_kts, u);

        let reported_roll = match (
            entries[a].observation.roll_deg,
            entries[b].observation.roll_deg,
        ) {
            (Some(_), Some(_)) => Some(lerp(s.bank_deg, end.bank_deg, u)),
            _ => None,
        };
        let bank_deg = reported_roll.unwrap_or_else(|| {
            let turn_rate = angle_diff_deg(s.heading_deg, end.heading_deg) / duration_s;
            coordinated_turn_bank(turn_rate, groundspeed_kts)
        });

        KinematicState {
            lat,
            lon,
            altitude_msl_meters: lerp(s.altitude_msl_meters, end.altitude_msl_meters, u),
            heading_deg: lerp_heading(s.heading_deg, end.heading_deg, u),
            track_deg,
            groundspeed_kts,
            vertical_rate_ft_per_min: lerp(
                s.vertical_rate_ft_per_min,
                end.vertical_rate_ft_per_min,
                u,
            ),
            bank_deg: self.clamp_bank(bank_deg),
            is_extrapolated: false,
        }
    }

    fn extrapolate(
        &self,
        start: &SegmentStart,
        entries: &[TimelineEntry],
        n: usize,
        render_ms: i64,
    ) -> KinematicState {
        let newest = self.entry_state(entries, n);
        let target = self.dead_reckon(&newest, render_ms - entries[n].sample_ms);
        if !start.from_anchor {
            return target;
        }

        let blend_ms = self.config.reanchor_blend_ms.max(1) as f64;
        let w = smoothstep((render_ms - start.at_ms) as f64 / blend_ms);
        if w >= 1.0 {
            return target;
        }

        let own = self.dead_reckon(&start.state, render_ms - start.at_ms);
        let frame = LocalFrame::new(own.lat, own.lon);
        let (east, north) = frame.to_local(target.lat, target.lon);
        let (lat, lon) = frame.to_geo(east * w, north * w);

        KinematicState {
            lat,
            lon,
            altitude_msl_meters: lerp(own.altitude_msl_meters, target.altitude_msl_meters, w),
            heading_deg: lerp_heading(own.heading_deg, target.heading_deg, w),
            track_deg: lerp_heading(own.track_deg, target.track_deg, w),
            groundspeed_kts: lerp(own.groundspeed_kts, target.groundspeed_kts, w),
            vertical_rate_ft_per_min: lerp(
                own.vertical_rate_ft_per_min,
                target.vertical_rate_ft_per_min,
                w,
            ),
            bank_deg: lerp(own.bank_deg, target.bank_deg, w),
            is_extrapolated: true,
        }
    }

    /// Straight-line projection along the track, holding after the horizon
    fn dead_reckon(&self, from: &KinematicState, elapsed_ms: i64) -> KinematicState {
        let elapsed_s = elapsed_ms.clamp(0, self.config.max_extrapolation_ms.max(0)) as f64 / 1000.0;
        let (ve, vn) = velocity_en(from.track_deg, from.groundspeed_kts);
        let (lat, lon) = LocalFrame::new(from.lat, from.lon).to_geo(ve * elapsed_s, vn * elapsed_s);

        KinematicState {
            lat,
            lon,
            altitude_msl_meters: from.altitude_msl_meters
                + from.vertical_rate_ft_per_min * FPM_TO_MPS * elapsed_s,
            is_extrapolated: true,
            ..*from
        }
    }

    fn clamp_bank(&self, bank_deg: f64) -> f64 {
        let limit = self.config.max_bank_deg.abs();
        bank_deg.clamp(-limit, limit)
    }
}

fn bracket(entries: &[TimelineEntry], render_ms: i64) -> Option<Bracket> {
    let first = entries.first()?;
    let last = entries.last()?;

    if entries.len() == 1 || render_ms < first.sample_ms {
        return Some(Bracket::Hold(0));
    }
    if render_ms > last.sample_ms {
        return Some(Bracket::Extrapolate(entries.len() - 1));
    }

    let b = entries.partition_point(|e| e.sample_ms < render_ms).max(1);
    Some(Bracket::Interpolate(b - 1, b))
}

/// Direction of travel at entry `i`.
///
/// Reported ground track first, then the direction of arrival from the
/// previous entry, then the direction toward the next one, then heading.
/// The following entry is only consulted for the first one, so the track of an
/// entry does not change when newer observations arrive.
fn travel_track(entries: &[TimelineEntry], i: usize) -> f64 {
    let obs = &entries[i].observation;
    if let Some(track) = obs.ground_track_deg {
        return track;
    }

    let moved_bearing = |from: usize, to: usize| {
        let a = &entries[from].observation;
        let b = &entries[to].observation;
        if haversine_m(a.lat, a.lon, b.lat, b.lon) > MIN_TRACK_MOVE_M {
            bearing_deg(a.lat, a.lon, b.lat, b.lon)
        } else {
            None
        }
    };

    let derived = if i > 0 {
        moved_bearing(i - 1, i)
    } else if entries.len() > 1 {
        moved_bearing(0, 1)
    } else {
        None
    };
    derived.unwrap_or(obs.heading_deg)
}

/// Reported vertical rate, else derived from the altitude change to a neighbour
fn vertical_rate(entries: &[TimelineEntry], i: usize) -> f64 {
    if let Some(rate) = entries[i].observation.vertical_rate_ft_per_min {
        return rate;
    }

    let (a, b) = if i > 0 {
        (&entries[i - 1], &entries[i])
    } else if entries.len() > 1 {
        (&entries[0], &entries[1])
    } else {
        return 0.0;
    };
    let minutes = (b.sample_ms - a.sample_ms) as f64 / 60_000.0;
    if minutes <= 0.0 {
        return 0.0;
    }
    (b.observation.altitude_msl_meters - a.observation.altitude_msl_meters) / 0.3048 / minutes
}

/// Hermite tangent in meters, limited so bad speed reports cannot make loops
fn tangent(track_deg: f64, speed_kts: f64, duration_s: f64, chord_m: f64) -> (f64, f64) {
    if chord_m <= 0.0 {
        return (0.0, 0.0);
    }
    let (ve, vn) = velocity_en(track_deg, speed_kts);
    let (te, tn) = (ve * duration_s, vn * duration_s);
    let len = te.hypot(tn);
    let max_len = 2.0 * chord_m;
    if len > max_len {
        let k = max_len / len;
        (te * k, tn * k)
    } else {
        (te, tn)
    }
}

/// Cubic Hermite from the origin to `p1`: position and derivative at `u`
fn hermite(p1: (f64, f64), m0: (f64, f64), m1: (f64, f64), u: f64) -> ((f64, f64), (f64, f64)) {
    let u2 = u * u;
    let u3 = u2 * u;
    let h10 = u3 - 2.0 * u2 + u;
    let h01 = -2.0 * u3 + 3.0 * u2;
    let h11 = u3 - u2;
    let d10 = 3.0 * u2 - 4.0 * u + 1.0;
    let d01 = -6.0 * u2 + 6.0 * u;
    let d11 = 3.0 * u2 - 2.0 * u;

    let pos = (
        h10 * m0.0 + h01 * p1.0 + h11 * m1.0,
        h10 * m0.1 + h01 * p1.1 + h11 * m1.1,
    );
    let vel = (
        d10 * m0.0 + d01 * p1.0 + d11 * m1.0,
        d10 * m0.1 + d01 * p1.1 + d11 * m1.1,
    );
    (pos, vel)
}

/// Bank needed for a coordinated turn at `turn_rate_deg_s` and `speed_kts`
fn coordinated_turn_bank(turn_rate_deg_s: f64, speed_kts: f64) -> f64 {
    let v = speed_kts * KTS_TO_MPS;
    (v * turn_rate_deg_s.to_radians() / GRAVITY_MPS2).atan().to_degrees()
}

//! Runway geometry in a local frame
//!
//! The centerline axis comes from the threshold coordinates; the published
//! true heading of each end is used for alignment checks.

use crate::context::{Runway, RunwayEnd};
use crate::geo::{angle_diff_deg, LocalFrame};

/// Position relative to one runway end, measured in its landing direction
#[derive(Debug, Clone, Copy)]
pub struct ApproachGeometry<'a> {
    pub end: &'a RunwayEnd,
    /// Negative before the threshold, positive past it
    pub along_m: f64,
    /// Positive right of the centerline
    pub lateral_m: f64,
}

impl ApproachGeometry<'_> {
    /// Distance still to fly to the threshold, zero once past it
    pub fn distance_to_threshold_m(&self) -> f64 {
        (-self.along_m).max(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunwayGeometry<'a> {
    runway: &'a Runway,
    frame: LocalFrame,
    far_end: (f64, f64),
    /// Unit vector from the first end toward the second
    axis: (f64, f64),
    length_m: f64,
}

impl<'a> RunwayGeometry<'a> {
    /// `None` when both ends coincide
    pub fn new(runway: &'a Runway) -> Option<Self> {
        let [first, second] = &runway.ends;
        let frame = LocalFrame::new(first.lat, first.lon);
        let far_end = frame.to_local(second.lat, second.lon);
        let length_m = far_end.0.hypot(far_end.1);
        if length_m < 1.0 {
            return None;
        }

        Some(Self {
            runway,
            frame,
            far_end,
            axis: (far_end.0 / length_m, far_end.1 / length_m),
            length_m,
        })
    }

    pub fn runway(&self) -> &'a Runway {
        self.runway
    }

    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    /// Position relative to end `end_index` (0 or 1)
    pub fn relative_to(&self, end_index: usize, lat: f64, lon: f64) -> ApproachGeometry<'a> {
        let p = self.frame.to_local(lat, lon);
        let (rel, dir) = if end_index == 0 {
            (p, self.axis)
        } else {
            (
                (p.0 - self.far_end.0, p.1 - self.far_end.1),
                (-self.axis.0, -self.axis.1),
            )
        };

        ApproachGeometry {
            end: &self.runway.ends[end_index.min(1)],
            along_m: rel.0 * dir.0 + rel.1 * dir.1,
            lateral_m: rel.0 * dir.1 - rel.1 * dir.0,
        }
    }

    /// Relative positions for both ends
    pub fn approaches(&self, lat: f64, lon: f64) -> [ApproachGeometry<'a>; 2] {
        [self.relative_to(0, lat, lon), self.relative_to(1, lat, lon)]
    }

    /// Whether a position is on the paved surface, with a margin around it
    pub fn contains(&self, lat: f64, lon: f64, margin_m: f64) -> bool {
        let g = self.relative_to(0, lat, lon);
        let half_width = self.runway.width_m / 2.0 + margin_m;
        g.along_m >= -margin_m
            && g.along_m <= self.length_m + margin_m
            && g.lateral_m.abs() <= half_width
    }

    /// Index of the end whose heading matches `direction_deg` within tolerance.
    ///
    /// Both ends are tested, so the runway matches whichever way it is used.
    pub fn aligned_end(&self, direction_deg: f64, tolerance_deg: f64) -> Option<usize> {
        (0..2)
            .map(|i| {
                let diff = angle_diff_deg(self.runway.ends[i].true_heading_deg, direction_deg).abs();
                (i, diff)
            })
            .filter(|(_, diff)| *diff <= tolerance_deg)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// End whose threshold is closer to a position
    pub fn nearest_end(&self, lat: f64, lon: f64) -> &'a RunwayEnd {
        let [a, b] = self.approaches(lat, lon);
        if a.along_m.abs() <= b.along_m.abs() {
            a.end
        } else {
            b.end
        }
    }
}

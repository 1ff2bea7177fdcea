//! Observation data types

use serde::{Deserialize, Serialize};

/// Identifier of a tracked aircraft (callsign or hex address, as the source reports it)
pub type AircraftId = String;

/// Data source that produced an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    /// VATSIM data feed (~15 s cadence, high jitter)
    Vatsim,
    /// vNAS tower cab feed (~1 s cadence)
    Vnas,
    /// RealTraffic feed (2-10 s cadence)
    #[serde(rename = "realtraffic")]
    RealTraffic,
    /// Recorded session played back by a replay producer
    Replay,
}

impl SourceTag {
    pub const ALL: [SourceTag; 4] = [
        SourceTag::Vatsim,
        SourceTag::Vnas,
        SourceTag::RealTraffic,
        SourceTag::Replay,
    ];

    /// Preference when more than one source reports the same aircraft (higher wins)
    pub fn priority(&self) -> u8 {
        match self {
            SourceTag::Vnas => 3,
            SourceTag::RealTraffic => 2,
            SourceTag::Vatsim => 1,
            SourceTag::Replay => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Vatsim => "vatsim",
            SourceTag::Vnas => "vnas",
            SourceTag::RealTraffic => "realtraffic",
            SourceTag::Replay => "replay",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw positional report for an aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// Aircraft identifier
    pub aircraft_id: AircraftId,

    /// Producing source
    #[serde(rename = "sourceTag")]
    pub source: SourceTag,

    /// Timestamp reported by the source (source clock), ms since epoch
    pub observed_at_ms: i64,

    /// Local wall-clock time the report was received, ms since epoch
    pub received_at_ms: i64,

    /// Latitude in degrees (-90 to 90)
    pub lat: f64,

    /// Longitude in degrees (-180 to 180)
    pub lon: f64,

    /// Altitude above mean sea level in meters
    pub altitude_msl_meters: f64,

    /// Ground speed in knots
    pub groundspeed_kts: f64,

    /// True heading (nose direction) in degrees
    pub heading_deg: f64,

    /// Direction of movement over the ground in degrees
    #[serde(default)]
    pub ground_track_deg: Option<f64>,

    /// On-ground flag as reported by the source
    #[serde(default)]
    pub on_ground_hint: Option<bool>,

    /// Vertical rate in feet per minute
    #[serde(default)]
    pub vertical_rate_ft_per_min: Option<f64>,

    /// Bank angle in degrees, positive right wing down
    #[serde(default)]
    pub roll_deg: Option<f64>,

    /// Height above ground as reported by the source (vNAS reports this)
    #[serde(default)]
    pub altitude_agl_meters: Option<f64>,
}

impl Observation {
    /// Minimal report with the required fields; optional fields unset
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        aircraft_id: impl Into<AircraftId>,
        source: SourceTag,
        observed_at_ms: i64,
        received_at_ms: i64,
        lat: f64,
        lon: f64,
        altitude_msl_meters: f64,
        groundspeed_kts: f64,
        heading_deg: f64,
    ) -> Self {
        Self {
            aircraft_id: aircraft_id.into(),
            source,
            observed_at_ms,
            received_at_ms,
            lat,
            lon,
            altitude_msl_meters,
            groundspeed_kts,
            heading_deg,
            ground_track_deg: None,
            on_ground_hint: None,
            vertical_rate_ft_per_min: None,
            roll_deg: None,
            altitude_agl_meters: None,
        }
    }

    pub fn with_ground_track(mut self, track_deg: f64) -> Self {
        self.ground_track_deg = Some(track_deg);
        self
    }

    pub fn with_vertical_rate(mut self, fpm: f64) -> Self {
        self.vertical_rate_ft_per_min = Some(fpm);
        self
    }

    pub fn with_on_ground(mut self, on_ground: bool) -> Self {
        self.on_ground_hint = Some(on_ground);
        self
    }

    pub fn with_roll(mut self, roll_deg: f64) -> Self {
        self.roll_deg = Some(roll_deg);
        self
    }

    pub fn with_agl(mut self, agl_m: f64) -> Self {
        self.altitude_agl_meters = Some(agl_m);
        self
    }
}

//! Observation parsing and validation

use super::types::Observation;
use crate::geo::normalize_deg;

/// Highest groundspeed accepted as physically plausible, in knots
const MAX_GROUNDSPEED_KTS: f64 = 1000.0;

/// Altitude band accepted, in meters MSL
const MIN_ALTITUDE_M: f64 = -1000.0;
const MAX_ALTITUDE_M: f64 = 30_000.0;

/// Latest timestamp accepted, 3000-01-01T00:00:00Z in ms since epoch
const MAX_TIMESTAMP_MS: i64 = 32_503_680_000_000;

/// Reasons an observation is rejected at ingest
#[derive(Debug, thiserror::Error)]
pub enum ObservationError {
    #[error("malformed observation: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("empty aircraft id")]
    EmptyAircraftId,

    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },

    #[error("latitude {0} out of range")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} out of range")]
    LongitudeOutOfRange(f64),

    #[error("altitude {0} m out of range")]
    AltitudeOutOfRange(f64),

    #[error("groundspeed {0} kt out of range")]
    GroundspeedOutOfRange(f64),

    #[error("{field} {value} ms out of range")]
    TimestampOutOfRange { field: &'static str, value: i64 },
}

/// Parse one JSON-lines record into a validated observation.
///
/// Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Observation>, ObservationError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let observation: Observation = serde_json::from_str(line)?;
    validate(observation).map(Some)
}

/// Check ranges and normalize angles.
///
/// Returns the observation with heading, track and roll normalized; rejects
/// anything that would poison interpolation (NaN, impossible coordinates).
pub fn validate(mut obs: Observation) -> Result<Observation, ObservationError> {
    if obs.aircraft_id.trim().is_empty() {
        return Err(ObservationError::EmptyAircraftId);
    }

    let required = [
        ("lat", obs.lat),
        ("lon", obs.lon),
        ("altitudeMslMeters", obs.altitude_msl_meters),
        ("groundspeedKts", obs.groundspeed_kts),
        ("headingDeg", obs.heading_deg),
    ];
    for (field, value) in required {
        if !value.is_finite() {
            return Err(ObservationError::NotFinite { field });
        }
    }

    let optional = [
        ("groundTrackDeg", obs.ground_track_deg),
        ("verticalRateFtPerMin", obs.vertical_rate_ft_per_min),
        ("rollDeg", obs.roll_deg),
        ("altitudeAglMeters", obs.altitude_agl_meters),
    ];
    for (field, value) in optional {
        if matches!(value, Some(v) if !v.is_finite()) {
            return Err(ObservationError::NotFinite { field });
        }
    }

    let timestamps = [
        ("observedAtMs", obs.observed_at_ms),
        ("receivedAtMs", obs.received_at_ms),
    ];
    for (field, value) in timestamps {
        if !(0..=MAX_TIMESTAMP_MS).contains(&value) {
            return Err(ObservationError::TimestampOutOfRange { field, value });
        }
    }

    if obs.lat.abs() > 90.0 {
        return Err(ObservationError::LatitudeOutOfRange(obs.lat));
    }
    if obs.lon.abs() > 180.0 {
        return Err(ObservationError::LongitudeOutOfRange(obs.lon));
    }
    if !(MIN_ALTITUDE_M..=MAX_ALTITUDE_M).contains(&obs.altitude_msl_meters) {
        return Err(ObservationError::AltitudeOutOfRange(obs.altitude_msl_meters));
    }
    if !(0.0..MAX_GROUNDSPEED_KTS).contains(&obs.groundspeed_kts) {
        return Err(ObservationError::GroundspeedOutOfRange(obs.groundspeed_kts));
    }

    obs.heading_deg = normalize_deg(obs.heading_deg);
    obs.ground_track_deg = obs.ground_track_deg.map(normalize_deg);
    obs.roll_deg = obs.roll_deg.map(|r| r.clamp(-90.0, 90.0));

    Ok(obs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::SourceTag;

    const LINE: &str = r#"{"aircraftId":"DAL123","sourceTag":"vatsim","observedAtMs":1000,"receivedAtMs":1200,"lat":33.94,"lon":-118.40,"altitudeMslMeters":1200.5,"groundspeedKts":180,"headingDeg":250,"verticalRateFtPerMin":-700}"#;

    #[test]
    fn test_parse_line_full_record() {
        let obs = parse_line(LINE).unwrap().unwrap();
        assert_eq!(obs.aircraft_id, "DAL123");
        assert_eq!(obs.source, SourceTag::Vatsim);
        assert_eq!(obs.observed_at_ms, 1000);
        assert_eq!(obs.received_at_ms, 1200);
        assert_eq!(obs.vertical_rate_ft_per_min, Some(-700.0));
        assert_eq!(obs.ground_track_deg, None);
    }

    #[test]
    fn test_parse_line_realtraffic_tag() {
        let line = LINE.replace("vatsim", "realtraffic");
        let obs = parse_line(&line).unwrap().unwrap();
        assert_eq!(obs.source, SourceTag::RealTraffic);
    }

    #[test]
    fn test_parse_line_skips_blank_and_comments() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   \r\n").unwrap().is_none());
        assert!(parse_line("# recorded 2024-05-01").unwrap().is_none());
    }

    #[test]
    fn test_parse_line_malformed() {
        assert!(matches!(
            parse_line("{not json"),
            Err(ObservationError::Malformed(_))
        ));
        assert!(matches!(
            parse_line(r#"{"aircraftId":"X"}"#),
            Err(ObservationError::Malformed(_))
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let base = Observation::new("N1", SourceTag::Vnas, 0, 0, 10.0, 10.0, 100.0, 50.0, 90.0);

        let mut bad = base.clone();
        bad.lat = 91.0;
        assert!(matches!(validate(bad), Err(ObservationError::LatitudeOutOfRange(_))));

        let mut bad = base.clone();
        bad.lon = -180.5;
        assert!(matches!(validate(bad), Err(ObservationError::LongitudeOutOfRange(_))));

        let mut bad = base.clone();
        bad.groundspeed_kts = -1.0;
        assert!(matches!(validate(bad), Err(ObservationError::GroundspeedOutOfRange(_))));

        let mut bad = base.clone();
        bad.aircraft_id = " ".into();
        assert!(matches!(validate(bad), Err(ObservationError::EmptyAircraftId)));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut bad = Observation::new("N1", SourceTag::Vnas, 0, 0, 10.0, 10.0, 100.0, 50.0, 90.0);
        bad.altitude_msl_meters = f64::NAN;
        assert!(matches!(
            validate(bad),
            Err(ObservationError::NotFinite { field: "altitudeMslMeters" })
        ));

        let bad = Observation::new("N1", SourceTag::Vnas, 0, 0, 10.0, 10.0, 100.0, 50.0, 90.0)
            .with_ground_track(f64::INFINITY);
        assert!(matches!(
            validate(bad),
            Err(ObservationError::NotFinite { field: "groundTrackDeg" })
        ));
    }

    #[test]
    fn test_timestamps_out_of_range_are_rejected() {
        let line = LINE
            .replace(r#""observedAtMs":1000"#, r#""observedAtMs":-9000000000000000000"#)
            .replace(r#""receivedAtMs":1200"#, r#""receivedAtMs":9000000000000000000"#);
        assert!(matches!(
            parse_line(&line),
            Err(ObservationError::TimestampOutOfRange { field: "observedAtMs", .. })
        ));

        let far_future = Observation::new("N1", SourceTag::Vnas, 0, MAX_TIMESTAMP_MS + 1, 10.0, 10.0, 100.0, 50.0, 90.0);
        assert!(matches!(
            validate(far_future),
            Err(ObservationError::TimestampOutOfRange { field: "receivedAtMs", .. })
        ));

        let edge = Observation::new("N1", SourceTag::Vnas, 0, MAX_TIMESTAMP_MS, 10.0, 10.0, 100.0, 50.0, 90.0);
        assert!(validate(edge).is_ok());
    }

    #[test]
    fn test_validate_normalizes_angles() {
        let obs = Observation::new("N1", SourceTag::Vnas, 0, 0, 10.0, 10.0, 100.0, 50.0, -90.0)
            .with_ground_track(370.0);
        let obs = validate(obs).unwrap();
        assert_eq!(obs.heading_deg, 270.0);
        assert_eq!(obs.ground_track_deg, Some(10.0));
    }
}

//! Geodesy helpers for short-range aircraft motion
//!
//! Distances between consecutive observations are at most a few kilometres,
//! so positions are projected into a local east/north plane (equirectangular
//! around a reference point) instead of doing full great-circle math per frame.

/// Mean earth radius for the spherical approximation, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per nautical mile
pub const METERS_PER_NM: f64 = 1852.0;

/// Knots to meters per second
pub const KTS_TO_MPS: f64 = METERS_PER_NM / 3600.0;

/// Feet per minute to meters per second
pub const FPM_TO_MPS: f64 = 0.3048 / 60.0;

/// Standard gravity in m/s^2
pub const GRAVITY_MPS2: f64 = 9.80665;

/// Great-circle distance between two points in meters
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Normalize an angle into `[0, 360)`
pub fn normalize_deg(deg: f64) -> f64 {
    let r = deg.rem_euclid(360.0);
    // rem_euclid of a tiny negative value rounds up to exactly 360.0
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`
pub fn angle_diff_deg(from: f64, to: f64) -> f64 {
    let d = (to - from).rem_euclid(360.0);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// Interpolate a heading along the shortest arc
pub fn lerp_heading(from: f64, to: f64, u: f64) -> f64 {
    normalize_deg(from + angle_diff_deg(from, to) * u)
}

/// Plain linear interpolation
#[inline]
pub fn lerp(a: f64, b: f64, u: f64) -> f64 {
    a + (b - a) * u
}

/// Cubic smoothstep on `[0, 1]`
#[inline]
pub fn smoothstep(u: f64) -> f64 {
    let u = u.clamp(0.0, 1.0);
    u * u * (3.0 - 2.0 * u)
}

/// Velocity in the local frame (east, north) in m/s for a track and speed
pub fn velocity_en(track_deg: f64, speed_kts: f64) -> (f64, f64) {
    let rad = track_deg.to_radians();
    let v = speed_kts * KTS_TO_MPS;
    (v * rad.sin(), v * rad.cos())
}

/// Compass bearing of a local-frame vector, `None` for a zero vector
pub fn bearing_of(east: f64, north: f64) -> Option<f64> {
    if east == 0.0 && north == 0.0 {
        return None;
    }
    Some(normalize_deg(east.atan2(north).to_degrees()))
}

/// Local east/north tangent plane anchored at a reference point.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    lat0: f64,
    lon0: f64,
    meters_per_deg_lat: f64,
    meters_per_deg_lon: f64,
}

impl LocalFrame {
    pub fn new(lat0: f64, lon0: f64) -> Self {
        let meters_per_deg_lat = EARTH_RADIUS_M.to_radians();
        // Clamp near the poles so the inverse projection stays finite
        let cos_lat = lat0.to_radians().cos().max(1e-6);
        Self {
            lat0,
            lon0,
            meters_per_deg_lat,
            meters_per_deg_lon: meters_per_deg_lat * cos_lat,
        }
    }

    /// Project a geographic position to (east, north) meters
    pub fn to_local(&self, lat: f64, lon: f64) -> (f64, f64) {
        let dlon = wrap_lon_delta(lon - self.lon0);
        (
            dlon * self.meters_per_deg_lon,
            (lat - self.lat0) * self.meters_per_deg_lat,
        )
    }

    /// Inverse of [`LocalFrame::to_local`]
    pub fn to_geo(&self, east: f64, north: f64) -> (f64, f64) {
        let lat = self.lat0 + north / self.meters_per_deg_lat;
        let lon = self.lon0 + east / self.meters_per_deg_lon;
        (lat, wrap_lon(lon))
    }
}

/// Bearing from one position to another, `None` when they coincide
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<f64> {
    let (e, n) = LocalFrame::new(lat1, lon1).to_local(lat2, lon2);
    bearing_of(e, n)
}

fn wrap_lon_delta(dlon: f64) -> f64 {
    if dlon > 180.0 {
        dlon - 360.0
    } else if dlon < -180.0 {
        dlon + 360.0
    } else {
        dlon
    }
}

fn wrap_lon(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_m(50.0, 8.0, 51.0, 8.0);
        assert!((d - 111_195.0).abs() < 10.0, "got {}", d);
    }

    #[test]
    fn test_angle_diff_wraps_through_north() {
        assert_eq!(angle_diff_deg(350.0, 10.0), 20.0);
        assert_eq!(angle_diff_deg(10.0, 350.0), -20.0);
        assert_eq!(angle_diff_deg(0.0, 180.0), 180.0);
        assert_eq!(angle_diff_deg(90.0, 90.0), 0.0);
    }

    #[test]
    fn test_lerp_heading_short_way() {
        let mid = lerp_heading(350.0, 10.0, 0.5);
        assert!(mid < 1e-9 || mid > 359.999_999, "got {}", mid);
        let quarter = lerp_heading(350.0, 10.0, 0.25);
        assert!((quarter - 355.0).abs() < 1e-9);
    }

    #[test]
    fn test_local_frame_round_trip_is_close() {
        let frame = LocalFrame::new(47.45, -122.31);
        let (e, n) = frame.to_local(47.46, -122.30);
        let (lat, lon) = frame.to_geo(e, n);
        assert!((lat - 47.46).abs() < 1e-9);
        assert!((lon + 122.30).abs() < 1e-9);
    }

    #[test]
    fn test_local_frame_origin_is_exact() {
        let frame = LocalFrame::new(33.9425, -118.408);
        assert_eq!(frame.to_local(33.9425, -118.408), (0.0, 0.0));
        assert_eq!(frame.to_geo(0.0, 0.0), (33.9425, -118.408));
    }

    #[test]
    fn test_local_frame_across_antimeridian() {
        let frame = LocalFrame::new(0.0, 179.999);
        let (e, _) = frame.to_local(0.0, -179.999);
        assert!(e > 0.0 && e < 300.0, "got {}", e);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let north = bearing_deg(10.0, 10.0, 10.01, 10.0).unwrap();
        let east = bearing_deg(10.0, 10.0, 10.0, 10.01).unwrap();
        assert!(north.abs() < 1e-6 || (north - 360.0).abs() < 1e-6);
        assert!((east - 90.0).abs() < 1e-6);
        assert!(bearing_deg(10.0, 10.0, 10.0, 10.0).is_none());
    }

    proptest! {
        #[test]
        fn prop_normalize_in_range(deg in -1.0e6f64..1.0e6) {
            let n = normalize_deg(deg);
            prop_assert!((0.0..360.0).contains(&n));
        }

        #[test]
        fn prop_angle_diff_is_shortest(a in 0.0f64..360.0, b in 0.0f64..360.0) {
            let d = angle_diff_deg(a, b);
            prop_assert!(d > -180.0 && d <= 180.0);
            let back = normalize_deg(a + d);
            prop_assert!(angle_diff_deg(back, b).abs() < 1e-6);
        }

        #[test]
        fn prop_lerp_heading_stays_on_short_arc(a in 0.0f64..360.0, b in 0.0f64..360.0, u in 0.0f64..=1.0) {
            let h = lerp_heading(a, b, u);
            let span = angle_diff_deg(a, b).abs();
            prop_assert!(angle_diff_deg(a, h).abs() <= span + 1e-6);
            prop_assert!(angle_diff_deg(h, b).abs() <= span + 1e-6);
        }
    }
}

//! Great-circle distance on a spherical Earth.

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two (latitude, longitude) pairs in degrees,
/// truncated to whole kilometers.
///
/// Truncation keeps nearest-centroid comparisons integer-safe: sub-kilometer
/// floating jitter cannot flip which candidate is "nearest" across
/// platforms.
pub fn distance_km(from: (f64, f64), to: (f64, f64)) -> u64 {
    let (lat0, long0) = (from.0.to_radians(), from.1.to_radians());
    let (lat1, long1) = (to.0.to_radians(), to.1.to_radians());

    let delta_lat = lat0 - lat1;
    let delta_long = long0 - long1;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat0.cos() * lat1.cos() * (delta_long / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    (EARTH_RADIUS_KM * c) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONDON: (f64, f64) = (51.5074, -0.1278);
    const PARIS: (f64, f64) = (48.8566, 2.3522);
    const SYDNEY: (f64, f64) = (-33.8688, 151.2093);

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(distance_km(LONDON, LONDON), 0);
    }

    #[test]
    fn test_known_distance_london_paris() {
        let d = distance_km(LONDON, PARIS);
        assert!((340..=348).contains(&d), "got {d} km");
    }

    #[test]
    fn test_symmetry() {
        assert_eq!(distance_km(LONDON, SYDNEY), distance_km(SYDNEY, LONDON));
        assert_eq!(distance_km(PARIS, SYDNEY), distance_km(SYDNEY, PARIS));
    }

    #[test]
    fn test_sub_kilometer_distances_truncate_to_zero() {
        let a = (51.5074, -0.1278);
        let b = (51.5075, -0.1279);
        assert_eq!(distance_km(a, b), 0);
    }
}

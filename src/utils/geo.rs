/// Calculate distance between two coordinates using Haversine formula
/// Returns distance in kilometers
///
/// Coordinates are not range-checked; out-of-range input still yields a number.
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_bangalore_hops() {
        // MG Road
        let mg_road = (12.9716, 77.5946);
        // Koramangala
        let koramangala = (12.9352, 77.6146);

        let distance = haversine_distance(mg_road.0, mg_road.1, koramangala.0, koramangala.1);
        assert!(distance > 4.5 && distance < 4.7);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = (-6.2088, 106.8456);
        let b = (-6.9175, 107.6191);

        let ab = haversine_distance(a.0, a.1, b.0, b.1);
        let ba = haversine_distance(b.0, b.1, a.0, a.1);
        assert!((ab - ba).abs() < 1e-9);
        assert_eq!(haversine_distance(a.0, a.1, a.0, a.1), 0.0);
    }

    #[test]
    fn test_out_of_range_coordinates_still_compute() {
        let distance = haversine_distance(123.0, 400.0, -95.0, -200.0);
        assert!(distance.is_finite());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(4.26, 1), 4.3);
        assert_eq!(round_to(111.4999999, 2), 111.5);
        assert_eq!(round_to(0.0, 1), 0.0);
    }
}

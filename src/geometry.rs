//! Geodesic length of point sequences and the display formats built on it.

use chrono::{DateTime, Utc};
use geo::{Distance, Haversine, Point};

/// Distances at or above this are shown in kilometers.
pub const KILOMETER_DISPLAY_THRESHOLD_M: f64 = 5000.0;

/// Great-circle distance in meters between two `(lon, lat)` pairs.
pub fn distance_between(a: (f64, f64), b: (f64, f64)) -> f64 {
    let d = Haversine::distance(Point::new(a.0, a.1), Point::new(b.0, b.1));
    // Rounding can push the haversine term a hair outside asin's domain for
    // coincident points.
    if d.is_nan() { 0.0 } else { d }
}

/// Total length in meters of the polyline through `points`, given as
/// `(lon, lat)` pairs. Fewer than two points yield 0.
pub fn length(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|pair| distance_between(pair[0], pair[1]))
        .sum()
}

/// `4999 m` below the threshold, `5.0 km` from it upwards.
pub fn format_distance(meters: f64) -> String {
    if meters >= KILOMETER_DISPLAY_THRESHOLD_M {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{} m", meters.round() as i64)
    }
}

/// Elapsed time as `H:MM:SS`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

pub fn format_speed(kmh: f64) -> String {
    format!("{kmh:.1} km/h")
}

pub fn format_coordinate(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.5}, {longitude:.5}")
}

/// Local-style `dd.mm.yyyy HH:MM` rendering used for default descriptions.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%d.%m.%Y %H:%M").to_string()
}

use crate::geometry;
use crate::gpx_types::{GpxDocument, GpxPoint};

/// A user-drawn route or distance measurement: an ordered list of
/// `(lon, lat)` points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteBuffer {
    points: Vec<(f64, f64)>,
}

impl RouteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, longitude: f64, latitude: f64) {
        self.points.push((longitude, latitude));
    }

    /// Remove the most recently added point.
    pub fn undo(&mut self) -> Option<(f64, f64)> {
        self.points.pop()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn length(&self) -> f64 {
        geometry::length(&self.points)
    }

    pub fn formatted_length(&self) -> String {
        geometry::format_distance(self.length())
    }

    pub fn to_gpx(&self, name: Option<String>) -> GpxDocument {
        GpxDocument::from_points(
            name,
            self.points
                .iter()
                .map(|&(lon, lat)| GpxPoint::new(lat, lon))
                .collect(),
        )
    }

    pub fn from_gpx(doc: &GpxDocument) -> Self {
        Self {
            points: doc.points().map(|pt| (pt.lon, pt.lat)).collect(),
        }
    }
}

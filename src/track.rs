//! Recorded and imported tracks, and the statistics derived from them.
//!
//! [`TrackBuffer`] is the live recording target: the sampler appends to it
//! from its delivery task while the UI reads snapshots and statistics. An
//! imported GPX file becomes a separate, read-only [`Track`] and never
//! mixes with the live buffer.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;

use crate::geometry;
use crate::gpx_types::{GpxDocument, GpxPoint};

/// One location measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub timestamp_millis: i64,
    pub speed: Option<f64>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, timestamp_millis: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            timestamp_millis,
            speed: None,
        }
    }

    /// `(lon, lat)` pair as used by [`geometry::length`].
    pub fn lon_lat(&self) -> (f64, f64) {
        (self.longitude, self.latitude)
    }

    fn to_gpx_point(self) -> GpxPoint {
        let mut pt = GpxPoint::new(self.latitude, self.longitude);
        pt.elevation = self.altitude;
        pt.time = DateTime::<Utc>::from_timestamp_millis(self.timestamp_millis)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true));
        pt
    }

    fn from_gpx_point(pt: &GpxPoint) -> Self {
        let timestamp_millis = pt
            .time
            .as_deref()
            .and_then(|t| match DateTime::parse_from_rfc3339(t.trim()) {
                Ok(parsed) => Some(parsed.timestamp_millis()),
                Err(e) => {
                    debug!("[track] unparseable trkpt time '{t}': {e}");
                    None
                }
            })
            .unwrap_or(0);
        Self {
            latitude: pt.lat,
            longitude: pt.lon,
            altitude: pt.elevation,
            timestamp_millis,
            speed: None,
        }
    }
}

/// Derived figures for a track; recomputed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackStatistics {
    pub total_distance_meters: f64,
    pub duration_seconds: i64,
    pub average_speed_kmh: f64,
    pub start_time_millis: Option<i64>,
}

impl TrackStatistics {
    /// While recording the clock runs to `now_millis`; otherwise it stops at
    /// the last fix.
    fn compute(fixes: &[Fix], distance: f64, now_millis: i64, is_recording: bool) -> Self {
        let (Some(first), Some(last)) = (fixes.first(), fixes.last()) else {
            return Self {
                total_distance_meters: 0.0,
                duration_seconds: 0,
                average_speed_kmh: 0.0,
                start_time_millis: None,
            };
        };

        let end = if is_recording {
            now_millis
        } else {
            last.timestamp_millis
        };
        let duration_seconds = ((end - first.timestamp_millis) / 1000).max(0);
        let average_speed_kmh = if duration_seconds > 0 {
            distance / duration_seconds as f64 * 3.6
        } else {
            0.0
        };

        Self {
            total_distance_meters: distance,
            duration_seconds,
            average_speed_kmh,
            start_time_millis: Some(first.timestamp_millis),
        }
    }

    pub fn formatted_distance(&self) -> String {
        geometry::format_distance(self.total_distance_meters)
    }

    pub fn formatted_duration(&self) -> String {
        geometry::format_duration(self.duration_seconds)
    }

    pub fn formatted_speed(&self) -> String {
        geometry::format_speed(self.average_speed_kmh)
    }
}

/// An immutable, ordered sequence of fixes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    fixes: Vec<Fix>,
}

impl Track {
    pub fn new(fixes: Vec<Fix>) -> Self {
        Self { fixes }
    }

    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn distance_meters(&self) -> f64 {
        let coords: Vec<(f64, f64)> = self.fixes.iter().map(Fix::lon_lat).collect();
        geometry::length(&coords)
    }

    pub fn statistics(&self, now_millis: i64, is_recording: bool) -> TrackStatistics {
        TrackStatistics::compute(&self.fixes, self.distance_meters(), now_millis, is_recording)
    }

    /// Export as a single-segment GPX document.
    pub fn to_gpx(&self, name: Option<String>) -> GpxDocument {
        GpxDocument::from_points(name, self.fixes.iter().map(|f| f.to_gpx_point()).collect())
    }

    /// Import every track point of `doc` in file order. Segments are
    /// concatenated and points are kept even when out of time order.
    pub fn from_gpx(doc: &GpxDocument) -> Self {
        Self {
            fixes: doc.points().map(Fix::from_gpx_point).collect(),
        }
    }
}

/// Receives fixes from a [`crate::sampler::GeoSampler`].
pub trait FixSink: Send + Sync + 'static {
    fn append(&self, fix: Fix);
}

#[derive(Debug, Default)]
struct Recording {
    fixes: Vec<Fix>,
    distance: f64,
}

/// Thread-safe, append-only buffer for the track being recorded.
///
/// Distance is accumulated on append so statistics stay O(1) in the number
/// of fixes. Readers take a short read lock to copy, so a snapshot is
/// always a prefix of every later snapshot (until [`TrackBuffer::clear`]).
#[derive(Debug, Default)]
pub struct TrackBuffer {
    inner: RwLock<Recording>,
}

impl TrackBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn append(&self, fix: Fix) {
        let mut rec = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = rec.fixes.last() {
            rec.distance += geometry::distance_between(last.lon_lat(), fix.lon_lat());
        }
        rec.fixes.push(fix);
    }

    pub fn snapshot(&self) -> Track {
        let rec = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Track::new(rec.fixes.clone())
    }

    pub fn statistics(&self, now_millis: i64, is_recording: bool) -> TrackStatistics {
        let rec = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        TrackStatistics::compute(&rec.fixes, rec.distance, now_millis, is_recording)
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fixes
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every fix, e.g. when the user deletes the track.
    pub fn clear(&self) {
        let mut rec = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        debug!("[track] clearing {} fixes", rec.fixes.len());
        rec.fixes.clear();
        rec.distance = 0.0;
    }
}

impl FixSink for TrackBuffer {
    fn append(&self, fix: Fix) {
        TrackBuffer::append(self, fix);
    }
}

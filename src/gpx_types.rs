/// A parsed GPX file, reduced to the parts this crate understands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpxDocument {
    pub track: Option<GpxTrack>,
}

/// A GPX track (<trk>).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpxTrack {
    pub name: Option<String>,
    pub segments: Vec<GpxSegment>,
}

/// A GPX track segment (<trkseg>).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpxSegment {
    pub points: Vec<GpxPoint>,
}

/// A single track point (<trkpt>).
#[derive(Debug, Clone, PartialEq)]
pub struct GpxPoint {
    pub lat: f64,
    pub lon: f64,
    pub elevation: Option<f64>,
    /// Passed through verbatim; never interpreted by the codec.
    pub time: Option<String>,
}

impl GpxPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            elevation: None,
            time: None,
        }
    }
}

impl GpxDocument {
    /// Build a document holding a single-segment track.
    pub fn from_points(name: Option<String>, points: Vec<GpxPoint>) -> Self {
        Self {
            track: Some(GpxTrack {
                name,
                segments: vec![GpxSegment { points }],
            }),
        }
    }

    /// All track points in document order, across segments.
    pub fn points(&self) -> impl Iterator<Item = &GpxPoint> {
        self.track
            .iter()
            .flat_map(|trk| trk.segments.iter())
            .flat_map(|seg| seg.points.iter())
    }
}

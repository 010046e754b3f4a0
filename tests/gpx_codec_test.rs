use cyclemap_core::geometry;
use cyclemap_core::parser::decode;
use cyclemap_core::writer::encode;
use cyclemap_core::{CycleMapError, GpxDocument, GpxPoint, GpxSegment, GpxTrack, Track};

fn load_fixture(path: &str) -> Vec<u8> {
    std::fs::read(format!("tests/fixtures/{path}")).unwrap()
}

// ---- basic/ ----

#[test]
fn test_simple_track() {
    let doc = decode(&load_fixture("basic/simple_track.gpx")).unwrap();
    let trk = doc.track.as_ref().unwrap();
    assert_eq!(trk.name.as_deref(), Some("Lech river ride"));
    assert_eq!(trk.segments.len(), 1);

    let points = &trk.segments[0].points;
    assert_eq!(points.len(), 5);
    assert!((points[0].lat - 48.279076).abs() < 1e-12);
    assert!((points[0].lon - 10.897498).abs() < 1e-12);
    assert_eq!(points[0].elevation, Some(471.0));
    assert_eq!(points[4].time.as_deref(), Some("2025-06-01T08:02:00Z"));
}

#[test]
fn test_simple_track_statistics() {
    let doc = decode(&load_fixture("basic/simple_track.gpx")).unwrap();
    let track = Track::from_gpx(&doc);
    let stats = track.statistics(0, false);

    let coords: Vec<(f64, f64)> = doc.points().map(|p| (p.lon, p.lat)).collect();
    assert!((stats.total_distance_meters - geometry::length(&coords)).abs() < 1e-9);
    assert_eq!(stats.duration_seconds, 120);
    assert_eq!(stats.start_time_millis, Some(1_748_764_800_000));
    assert!(stats.average_speed_kmh > 0.0);
}

#[test]
fn test_multi_segment_preserved() {
    let doc = decode(&load_fixture("basic/multi_segment.gpx")).unwrap();
    let trk = doc.track.as_ref().unwrap();
    assert_eq!(trk.segments.len(), 2);
    assert_eq!(trk.segments[0].points.len(), 2);
    assert_eq!(trk.segments[1].points.len(), 3);

    // Import flattens in file order.
    let track = Track::from_gpx(&doc);
    assert_eq!(track.len(), 5);
}

#[test]
fn test_fixture_round_trip() {
    for fixture in ["basic/simple_track.gpx", "basic/multi_segment.gpx", "lenient/foreign_tool.gpx"] {
        let doc = decode(&load_fixture(fixture)).unwrap();
        let again = decode(&encode(&doc).unwrap()).unwrap();
        assert_eq!(again, doc, "round trip changed {fixture}");
    }
}

// ---- lenient/ ----

#[test]
fn test_foreign_tool_best_effort() {
    let doc = decode(&load_fixture("lenient/foreign_tool.gpx")).unwrap();
    let trk = doc.track.as_ref().unwrap();
    assert_eq!(trk.name.as_deref(), Some("Evening spin"));

    let points = &trk.segments[0].points;
    assert_eq!(points.len(), 3);
    assert_eq!(points[0].elevation, None);
    assert_eq!(points[1].elevation, Some(494.2));
}

#[test]
fn test_foreign_tool_order_not_resorted() {
    let doc = decode(&load_fixture("lenient/foreign_tool.gpx")).unwrap();
    let track = Track::from_gpx(&doc);
    let times: Vec<i64> = track.fixes().iter().map(|f| f.timestamp_millis % 60_000).collect();
    assert_eq!(times, vec![0, 5_000, 3_000]);
}

#[test]
fn test_unknown_content_not_written_back() {
    let doc = decode(&load_fixture("lenient/foreign_tool.gpx")).unwrap();
    let xml = String::from_utf8(encode(&doc).unwrap()).unwrap();
    assert!(!xml.contains("extensions"));
    assert!(!xml.contains("<wpt"));
    assert!(!xml.contains("<metadata"));
    assert!(!xml.contains("hdop"));
}

// ---- malformed/ ----

#[test]
fn test_missing_lon_fails() {
    let err = decode(&load_fixture("malformed/missing_lon.gpx")).unwrap_err();
    assert!(matches!(
        err,
        CycleMapError::MalformedTrackPoint { attribute: "lon", value: None }
    ));
}

#[test]
fn test_broken_xml_fails() {
    let err = decode(b"<gpx><trk><trkseg><trkpt lat=\"1\" lon=\"2\"></trkseg></gpx>").unwrap_err();
    assert!(matches!(err, CycleMapError::XmlParse(_)));
}

// ---- round trip of hand-built documents ----

#[test]
fn test_constructed_document_round_trip() {
    let mut with_all = GpxPoint::new(-45.000001, 170.5);
    with_all.elevation = Some(-3.25);
    with_all.time = Some("yesterday, around 5".to_string());
    let mut time_only = GpxPoint::new(0.0, 0.0);
    time_only.time = Some(String::new());

    let doc = GpxDocument {
        track: Some(GpxTrack {
            name: None,
            segments: vec![
                GpxSegment {
                    points: vec![with_all, GpxPoint::new(89.9, -179.9)],
                },
                GpxSegment {
                    points: vec![time_only],
                },
            ],
        }),
    };

    assert_eq!(decode(&encode(&doc).unwrap()).unwrap(), doc);
}

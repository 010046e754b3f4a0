use log::debug;
use quick_xml::Reader;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, Event};

use crate::error::{CycleMapError, Result};
use crate::gpx_types::*;

/// Decode GPX bytes into a [`GpxDocument`].
///
/// Parsing is lenient: unknown elements and attributes are skipped, and a
/// missing or unparseable `<ele>` is treated as absent. The only fatal
/// content error is a `<trkpt>` without a usable `lat` or `lon`.
pub fn decode(bytes: &[u8]) -> Result<GpxDocument> {
    let mut reader = Reader::from_reader(bytes);
    let mut doc = GpxDocument::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"trk" {
                    let trk = parse_track(&mut reader)?;
                    merge_track(&mut doc, trk);
                }
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trk" {
                    merge_track(&mut doc, GpxTrack::default());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CycleMapError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(doc)
}

/// Convenience wrapper for string input.
pub fn decode_str(xml: &str) -> Result<GpxDocument> {
    decode(xml.as_bytes())
}

/// A document holds at most one track; segments of any further `<trk>`
/// are appended to it so nothing from the file is lost.
fn merge_track(doc: &mut GpxDocument, trk: GpxTrack) {
    match doc.track.as_mut() {
        None => doc.track = Some(trk),
        Some(existing) => {
            debug!(
                "[gpx] merging extra <trk> with {} segment(s) into the first track",
                trk.segments.len()
            );
            if existing.name.is_none() {
                existing.name = trk.name;
            }
            existing.segments.extend(trk.segments);
        }
    }
}

/// Parse lat/lon attributes from a `<trkpt>` start tag.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<(f64, f64)> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| CycleMapError::XmlParse(e.into()))?;
        let key = attr.key.local_name();
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match key.as_ref() {
            b"lat" => lat = Some(parse_coordinate("lat", val)?),
            b"lon" => lon = Some(parse_coordinate("lon", val)?),
            _ => {}
        }
    }

    let lat = lat.ok_or(CycleMapError::MalformedTrackPoint {
        attribute: "lat",
        value: None,
    })?;
    let lon = lon.ok_or(CycleMapError::MalformedTrackPoint {
        attribute: "lon",
        value: None,
    })?;

    Ok((lat, lon))
}

fn parse_coordinate(attribute: &'static str, val: &str) -> Result<f64> {
    match val.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CycleMapError::MalformedTrackPoint {
            attribute,
            value: Some(val.to_string()),
        }),
    }
}

/// Parse a `<trkpt>` element and its children.
/// Called after receiving Event::Start for the point element.
fn parse_point<'a>(start: &BytesStart<'a>, reader: &mut Reader<&'a [u8]>) -> Result<GpxPoint> {
    let (lat, lon) = parse_lat_lon(start)?;
    let mut point = GpxPoint::new(lat, lon);
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = read_text_owned(reader, &e)?;
                    point.elevation = text.trim().parse::<f64>().ok();
                }
                b"time" => {
                    point.time = Some(read_text_owned(reader, &e)?);
                }
                _ => {
                    // Skip unknown/extensions elements
                    reader
                        .read_to_end(e.name())
                        .map_err(CycleMapError::XmlParse)?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"time" {
                    point.time = Some(String::new());
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(CycleMapError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(point)
}

/// Parse a `<trk>` element.
fn parse_track<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxTrack> {
    let mut track = GpxTrack::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => track.name = Some(read_text_owned(reader, &e)?),
                b"trkseg" => track.segments.push(parse_segment(reader)?),
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(CycleMapError::XmlParse)?;
                }
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"trkseg" => track.segments.push(GpxSegment::default()),
                b"name" => track.name = Some(String::new()),
                _ => {}
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(CycleMapError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(track)
}

/// Parse a `<trkseg>` element. Empty segments are kept so that segment
/// boundaries survive a write/read cycle.
fn parse_segment<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxSegment> {
    let mut segment = GpxSegment::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkpt" => segment.points.push(parse_point(&e, reader)?),
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(CycleMapError::XmlParse)?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    let (lat, lon) = parse_lat_lon(&e)?;
                    segment.points.push(GpxPoint::new(lat, lon));
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(CycleMapError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(segment)
}

/// Text content of `start` up to its matching end tag, with character and
/// predefined entity references resolved. Unknown entities are dropped.
fn read_text_owned(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Text(chunk) => text.push_str(&String::from_utf8_lossy(&chunk)),
            Event::CData(chunk) => text.push_str(&String::from_utf8_lossy(&chunk)),
            Event::GeneralRef(entity) => match entity.resolve_char_ref() {
                Ok(Some(ch)) => text.push(ch),
                _ => {
                    let name = String::from_utf8_lossy(&entity);
                    text.push_str(resolve_xml_entity(&name).unwrap_or_default());
                }
            },
            Event::End(e) if e.name().0 == end.as_slice() => return Ok(text),
            Event::Eof => return Ok(text),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_track() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <name>Morning Ride</name>
    <trkseg>
      <trkpt lat="48.0" lon="10.0"><ele>510.0</ele></trkpt>
      <trkpt lat="48.001" lon="10.001"><ele>511.0</ele></trkpt>
      <trkpt lat="48.002" lon="10.002"><ele>512.0</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let doc = decode_str(xml).unwrap();
        let trk = doc.track.as_ref().unwrap();
        assert_eq!(trk.name.as_deref(), Some("Morning Ride"));
        assert_eq!(trk.segments.len(), 1);
        assert_eq!(trk.segments[0].points.len(), 3);
        assert_eq!(trk.segments[0].points[2].elevation, Some(512.0));
    }

    #[test]
    fn test_multi_segment_track_not_flattened() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="48.0" lon="10.0"/>
      <trkpt lat="48.001" lon="10.001"/>
    </trkseg>
    <trkseg>
      <trkpt lat="49.0" lon="11.0"/>
    </trkseg>
  </trk>
</gpx>"#;
        let doc = decode_str(xml).unwrap();
        let trk = doc.track.unwrap();
        assert_eq!(trk.segments.len(), 2);
        assert_eq!(trk.segments[0].points.len(), 2);
        assert_eq!(trk.segments[1].points.len(), 1);
    }

    #[test]
    fn test_empty_gpx() {
        let xml = r#"<?xml version="1.0"?><gpx version="1.1"></gpx>"#;
        let doc = decode_str(xml).unwrap();
        assert!(doc.track.is_none());
    }

    #[test]
    fn test_empty_segment_kept() {
        let xml = r#"<gpx><trk><trkseg></trkseg><trkseg/><trkseg><trkpt lat="1" lon="2"/></trkseg></trk></gpx>"#;
        let doc = decode_str(xml).unwrap();
        let trk = doc.track.unwrap();
        assert_eq!(trk.segments.len(), 3);
        assert!(trk.segments[0].points.is_empty());
        assert!(trk.segments[1].points.is_empty());
    }

    #[test]
    fn test_extensions_skipped() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="48.0" lon="10.0">
        <extensions>
          <gpxtpx:TrackPointExtension xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
            <gpxtpx:hr>150</gpxtpx:hr>
          </gpxtpx:TrackPointExtension>
        </extensions>
        <time>2025-05-01T07:00:00Z</time>
      </trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let doc = decode_str(xml).unwrap();
        let points: Vec<_> = doc.points().collect();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].time.as_deref(), Some("2025-05-01T07:00:00Z"));
    }

    #[test]
    fn test_missing_lon_is_fatal() {
        let xml = r#"<gpx><trk><trkseg>
  <trkpt lat="48.0" lon="10.0"/>
  <trkpt lat="48.1"><ele>3</ele></trkpt>
</trkseg></trk></gpx>"#;
        let err = decode_str(xml).unwrap_err();
        assert!(matches!(
            err,
            CycleMapError::MalformedTrackPoint {
                attribute: "lon",
                value: None
            }
        ));
    }

    #[test]
    fn test_missing_lat_on_empty_tag_is_fatal() {
        let xml = r#"<gpx><trk><trkseg><trkpt lon="10.0"/></trkseg></trk></gpx>"#;
        let err = decode_str(xml).unwrap_err();
        assert!(matches!(
            err,
            CycleMapError::MalformedTrackPoint {
                attribute: "lat",
                ..
            }
        ));
    }

    #[test]
    fn test_unparseable_lat_is_fatal() {
        let xml = r#"<gpx><trk><trkseg><trkpt lat="north" lon="10.0"/></trkseg></trk></gpx>"#;
        let err = decode_str(xml).unwrap_err();
        match err {
            CycleMapError::MalformedTrackPoint { attribute, value } => {
                assert_eq!(attribute, "lat");
                assert_eq!(value.as_deref(), Some("north"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_elevation_is_absent() {
        let xml = r#"<gpx><trk><trkseg><trkpt lat="1" lon="2"><ele>n/a</ele></trkpt></trkseg></trk></gpx>"#;
        let doc = decode_str(xml).unwrap();
        assert_eq!(doc.points().next().unwrap().elevation, None);
    }

    #[test]
    fn test_with_namespace() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1">
  <trk><trkseg><trkpt lat="35.0" lon="139.0"/></trkseg></trk>
</gpx>"#;
        let doc = decode_str(xml).unwrap();
        assert_eq!(doc.points().count(), 1);
    }

    #[test]
    fn test_waypoints_and_routes_ignored() {
        let xml = r#"<gpx>
  <wpt lat="35.0" lon="139.0"><name>Cafe</name></wpt>
  <rte><rtept lat="35.0" lon="139.0"/></rte>
  <wpt><name>no coordinates is fine outside a track</name></wpt>
</gpx>"#;
        let doc = decode_str(xml).unwrap();
        assert!(doc.track.is_none());
    }

    #[test]
    fn test_second_track_merged() {
        let xml = r#"<gpx>
  <trk><name>First</name><trkseg><trkpt lat="1" lon="1"/></trkseg></trk>
  <trk><name>Second</name><trkseg><trkpt lat="2" lon="2"/></trkseg></trk>
</gpx>"#;
        let doc = decode_str(xml).unwrap();
        let trk = doc.track.unwrap();
        assert_eq!(trk.name.as_deref(), Some("First"));
        assert_eq!(trk.segments.len(), 2);
    }

    #[test]
    fn test_time_entities_resolved() {
        let xml = r#"<gpx><trk><trkseg><trkpt lat="1" lon="2"><time>a &amp; b</time></trkpt></trkseg></trk></gpx>"#;
        let doc = decode_str(xml).unwrap();
        assert_eq!(doc.points().next().unwrap().time.as_deref(), Some("a & b"));
    }

    #[test]
    fn test_name_char_refs_cdata_and_unknown_entity() {
        let xml = r#"<gpx><trk><name>&#60;Tour&#x3E; <![CDATA[a&b]]>&nbsp;&quot;x&quot;</name>
<trkseg><trkpt lat="1" lon="2"/></trkseg></trk></gpx>"#;
        let doc = decode_str(xml).unwrap();
        assert_eq!(
            doc.track.unwrap().name.as_deref(),
            Some("<Tour> a&b\"x\"")
        );
    }

    #[test]
    fn test_gpx10_elements_ignored() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/0" version="1.0">
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0">
        <speed>5.5</speed>
        <course>180.0</course>
      </trkpt>
      <trkpt lat="35.001" lon="139.001"/>
    </trkseg>
  </trk>
</gpx>"#;
        let doc = decode_str(xml).unwrap();
        assert_eq!(doc.points().count(), 2);
    }
}

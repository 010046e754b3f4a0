use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::favourites::FavouritesCollection;
use crate::gpx_types::*;
use crate::options::ConvertOptions;
use crate::route::RouteBuffer;
use crate::track::Track;

/// Convert a GPX document's track to a GeoJSON FeatureCollection for the map layer.
pub fn to_feature_collection(doc: &GpxDocument, opts: &ConvertOptions) -> FeatureCollection {
    let features = match &doc.track {
        Some(trk) => track_to_features(trk, opts),
        None => Vec::new(),
    };
    collection(features)
}

/// Convert a recorded or imported track.
pub fn track_to_feature_collection(track: &Track, opts: &ConvertOptions) -> FeatureCollection {
    to_feature_collection(&track.to_gpx(None), opts)
}

/// A drawn route as a single LineString, carrying its length.
pub fn route_to_feature(route: &RouteBuffer) -> Option<Feature> {
    let geometry = match route.points() {
        [] => return None,
        [(lon, lat)] => Geometry::new(Value::Point(vec![*lon, *lat])),
        points => Geometry::new(Value::LineString(
            points.iter().map(|&(lon, lat)| vec![lon, lat]).collect(),
        )),
    };

    let mut props = Map::new();
    props.insert("kind".to_string(), JsonValue::String("route".to_string()));
    insert_number(&mut props, "lengthMeters", route.length());
    props.insert(
        "lengthLabel".to_string(),
        JsonValue::String(route.formatted_length()),
    );

    Some(feature(geometry, props))
}

/// One Point feature per favourite, for the bookmarks layer.
pub fn favourites_to_feature_collection(favourites: &FavouritesCollection) -> FeatureCollection {
    let features = favourites
        .iter()
        .map(|fav| {
            let geometry = Geometry::new(Value::Point(vec![fav.longitude, fav.latitude]));
            let mut props = Map::new();
            props.insert("kind".to_string(), JsonValue::String("favourite".to_string()));
            props.insert("name".to_string(), JsonValue::String(fav.name.clone()));
            props.insert(
                "description".to_string(),
                JsonValue::String(fav.description.clone()),
            );
            insert_number(&mut props, "zoom", fav.zoom);
            props.insert(
                "hasThumbnail".to_string(),
                JsonValue::Bool(fav.image.is_some() || fav.image_encoded.is_some()),
            );
            feature(geometry, props)
        })
        .collect();
    collection(features)
}

fn track_to_features(trk: &GpxTrack, opts: &ConvertOptions) -> Vec<Feature> {
    let non_empty_segments: Vec<&GpxSegment> =
        trk.segments.iter().filter(|s| !s.points.is_empty()).collect();

    if non_empty_segments.is_empty() {
        return Vec::new();
    }

    let total_points: usize = non_empty_segments.iter().map(|s| s.points.len()).sum();
    if total_points == 1 {
        let pt = &non_empty_segments[0].points[0];
        let geometry = Geometry::new(Value::Point(position(pt, opts.include_elevation)));
        return vec![feature(geometry, build_track_props(trk))];
    }

    let drawable: Vec<&GpxSegment> = non_empty_segments
        .into_iter()
        .filter(|s| s.points.len() >= 2)
        .collect();

    if opts.join_track_segments && drawable.len() > 1 {
        let line_strings: Vec<Vec<Vec<f64>>> = drawable
            .iter()
            .map(|seg| line_coords(seg, opts))
            .collect();
        let geometry = Geometry::new(Value::MultiLineString(line_strings));
        let mut props = build_track_props(trk);
        if opts.include_time && has_times(&drawable) {
            attach_times(&mut props, drawable.iter().map(|seg| segment_times(seg)).collect());
        }
        return vec![feature(geometry, props)];
    }

    drawable
        .iter()
        .map(|seg| {
            let geometry = Geometry::new(Value::LineString(line_coords(seg, opts)));
            let mut props = build_track_props(trk);
            if opts.include_time && has_times(std::slice::from_ref(seg)) {
                attach_times(&mut props, segment_times(seg));
            }
            feature(geometry, props)
        })
        .collect()
}

fn build_track_props(trk: &GpxTrack) -> Map<String, JsonValue> {
    let mut props = Map::new();
    props.insert("kind".to_string(), JsonValue::String("track".to_string()));
    if let Some(name) = &trk.name {
        props.insert("name".to_string(), JsonValue::String(name.clone()));
    }
    props
}

fn line_coords(seg: &GpxSegment, opts: &ConvertOptions) -> Vec<Vec<f64>> {
    seg.points
        .iter()
        .map(|pt| position(pt, opts.include_elevation))
        .collect()
}

/// `[lon, lat]`, or `[lon, lat, ele]` when elevation is wanted and known.
fn position(pt: &GpxPoint, include_elevation: bool) -> Vec<f64> {
    let mut position = vec![pt.lon, pt.lat];
    position.extend(pt.elevation.filter(|_| include_elevation));
    position
}

fn has_times(segments: &[&GpxSegment]) -> bool {
    segments
        .iter()
        .flat_map(|seg| &seg.points)
        .any(|pt| pt.time.is_some())
}

/// One entry per point; `null` where the point has no time.
fn segment_times(seg: &GpxSegment) -> JsonValue {
    seg.points
        .iter()
        .map(|pt| pt.time.clone().map_or(JsonValue::Null, JsonValue::String))
        .collect()
}

fn attach_times(props: &mut Map<String, JsonValue>, times: JsonValue) {
    props.insert(
        "coordinateProperties".to_string(),
        serde_json::json!({ "times": times }),
    );
}

fn insert_number(props: &mut Map<String, JsonValue>, key: &str, value: f64) {
    if let Some(n) = serde_json::Number::from_f64(value) {
        props.insert(key.to_string(), JsonValue::Number(n));
    }
}

fn feature(geometry: Geometry, props: Map<String, JsonValue>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favourites::Favourite;
    use crate::parser::decode_str;
    use crate::track::Fix;

    #[test]
    fn test_track_with_times() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <name>Ride</name>
    <trkseg>
      <trkpt lat="48.0" lon="10.0"><ele>480</ele><time>2025-01-01T00:00:00Z</time></trkpt>
      <trkpt lat="48.001" lon="10.001"><time>2025-01-01T00:01:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let doc = decode_str(xml).unwrap();
        let fc = to_feature_collection(&doc, &ConvertOptions::default());

        assert_eq!(fc.features.len(), 1);
        let f = &fc.features[0];
        let props = f.properties.as_ref().unwrap();
        assert_eq!(props["kind"], "track");
        assert_eq!(props["name"], "Ride");

        let times = props["coordinateProperties"]["times"].as_array().unwrap();
        assert_eq!(times.len(), 2);
        assert_eq!(times[0], "2025-01-01T00:00:00Z");

        match &f.geometry.as_ref().unwrap().value {
            Value::LineString(coords) => {
                assert_eq!(coords[0], vec![10.0, 48.0, 480.0]);
                assert_eq!(coords[1], vec![10.001, 48.001]);
            }
            _ => panic!("Expected LineString"),
        }
    }

    #[test]
    fn test_multi_segment_join_and_separate() {
        let xml = r#"<gpx><trk>
  <trkseg><trkpt lat="48.0" lon="10.0"/><trkpt lat="48.001" lon="10.001"/></trkseg>
  <trkseg><trkpt lat="49.0" lon="11.0"/><trkpt lat="49.001" lon="11.001"/></trkseg>
</trk></gpx>"#;
        let doc = decode_str(xml).unwrap();

        let joined = to_feature_collection(
            &doc,
            &ConvertOptions {
                join_track_segments: true,
                ..Default::default()
            },
        );
        assert_eq!(joined.features.len(), 1);
        assert!(matches!(
            joined.features[0].geometry.as_ref().unwrap().value,
            Value::MultiLineString(ref lines) if lines.len() == 2
        ));

        let separate = to_feature_collection(&doc, &ConvertOptions::default());
        assert_eq!(separate.features.len(), 2);
    }

    #[test]
    fn test_joined_times_pad_untimed_segment() {
        let xml = r#"<gpx><trk>
  <trkseg><trkpt lat="48.0" lon="10.0"><time>2025-01-01T00:00:00Z</time></trkpt><trkpt lat="48.001" lon="10.001"/></trkseg>
  <trkseg><trkpt lat="49.0" lon="11.0"/><trkpt lat="49.001" lon="11.001"/></trkseg>
</trk></gpx>"#;
        let doc = decode_str(xml).unwrap();
        let opts = ConvertOptions {
            join_track_segments: true,
            ..Default::default()
        };
        let fc = to_feature_collection(&doc, &opts);
        let times = &fc.features[0].properties.as_ref().unwrap()["coordinateProperties"]["times"];
        assert_eq!(
            *times,
            serde_json::json!([["2025-01-01T00:00:00Z", null], [null, null]])
        );

        let separate = to_feature_collection(&doc, &ConvertOptions::default());
        let second = separate.features[1].properties.as_ref().unwrap();
        assert!(second.get("coordinateProperties").is_none());
    }

    #[test]
    fn test_single_fix_track_is_point() {
        let track = Track::new(vec![Fix::new(48.0, 10.0, 0)]);
        let fc = track_to_feature_collection(&track, &ConvertOptions::default());
        assert_eq!(fc.features.len(), 1);
        assert!(matches!(
            fc.features[0].geometry.as_ref().unwrap().value,
            Value::Point(_)
        ));
    }

    #[test]
    fn test_no_elevation_or_time() {
        let mut fix = Fix::new(48.0, 10.0, 0);
        fix.altitude = Some(500.0);
        let track = Track::new(vec![fix, Fix::new(48.1, 10.0, 60_000)]);
        let opts = ConvertOptions {
            include_elevation: false,
            include_time: false,
            ..Default::default()
        };
        let fc = track_to_feature_collection(&track, &opts);
        let f = &fc.features[0];
        assert!(f.properties.as_ref().unwrap().get("coordinateProperties").is_none());
        match &f.geometry.as_ref().unwrap().value {
            Value::LineString(coords) => assert_eq!(coords[0].len(), 2),
            _ => panic!("Expected LineString"),
        }
    }

    #[test]
    fn test_route_feature() {
        assert!(route_to_feature(&RouteBuffer::new()).is_none());
        let mut route = RouteBuffer::new();
        route.push(10.0, 48.0);
        route.push(10.0, 48.1);
        let f = route_to_feature(&route).unwrap();
        let props = f.properties.as_ref().unwrap();
        assert_eq!(props["lengthLabel"], "11.1 km");
    }

    #[test]
    fn test_favourites_layer() {
        let favourites: FavouritesCollection = [
            Favourite::new("A", "first", 10.0, 48.0, 14.0),
            Favourite::new("B", "second", 11.0, 49.0, 12.0),
        ]
        .into_iter()
        .collect();
        let fc = favourites_to_feature_collection(&favourites);
        assert_eq!(fc.features.len(), 2);
        for f in &fc.features {
            let props = f.properties.as_ref().unwrap();
            assert_eq!(props["kind"], "favourite");
            assert_eq!(props["hasThumbnail"], false);
        }
    }

    #[test]
    fn test_empty_document() {
        let fc = to_feature_collection(&GpxDocument::default(), &ConvertOptions::default());
        assert!(fc.features.is_empty());
    }
}

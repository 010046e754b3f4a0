use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::Result;
use crate::gpx_types::*;

const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
const CREATOR: &str = "cyclemap-core";

/// Encode a [`GpxDocument`] as GPX 1.1 XML.
///
/// Unset optional fields are omitted, so `decode(encode(doc))` yields `doc`
/// again for everything the codec understands.
pub fn encode(doc: &GpxDocument) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("gpx").with_attributes([
        ("version", "1.1"),
        ("creator", CREATOR),
        ("xmlns", GPX_NAMESPACE),
    ])))?;

    if let Some(trk) = &doc.track {
        write_track(&mut writer, trk)?;
    }

    writer.write_event(Event::End(BytesEnd::new("gpx")))?;
    Ok(writer.into_inner())
}

/// Convenience wrapper returning the XML as a `String`.
pub fn encode_string(doc: &GpxDocument) -> Result<String> {
    let bytes = encode(doc)?;
    // The writer only ever receives UTF-8 input.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_track(writer: &mut Writer<Vec<u8>>, trk: &GpxTrack) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("trk")))?;
    if let Some(name) = &trk.name {
        write_text_element(writer, "name", name)?;
    }
    for seg in &trk.segments {
        if seg.points.is_empty() {
            writer.write_event(Event::Empty(BytesStart::new("trkseg")))?;
            continue;
        }
        writer.write_event(Event::Start(BytesStart::new("trkseg")))?;
        for pt in &seg.points {
            write_point(writer, pt)?;
        }
        writer.write_event(Event::End(BytesEnd::new("trkseg")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("trk")))?;
    Ok(())
}

fn write_point(writer: &mut Writer<Vec<u8>>, pt: &GpxPoint) -> Result<()> {
    let lat = pt.lat.to_string();
    let lon = pt.lon.to_string();
    let start = BytesStart::new("trkpt").with_attributes([("lat", lat.as_str()), ("lon", lon.as_str())]);

    if pt.elevation.is_none() && pt.time.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(ele) = pt.elevation {
        write_text_element(writer, "ele", &ele.to_string())?;
    }
    if let Some(time) = &pt.time {
        write_text_element(writer, "time", time)?;
    }
    writer.write_event(Event::End(BytesEnd::new("trkpt")))?;
    Ok(())
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

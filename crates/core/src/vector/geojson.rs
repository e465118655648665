//! GeoJSON geometry encoding over `serde_json` values

use super::Feature;
use crate::error::{Error, Result};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde_json::{json, Value};

/// Decode a GeoJSON geometry object
pub fn geometry_from_geojson(value: &Value) -> Result<Geometry<f64>> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Geometry("GeoJSON geometry without type".into()))?;

    if kind == "GeometryCollection" {
        let members = value
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Geometry("GeometryCollection without geometries".into()))?;
        let geoms = members
            .iter()
            .map(geometry_from_geojson)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection(geoms)));
    }

    let coords = value
        .get("coordinates")
        .ok_or_else(|| Error::Geometry(format!("{} without coordinates", kind)))?;

    let geom = match kind {
        "Point" => Geometry::Point(Point(position(coords)?)),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint(
            array(coords)?
                .iter()
                .map(|c| position(c).map(Point))
                .collect::<Result<_>>()?,
        )),
        "LineString" => Geometry::LineString(line(coords)?),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString(
            array(coords)?.iter().map(line).collect::<Result<_>>()?,
        )),
        "Polygon" => Geometry::Polygon(polygon(coords)?),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon(
            array(coords)?.iter().map(polygon).collect::<Result<_>>()?,
        )),
        other => return Err(Error::Geometry(format!("unsupported GeoJSON type '{}'", other))),
    };
    Ok(geom)
}

/// Encode a geometry as a GeoJSON geometry object
pub fn geometry_to_geojson(geom: &Geometry<f64>) -> Value {
    match geom {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": pos(p.0)}),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| pos(p.0)).collect::<Vec<_>>(),
        }),
        Geometry::Line(l) => json!({
            "type": "LineString",
            "coordinates": [pos(l.start), pos(l.end)],
        }),
        Geometry::LineString(ls) => json!({"type": "LineString", "coordinates": ring(ls)}),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(ring).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": rings(p)}),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(rings).collect::<Vec<_>>(),
        }),
        Geometry::Rect(r) => geometry_to_geojson(&Geometry::Polygon(r.to_polygon())),
        Geometry::Triangle(t) => geometry_to_geojson(&Geometry::Polygon(t.to_polygon())),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.0.iter().map(geometry_to_geojson).collect::<Vec<_>>(),
        }),
    }
}

/// Decode a FeatureCollection, a single Feature, or a bare geometry into features.
///
/// A feature whose geometry is `null` is kept with `geometry: None`; one whose
/// geometry cannot be decoded is an error for the caller to handle per item.
pub fn features_from_geojson(value: &Value) -> Result<Vec<Result<Feature>>> {
    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::Geometry("FeatureCollection without features".into()))?;
            Ok(features.iter().map(feature).collect())
        }
        Some("Feature") => Ok(vec![feature(value)]),
        Some(_) => Ok(vec![geometry_from_geojson(value).map(Feature::new)]),
        None => Err(Error::Geometry("GeoJSON object without type".into())),
    }
}

fn feature(value: &Value) -> Result<Feature> {
    let geometry = match value.get("geometry") {
        None | Some(Value::Null) => None,
        Some(g) => Some(geometry_from_geojson(g)?),
    };
    let properties = value
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Ok(Feature {
        id: value.get("id").cloned(),
        geometry,
        properties,
    })
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::Geometry("GeoJSON coordinates must be arrays".into()))
}

fn position(value: &Value) -> Result<Coord<f64>> {
    let items = array(value)?;
    let x = items.first().and_then(Value::as_f64);
    let y = items.get(1).and_then(Value::as_f64);
    match (x, y) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(Error::Geometry("GeoJSON position needs two numbers".into())),
    }
}

fn line(value: &Value) -> Result<LineString<f64>> {
    Ok(LineString(
        array(value)?.iter().map(position).collect::<Result<_>>()?,
    ))
}

fn polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = array(value)?.iter().map(line);
    let exterior = rings
        .next()
        .ok_or_else(|| Error::Geometry("Polygon without exterior ring".into()))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn pos(c: Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn ring(ls: &LineString<f64>) -> Vec<Value> {
    ls.0.iter().map(|c| pos(*c)).collect()
}

fn rings(p: &Polygon<f64>) -> Vec<Vec<Value>> {
    std::iter::once(p.exterior())
        .chain(p.interiors())
        .map(ring)
        .collect()
}

//! Asset inventory records

use georisk_core::vector::{features_from_geojson, geometry_to_geojson};
use georisk_core::Result;
use geo::Geometry;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// Four-tier asset importance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub enum Criticality {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Criticality {
    pub const ALL: [Criticality; 4] = [
        Criticality::Low,
        Criticality::Medium,
        Criticality::High,
        Criticality::Critical,
    ];

    pub fn code(self) -> u8 {
        match self {
            Criticality::Low => 0,
            Criticality::Medium => 1,
            Criticality::High => 2,
            Criticality::Critical => 3,
        }
    }

    /// Decode a tier code; unknown codes are `Medium`
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Criticality::Low,
            2 => Criticality::High,
            3 => Criticality::Critical,
            _ => Criticality::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Criticality::Low => "Low",
            Criticality::Medium => "Medium",
            Criticality::High => "High",
            Criticality::Critical => "Critical",
        }
    }
}

impl From<i64> for Criticality {
    fn from(code: i64) -> Self {
        Self::from_code(code)
    }
}

impl From<Criticality> for u8 {
    fn from(c: Criticality) -> Self {
        c.code()
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown_id() -> String {
    "unknown".to_string()
}

fn unknown_name() -> String {
    "Unknown".to_string()
}

/// Ids arrive as strings or numbers
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => unknown_id(),
        other => other.to_string(),
    })
}

/// One infrastructure asset as delivered by the inventory.
///
/// Geometry stays raw GeoJSON until proximity search so that one corrupt
/// record only skips that asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    #[serde(alias = "id", default = "unknown_id", deserialize_with = "string_or_number")]
    pub asset_id: String,
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(alias = "type", default)]
    pub asset_type: i64,
    #[serde(alias = "type_name", default = "unknown_name")]
    pub asset_type_name: String,
    #[serde(default)]
    pub criticality: Criticality,
    #[serde(alias = "criticality_name", default)]
    pub criticality_name: Option<String>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

impl AssetRecord {
    pub fn new(
        asset_id: impl Into<String>,
        asset_type_name: impl Into<String>,
        criticality: Criticality,
        geometry: &Geometry<f64>,
    ) -> Self {
        let asset_id = asset_id.into();
        Self {
            name: asset_id.clone(),
            asset_id,
            asset_type: 0,
            asset_type_name: asset_type_name.into(),
            criticality,
            criticality_name: None,
            geometry: Some(geometry_to_geojson(geometry)),
        }
    }

    /// Declared tier name, or the name of the tier code
    pub fn criticality_name(&self) -> &str {
        self.criticality_name
            .as_deref()
            .unwrap_or_else(|| self.criticality.as_str())
    }
}

/// Assets from a GeoJSON FeatureCollection whose properties carry the
/// inventory fields.
///
/// Features that fail to decode are skipped with a warning. The feature id
/// stands in for a missing `assetId`.
pub fn assets_from_feature_collection(value: &Value) -> Result<Vec<AssetRecord>> {
    let features = features_from_geojson(value)?;
    let mut assets = Vec::with_capacity(features.len());

    for (index, feature) in features.into_iter().enumerate() {
        let feature = match feature {
            Ok(f) => f,
            Err(e) => {
                warn!(index, error = %e, "skipping asset feature");
                continue;
            }
        };

        let mut properties = feature.properties.clone();
        if !properties.contains_key("assetId") && !properties.contains_key("id") {
            if let Some(id) = &feature.id {
                properties.insert("assetId".into(), id.clone());
            }
        }

        match serde_json::from_value::<AssetRecord>(Value::Object(properties)) {
            Ok(mut asset) => {
                asset.geometry = feature.geometry.as_ref().map(geometry_to_geojson);
                assets.push(asset);
            }
            Err(e) => warn!(index, error = %e, "skipping asset with malformed properties"),
        }
    }

    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inventory_shape_and_defaults() {
        let asset: AssetRecord = serde_json::from_value(json!({
            "assetId": "sub-12",
            "name": "North Substation",
            "assetType": 3,
            "assetTypeName": "Substation",
            "criticality": 3,
            "geometry": {"type": "Point", "coordinates": [-122.0, 37.0]}
        }))
        .unwrap();
        assert_eq!(asset.asset_id, "sub-12");
        assert_eq!(asset.criticality, Criticality::Critical);
        assert_eq!(asset.criticality_name(), "Critical");

        let bare: AssetRecord = serde_json::from_value(json!({"id": 42})).unwrap();
        assert_eq!(bare.asset_id, "42");
        assert_eq!(bare.name, "Unknown");
        assert_eq!(bare.asset_type_name, "Unknown");
        assert_eq!(bare.criticality, Criticality::Medium);
        assert!(bare.geometry.is_none());
    }

    #[test]
    fn test_unknown_criticality_is_medium() {
        let asset: AssetRecord = serde_json::from_value(json!({"criticality": 9})).unwrap();
        assert_eq!(asset.criticality, Criticality::Medium);
        assert_eq!(asset.asset_id, "unknown");
        assert!(Criticality::Low < Criticality::Critical);
    }

    #[test]
    fn test_snake_case_aliases() {
        let asset: AssetRecord = serde_json::from_value(json!({
            "id": "pole-1",
            "type": 1,
            "type_name": "Pole",
            "criticality_name": "Tier 2"
        }))
        .unwrap();
        assert_eq!(asset.asset_type, 1);
        assert_eq!(asset.asset_type_name, "Pole");
        assert_eq!(asset.criticality_name(), "Tier 2");
    }

    #[test]
    fn test_feature_collection() {
        let fc = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": "t-1",
                 "geometry": {"type": "Point", "coordinates": [10.0, 45.0]},
                 "properties": {"assetTypeName": "Tower", "criticality": 2}},
                {"type": "Feature",
                 "geometry": {"type": "Bogus", "coordinates": []},
                 "properties": {}},
                {"type": "Feature", "geometry": null,
                 "properties": {"assetId": "ghost"}}
            ]
        });
        let assets = assets_from_feature_collection(&fc).unwrap();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].asset_id, "t-1");
        assert_eq!(assets[0].criticality, Criticality::High);
        assert_eq!(assets[0].geometry.as_ref().unwrap()["type"], "Point");
        assert!(assets[1].geometry.is_none());
    }
}

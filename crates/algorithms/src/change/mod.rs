//! Vegetation change detection
//!
//! Turns a pair of aligned vegetation-index rasters into change polygons:
//! difference, threshold mask, vectorization, metric area filter, polygon
//! statistics and rule-based change typing.

mod classify;
mod detect;
mod vectorize;

pub use classify::{classify_change, ChangeType};
pub use detect::{
    detect_changes, detect_ndvi_changes, ChangeDetectionResult, ChangeDetector, ChangeParams,
    ChangeStats,
};
pub use vectorize::{label_regions, vectorize_mask};

use georisk_core::vector::geometry_to_geojson;
use geo::{Geometry, Polygon};
use serde::Serialize;

/// One connected change region.
///
/// Geometry is WGS84 and never changes after detection. Terrain and
/// classification fields start empty and are filled by later enrichment
/// passes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangePolygon {
    pub geometry: Polygon<f64>,
    pub area_sq_meters: f64,
    pub ndvi_drop_mean: f64,
    pub ndvi_drop_max: f64,
    pub change_type: ChangeType,
    pub slope_degree_mean: Option<f64>,
    pub slope_degree_max: Option<f64>,
    pub aspect_degrees: Option<f64>,
    pub elevation_m: Option<f64>,
    pub land_cover_class: Option<String>,
    pub ml_confidence: Option<f64>,
    pub ml_model_version: Option<String>,
}

impl ChangePolygon {
    /// Change polygon without enrichment, typed from its mean drop alone
    pub fn new(geometry: Polygon<f64>, area_sq_meters: f64, ndvi_drop_mean: f64, ndvi_drop_max: f64) -> Self {
        Self {
            geometry,
            area_sq_meters,
            ndvi_drop_mean,
            ndvi_drop_max,
            change_type: classify_change(ndvi_drop_mean, None),
            slope_degree_mean: None,
            slope_degree_max: None,
            aspect_degrees: None,
            elevation_m: None,
            land_cover_class: None,
            ml_confidence: None,
            ml_model_version: None,
        }
    }

    /// Geometry as a generic `geo` geometry
    pub fn geometry(&self) -> Geometry<f64> {
        Geometry::Polygon(self.geometry.clone())
    }

    /// Persistable record with GeoJSON geometry and the integer change code
    pub fn to_record(&self) -> ChangeRecord {
        ChangeRecord {
            geometry: geometry_to_geojson(&self.geometry()),
            area_sq_meters: self.area_sq_meters,
            ndvi_drop_mean: self.ndvi_drop_mean,
            ndvi_drop_max: self.ndvi_drop_max,
            change_type: self.change_type.code(),
            slope_degree_mean: self.slope_degree_mean,
            slope_degree_max: self.slope_degree_max,
            aspect_degrees: self.aspect_degrees,
            elevation_m: self.elevation_m,
        }
    }
}

/// Serialized form of a [`ChangePolygon`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub geometry: serde_json::Value,
    pub area_sq_meters: f64,
    pub ndvi_drop_mean: f64,
    pub ndvi_drop_max: f64,
    pub change_type: u8,
    pub slope_degree_mean: Option<f64>,
    pub slope_degree_max: Option<f64>,
    pub aspect_degrees: Option<f64>,
    pub elevation_m: Option<f64>,
}

//! Metric-frame proximity search between change polygons and assets

use super::asset::{AssetRecord, Criticality};
use crate::terrain::{DirectionalTerrainMetrics, TerrainAnalyzer};
use georisk_core::crs::utm::{is_valid_wgs84, utm_zone_for};
use georisk_core::vector::geometry_from_geojson;
use georisk_core::{Error, GeometryExt, Result, Transformer};
use geo::{Geometry, Point, Polygon};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Proximity search settings
#[derive(Debug, Clone)]
pub struct ProximityParams {
    /// Assets farther than this (meters) are not reported
    pub max_distance_m: f64,
    /// Asset type names whose line geometries are suspended above ground
    pub overhead_line_types: HashSet<String>,
}

impl Default for ProximityParams {
    fn default() -> Self {
        Self {
            max_distance_m: 500.0,
            overhead_line_types: HashSet::from(["TransmissionLine".to_string()]),
        }
    }
}

impl ProximityParams {
    pub fn with_max_distance(mut self, max_distance_m: f64) -> Self {
        self.max_distance_m = max_distance_m;
        self
    }
}

/// An asset within reach of a change, with optional terrain relationship
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityResult {
    pub asset_id: String,
    pub asset_name: String,
    pub asset_type: i64,
    pub asset_type_name: String,
    pub criticality: Criticality,
    pub criticality_name: String,
    pub distance_meters: f64,
    /// WGS84 geometry as delivered
    pub asset_geometry: Geometry<f64>,
    pub asset_elevation_m: Option<f64>,
    /// Change minus asset elevation
    pub elevation_diff_m: Option<f64>,
    pub is_upslope: Option<bool>,
    pub slope_toward_asset_deg: Option<f64>,
}

impl ProximityResult {
    fn from_asset(asset: &AssetRecord, geometry: Geometry<f64>, distance_meters: f64) -> Self {
        Self {
            asset_id: asset.asset_id.clone(),
            asset_name: asset.name.clone(),
            asset_type: asset.asset_type,
            asset_type_name: asset.asset_type_name.clone(),
            criticality: asset.criticality,
            criticality_name: asset.criticality_name().to_string(),
            distance_meters,
            asset_geometry: geometry,
            asset_elevation_m: None,
            elevation_diff_m: None,
            is_upslope: None,
            slope_toward_asset_deg: None,
        }
    }

    /// Flatten directional terrain metrics onto the result
    pub fn with_terrain(mut self, metrics: &DirectionalTerrainMetrics) -> Self {
        self.asset_elevation_m = Some(metrics.asset_elevation_m);
        self.elevation_diff_m = Some(metrics.elevation_diff_m);
        self.is_upslope = Some(metrics.is_upslope);
        self.slope_toward_asset_deg = Some(metrics.slope_toward_asset_deg);
        self
    }
}

/// Finds assets near a change polygon.
///
/// Distances are measured in the UTM zone of the change centroid. Asset
/// failures never abort the search: they are logged and skipped.
#[derive(Debug, Clone)]
pub struct ProximityFinder {
    params: ProximityParams,
}

impl ProximityFinder {
    pub fn new(params: ProximityParams) -> Result<Self> {
        if !(params.max_distance_m.is_finite() && params.max_distance_m >= 0.0) {
            return Err(Error::invalid_parameter(
                "max_distance_m",
                params.max_distance_m,
                "must be a non-negative distance",
            ));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &ProximityParams {
        &self.params
    }

    /// Assets within `max_distance_m` of a WGS84 change polygon, nearest first.
    ///
    /// With a terrain analyzer, each result carries the elevation
    /// relationship between the change centroid and the asset centroid.
    /// Fails only when the change polygon itself is unusable.
    pub fn find_nearby(
        &self,
        change: &Polygon<f64>,
        assets: &[AssetRecord],
        terrain: Option<&TerrainAnalyzer>,
    ) -> Result<Vec<ProximityResult>> {
        if assets.is_empty() {
            return Ok(Vec::new());
        }

        let change = Geometry::Polygon(change.clone());
        let centroid = change.centroid_point()?;
        if !is_valid_wgs84(centroid.x(), centroid.y()) {
            return Err(Error::Geometry(format!(
                "change centroid ({}, {}) is not a WGS84 coordinate",
                centroid.x(),
                centroid.y()
            )));
        }

        let (zone, north) = utm_zone_for(centroid.x(), centroid.y());
        let to_utm = Transformer::wgs84_to_utm(zone, north);
        let change_utm = change.reproject(&to_utm)?;

        let mut results: Vec<ProximityResult> = assets
            .iter()
            .filter_map(|asset| {
                match self.evaluate(asset, &change_utm, centroid, &to_utm, terrain) {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(asset_id = %asset.asset_id, asset_name = %asset.name, error = %e, "failed to process asset");
                        None
                    }
                }
            })
            .collect();

        results.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));

        debug!(
            nearby = results.len(),
            max_distance_m = self.params.max_distance_m,
            utm_zone = zone,
            "proximity analysis complete"
        );
        Ok(results)
    }

    fn evaluate(
        &self,
        asset: &AssetRecord,
        change_utm: &Geometry<f64>,
        change_centroid: Point<f64>,
        to_utm: &Transformer,
        terrain: Option<&TerrainAnalyzer>,
    ) -> Result<Option<ProximityResult>> {
        let Some(raw) = asset.geometry.as_ref().filter(|g| !g.is_null()) else {
            return Ok(None);
        };
        let geometry = geometry_from_geojson(raw)?;

        if matches!(geometry, Geometry::LineString(_) | Geometry::MultiLineString(_))
            && self.params.overhead_line_types.contains(&asset.asset_type_name)
        {
            debug!(asset_name = %asset.name, asset_type = %asset.asset_type_name, "skipping overhead line geometry");
            return Ok(None);
        }

        let bounds = geometry
            .bounds()
            .ok_or_else(|| Error::Geometry("empty asset geometry".into()))?;
        if !bounds.is_valid_wgs84() {
            warn!(asset_id = %asset.asset_id, asset_name = %asset.name, ?bounds, "skipping asset with non-WGS84 coordinates");
            return Ok(None);
        }

        let distance = change_utm.distance_to(&geometry.reproject(to_utm)?);
        if !(distance <= self.params.max_distance_m) {
            return Ok(None);
        }

        let metrics = terrain.and_then(|t| {
            let asset_point = geometry.centroid_point().ok()?;
            t.directional_metrics(change_centroid, asset_point)
        });

        let result = ProximityResult::from_asset(asset, geometry, distance);
        Ok(Some(match metrics {
            Some(m) => result.with_terrain(&m),
            None => result,
        }))
    }
}

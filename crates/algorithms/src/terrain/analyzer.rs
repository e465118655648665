//! Point, polygon and pairwise terrain queries over a loaded DEM

use super::dem::DemData;
use super::horn::normalize_bearing;
use crate::change::ChangePolygon;
use georisk_core::crs::utm::utm_zone_for;
use georisk_core::raster::polygon_cells;
use georisk_core::{Error, GeometryExt, Raster, Result, Transformer, CRS};
use geo::{Geometry, Point, Polygon};
use serde::Serialize;
use tracing::debug;

/// Elevation difference above which a change counts as upslope
pub const UPSLOPE_THRESHOLD_M: f64 = 5.0;

/// Below this horizontal distance the slope toward a point is 0
const MIN_HORIZONTAL_DISTANCE_M: f64 = 1.0;

/// Terrain sampled at one point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TerrainData {
    pub slope_degrees: f64,
    pub aspect_degrees: f64,
    pub elevation_m: f64,
}

/// Elevation relationship between a change and an asset.
///
/// `elevation_diff_m` is change minus asset: positive means the change sits
/// above the asset. `slope_toward_asset_deg` is positive downhill toward the
/// asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionalTerrainMetrics {
    pub change_elevation_m: f64,
    pub asset_elevation_m: f64,
    pub elevation_diff_m: f64,
    pub is_upslope: bool,
    pub slope_toward_asset_deg: f64,
}

/// Terrain statistics over the cells whose centres fall inside a polygon
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolygonTerrainStats {
    /// Number of covered cells
    pub cells: usize,
    pub elevation_m: Option<f64>,
    pub slope_degree_mean: Option<f64>,
    pub slope_degree_max: Option<f64>,
    /// Circular mean in [0, 360)
    pub aspect_degrees: Option<f64>,
}

/// Terrain queries against one DEM.
///
/// Inputs are WGS84; points and polygons are projected into the DEM CRS
/// before lookup. Built once per run and shared read-only across threads.
#[derive(Debug, Clone)]
pub struct TerrainAnalyzer {
    dem: DemData,
    from_wgs84: Transformer,
}

impl TerrainAnalyzer {
    /// Analyzer over `dem`, deriving slope/aspect if they are missing
    pub fn new(dem: DemData) -> Result<Self> {
        let dem = if dem.has_derivatives() {
            dem
        } else {
            dem.with_slope_aspect()?
        };
        let from_wgs84 = Transformer::new(&CRS::wgs84(), &dem.crs())?;
        Ok(Self { dem, from_wgs84 })
    }

    pub fn dem(&self) -> &DemData {
        &self.dem
    }

    /// Nearest-cell terrain at a WGS84 point.
    ///
    /// `None` outside the grid or on missing elevation. Missing slope or
    /// aspect read as 0.
    pub fn sample_point(&self, point: Point<f64>) -> Option<TerrainData> {
        let (x, y) = self.from_wgs84.transform(point.x(), point.y());
        let elevation = &self.dem.elevation;
        let Some((row, col)) = elevation.cell_at(x, y) else {
            debug!(x, y, "point outside DEM bounds");
            return None;
        };

        let elevation_m = elevation.valid_at(row, col)?;
        let derived = |grid: &Option<Raster<f64>>| {
            grid.as_ref()
                .and_then(|g| g.valid_at(row, col))
                .unwrap_or(0.0)
        };

        Some(TerrainData {
            slope_degrees: derived(&self.dem.slope),
            aspect_degrees: derived(&self.dem.aspect),
            elevation_m,
        })
    }

    /// Statistics over a WGS84 polygon
    pub fn polygon_stats(&self, polygon: &Polygon<f64>) -> Result<PolygonTerrainStats> {
        let native = match Geometry::Polygon(polygon.clone()).reproject(&self.from_wgs84)? {
            Geometry::Polygon(p) => p,
            _ => return Err(Error::Geometry("reprojection changed geometry type".into())),
        };

        let (rows, cols) = self.dem.elevation.shape();
        let cells = polygon_cells(self.dem.transform(), rows, cols, &native);

        let collect = |grid: &Raster<f64>| -> Vec<f64> {
            cells.iter().filter_map(|&(r, c)| grid.valid_at(r, c)).collect()
        };

        let elevations = collect(&self.dem.elevation);
        let slopes = self.dem.slope.as_ref().map(collect).unwrap_or_default();
        let aspects = self.dem.aspect.as_ref().map(collect).unwrap_or_default();

        let slope_degree_max = slopes.iter().copied().reduce(f64::max);
        // Summation error must not lift the mean above the max
        let slope_degree_mean = mean(&slopes).zip(slope_degree_max).map(|(m, max)| m.min(max));

        Ok(PolygonTerrainStats {
            cells: cells.len(),
            elevation_m: mean(&elevations),
            slope_degree_mean,
            slope_degree_max,
            aspect_degrees: circular_mean(&aspects),
        })
    }

    /// Elevation relationship from `from` (change) to `to` (asset), both WGS84.
    ///
    /// `None` when either point has no elevation.
    pub fn directional_metrics(
        &self,
        from: Point<f64>,
        to: Point<f64>,
    ) -> Option<DirectionalTerrainMetrics> {
        let change_elevation_m = self.sample_point(from)?.elevation_m;
        let asset_elevation_m = self.sample_point(to)?.elevation_m;
        let elevation_diff_m = change_elevation_m - asset_elevation_m;

        Some(DirectionalTerrainMetrics {
            change_elevation_m,
            asset_elevation_m,
            elevation_diff_m,
            is_upslope: elevation_diff_m > UPSLOPE_THRESHOLD_M,
            slope_toward_asset_deg: slope_toward(from, to, elevation_diff_m),
        })
    }

    /// `(is_upslope, elevation_diff_m)` for a change relative to an asset,
    /// `(false, 0.0)` when elevations are unavailable
    pub fn is_upslope_from(&self, change: Point<f64>, asset: Point<f64>, threshold_m: f64) -> (bool, f64) {
        match self.directional_metrics(change, asset) {
            Some(m) => (m.elevation_diff_m > threshold_m, m.elevation_diff_m),
            None => (false, 0.0),
        }
    }

    /// Fill the terrain fields of a change polygon.
    ///
    /// Polygons covering no cell centre fall back to the nearest-cell
    /// sample at their centroid. Fields stay empty when neither yields an
    /// elevation.
    pub fn enrich(&self, change: &mut ChangePolygon) -> Result<()> {
        let stats = self.polygon_stats(&change.geometry)?;
        if stats.elevation_m.is_some() {
            change.elevation_m = stats.elevation_m;
            change.slope_degree_mean = stats.slope_degree_mean;
            change.slope_degree_max = stats.slope_degree_max;
            change.aspect_degrees = stats.aspect_degrees;
            return Ok(());
        }

        let centroid = change.geometry().centroid_point()?;
        match self.sample_point(centroid) {
            Some(t) => {
                change.elevation_m = Some(t.elevation_m);
                change.slope_degree_mean = Some(t.slope_degrees);
                change.slope_degree_max = Some(t.slope_degrees);
                change.aspect_degrees = Some(t.aspect_degrees);
            }
            None => debug!(x = centroid.x(), y = centroid.y(), "no terrain under change polygon"),
        }
        Ok(())
    }
}

/// Slope angle in degrees from `from` toward `to`, measured in the UTM zone
/// of their midpoint
fn slope_toward(from: Point<f64>, to: Point<f64>, elevation_diff_m: f64) -> f64 {
    let (mid_x, mid_y) = ((from.x() + to.x()) / 2.0, (from.y() + to.y()) / 2.0);
    let (zone, north) = utm_zone_for(mid_x, mid_y);
    let utm = Transformer::wgs84_to_utm(zone, north);

    let (fx, fy) = utm.transform(from.x(), from.y());
    let (tx, ty) = utm.transform(to.x(), to.y());
    let distance = (tx - fx).hypot(ty - fy);

    if !(distance >= MIN_HORIZONTAL_DISTANCE_M) {
        return 0.0;
    }
    elevation_diff_m.atan2(distance).to_degrees()
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean direction of unit vectors at each angle, in [0, 360)
pub fn circular_mean(degrees: &[f64]) -> Option<f64> {
    if degrees.is_empty() {
        return None;
    }
    let n = degrees.len() as f64;
    let (sin, cos) = degrees.iter().fold((0.0, 0.0), |(s, c), d| {
        let r = d.to_radians();
        (s + r.sin(), c + r.cos())
    });
    Some(normalize_bearing((sin / n).atan2(cos / n).to_degrees()))
}

/// Eight-point compass label for a bearing (45 degree sectors centred on N)
pub fn compass_direction(aspect: f64) -> &'static str {
    const LABELS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let sector = ((normalize_bearing(aspect) + 22.5) / 45.0).floor() as usize % 8;
    LABELS[sector]
}

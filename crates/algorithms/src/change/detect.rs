//! Index differencing, thresholding and polygon extraction

use super::vectorize::vectorize_mask;
use super::ChangePolygon;
use crate::imagery::NdviResult;
use crate::maybe_rayon::*;
use georisk_core::crs::utm::utm_zone_for;
use georisk_core::io::write_geotiff;
use georisk_core::raster::{polygon_cells, Raster};
use georisk_core::{Algorithm, CrsKind, Error, GeometryExt, Result, Transformer, CRS};
use geo::{Geometry, Polygon};
use ndarray::Array2;
use std::path::Path;
use tracing::{debug, info};

/// Parameters for change detection
#[derive(Debug, Clone)]
pub struct ChangeParams {
    /// Cells with `after - before` strictly below this value are changed
    pub threshold: f64,
    /// Polygons smaller than this many square meters are discarded
    pub min_area_m2: f64,
}

impl Default for ChangeParams {
    fn default() -> Self {
        Self {
            threshold: -0.2,
            min_area_m2: 2500.0,
        }
    }
}

impl ChangeParams {
    fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(Error::invalid_parameter("threshold", self.threshold, "must be finite"));
        }
        if !(self.min_area_m2 >= 0.0) {
            return Err(Error::invalid_parameter(
                "min_area_m2",
                self.min_area_m2,
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Run-level difference statistics.
///
/// `mean_diff`, `min_diff` and `max_diff` are taken over non-zero, non-NaN
/// differences and are 0 when there are none.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChangeStats {
    pub mean_diff: f64,
    pub min_diff: f64,
    pub max_diff: f64,
    pub changed_pixels: usize,
    pub total_pixels: usize,
    pub change_percent: f64,
}

/// Output of one detection run
#[derive(Debug, Clone)]
pub struct ChangeDetectionResult {
    /// `after - before`, NaN where either input is NaN
    pub diff: Raster<f64>,
    /// 1 where the difference is below the threshold
    pub mask: Raster<u8>,
    pub polygons: Vec<ChangePolygon>,
    pub threshold: f64,
    pub stats: ChangeStats,
    pub before_scene_id: Option<String>,
    pub after_scene_id: Option<String>,
}

impl ChangeDetectionResult {
    /// Write the difference raster as GeoTIFF
    pub fn save_diff_raster(&self, path: impl AsRef<Path>) -> Result<()> {
        write_geotiff(&self.diff, path.as_ref())?;
        info!(path = %path.as_ref().display(), "saved difference raster");
        Ok(())
    }

    /// Write the change mask as GeoTIFF
    pub fn save_mask_raster(&self, path: impl AsRef<Path>) -> Result<()> {
        write_geotiff(&self.mask, path.as_ref())?;
        info!(path = %path.as_ref().display(), "saved change mask");
        Ok(())
    }
}

/// Change detection over a `(before, after)` raster pair
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector;

impl Algorithm for ChangeDetector {
    type Input = (Raster<f64>, Raster<f64>);
    type Output = ChangeDetectionResult;
    type Params = ChangeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ChangeDetector"
    }

    fn description(&self) -> &'static str {
        "Threshold the index difference and vectorize changed regions into typed polygons"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (before, after) = input;
        detect_changes(&before, &after, &params)
    }
}

/// Detect changes between two NDVI results, carrying their scene ids
pub fn detect_ndvi_changes(
    before: &NdviResult,
    after: &NdviResult,
    params: &ChangeParams,
) -> Result<ChangeDetectionResult> {
    let mut result = detect_changes(&before.raster, &after.raster, params)?;
    result.before_scene_id = Some(before.scene_id.clone());
    result.after_scene_id = Some(after.scene_id.clone());
    Ok(result)
}

/// Detect change polygons between two aligned index rasters.
///
/// The grids must share shape; georeferencing is taken from `before` and a
/// raster without CRS is treated as WGS84. Polygon area is measured natively
/// for projected grids, otherwise in the UTM zone of the polygon centroid.
/// Polygons below `min_area_m2` or with degenerate geometry are dropped.
pub fn detect_changes(
    before: &Raster<f64>,
    after: &Raster<f64>,
    params: &ChangeParams,
) -> Result<ChangeDetectionResult> {
    params.validate()?;

    let (rows, cols) = before.shape();
    if after.shape() != (rows, cols) {
        return Err(Error::SizeMismatch {
            er: rows,
            ec: cols,
            ar: after.rows(),
            ac: after.cols(),
        });
    }

    let native = before.crs().cloned().unwrap_or_else(CRS::wgs84);
    let kind = native.kind()?;

    let diff_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = Vec::with_capacity(cols);
            for col in 0..cols {
                let b = unsafe { before.get_unchecked(row, col) };
                let a = unsafe { after.get_unchecked(row, col) };
                row_data.push(if b.is_nan() || a.is_nan() { f64::NAN } else { a - b });
            }
            row_data
        })
        .collect();

    let diff_array =
        Array2::from_shape_vec((rows, cols), diff_data).map_err(|e| Error::Other(e.to_string()))?;
    let mask_array = diff_array.mapv(|d| u8::from(d < params.threshold));

    let mut diff = before.with_same_meta::<f64>(rows, cols);
    diff.set_nodata(Some(f64::NAN));
    *diff.data_mut() = diff_array;
    let mask = before.replace_data(mask_array)?;

    let stats = difference_stats(&diff, &mask);

    let candidates = vectorize_mask(mask.data(), diff.transform());
    let n_candidates = candidates.len();

    let polygons: Vec<ChangePolygon> = candidates
        .into_par_iter()
        .filter_map(|native_poly| {
            match build_change_polygon(native_poly, kind, &diff, params.min_area_m2) {
                Ok(p) => p,
                Err(e) => {
                    debug!(error = %e, "dropping change polygon");
                    None
                }
            }
        })
        .collect();

    info!(
        candidates = n_candidates,
        polygons = polygons.len(),
        changed_pixels = stats.changed_pixels,
        change_percent = stats.change_percent,
        "change detection complete"
    );

    Ok(ChangeDetectionResult {
        diff,
        mask,
        polygons,
        threshold: params.threshold,
        stats,
        before_scene_id: None,
        after_scene_id: None,
    })
}

fn difference_stats(diff: &Raster<f64>, mask: &Raster<u8>) -> ChangeStats {
    let (mut min, mut max, mut sum, mut count) = (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize);
    for &d in diff.data().iter().filter(|d| !d.is_nan() && **d != 0.0) {
        min = min.min(d);
        max = max.max(d);
        sum += d;
        count += 1;
    }

    let changed_pixels = mask.data().iter().filter(|&&m| m == 1).count();
    let total_pixels = mask.len();
    let change_percent = if total_pixels > 0 {
        changed_pixels as f64 / total_pixels as f64 * 100.0
    } else {
        0.0
    };

    if count == 0 {
        return ChangeStats {
            changed_pixels,
            total_pixels,
            change_percent,
            ..ChangeStats::default()
        };
    }

    ChangeStats {
        mean_diff: sum / count as f64,
        min_diff: min,
        max_diff: max,
        changed_pixels,
        total_pixels,
        change_percent,
    }
}

/// Area in square meters of a polygon in a grid of the given CRS kind
fn metric_area(geometry: &Geometry<f64>, kind: CrsKind) -> Result<f64> {
    let area = match kind {
        CrsKind::Geographic => {
            let centroid = geometry.centroid_point()?;
            let (zone, north) = utm_zone_for(centroid.x(), centroid.y());
            geometry
                .reproject(&Transformer::wgs84_to_utm(zone, north))?
                .planar_area()
        }
        CrsKind::Utm { .. } | CrsKind::WebMercator => geometry.planar_area(),
    };
    if !area.is_finite() || area <= 0.0 {
        return Err(Error::Geometry(format!("degenerate polygon area {}", area)));
    }
    Ok(area)
}

fn build_change_polygon(
    native_poly: Polygon<f64>,
    kind: CrsKind,
    diff: &Raster<f64>,
    min_area_m2: f64,
) -> Result<Option<ChangePolygon>> {
    let native = Geometry::Polygon(native_poly);
    let area = metric_area(&native, kind)?;
    if area < min_area_m2 {
        return Ok(None);
    }

    let Geometry::Polygon(native_poly) = &native else {
        return Err(Error::Geometry("expected polygon".into()));
    };
    let (rows, cols) = diff.shape();
    let values: Vec<f64> = polygon_cells(diff.transform(), rows, cols, native_poly)
        .into_iter()
        .filter_map(|(r, c)| diff.valid_at(r, c))
        .collect();
    let (drop_mean, drop_max) = if values.is_empty() {
        (0.0, 0.0)
    } else {
        (
            values.iter().sum::<f64>() / values.len() as f64,
            values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        )
    };

    let to_wgs84 = Transformer::from_kinds(kind, CrsKind::Geographic);
    let geometry = match native.reproject(&to_wgs84)? {
        Geometry::Polygon(p) => p,
        _ => return Err(Error::Geometry("reprojection changed geometry type".into())),
    };

    Ok(Some(ChangePolygon::new(geometry, area, drop_mean, drop_max)))
}

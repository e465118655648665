//! Normalized Difference Vegetation Index

use crate::maybe_rayon::*;
use georisk_core::io::write_geotiff;
use georisk_core::raster::Raster;
use georisk_core::{Algorithm, Error, Result};
use ndarray::Array2;
use std::path::Path;
use tracing::info;

/// Parameters for NDVI computation
#[derive(Debug, Clone)]
pub struct NdviParams {
    /// Scene identifier carried into the result
    pub scene_id: String,
    /// Acquisition datetime carried into the result
    pub datetime: String,
    /// Value written where the index is undefined (zero denominator or missing band)
    pub nodata_value: f64,
}

impl Default for NdviParams {
    fn default() -> Self {
        Self {
            scene_id: "unknown".to_string(),
            datetime: String::new(),
            nodata_value: 0.0,
        }
    }
}

/// NDVI raster with its scene identity and summary statistics.
///
/// Statistics exclude nodata cells; with no valid cell they fall back to
/// min -1, max 1, mean 0.
#[derive(Debug, Clone)]
pub struct NdviResult {
    pub raster: Raster<f64>,
    pub scene_id: String,
    pub datetime: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl NdviResult {
    /// Write the NDVI raster as GeoTIFF
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_geotiff(&self.raster, path.as_ref())?;
        info!(path = %path.as_ref().display(), mean = self.mean, "saved NDVI raster");
        Ok(())
    }
}

/// NDVI algorithm over a `(red, nir)` band pair
#[derive(Debug, Clone, Default)]
pub struct Ndvi;

impl Algorithm for Ndvi {
    type Input = (Raster<f64>, Raster<f64>);
    type Output = NdviResult;
    type Params = NdviParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "NDVI"
    }

    fn description(&self) -> &'static str {
        "Normalized difference vegetation index (NIR - Red) / (NIR + Red), clipped to [-1, 1]"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (red, nir) = input;
        ndvi(&red, &nir, params)
    }
}

/// Compute NDVI from red and near-infrared bands.
///
/// `NDVI = (NIR - Red) / (NIR + Red)`, clipped to [-1, 1]. Cells with a zero
/// denominator or a missing band value get `params.nodata_value`. CRS and
/// transform are copied from the red band.
pub fn ndvi(red: &Raster<f64>, nir: &Raster<f64>, params: NdviParams) -> Result<NdviResult> {
    if red.shape() != nir.shape() {
        return Err(Error::SizeMismatch {
            er: red.rows(),
            ec: red.cols(),
            ar: nir.rows(),
            ac: nir.cols(),
        });
    }

    let (rows, cols) = red.shape();
    let nodata = params.nodata_value;

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; cols];
            for col in 0..cols {
                let r = unsafe { red.get_unchecked(row, col) };
                let n = unsafe { nir.get_unchecked(row, col) };
                if red.is_nodata(r) || nir.is_nodata(n) {
                    continue;
                }

                let denominator = n + r;
                if denominator == 0.0 {
                    continue;
                }
                row_data[col] = ((n - r) / denominator).clamp(-1.0, 1.0);
            }
            row_data
        })
        .collect();

    let mut raster = red.with_same_meta::<f64>(rows, cols);
    raster.set_nodata(Some(nodata));
    *raster.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    let (mut min, mut max, mut sum, mut count) = (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize);
    for v in raster.valid_values() {
        min = min.min(v);
        max = max.max(v);
        sum += v;
        count += 1;
    }
    let (min, max, mean) = if count > 0 {
        (min, max, sum / count as f64)
    } else {
        (-1.0, 1.0, 0.0)
    };

    info!(scene_id = %params.scene_id, min, max, mean, "NDVI calculated");

    Ok(NdviResult {
        raster,
        scene_id: params.scene_id,
        datetime: params.datetime,
        min,
        max,
        mean,
    })
}

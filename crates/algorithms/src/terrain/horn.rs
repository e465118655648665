//! Slope and aspect from a DEM using Horn's (1981) method
//!
//! ```text
//! a b c
//! d e f
//! g h i
//! ```
//!
//! The gradients are true convolutions (flipped kernels) of the elevation
//! with `kx = [[-1,0,1],[-2,0,2],[-1,0,1]] / 8c` and
//! `ky = [[1,2,1],[0,0,0],[-1,-2,-1]] / 8c`:
//!
//! dz/dx = ((a + 2d + g) - (c + 2f + i)) / (8 * cellsize)
//! dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * cellsize)
//! slope = atan(sqrt(dz/dx² + dz/dy²))
//! aspect = atan2(-dz/dx, dz/dy), as a bearing in [0, 360)
//!
//! A surface falling to the south has aspect 180 and one rising to the
//! east has aspect 90.

use crate::maybe_rayon::*;
use georisk_core::raster::Raster;
use georisk_core::{Algorithm, Error, Result};
use ndarray::Array2;
use tracing::info;

/// Parameters for slope/aspect derivation
#[derive(Debug, Clone, Default)]
pub struct HornParams {
    /// Ground cell size in meters; the DEM's own cell size when `None`
    pub cell_size_m: Option<f64>,
}

/// Slope and aspect rasters, both in degrees with NaN as nodata
#[derive(Debug, Clone)]
pub struct SlopeAspect {
    pub slope: Raster<f64>,
    pub aspect: Raster<f64>,
}

/// Horn slope/aspect algorithm
#[derive(Debug, Clone, Default)]
pub struct Horn;

impl Algorithm for Horn {
    type Input = Raster<f64>;
    type Output = SlopeAspect;
    type Params = HornParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Horn"
    }

    fn description(&self) -> &'static str {
        "Slope and aspect in degrees from a DEM using Horn's 3x3 gradient"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let cell_size = params.cell_size_m.unwrap_or_else(|| input.cell_size());
        slope_aspect(&input, cell_size)
    }
}

/// Compute slope and aspect (degrees) from an elevation grid.
///
/// Border cells reuse the nearest edge cell for missing neighbours. A
/// missing neighbour inside the grid takes the centre value; a missing
/// centre is NaN in both outputs.
pub fn slope_aspect(dem: &Raster<f64>, cell_size_m: f64) -> Result<SlopeAspect> {
    if !(cell_size_m.is_finite() && cell_size_m > 0.0) {
        return Err(Error::invalid_parameter("cell_size_m", cell_size_m, "must be positive"));
    }

    let (rows, cols) = dem.shape();
    let eight_cell_size = 8.0 * cell_size_m;

    let cells: Vec<(f64, f64)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![(f64::NAN, f64::NAN); cols];

            for col in 0..cols {
                let e = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(e) {
                    continue;
                }

                // Nearest-edge padding, then centre substitution for gaps
                let z = |dr: isize, dc: isize| -> f64 {
                    let r = (row as isize + dr).clamp(0, rows as isize - 1) as usize;
                    let c = (col as isize + dc).clamp(0, cols as isize - 1) as usize;
                    let v = unsafe { dem.get_unchecked(r, c) };
                    if dem.is_nodata(v) { e } else { v }
                };

                let (a, b, c) = (z(-1, -1), z(-1, 0), z(-1, 1));
                let (d, f) = (z(0, -1), z(0, 1));
                let (g, h, i) = (z(1, -1), z(1, 0), z(1, 1));

                let dz_dx = ((a + 2.0 * d + g) - (c + 2.0 * f + i)) / eight_cell_size;
                let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / eight_cell_size;

                let slope = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();
                row_data[col] = (slope, normalize_bearing((-dz_dx).atan2(dz_dy).to_degrees()));
            }

            row_data
        })
        .collect();

    let (slope_data, aspect_data): (Vec<f64>, Vec<f64>) = cells.into_iter().unzip();

    let mut slope = dem.with_same_meta::<f64>(rows, cols);
    slope.set_nodata(Some(f64::NAN));
    *slope.data_mut() = Array2::from_shape_vec((rows, cols), slope_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    let mut aspect = dem.with_same_meta::<f64>(rows, cols);
    aspect.set_nodata(Some(f64::NAN));
    *aspect.data_mut() = Array2::from_shape_vec((rows, cols), aspect_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    let (mut min, mut max, mut sum, mut n) = (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize);
    for v in slope.valid_values() {
        min = min.min(v);
        max = max.max(v);
        sum += v;
        n += 1;
    }
    if n > 0 {
        info!(slope_min = min, slope_max = max, slope_mean = sum / n as f64, "slope/aspect calculated");
    }

    Ok(SlopeAspect { slope, aspect })
}

/// Map any angle in degrees into [0, 360)
pub(crate) fn normalize_bearing(deg: f64) -> f64 {
    let a = deg.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to 360; -0.0 becomes 0.0
    if a >= 360.0 { 0.0 } else { a + 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use georisk_core::GeoTransform;

    fn dem_from(f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut dem = Raster::new(10, 10);
        dem.set_transform(GeoTransform::new(0.0, 100.0, 10.0, -10.0));
        for row in 0..10 {
            for col in 0..10 {
                dem.set(row, col, f(row, col)).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_flat_surface() {
        let dem = dem_from(|_, _| 100.0);
        let out = slope_aspect(&dem, 10.0).unwrap();
        assert_relative_eq!(out.slope.get(5, 5).unwrap(), 0.0);
        assert_eq!(out.aspect.get(5, 5).unwrap(), 0.0);
        assert!(out.aspect.get(5, 5).unwrap().is_sign_positive());
    }

    #[test]
    fn test_east_rising_plane_aspect() {
        // +10 m per 10 m cell eastward: 45 degrees, convolved kx gives west minus east
        let dem = dem_from(|_, c| c as f64 * 10.0);
        let out = slope_aspect(&dem, 10.0).unwrap();
        assert_relative_eq!(out.slope.get(5, 5).unwrap(), 45.0, epsilon = 1e-9);
        assert_relative_eq!(out.aspect.get(5, 5).unwrap(), 90.0, epsilon = 1e-9);

        let west_rising = slope_aspect(&dem_from(|_, c| 100.0 - c as f64 * 10.0), 10.0).unwrap();
        assert_relative_eq!(west_rising.aspect.get(5, 5).unwrap(), 270.0, epsilon = 1e-9);
    }

    #[test]
    fn test_south_facing_slope() {
        // Elevation drops with row, i.e. toward the south
        let dem = dem_from(|r, _| 200.0 - r as f64 * 5.0);
        let out = slope_aspect(&dem, 10.0).unwrap();
        assert_relative_eq!(out.aspect.get(4, 4).unwrap(), 180.0, epsilon = 1e-9);
        assert_relative_eq!(out.slope.get(4, 4).unwrap(), 0.5_f64.atan().to_degrees(), epsilon = 1e-9);
    }

    #[test]
    fn test_north_facing_slope() {
        let dem = dem_from(|r, _| r as f64);
        let out = Horn.execute(dem, HornParams { cell_size_m: Some(10.0) }).unwrap();
        let a = out.aspect.get(5, 5).unwrap();
        assert!(a < 1e-9 || a > 360.0 - 1e-9, "aspect {}", a);
    }

    #[test]
    fn test_borders_use_nearest_padding() {
        let dem = dem_from(|_, c| c as f64 * 10.0);
        let out = slope_aspect(&dem, 10.0).unwrap();
        // Left neighbours of the corner clamp onto column 0: 40 / 80 = 0.5
        assert_relative_eq!(out.slope.get(0, 0).unwrap(), 0.5_f64.atan().to_degrees(), epsilon = 1e-9);
        assert_eq!(out.slope.valid_values().count(), 100);
    }

    #[test]
    fn test_nodata_propagates() {
        let mut dem = dem_from(|_, c| c as f64);
        dem.set(5, 5, f64::NAN).unwrap();
        let out = slope_aspect(&dem, 10.0).unwrap();
        assert!(out.slope.get(5, 5).unwrap().is_nan());
        assert!(out.aspect.get(5, 5).unwrap().is_nan());
        // Neighbours stay defined
        assert!(out.slope.get(5, 6).unwrap().is_finite());
    }

    #[test]
    fn test_aspect_range() {
        let dem = dem_from(|r, c| ((r * 7 + c * 13) % 11) as f64 * 3.0);
        let out = slope_aspect(&dem, 10.0).unwrap();
        for a in out.aspect.valid_values() {
            assert!((0.0..360.0).contains(&a));
        }
    }

    #[test]
    fn test_invalid_cell_size() {
        let dem = dem_from(|_, _| 1.0);
        assert!(slope_aspect(&dem, 0.0).is_err());
    }
}

//! Georeferenced raster grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::{s, Array2, ArrayView2};

/// A georeferenced 2D grid of cell values.
///
/// Rows run north to south for the usual north-up transform. The grid knows
/// its affine transform, an optional CRS (absent means WGS84 to the rest of
/// the pipeline) and an optional nodata value.
///
/// ```ignore
/// use georisk_core::{GeoTransform, Raster, CRS};
///
/// let mut ndvi: Raster<f64> = Raster::filled(100, 100, 0.7);
/// ndvi.set_transform(GeoTransform::new(500_000.0, 4_200_000.0, 10.0, -10.0));
/// ndvi.set_crs(Some(CRS::from_epsg(32610)));
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled raster with the default transform
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Raster filled with `value`
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Raster wrapping an existing array
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Empty raster of another cell type sharing this raster's georeferencing
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Replace the cell data, keeping georeferencing. Shapes must match.
    pub fn replace_data<U: RasterElement>(&self, data: Array2<U>) -> Result<Raster<U>> {
        if data.dim() != self.shape() {
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch {
                er: self.rows(),
                ec: self.cols(),
                ar,
                ac,
            });
        }
        Ok(Raster {
            data,
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        })
    }

    /// Builder-style transform setter
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Builder-style CRS setter
    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        let (rows, cols) = self.shape();
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds { row, col, rows, cols }),
        }
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size in CRS units (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Bounds `(min_x, min_y, max_x, max_y)` in CRS units
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Map coordinates of a cell centre
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Fractional pixel position of a map coordinate
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    /// The cell containing map coordinate (x, y), or `None` outside the grid
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.geo_to_pixel(x, y);
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row.floor() as usize, col.floor() as usize);
        (row < self.rows() && col < self.cols()).then_some((row, col))
    }

    /// Whether a value is missing for this raster
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Non-missing value at (row, col), if any
    pub fn valid_at(&self, row: usize, col: usize) -> Option<T> {
        self.data
            .get((row, col))
            .copied()
            .filter(|v| !self.is_nodata(*v))
    }

    /// Copy of the window `rows x cols` starting at (row_off, col_off)
    pub fn window(&self, row_off: usize, col_off: usize, rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 || row_off + rows > self.rows() || col_off + cols > self.cols() {
            return Err(Error::IndexOutOfBounds {
                row: row_off + rows,
                col: col_off + cols,
                rows: self.rows(),
                cols: self.cols(),
            });
        }

        let data = self
            .data
            .slice(s![row_off..row_off + rows, col_off..col_off + cols])
            .to_owned();

        Ok(Self {
            data,
            transform: self.transform.shifted(col_off, row_off),
            crs: self.crs.clone(),
            nodata: self.nodata,
        })
    }

    /// Iterator over all non-missing values as `f64`
    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.data
            .iter()
            .filter(|v| !self.is_nodata(**v))
            .filter_map(|v| v.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utm_grid() -> Raster<f64> {
        let mut r = Raster::new(4, 5);
        r.set_transform(GeoTransform::new(1000.0, 2000.0, 10.0, -10.0));
        for row in 0..4 {
            for col in 0..5 {
                r.set(row, col, (row * 10 + col) as f64).unwrap();
            }
        }
        r
    }

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.shape(), (100, 200));
        assert_eq!(raster.len(), 20_000);
    }

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Raster::<f64>::from_vec(vec![0.0; 5], 2, 3).is_err());
        assert!(Raster::<f64>::from_vec(vec![0.0; 6], 2, 3).is_ok());
    }

    #[test]
    fn test_set_out_of_bounds() {
        let mut r: Raster<u8> = Raster::new(2, 2);
        assert!(r.set(2, 0, 1).is_err());
    }

    #[test]
    fn test_cell_at() {
        let r = utm_grid();
        assert_eq!(r.cell_at(1001.0, 1999.0), Some((0, 0)));
        assert_eq!(r.cell_at(1049.0, 1961.0), Some((3, 4)));
        assert_eq!(r.cell_at(999.0, 1999.0), None);
        assert_eq!(r.cell_at(1051.0, 1999.0), None);
    }

    #[test]
    fn test_window_shifts_transform() {
        let r = utm_grid();
        let w = r.window(1, 2, 2, 3).unwrap();
        assert_eq!(w.shape(), (2, 3));
        assert_eq!(w.get(0, 0).unwrap(), 12.0);
        assert_eq!(w.transform().origin_x, 1020.0);
        assert_eq!(w.transform().origin_y, 1990.0);
        assert!(r.window(3, 0, 2, 1).is_err());
    }

    #[test]
    fn test_valid_values_skip_nan() {
        let mut r = utm_grid();
        r.set(0, 0, f64::NAN).unwrap();
        assert_eq!(r.valid_values().count(), 19);
        assert_eq!(r.valid_at(0, 0), None);
    }
}

//! DEM containers and providers

use super::horn::slope_aspect;
use georisk_core::io::read_geotiff;
use georisk_core::raster::{GeoTransform, Raster};
use georisk_core::{BoundingBox, CrsKind, Error, Result, Transformer, CRS};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Meters per degree of latitude, and of longitude at the equator
const METERS_PER_DEGREE_LAT: f64 = 110_574.0;
const METERS_PER_DEGREE_LON: f64 = 111_320.0;

/// Elevation grid with optional derived slope/aspect grids.
///
/// Loaded once per run and shared read-only. `resolution_m` is the ground
/// cell size used by the slope computation.
#[derive(Debug, Clone)]
pub struct DemData {
    pub elevation: Raster<f64>,
    pub slope: Option<Raster<f64>>,
    pub aspect: Option<Raster<f64>>,
    pub resolution_m: f64,
}

impl DemData {
    /// Wrap an elevation grid, deriving its ground resolution.
    ///
    /// Geographic grids convert degrees to meters at their centre latitude.
    pub fn new(elevation: Raster<f64>) -> Result<Self> {
        if elevation.is_empty() {
            return Err(Error::DataUnavailable("empty DEM".into()));
        }
        let resolution_m = ground_resolution(&elevation)?;
        Ok(Self {
            elevation,
            slope: None,
            aspect: None,
            resolution_m,
        })
    }

    /// CRS of the grids; WGS84 when the elevation raster carries none
    pub fn crs(&self) -> CRS {
        self.elevation.crs().cloned().unwrap_or_else(CRS::wgs84)
    }

    pub fn transform(&self) -> &GeoTransform {
        self.elevation.transform()
    }

    /// Bounds in the DEM's own CRS
    pub fn bounds(&self) -> BoundingBox {
        let (min_x, min_y, max_x, max_y) = self.elevation.bounds();
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    pub fn has_derivatives(&self) -> bool {
        self.slope.is_some() && self.aspect.is_some()
    }

    /// Fill slope and aspect with Horn's method at `resolution_m`
    pub fn with_slope_aspect(mut self) -> Result<Self> {
        let out = slope_aspect(&self.elevation, self.resolution_m)?;
        self.slope = Some(out.slope);
        self.aspect = Some(out.aspect);
        Ok(self)
    }
}

fn ground_resolution(raster: &Raster<f64>) -> Result<f64> {
    let gt = raster.transform();
    let kind = raster.crs().map(CRS::kind).transpose()?.unwrap_or(CrsKind::Geographic);
    let resolution = match kind {
        CrsKind::Geographic => {
            let (_, min_y, _, max_y) = raster.bounds();
            let lat = ((min_y + max_y) / 2.0).to_radians();
            let res_x = gt.pixel_width.abs() * METERS_PER_DEGREE_LON * lat.cos();
            let res_y = gt.pixel_height.abs() * METERS_PER_DEGREE_LAT;
            (res_x + res_y) / 2.0
        }
        CrsKind::Utm { .. } | CrsKind::WebMercator => gt.mean_resolution(),
    };
    if !(resolution.is_finite() && resolution > 0.0) {
        return Err(Error::invalid_parameter("resolution_m", resolution, "must be positive"));
    }
    Ok(resolution)
}

/// Source of elevation data for a WGS84 bounding box.
///
/// `Ok(None)` means no data for the area; callers continue without terrain.
pub trait DemProvider: Send + Sync {
    fn dem_for_bbox(&self, bbox: &BoundingBox) -> Result<Option<DemData>>;
}

/// DEM read from a single GeoTIFF on disk, clipped per request
#[derive(Debug, Clone)]
pub struct LocalDemProvider {
    path: PathBuf,
}

impl LocalDemProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DemProvider for LocalDemProvider {
    fn dem_for_bbox(&self, bbox: &BoundingBox) -> Result<Option<DemData>> {
        if !self.path.exists() {
            warn!(path = %self.path.display(), "local DEM file not found");
            return Ok(None);
        }

        let raster: Raster<f64> = read_geotiff(&self.path)?;
        let Some(clipped) = clip_to_bbox(&raster, bbox)? else {
            warn!(path = %self.path.display(), ?bbox, "DEM does not cover bounding box");
            return Ok(None);
        };

        let dem = DemData::new(clipped)?;
        info!(
            rows = dem.elevation.rows(),
            cols = dem.elevation.cols(),
            crs = %dem.crs(),
            resolution_m = dem.resolution_m,
            "DEM loaded"
        );
        Ok(Some(dem))
    }
}

/// Window of `raster` covering a WGS84 bounding box, `None` without overlap.
///
/// All four bbox corners are projected into the raster CRS and the window
/// is the pixel envelope of their extent.
pub fn clip_to_bbox(raster: &Raster<f64>, bbox: &BoundingBox) -> Result<Option<Raster<f64>>> {
    let crs = raster.crs().cloned().unwrap_or_else(CRS::wgs84);
    let to_native = Transformer::new(&CRS::wgs84(), &crs)?;

    let corners = [
        (bbox.min_x, bbox.min_y),
        (bbox.min_x, bbox.max_y),
        (bbox.max_x, bbox.min_y),
        (bbox.max_x, bbox.max_y),
    ];
    let pixels: Vec<(f64, f64)> = corners
        .iter()
        .map(|&(x, y)| {
            let (nx, ny) = to_native.transform(x, y);
            raster.geo_to_pixel(nx, ny)
        })
        .collect();
    if pixels.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
        return Err(Error::Geometry("bounding box does not project into DEM CRS".into()));
    }

    let min_col = pixels.iter().map(|p| p.0).fold(f64::INFINITY, f64::min).floor().max(0.0);
    let max_col = pixels.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max).ceil();
    let min_row = pixels.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).floor().max(0.0);
    let max_row = pixels.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max).ceil();

    let max_col = max_col.min(raster.cols() as f64);
    let max_row = max_row.min(raster.rows() as f64);
    if max_col <= min_col || max_row <= min_row {
        return Ok(None);
    }

    let (c0, r0) = (min_col as usize, min_row as usize);
    let (c1, r1) = (max_col as usize, max_row as usize);
    debug!(row_off = r0, col_off = c0, rows = r1 - r0, cols = c1 - c0, "clipping DEM");
    raster.window(r0, c0, r1 - r0, c1 - c0).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use georisk_core::io::write_geotiff;

    fn utm_dem() -> Raster<f64> {
        // 100 x 100 cells of 30 m in zone 33N, origin near 15 E, 45 N
        let mut dem = Raster::new(100, 100)
            .with_transform(GeoTransform::new(500_000.0, 4_985_000.0, 30.0, -30.0))
            .with_crs(CRS::from_epsg(32633));
        for row in 0..100 {
            for col in 0..100 {
                dem.set(row, col, 1000.0 - row as f64).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_resolution_projected_and_geographic() {
        let dem = DemData::new(utm_dem()).unwrap();
        assert_relative_eq!(dem.resolution_m, 30.0);

        let geo = Raster::filled(10, 10, 5.0)
            .with_transform(GeoTransform::new(10.0, 60.05, 0.001, -0.001))
            .with_crs(CRS::wgs84());
        let dem = DemData::new(geo).unwrap();
        // At 60 N a longitude degree is half as long
        let expected = (0.001 * 111_320.0 * 0.5 + 0.001 * 110_574.0) / 2.0;
        assert_relative_eq!(dem.resolution_m, expected, max_relative = 1e-3);
    }

    #[test]
    fn test_with_slope_aspect() {
        let dem = DemData::new(utm_dem()).unwrap().with_slope_aspect().unwrap();
        assert!(dem.has_derivatives());
        let aspect = dem.aspect.as_ref().unwrap().get(50, 50).unwrap();
        // Elevation falls toward the south
        assert_relative_eq!(aspect, 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_clip_to_bbox() {
        let dem = utm_dem();
        let bbox = BoundingBox::new(15.001, 45.0, 15.01, 45.01);
        let clipped = clip_to_bbox(&dem, &bbox).unwrap().unwrap();
        assert!(clipped.rows() < 100 && clipped.cols() < 100);
        assert_eq!(clipped.crs().and_then(|c| c.epsg()), Some(32633));

        let far = BoundingBox::new(-70.0, -30.0, -69.9, -29.9);
        // Far outside the zone the window is empty
        assert!(matches!(clip_to_bbox(&dem, &far), Ok(None) | Err(_)));
    }

    #[test]
    fn test_local_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        write_geotiff(&utm_dem(), &path).unwrap();

        let provider = LocalDemProvider::new(&path);
        let bbox = BoundingBox::new(15.0, 44.9, 15.05, 45.0);
        let dem = provider.dem_for_bbox(&bbox).unwrap().unwrap();
        assert_relative_eq!(dem.resolution_m, 30.0);

        let missing = LocalDemProvider::new(dir.path().join("nope.tif"));
        assert!(missing.dem_for_bbox(&bbox).unwrap().is_none());
    }
}

//! Polygon rasterization by cell-centre test

use crate::raster::GeoTransform;
use geo::{BoundingRect, Contains};
use geo_types::{Point, Polygon};

/// Cells `(row, col)` of a `rows x cols` grid whose centres fall inside `polygon`.
///
/// The polygon must be expressed in the grid's CRS. Only the window covering
/// the polygon's bounding box is scanned.
pub fn polygon_cells(
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    polygon: &Polygon<f64>,
) -> Vec<(usize, usize)> {
    let Some(rect) = polygon.bounding_rect() else {
        return Vec::new();
    };
    if rows == 0 || cols == 0 {
        return Vec::new();
    }

    // Pixel-space envelope of the bbox corners, for any transform orientation
    let corners = [
        transform.geo_to_pixel(rect.min().x, rect.min().y),
        transform.geo_to_pixel(rect.min().x, rect.max().y),
        transform.geo_to_pixel(rect.max().x, rect.min().y),
        transform.geo_to_pixel(rect.max().x, rect.max().y),
    ];
    if corners.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
        return Vec::new();
    }

    let min_col = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_col = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_row = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_row = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    if max_col < 0.0 || max_row < 0.0 || min_col >= cols as f64 || min_row >= rows as f64 {
        return Vec::new();
    }

    let c0 = min_col.floor().max(0.0) as usize;
    let r0 = min_row.floor().max(0.0) as usize;
    let c1 = (max_col.ceil() as usize).min(cols);
    let r1 = (max_row.ceil() as usize).min(rows);

    let mut cells = Vec::new();
    for row in r0..r1 {
        for col in c0..c1 {
            let (x, y) = transform.pixel_to_geo(col, row);
            if polygon.contains(&Point::new(x, y)) {
                cells.push((row, col));
            }
        }
    }
    cells
}

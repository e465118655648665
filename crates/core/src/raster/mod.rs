//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod mask;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::Raster;
pub use mask::polygon_cells;

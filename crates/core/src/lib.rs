//! # GeoRisk Core
//!
//! Core types, traits and I/O for the GeoRisk infrastructure change-risk
//! library.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid for vegetation-index and elevation data
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS` and `Transformer`: WGS84, UTM and Web Mercator handling
//! - `GeometryExt`: centroid, distance, area, bounds and reprojection
//! - The error taxonomy shared by every pipeline stage
//! - GeoTIFF I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{CrsKind, Transformer, CRS};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{BoundingBox, GeometryExt};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{CrsKind, Transformer, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{BoundingBox, GeometryExt};
    pub use crate::Algorithm;
}

/// Core trait for the raster stages of the pipeline.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(
        &self,
        input: Self::Input,
        params: Self::Params,
    ) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}

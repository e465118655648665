//! Imagery analysis algorithms
//!
//! Vegetation index computation feeding change detection.

mod ndvi;

pub use ndvi::{ndvi, Ndvi, NdviParams, NdviResult};

//! Terrain analysis for change polygons
//!
//! - Horn slope/aspect derivation
//! - DEM containers and providers
//! - Point, polygon and change-to-asset terrain queries

mod analyzer;
mod dem;
mod horn;

pub use analyzer::{
    circular_mean, compass_direction, DirectionalTerrainMetrics, PolygonTerrainStats,
    TerrainAnalyzer, TerrainData, UPSLOPE_THRESHOLD_M,
};
pub use dem::{clip_to_bbox, DemData, DemProvider, LocalDemProvider};
pub use horn::{slope_aspect, Horn, HornParams, SlopeAspect};

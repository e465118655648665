//! # GeoRisk Algorithms
//!
//! Change-risk analysis for infrastructure near vegetation change.
//!
//! ## Stages
//!
//! - **imagery**: NDVI from red and near-infrared bands
//! - **change**: Index differencing, thresholding, vectorization, change typing
//! - **terrain**: Horn slope/aspect, DEM providers, polygon and directional terrain queries
//! - **classification**: Land cover and landslide model capabilities
//! - **proximity**: Assets near a change polygon, with elevation relationship
//! - **scoring**: Configurable, transparent 0-100 risk scores
//! - **pipeline**: Batch enrichment and assessment of a processing run

mod maybe_rayon;

pub mod change;
pub mod classification;
pub mod imagery;
pub mod pipeline;
pub mod proximity;
pub mod scoring;
pub mod terrain;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::change::{
        classify_change, detect_changes, detect_ndvi_changes, ChangeDetectionResult,
        ChangeDetector, ChangeParams, ChangePolygon, ChangeType,
    };
    pub use crate::classification::{
        apply_land_cover, apply_landslide, Classifier, LandCoverModel, LandslideModel,
    };
    pub use crate::imagery::{ndvi, NdviParams, NdviResult};
    pub use crate::pipeline::{
        assess_changes, batch_proximity, changes_bbox, enrich_terrain, load_dem, Assessment,
        RiskEvent,
    };
    pub use crate::proximity::{
        AssetRecord, Criticality, ProximityFinder, ProximityParams, ProximityResult,
    };
    pub use crate::scoring::{RiskLevel, RiskScore, RiskScorer, ScoringConfig};
    pub use crate::terrain::{
        slope_aspect, DemData, DemProvider, LocalDemProvider, TerrainAnalyzer,
    };
    pub use georisk_core::prelude::*;
}

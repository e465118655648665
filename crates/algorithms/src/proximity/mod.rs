//! Proximity search between change polygons and infrastructure assets

mod asset;
mod finder;

pub use asset::{assets_from_feature_collection, AssetRecord, Criticality};
pub use finder::{ProximityFinder, ProximityParams, ProximityResult};

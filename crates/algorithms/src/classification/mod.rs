//! ML classifier capabilities and change-polygon enrichment
//!
//! Models are owned by the caller and handed in wrapped in a
//! [`Classifier`], which is either a ready model or an explanation of why
//! none is available. Enrichment never fails the batch: a model error
//! leaves that polygon without classification context.

mod landcover;
mod landslide;

pub use landcover::{apply_land_cover, LandCoverClass, LandCoverModel, LandCoverPrediction};
pub use landslide::{
    apply_landslide, LandslideModel, LandslidePrediction, LANDSLIDE_MIN_SLOPE_DEG,
};

/// A model capability that may be missing at runtime
#[derive(Debug, Clone)]
pub enum Classifier<M> {
    Available(M),
    Unavailable { reason: String },
}

impl<M> Classifier<M> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Classifier::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Classifier::Available(_))
    }

    pub fn model(&self) -> Option<&M> {
        match self {
            Classifier::Available(m) => Some(m),
            Classifier::Unavailable { .. } => None,
        }
    }
}

impl<M> From<Option<M>> for Classifier<M> {
    fn from(model: Option<M>) -> Self {
        match model {
            Some(m) => Classifier::Available(m),
            None => Classifier::unavailable("no model provided"),
        }
    }
}

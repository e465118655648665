//! Landslide detection on steep change polygons

use super::Classifier;
use crate::change::{ChangePolygon, ChangeType};
use crate::maybe_rayon::*;
use crate::terrain::DemData;
use georisk_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Polygons flatter than this are never sent to the landslide model
pub const LANDSLIDE_MIN_SLOPE_DEG: f64 = 10.0;

/// Share of the detection threshold the mean probability must exceed
const MEAN_THRESHOLD_RATIO: f64 = 0.7;
/// Share of pixels that must exceed the full threshold
const MIN_PIXEL_FRACTION: f64 = 0.15;

/// Output of a landslide model for one polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandslidePrediction {
    pub is_landslide: bool,
    /// Mean per-pixel probability
    pub landslide_probability: f64,
    pub model_version: String,
    #[serde(default)]
    pub max_probability: f64,
    #[serde(default)]
    pub pixel_fraction: f64,
}

impl LandslidePrediction {
    /// Decide from a per-pixel probability map.
    ///
    /// A polygon is a landslide when the mean probability exceeds 70% of
    /// `threshold` and more than 15% of pixels exceed `threshold`.
    pub fn from_probabilities(probabilities: &[f64], threshold: f64, model_version: impl Into<String>) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(Error::Classification("empty probability map".into()));
        }
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(Error::invalid_parameter("threshold", threshold, "must be within (0, 1)"));
        }

        let n = probabilities.len() as f64;
        let mean = probabilities.iter().sum::<f64>() / n;
        if !mean.is_finite() {
            return Err(Error::Classification("non-finite probability".into()));
        }
        let max = probabilities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let fraction = probabilities.iter().filter(|&&p| p > threshold).count() as f64 / n;

        Ok(Self {
            is_landslide: mean > threshold * MEAN_THRESHOLD_RATIO && fraction > MIN_PIXEL_FRACTION,
            landslide_probability: mean,
            model_version: model_version.into(),
            max_probability: max,
            pixel_fraction: fraction,
        })
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.landslide_probability) {
            return Err(Error::Classification(format!(
                "landslide probability {} outside [0, 1]",
                self.landslide_probability
            )));
        }
        Ok(())
    }
}

/// A landslide detector using imagery and terrain around a change polygon
pub trait LandslideModel: Send + Sync {
    fn model_version(&self) -> &str;

    fn detect(&self, polygon: &ChangePolygon, dem: &DemData) -> Result<LandslidePrediction>;
}

impl<M: LandslideModel + ?Sized> LandslideModel for &M {
    fn model_version(&self) -> &str {
        (**self).model_version()
    }

    fn detect(&self, polygon: &ChangePolygon, dem: &DemData) -> Result<LandslidePrediction> {
        (**self).detect(polygon, dem)
    }
}

/// Run landslide detection on polygons with a mean slope of at least
/// [`LANDSLIDE_MIN_SLOPE_DEG`]; positive detections become
/// [`ChangeType::LandslideDebris`].
///
/// Returns the number of polygons marked as landslides.
pub fn apply_landslide<M: LandslideModel>(
    classifier: &Classifier<M>,
    polygons: &mut [ChangePolygon],
    dem: &DemData,
) -> usize {
    let model = match classifier {
        Classifier::Available(m) => m,
        Classifier::Unavailable { reason } => {
            info!(%reason, "landslide detection skipped");
            return 0;
        }
    };

    let candidates = polygons
        .iter()
        .filter(|c| c.slope_degree_mean.unwrap_or(0.0) >= LANDSLIDE_MIN_SLOPE_DEG)
        .count();

    let detected = polygons
        .into_par_iter()
        .enumerate()
        .filter(|(_, c)| c.slope_degree_mean.unwrap_or(0.0) >= LANDSLIDE_MIN_SLOPE_DEG)
        .map(|(index, change)| {
            match model.detect(change, dem).and_then(|p| p.validate().map(|_| p)) {
                Ok(p) if p.is_landslide => {
                    change.change_type = ChangeType::LandslideDebris;
                    change.ml_confidence = Some(p.landslide_probability);
                    change.ml_model_version = Some(p.model_version);
                    true
                }
                Ok(_) => false,
                Err(e) => {
                    warn!(polygon = index, error = %e, "landslide detection failed");
                    false
                }
            }
        })
        .filter(|&hit| hit)
        .count();

    info!(
        candidates,
        detected,
        model_version = model.model_version(),
        "landslide detection complete"
    );
    detected
}

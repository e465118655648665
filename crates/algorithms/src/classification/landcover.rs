//! Land cover classification

use super::Classifier;
use crate::change::{classify_change, ChangePolygon};
use crate::maybe_rayon::*;
use georisk_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

/// EuroSAT land cover classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LandCoverClass {
    AnnualCrop,
    Forest,
    HerbaceousVegetation,
    Highway,
    Industrial,
    Pasture,
    PermanentCrop,
    Residential,
    River,
    SeaLake,
}

impl LandCoverClass {
    /// In model output order
    pub const ALL: [LandCoverClass; 10] = [
        LandCoverClass::AnnualCrop,
        LandCoverClass::Forest,
        LandCoverClass::HerbaceousVegetation,
        LandCoverClass::Highway,
        LandCoverClass::Industrial,
        LandCoverClass::Pasture,
        LandCoverClass::PermanentCrop,
        LandCoverClass::Residential,
        LandCoverClass::River,
        LandCoverClass::SeaLake,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LandCoverClass::AnnualCrop => "AnnualCrop",
            LandCoverClass::Forest => "Forest",
            LandCoverClass::HerbaceousVegetation => "HerbaceousVegetation",
            LandCoverClass::Highway => "Highway",
            LandCoverClass::Industrial => "Industrial",
            LandCoverClass::Pasture => "Pasture",
            LandCoverClass::PermanentCrop => "PermanentCrop",
            LandCoverClass::Residential => "Residential",
            LandCoverClass::River => "River",
            LandCoverClass::SeaLake => "SeaLake",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }

    /// Class for a model output index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for LandCoverClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a land cover model for one polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandCoverPrediction {
    pub dominant_class: String,
    pub confidence: f64,
    pub model_version: String,
    /// Per-class probabilities, when the model reports them
    #[serde(default)]
    pub class_probabilities: BTreeMap<String, f64>,
}

impl LandCoverPrediction {
    /// Prediction from a softmax vector in [`LandCoverClass::ALL`] order
    pub fn from_probabilities(probabilities: &[f64], model_version: impl Into<String>) -> Result<Self> {
        if probabilities.len() != LandCoverClass::ALL.len() {
            return Err(Error::Classification(format!(
                "expected {} class probabilities, got {}",
                LandCoverClass::ALL.len(),
                probabilities.len()
            )));
        }

        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, p)| p.is_finite())
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| Error::Classification("no finite class probability".into()))?;

        let dominant = LandCoverClass::from_index(index)
            .ok_or_else(|| Error::Classification(format!("class index {} out of range", index)))?;

        Ok(Self {
            dominant_class: dominant.to_string(),
            confidence,
            model_version: model_version.into(),
            class_probabilities: LandCoverClass::ALL
                .iter()
                .zip(probabilities)
                .map(|(c, &p)| (c.to_string(), p))
                .collect(),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.dominant_class.trim().is_empty() {
            return Err(Error::Classification("empty land cover class".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::Classification(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// A land cover classifier for change polygons
pub trait LandCoverModel: Send + Sync {
    fn model_version(&self) -> &str;

    fn classify(&self, polygon: &ChangePolygon) -> Result<LandCoverPrediction>;
}

impl<M: LandCoverModel + ?Sized> LandCoverModel for &M {
    fn model_version(&self) -> &str {
        (**self).model_version()
    }

    fn classify(&self, polygon: &ChangePolygon) -> Result<LandCoverPrediction> {
        (**self).classify(polygon)
    }
}

/// Attach land cover to every polygon the model can classify, then
/// re-derive each classified polygon's change type with that context.
///
/// Returns the number of polygons classified. Failing polygons are logged
/// and left untouched.
pub fn apply_land_cover<M: LandCoverModel>(classifier: &Classifier<M>, polygons: &mut [ChangePolygon]) -> usize {
    let model = match classifier {
        Classifier::Available(m) => m,
        Classifier::Unavailable { reason } => {
            info!(%reason, "land cover classification skipped");
            return 0;
        }
    };

    let total = polygons.len();
    let classified = polygons
        .into_par_iter()
        .enumerate()
        .map(|(index, change)| {
            match model.classify(change).and_then(|p| p.validate().map(|_| p)) {
                Ok(prediction) => {
                    let change_type = classify_change(change.ndvi_drop_mean, Some(prediction.dominant_class.as_str()));
                    change.change_type = change_type;
                    change.land_cover_class = Some(prediction.dominant_class);
                    change.ml_confidence = Some(prediction.confidence);
                    change.ml_model_version = Some(prediction.model_version);
                    true
                }
                Err(e) => {
                    warn!(polygon = index, error = %e, "land cover classification failed");
                    false
                }
            }
        })
        .filter(|&ok| ok)
        .count();

    info!(
        classified,
        total,
        model_version = model.model_version(),
        "land cover classification complete"
    );
    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeType;
    use geo::{LineString, Polygon};

    struct FixedModel {
        class: &'static str,
        confidence: f64,
    }

    impl LandCoverModel for FixedModel {
        fn model_version(&self) -> &str {
            "eurosat-test-1"
        }

        fn classify(&self, polygon: &ChangePolygon) -> Result<LandCoverPrediction> {
            if polygon.area_sq_meters > 1e6 {
                return Err(Error::Classification("patch too large".into()));
            }
            Ok(LandCoverPrediction {
                dominant_class: self.class.to_string(),
                confidence: self.confidence,
                model_version: self.model_version().to_string(),
                class_probabilities: BTreeMap::new(),
            })
        }
    }

    fn change(area: f64, drop: f64) -> ChangePolygon {
        let ring = LineString::from(vec![(0.0, 0.0), (0.001, 0.0), (0.001, 0.001), (0.0, 0.0)]);
        ChangePolygon::new(Polygon::new(ring, vec![]), area, drop, drop)
    }

    #[test]
    fn test_class_names() {
        assert_eq!(LandCoverClass::from_name("SeaLake"), Some(LandCoverClass::SeaLake));
        assert_eq!(LandCoverClass::from_name("Glacier"), None);
        assert_eq!(LandCoverClass::from_index(1), Some(LandCoverClass::Forest));
        assert_eq!(LandCoverClass::from_index(10), None);
    }

    #[test]
    fn test_prediction_from_probabilities() {
        let mut probs = vec![0.01; 10];
        probs[6] = 0.91;
        let p = LandCoverPrediction::from_probabilities(&probs, "v2").unwrap();
        assert_eq!(p.dominant_class, "PermanentCrop");
        assert_eq!(p.confidence, 0.91);
        assert_eq!(p.class_probabilities.len(), 10);

        assert!(LandCoverPrediction::from_probabilities(&[0.5, 0.5], "v2").is_err());
        assert!(LandCoverPrediction::from_probabilities(&[f64::NAN; 10], "v2").is_err());
    }

    #[test]
    fn test_apply_reclassifies_with_context() {
        let model = FixedModel { class: "Forest", confidence: 0.8 };
        let mut polygons = vec![change(10_000.0, -0.5), change(2e6, -0.5)];

        let classified = apply_land_cover(&Classifier::Available(&model), &mut polygons);
        assert_eq!(classified, 1);

        assert_eq!(polygons[0].land_cover_class.as_deref(), Some("Forest"));
        assert_eq!(polygons[0].change_type, ChangeType::FireBurnScar);
        assert_eq!(polygons[0].ml_confidence, Some(0.8));
        assert_eq!(polygons[0].ml_model_version.as_deref(), Some("eurosat-test-1"));

        // Failed polygon stays neutral
        assert_eq!(polygons[1].land_cover_class, None);
        assert_eq!(polygons[1].change_type, ChangeType::VegetationLoss);
    }

    #[test]
    fn test_invalid_confidence_is_rejected() {
        let model = FixedModel { class: "Pasture", confidence: 1.7 };
        let mut polygons = vec![change(10_000.0, -0.3)];
        assert_eq!(apply_land_cover(&Classifier::Available(model), &mut polygons), 0);
        assert_eq!(polygons[0].land_cover_class, None);
    }

    #[test]
    fn test_unavailable_is_noop() {
        let mut polygons = vec![change(10_000.0, -0.3)];
        let classifier: Classifier<FixedModel> = Classifier::unavailable("torch missing");
        assert_eq!(apply_land_cover(&classifier, &mut polygons), 0);
        assert_eq!(polygons[0].change_type, ChangeType::VegetationLoss);
    }
}

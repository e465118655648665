//! Change type taxonomy and rule-based classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Moderate-loss band upper edge (strict)
const MODERATE_DROP: f64 = -0.2;
/// Severe-loss band upper edge (strict)
const SEVERE_DROP: f64 = -0.4;
/// Gain threshold (strict)
const GAIN: f64 = 0.2;

/// Kind of vegetation change, with fixed integer codes 0..=6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChangeType {
    #[default]
    Unknown,
    VegetationLoss,
    VegetationGain,
    FireBurnScar,
    DroughtStress,
    AgriculturalChange,
    LandslideDebris,
}

impl ChangeType {
    pub const ALL: [ChangeType; 7] = [
        ChangeType::Unknown,
        ChangeType::VegetationLoss,
        ChangeType::VegetationGain,
        ChangeType::FireBurnScar,
        ChangeType::DroughtStress,
        ChangeType::AgriculturalChange,
        ChangeType::LandslideDebris,
    ];

    /// Integer code used in persisted records
    pub fn code(self) -> u8 {
        match self {
            ChangeType::Unknown => 0,
            ChangeType::VegetationLoss => 1,
            ChangeType::VegetationGain => 2,
            ChangeType::FireBurnScar => 3,
            ChangeType::DroughtStress => 4,
            ChangeType::AgriculturalChange => 5,
            ChangeType::LandslideDebris => 6,
        }
    }

    /// Decode an integer code; anything out of range is `Unknown`
    pub fn from_code(code: i64) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|t| i64::from(t.code()) == code)
            .unwrap_or_default()
    }

    /// Decode a label; unrecognized labels are `Unknown`
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == name)
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Unknown => "Unknown",
            ChangeType::VegetationLoss => "VegetationLoss",
            ChangeType::VegetationGain => "VegetationGain",
            ChangeType::FireBurnScar => "FireBurnScar",
            ChangeType::DroughtStress => "DroughtStress",
            ChangeType::AgriculturalChange => "AgriculturalChange",
            ChangeType::LandslideDebris => "LandslideDebris",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

fn is_crop(land_cover: &str) -> bool {
    matches!(land_cover, "AnnualCrop" | "PermanentCrop")
}

fn is_grassland(land_cover: &str) -> bool {
    matches!(land_cover, "HerbaceousVegetation" | "Herbaceous" | "Pasture")
}

/// Classify a change from its mean index difference and optional land cover.
///
/// Band edges are strict: a drop of exactly -0.4 is moderate, exactly -0.2
/// or exactly 0.2 is `Unknown`. Grassland classes only refine the moderate
/// band.
pub fn classify_change(ndvi_drop: f64, land_cover: Option<&str>) -> ChangeType {
    if ndvi_drop < SEVERE_DROP {
        match land_cover {
            Some("Forest") => ChangeType::FireBurnScar,
            Some(lc) if is_crop(lc) => ChangeType::AgriculturalChange,
            _ => ChangeType::VegetationLoss,
        }
    } else if ndvi_drop < MODERATE_DROP {
        match land_cover {
            Some(lc) if is_crop(lc) => ChangeType::AgriculturalChange,
            Some(lc) if is_grassland(lc) => ChangeType::DroughtStress,
            _ => ChangeType::VegetationLoss,
        }
    } else if ndvi_drop > GAIN {
        ChangeType::VegetationGain
    } else {
        ChangeType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_a_bijection() {
        for (i, t) in ChangeType::ALL.iter().enumerate() {
            assert_eq!(t.code() as usize, i);
            assert_eq!(ChangeType::from_code(i as i64), *t);
            assert_eq!(ChangeType::from_name(t.as_str()), *t);
        }
        assert_eq!(ChangeType::from_code(7), ChangeType::Unknown);
        assert_eq!(ChangeType::from_code(-1), ChangeType::Unknown);
        assert_eq!("Mudslide".parse::<ChangeType>().unwrap(), ChangeType::Unknown);
    }

    #[test]
    fn test_strict_band_edges() {
        assert_eq!(classify_change(-0.2, None), ChangeType::Unknown);
        assert_eq!(classify_change(0.2, None), ChangeType::Unknown);
        assert_eq!(classify_change(-0.4, None), ChangeType::VegetationLoss);
        assert_eq!(classify_change(-0.4, Some("Forest")), ChangeType::VegetationLoss);
        assert_eq!(classify_change(0.25, Some("Forest")), ChangeType::VegetationGain);
    }

    #[test]
    fn test_land_cover_refinement() {
        assert_eq!(classify_change(-0.5, Some("Forest")), ChangeType::FireBurnScar);
        assert_eq!(classify_change(-0.5, Some("AnnualCrop")), ChangeType::AgriculturalChange);
        assert_eq!(classify_change(-0.3, Some("PermanentCrop")), ChangeType::AgriculturalChange);
        assert_eq!(classify_change(-0.3, Some("Pasture")), ChangeType::DroughtStress);
        assert_eq!(classify_change(-0.3, Some("HerbaceousVegetation")), ChangeType::DroughtStress);
        // Grassland refinement does not reach the severe band
        assert_eq!(classify_change(-0.5, Some("Pasture")), ChangeType::VegetationLoss);
        assert_eq!(classify_change(-0.3, Some("Industrial")), ChangeType::VegetationLoss);
        assert_eq!(classify_change(-0.1, Some("Forest")), ChangeType::Unknown);
    }
}

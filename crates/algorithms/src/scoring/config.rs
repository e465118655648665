//! Scoring configuration: defaults, partial JSON overrides and validation

use crate::proximity::Criticality;
use georisk_core::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One row of a threshold table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Threshold {
    #[serde(alias = "distance_m", alias = "delta", alias = "area_m2", alias = "slope_deg")]
    pub value: f64,
    pub points: i32,
    pub reason_code: String,
}

impl Threshold {
    pub fn new(value: f64, points: i32, reason_code: impl Into<String>) -> Self {
        Self {
            value,
            points,
            reason_code: reason_code.into(),
        }
    }
}

/// Additive factor scored from a table, most severe row first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdFactor {
    pub max_points: i32,
    pub thresholds: Vec<Threshold>,
}

/// Directional modifier applied to the base slope points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectionalSlopeConfig {
    pub max_points: i32,
    pub upslope_threshold_m: f64,
    pub downslope_threshold_m: f64,
    pub upslope_multiplier_base: f64,
    pub upslope_multiplier_max: f64,
    pub upslope_elev_scale: f64,
    pub downslope_multiplier_base: f64,
    pub downslope_multiplier_min: f64,
    pub downslope_elev_scale: f64,
}

/// Half-open bearing range `[min_deg, max_deg)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AspectRange {
    pub min_deg: f64,
    pub max_deg: f64,
    pub points: i32,
    pub reason_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AspectConfig {
    pub max_points: i32,
    /// Checked in order; the first containing range wins
    pub ranges: Vec<AspectRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LandCoverConfig {
    /// Per-class multipliers; unlisted classes are 1.0
    pub multipliers: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LandslideConfig {
    pub multiplier: f64,
    pub upslope_boost: f64,
    pub min_slope_deg: f64,
    pub max_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriticalityConfig {
    pub max_points: i32,
    /// Keyed by tier code 0..=3; a missing tier is 1.0
    pub multipliers: BTreeMap<u8, f64>,
}

/// Inclusive score band for a risk level name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskLevelBand {
    pub name: String,
    pub min_score: i32,
    pub max_score: i32,
}

impl RiskLevelBand {
    pub fn new(name: impl Into<String>, min_score: i32, max_score: i32) -> Self {
        Self {
            name: name.into(),
            min_score,
            max_score,
        }
    }
}

/// Immutable scoring configuration.
///
/// Only obtainable through [`ScoringConfigBuilder::build`] (or
/// `Default`), so every instance has passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringConfig {
    distance: ThresholdFactor,
    ndvi_drop: ThresholdFactor,
    area: ThresholdFactor,
    slope: ThresholdFactor,
    directional_slope: DirectionalSlopeConfig,
    aspect: AspectConfig,
    land_cover: LandCoverConfig,
    landslide: LandslideConfig,
    criticality: CriticalityConfig,
    risk_levels: Vec<RiskLevelBand>,
}

fn table(max_points: i32, rows: &[(f64, i32, &str)]) -> ThresholdFactor {
    ThresholdFactor {
        max_points,
        thresholds: rows
            .iter()
            .map(|&(v, p, code)| Threshold::new(v, p, code))
            .collect(),
    }
}

fn range(min_deg: f64, max_deg: f64, points: i32, reason_code: &str) -> AspectRange {
    AspectRange {
        min_deg,
        max_deg,
        points,
        reason_code: reason_code.to_string(),
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            distance: table(28, &[
                (100.0, 28, "DISTANCE_LT_100M"),
                (500.0, 21, "DISTANCE_LT_500M"),
                (1000.0, 14, "DISTANCE_LT_1KM"),
                (2500.0, 7, "DISTANCE_LT_2.5KM"),
            ]),
            ndvi_drop: table(25, &[
                (-0.5, 25, "NDVI_DROP_SEVERE"),
                (-0.4, 20, "NDVI_DROP_STRONG"),
                (-0.3, 15, "NDVI_DROP_MODERATE"),
                (-0.2, 10, "NDVI_DROP_MILD"),
            ]),
            area: table(15, &[
                (50_000.0, 15, "LARGE_AREA_GT_50000M2"),
                (25_000.0, 11, "LARGE_AREA_GT_25000M2"),
                (10_000.0, 8, "AREA_GT_10000M2"),
                (5_000.0, 4, "AREA_GT_5000M2"),
            ]),
            slope: table(10, &[
                (30.0, 10, "SLOPE_GT_30DEG"),
                (20.0, 7, "SLOPE_GT_20DEG"),
                (15.0, 5, "SLOPE_GT_15DEG"),
                (10.0, 3, "SLOPE_GT_10DEG"),
            ]),
            directional_slope: DirectionalSlopeConfig {
                max_points: 20,
                upslope_threshold_m: 5.0,
                downslope_threshold_m: -5.0,
                upslope_multiplier_base: 1.5,
                upslope_multiplier_max: 2.5,
                upslope_elev_scale: 100.0,
                downslope_multiplier_base: 0.9,
                downslope_multiplier_min: 0.7,
                downslope_elev_scale: 100.0,
            },
            aspect: AspectConfig {
                max_points: 5,
                ranges: vec![
                    range(157.5, 202.5, 5, "ASPECT_SOUTH"),
                    range(135.0, 157.5, 4, "ASPECT_SE"),
                    range(202.5, 225.0, 4, "ASPECT_SW"),
                    range(112.5, 135.0, 2, "ASPECT_EAST"),
                    range(225.0, 247.5, 2, "ASPECT_WEST"),
                    range(22.5, 67.5, 1, "ASPECT_NE"),
                    range(292.5, 337.5, 1, "ASPECT_NW"),
                    range(337.5, 360.0, 0, "ASPECT_NORTH"),
                    range(0.0, 22.5, 0, "ASPECT_NORTH"),
                ],
            },
            land_cover: LandCoverConfig {
                multipliers: [
                    ("Forest", 1.0),
                    ("Residential", 0.9),
                    ("HerbaceousVegetation", 0.85),
                    ("River", 0.8),
                    ("PermanentCrop", 0.75),
                    ("Pasture", 0.7),
                    ("Industrial", 0.5),
                    ("SeaLake", 0.4),
                    ("AnnualCrop", 0.3),
                    ("Highway", 0.25),
                ]
                .iter()
                .map(|&(k, v)| (k.to_string(), v))
                .collect(),
            },
            landslide: LandslideConfig {
                multiplier: 1.8,
                upslope_boost: 0.5,
                min_slope_deg: 15.0,
                max_multiplier: 2.5,
            },
            criticality: CriticalityConfig {
                max_points: 10,
                multipliers: BTreeMap::from([(0, 0.5), (1, 1.0), (2, 1.5), (3, 2.0)]),
            },
            risk_levels: vec![
                RiskLevelBand::new("Low", 0, 24),
                RiskLevelBand::new("Medium", 25, 49),
                RiskLevelBand::new("High", 50, 74),
                RiskLevelBand::new("Critical", 75, 100),
            ],
        }
    }
}

impl ScoringConfig {
    pub fn builder() -> ScoringConfigBuilder {
        ScoringConfigBuilder::default()
    }

    /// Defaults with a partial JSON override document applied
    pub fn from_json(overrides: &str) -> Result<Self> {
        Self::builder().merge_json(overrides)?.build()
    }

    pub fn distance(&self) -> &ThresholdFactor {
        &self.distance
    }

    pub fn ndvi_drop(&self) -> &ThresholdFactor {
        &self.ndvi_drop
    }

    pub fn area(&self) -> &ThresholdFactor {
        &self.area
    }

    pub fn slope(&self) -> &ThresholdFactor {
        &self.slope
    }

    pub fn directional_slope(&self) -> &DirectionalSlopeConfig {
        &self.directional_slope
    }

    pub fn aspect(&self) -> &AspectConfig {
        &self.aspect
    }

    pub fn landslide(&self) -> &LandslideConfig {
        &self.landslide
    }

    pub fn criticality(&self) -> &CriticalityConfig {
        &self.criticality
    }

    pub fn risk_levels(&self) -> &[RiskLevelBand] {
        &self.risk_levels
    }

    /// Land cover multiplier, 1.0 for unlisted classes
    pub fn land_cover_multiplier(&self, class: &str) -> f64 {
        self.land_cover.multipliers.get(class).copied().unwrap_or(1.0)
    }

    /// Criticality multiplier, 1.0 for tiers without an entry
    pub fn criticality_multiplier(&self, criticality: Criticality) -> f64 {
        self.criticality
            .multipliers
            .get(&criticality.code())
            .copied()
            .unwrap_or(1.0)
    }
}

/// Builder for [`ScoringConfig`]; validation happens once in [`build`](Self::build)
#[derive(Debug, Clone, Default)]
pub struct ScoringConfigBuilder {
    config: ScoringConfig,
}

impl ScoringConfigBuilder {
    pub fn distance(mut self, factor: ThresholdFactor) -> Self {
        self.config.distance = factor;
        self
    }

    pub fn ndvi_drop(mut self, factor: ThresholdFactor) -> Self {
        self.config.ndvi_drop = factor;
        self
    }

    pub fn area(mut self, factor: ThresholdFactor) -> Self {
        self.config.area = factor;
        self
    }

    pub fn slope(mut self, factor: ThresholdFactor) -> Self {
        self.config.slope = factor;
        self
    }

    pub fn directional_slope(mut self, config: DirectionalSlopeConfig) -> Self {
        self.config.directional_slope = config;
        self
    }

    pub fn aspect(mut self, config: AspectConfig) -> Self {
        self.config.aspect = config;
        self
    }

    pub fn land_cover_multiplier(mut self, class: impl Into<String>, multiplier: f64) -> Self {
        self.config.land_cover.multipliers.insert(class.into(), multiplier);
        self
    }

    pub fn landslide(mut self, config: LandslideConfig) -> Self {
        self.config.landslide = config;
        self
    }

    pub fn criticality_multiplier(mut self, criticality: Criticality, multiplier: f64) -> Self {
        self.config.criticality.multipliers.insert(criticality.code(), multiplier);
        self
    }

    pub fn risk_levels(mut self, levels: Vec<RiskLevelBand>) -> Self {
        self.config.risk_levels = levels;
        self
    }

    /// Apply a partial override document.
    ///
    /// ```json
    /// {"scoring_factors": {"distance": {"max_points": 30}}, "risk_levels": [...]}
    /// ```
    ///
    /// Keys given for a factor replace that key's value; a factor's other
    /// keys keep their current values. `risk_levels` replaces the whole
    /// table. Unknown factors or keys are configuration errors.
    pub fn merge_json(mut self, overrides: &str) -> Result<Self> {
        let doc: Value = serde_json::from_str(overrides)?;
        let doc = doc
            .as_object()
            .ok_or_else(|| Error::Config("override document must be a JSON object".into()))?;

        for key in doc.keys() {
            if key != "scoring_factors" && key != "risk_levels" {
                return Err(Error::Config(format!("unknown configuration key '{}'", key)));
            }
        }

        if let Some(factors) = doc.get("scoring_factors") {
            let factors = factors
                .as_object()
                .ok_or_else(|| Error::Config("scoring_factors must be an object".into()))?;
            for (name, settings) in factors {
                let settings = settings
                    .as_object()
                    .ok_or_else(|| Error::Config(format!("settings for '{}' must be an object", name)))?;
                let c = &mut self.config;
                match name.as_str() {
                    "distance" => merge_into(&mut c.distance, settings)?,
                    "ndvi_drop" => merge_into(&mut c.ndvi_drop, settings)?,
                    "area" => merge_into(&mut c.area, settings)?,
                    "slope" => merge_into(&mut c.slope, settings)?,
                    "directional_slope" => merge_into(&mut c.directional_slope, settings)?,
                    "aspect" => merge_into(&mut c.aspect, settings)?,
                    "land_cover" => merge_into(&mut c.land_cover, settings)?,
                    "landslide" => merge_into(&mut c.landslide, settings)?,
                    "criticality" => merge_into(&mut c.criticality, settings)?,
                    other => return Err(Error::Config(format!("unknown scoring factor '{}'", other))),
                }
            }
        }

        if let Some(levels) = doc.get("risk_levels") {
            self.config.risk_levels = serde_json::from_value(levels.clone())?;
        }

        Ok(self)
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<ScoringConfig> {
        let c = &self.config;

        validate_table("distance", &c.distance, Order::Ascending)?;
        validate_table("ndvi_drop", &c.ndvi_drop, Order::Ascending)?;
        validate_table("area", &c.area, Order::Descending)?;
        validate_table("slope", &c.slope, Order::Descending)?;

        let d = &c.directional_slope;
        if d.max_points < 0 {
            return Err(Error::invalid_parameter("directional_slope.max_points", d.max_points, "must be non-negative"));
        }
        if !(d.downslope_threshold_m <= d.upslope_threshold_m) {
            return Err(Error::invalid_parameter(
                "directional_slope.downslope_threshold_m",
                d.downslope_threshold_m,
                "must not exceed upslope_threshold_m",
            ));
        }
        if !(d.upslope_multiplier_base > 0.0 && d.upslope_multiplier_base <= d.upslope_multiplier_max) {
            return Err(Error::invalid_parameter(
                "directional_slope.upslope_multiplier_base",
                d.upslope_multiplier_base,
                "must be positive and at most upslope_multiplier_max",
            ));
        }
        if !(d.downslope_multiplier_min > 0.0 && d.downslope_multiplier_min <= d.downslope_multiplier_base) {
            return Err(Error::invalid_parameter(
                "directional_slope.downslope_multiplier_min",
                d.downslope_multiplier_min,
                "must be positive and at most downslope_multiplier_base",
            ));
        }
        for (name, scale) in [
            ("directional_slope.upslope_elev_scale", d.upslope_elev_scale),
            ("directional_slope.downslope_elev_scale", d.downslope_elev_scale),
        ] {
            positive(name, scale)?;
        }

        let a = &c.aspect;
        for r in &a.ranges {
            if !(0.0 <= r.min_deg && r.min_deg < r.max_deg && r.max_deg <= 360.0) {
                return Err(Error::invalid_parameter(
                    "aspect.ranges",
                    format!("[{}, {})", r.min_deg, r.max_deg),
                    "must satisfy 0 <= min_deg < max_deg <= 360",
                ));
            }
            points_within("aspect.ranges.points", r.points, a.max_points)?;
        }

        for (class, &m) in &c.land_cover.multipliers {
            if !(m.is_finite() && m > 0.0) {
                return Err(Error::invalid_parameter("land_cover.multipliers", format!("{}={}", class, m), "must be positive"));
            }
        }

        let l = &c.landslide;
        positive("landslide.multiplier", l.multiplier)?;
        positive("landslide.max_multiplier", l.max_multiplier)?;
        if !(l.upslope_boost >= 0.0) {
            return Err(Error::invalid_parameter("landslide.upslope_boost", l.upslope_boost, "must be non-negative"));
        }
        if !(l.min_slope_deg >= 0.0 && l.min_slope_deg <= 90.0) {
            return Err(Error::invalid_parameter("landslide.min_slope_deg", l.min_slope_deg, "must be within [0, 90]"));
        }

        for (&tier, &m) in &c.criticality.multipliers {
            if tier > 3 {
                return Err(Error::invalid_parameter("criticality.multipliers", tier, "tier codes are 0..=3"));
            }
            positive("criticality.multipliers", m)?;
        }

        validate_risk_levels(&c.risk_levels)?;

        Ok(self.config)
    }
}

/// Replace the given keys of a config section, keeping the others
fn merge_into<T: Serialize + DeserializeOwned>(target: &mut T, settings: &Map<String, Value>) -> Result<()> {
    let mut current = serde_json::to_value(&*target)?;
    if let Value::Object(fields) = &mut current {
        for (k, v) in settings {
            fields.insert(k.clone(), v.clone());
        }
    }
    *target = serde_json::from_value(current)?;
    Ok(())
}

#[derive(Clone, Copy)]
enum Order {
    Ascending,
    Descending,
}

fn validate_table(name: &'static str, factor: &ThresholdFactor, order: Order) -> Result<()> {
    if factor.max_points < 0 {
        return Err(Error::invalid_parameter(name, factor.max_points, "max_points must be non-negative"));
    }
    for t in &factor.thresholds {
        if !t.value.is_finite() {
            return Err(Error::invalid_parameter(name, t.value, "threshold must be finite"));
        }
        points_within(name, t.points, factor.max_points)?;
    }
    let ordered = factor.thresholds.windows(2).all(|w| match order {
        Order::Ascending => w[0].value < w[1].value,
        Order::Descending => w[0].value > w[1].value,
    });
    if !ordered {
        return Err(Error::invalid_parameter(
            name,
            format!("{:?}", factor.thresholds.iter().map(|t| t.value).collect::<Vec<_>>()),
            "thresholds must run from most to least severe",
        ));
    }
    Ok(())
}

fn points_within(name: &'static str, points: i32, max_points: i32) -> Result<()> {
    if points < 0 || points > max_points {
        return Err(Error::invalid_parameter(name, points, format!("points must be within [0, {}]", max_points)));
    }
    Ok(())
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::invalid_parameter(name, value, "must be positive"));
    }
    Ok(())
}

fn validate_risk_levels(levels: &[RiskLevelBand]) -> Result<()> {
    const NAMES: [&str; 4] = ["Low", "Medium", "High", "Critical"];

    let mut sorted: Vec<&RiskLevelBand> = levels.iter().collect();
    sorted.sort_by_key(|b| b.min_score);

    let mut expected_min = 0;
    for band in &sorted {
        if !NAMES.contains(&band.name.as_str()) {
            return Err(Error::invalid_parameter("risk_levels", &band.name, "unknown risk level name"));
        }
        if band.min_score != expected_min || band.max_score < band.min_score {
            return Err(Error::invalid_parameter(
                "risk_levels",
                format!("{} [{}, {}]", band.name, band.min_score, band.max_score),
                "bands must be contiguous from 0 to 100",
            ));
        }
        expected_min = band.max_score + 1;
    }
    if expected_min != 101 {
        return Err(Error::invalid_parameter("risk_levels", expected_min - 1, "bands must end at 100"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ScoringConfig::builder().build().unwrap();
        assert_eq!(config, ScoringConfig::default());
        assert_eq!(config.land_cover_multiplier("Highway"), 0.25);
        assert_eq!(config.land_cover_multiplier("Glacier"), 1.0);
        assert_eq!(config.criticality_multiplier(Criticality::High), 1.5);
    }

    #[test]
    fn test_merge_partial_factor() {
        let config = ScoringConfig::from_json(
            r#"{"scoring_factors": {"distance": {"max_points": 30}, "landslide": {"multiplier": 2.0}}}"#,
        )
        .unwrap();
        assert_eq!(config.distance().max_points, 30);
        // Untouched keys keep their defaults
        assert_eq!(config.distance().thresholds.len(), 4);
        assert_eq!(config.landslide().multiplier, 2.0);
        assert_eq!(config.landslide().upslope_boost, 0.5);
    }

    #[test]
    fn test_merge_threshold_table_with_original_keys() {
        let config = ScoringConfig::from_json(
            r#"{"scoring_factors": {"distance": {"thresholds": [
                {"distance_m": 50, "points": 28, "reason_code": "DISTANCE_LT_50M"},
                {"distance_m": 200, "points": 10, "reason_code": "DISTANCE_LT_200M"}
            ]}}}"#,
        )
        .unwrap();
        assert_eq!(config.distance().thresholds[0].value, 50.0);
        assert_eq!(config.distance().thresholds.len(), 2);
    }

    #[test]
    fn test_merge_criticality_and_levels() {
        let config = ScoringConfig::from_json(
            r#"{
                "scoring_factors": {"criticality": {"multipliers": {"0": 0.25, "1": 1.0, "2": 1.5, "3": 3.0}}},
                "risk_levels": [
                    {"name": "Low", "min_score": 0, "max_score": 19},
                    {"name": "Medium", "min_score": 20, "max_score": 59},
                    {"name": "High", "min_score": 60, "max_score": 79},
                    {"name": "Critical", "min_score": 80, "max_score": 100}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.criticality_multiplier(Criticality::Critical), 3.0);
        assert_eq!(config.risk_levels()[1].max_score, 59);
    }

    #[test]
    fn test_malformed_documents_fail_fast() {
        for doc in [
            "not json",
            "[1, 2]",
            r#"{"weights": {}}"#,
            r#"{"scoring_factors": {"wind": {"max_points": 5}}}"#,
            r#"{"scoring_factors": {"distance": {"max_pointz": 5}}}"#,
            r#"{"scoring_factors": {"distance": {"max_points": "many"}}}"#,
        ] {
            assert!(
                matches!(ScoringConfig::from_json(doc), Err(Error::Config(_))),
                "accepted {}",
                doc
            );
        }
    }

    #[test]
    fn test_validation_rejects_inconsistent_values() {
        let unordered = ThresholdFactor {
            max_points: 28,
            thresholds: vec![Threshold::new(500.0, 21, "B"), Threshold::new(100.0, 28, "A")],
        };
        assert!(matches!(
            ScoringConfig::builder().distance(unordered).build(),
            Err(Error::InvalidParameter { name: "distance", .. })
        ));

        let over_max = ThresholdFactor {
            max_points: 10,
            thresholds: vec![Threshold::new(30.0, 12, "STEEP")],
        };
        assert!(ScoringConfig::builder().slope(over_max).build().is_err());

        assert!(ScoringConfig::builder()
            .criticality_multiplier(Criticality::Low, 0.0)
            .build()
            .is_err());
        assert!(ScoringConfig::builder()
            .land_cover_multiplier("Forest", -1.0)
            .build()
            .is_err());

        let gap = vec![
            RiskLevelBand::new("Low", 0, 24),
            RiskLevelBand::new("High", 30, 100),
        ];
        assert!(ScoringConfig::builder().risk_levels(gap).build().is_err());

        let short = vec![RiskLevelBand::new("Low", 0, 90)];
        assert!(ScoringConfig::builder().risk_levels(short).build().is_err());

        let bad = ScoringConfig::from_json(
            r#"{"scoring_factors": {"directional_slope": {"upslope_multiplier_base": 3.0}}}"#,
        );
        assert!(matches!(bad, Err(Error::InvalidParameter { .. })));
    }
}

//! Risk scoring of one change polygon against one nearby asset

use super::config::ScoringConfig;
use super::factors::{self, ScoringFactor};
use crate::change::{ChangePolygon, ChangeType};
use crate::proximity::ProximityResult;
use georisk_core::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Qualitative risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
    /// Score fell outside every configured band
    Unknown,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    /// Integer code used in persisted records; `Unknown` is stored as 0
    pub fn code(self) -> u8 {
        match self {
            RiskLevel::Low | RiskLevel::Unknown => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
            RiskLevel::Critical => 3,
        }
    }

    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == name)
            .unwrap_or(RiskLevel::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
            RiskLevel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final score with its factor breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct RiskScore {
    /// Integer in `[0, 100]`
    pub score: u8,
    pub level: RiskLevel,
    pub factors: Vec<ScoringFactor>,
}

/// Serialized factor breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringFactors {
    pub total_score: u8,
    pub risk_level: String,
    pub factors: Vec<ScoringFactor>,
}

/// Persistable form of a [`RiskScore`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScoreRecord {
    pub score: u8,
    pub risk_level: u8,
    pub scoring_factors: ScoringFactors,
}

impl RiskScore {
    /// Factor breakdown as stored alongside a risk event
    pub fn scoring_factors(&self) -> ScoringFactors {
        ScoringFactors {
            total_score: self.score,
            risk_level: self.level.to_string(),
            factors: self.factors.clone(),
        }
    }

    /// Factor breakdown as a JSON value
    pub fn scoring_factors_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.scoring_factors())?)
    }

    pub fn to_record(&self) -> RiskScoreRecord {
        RiskScoreRecord {
            score: self.score,
            risk_level: self.level.code(),
            scoring_factors: self.scoring_factors(),
        }
    }
}

/// Transparent, configurable risk scorer.
///
/// Additive factors (distance, vegetation-index drop, area, directional
/// slope, aspect) are summed, then land cover, landslide and asset
/// criticality each scale the running total. Every step leaves a
/// [`ScoringFactor`] in the result.
///
/// ```ignore
/// use georisk_algorithms::scoring::{RiskScorer, ScoringConfig};
///
/// let scorer = RiskScorer::new(ScoringConfig::from_json(r#"{"scoring_factors": {}}"#)?);
/// let risk = scorer.score(&change, &proximity);
/// println!("{} ({})", risk.score, risk.level);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    config: ScoringConfig,
}

impl RiskScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a change polygon against one nearby asset
    pub fn score(&self, change: &ChangePolygon, proximity: &ProximityResult) -> RiskScore {
        let config = &self.config;
        let mut applied = Vec::with_capacity(8);

        applied.push(factors::distance(config.distance(), proximity.distance_meters));
        applied.push(factors::ndvi_drop(config.ndvi_drop(), change.ndvi_drop_mean));
        applied.push(factors::area(config.area(), change.area_sq_meters));

        if let Some(slope) = change.slope_degree_mean {
            applied.push(factors::directional_slope(
                config.slope(),
                config.directional_slope(),
                slope,
                proximity.elevation_diff_m,
            ));
        }

        if let Some(aspect) = change.aspect_degrees {
            applied.push(factors::aspect(config.aspect(), aspect));
        }

        let mut total: i32 = applied.iter().map(|f| f.points).sum();

        if let Some(class) = change.land_cover_class.as_deref() {
            let (factor, adjusted) =
                factors::land_cover(class, config.land_cover_multiplier(class), total);
            applied.push(factor);
            total = adjusted;
        }

        if change.change_type == ChangeType::LandslideDebris {
            let (factor, adjusted) = factors::landslide(
                config.landslide(),
                change.slope_degree_mean,
                proximity.elevation_diff_m,
                total,
            );
            applied.push(factor);
            total = adjusted;
        }

        let (factor, adjusted) = factors::criticality(
            &proximity.criticality_name,
            config.criticality_multiplier(proximity.criticality),
            config.criticality().max_points,
            total,
        );
        applied.push(factor);

        let score = adjusted.clamp(0, 100) as u8;
        let level = self.level_for(score);

        debug!(
            asset_id = %proximity.asset_id,
            score,
            level = %level,
            "risk score calculated"
        );

        RiskScore {
            score,
            level,
            factors: applied,
        }
    }

    /// Risk level whose inclusive band contains `score`
    pub fn level_for(&self, score: u8) -> RiskLevel {
        let score = i32::from(score);
        self.config
            .risk_levels()
            .iter()
            .find(|b| b.min_score <= score && score <= b.max_score)
            .map(|b| RiskLevel::from_name(&b.name))
            .unwrap_or(RiskLevel::Unknown)
    }
}

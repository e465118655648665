//! Transparent risk scoring
//!
//! A [`RiskScorer`] combines a change polygon and a proximity result into
//! a 0-100 score, a [`RiskLevel`] and a list of [`ScoringFactor`]s that
//! explain every point. All weights and thresholds live in a validated
//! [`ScoringConfig`].

mod config;
mod factors;
mod scorer;

pub use config::{
    AspectConfig, AspectRange, CriticalityConfig, DirectionalSlopeConfig, LandCoverConfig,
    LandslideConfig, RiskLevelBand, ScoringConfig, ScoringConfigBuilder, Threshold,
    ThresholdFactor,
};
pub use factors::ScoringFactor;
pub use scorer::{RiskLevel, RiskScore, RiskScoreRecord, RiskScorer, ScoringFactors};

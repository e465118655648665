//! Batch assessment of one processing run
//!
//! Glues the stages together over a whole set of change polygons:
//! DEM loading with graceful degradation, terrain enrichment, proximity
//! search and scoring. Each stage shares read-only state across polygons
//! and runs in parallel when the `parallel` feature is on.

use crate::change::ChangePolygon;
use crate::maybe_rayon::*;
use crate::proximity::{AssetRecord, ProximityFinder, ProximityResult};
use crate::scoring::{RiskLevel, RiskScore, RiskScorer, ScoringFactors};
use crate::terrain::{DemProvider, TerrainAnalyzer};
use georisk_core::{BoundingBox, GeometryExt};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// WGS84 box around every polygon, grown by `margin_deg` on each side
pub fn changes_bbox(polygons: &[ChangePolygon], margin_deg: f64) -> Option<BoundingBox> {
    polygons
        .iter()
        .filter_map(|c| c.geometry().bounds())
        .reduce(|a, b| a.union(&b))
        .map(|b| b.expanded(margin_deg))
}

/// Terrain analyzer for a run, or `None` when no usable DEM exists.
///
/// Provider and derivation failures are logged and treated as missing
/// data, so scoring continues without terrain factors.
pub fn load_dem(provider: &dyn DemProvider, bbox: &BoundingBox) -> Option<TerrainAnalyzer> {
    let dem = match provider.dem_for_bbox(bbox) {
        Ok(Some(dem)) => dem,
        Ok(None) => {
            warn!(?bbox, "no DEM available, continuing without terrain");
            return None;
        }
        Err(e) => {
            warn!(?bbox, error = %e, "DEM provider failed, continuing without terrain");
            return None;
        }
    };

    match TerrainAnalyzer::new(dem) {
        Ok(analyzer) => Some(analyzer),
        Err(e) => {
            warn!(error = %e, "slope/aspect derivation failed, continuing without terrain");
            None
        }
    }
}

/// Fill terrain fields on every polygon. Returns how many got an elevation.
pub fn enrich_terrain(terrain: &TerrainAnalyzer, polygons: &mut [ChangePolygon]) -> usize {
    let total = polygons.len();
    let enriched = polygons
        .into_par_iter()
        .enumerate()
        .map(|(index, change)| match terrain.enrich(change) {
            Ok(()) => change.elevation_m.is_some(),
            Err(e) => {
                warn!(polygon = index, error = %e, "terrain enrichment failed");
                false
            }
        })
        .filter(|&ok| ok)
        .count();

    info!(enriched, total, "terrain enrichment complete");
    enriched
}

/// Nearby assets per polygon index; polygons with no nearby asset or an
/// unusable geometry are absent
pub fn batch_proximity(
    finder: &ProximityFinder,
    polygons: &[ChangePolygon],
    assets: &[AssetRecord],
    terrain: Option<&TerrainAnalyzer>,
) -> BTreeMap<usize, Vec<ProximityResult>> {
    let found: Vec<(usize, Vec<ProximityResult>)> = polygons
        .into_par_iter()
        .enumerate()
        .filter_map(|(index, change)| nearby(finder, index, change, assets, terrain))
        .filter(|(_, results)| !results.is_empty())
        .collect();

    found.into_iter().collect()
}

fn nearby(
    finder: &ProximityFinder,
    index: usize,
    change: &ChangePolygon,
    assets: &[AssetRecord],
    terrain: Option<&TerrainAnalyzer>,
) -> Option<(usize, Vec<ProximityResult>)> {
    match finder.find_nearby(&change.geometry, assets, terrain) {
        Ok(results) => Some((index, results)),
        Err(e) => {
            warn!(polygon = index, error = %e, "skipping change polygon in proximity analysis");
            None
        }
    }
}

/// Score for one (change polygon, asset) pair
#[derive(Debug, Clone, PartialEq)]
pub struct RiskEvent {
    /// Index into the polygon slice passed to [`assess_changes`]
    pub change_index: usize,
    pub asset_id: String,
    pub distance_meters: f64,
    pub score: RiskScore,
}

/// Persistable form of a [`RiskEvent`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEventRecord {
    pub change_polygon_id: Option<String>,
    pub asset_id: String,
    pub distance_meters: f64,
    pub risk_score: u8,
    pub risk_level: u8,
    pub scoring_factors: ScoringFactors,
}

impl RiskEvent {
    pub fn level(&self) -> RiskLevel {
        self.score.level
    }

    /// Record linked to a stored change polygon, when its id is known
    pub fn to_record(&self, change_polygon_id: Option<&str>) -> RiskEventRecord {
        RiskEventRecord {
            change_polygon_id: change_polygon_id.map(str::to_string),
            asset_id: self.asset_id.clone(),
            distance_meters: self.distance_meters,
            risk_score: self.score.score,
            risk_level: self.score.level.code(),
            scoring_factors: self.score.scoring_factors(),
        }
    }
}

/// Run-level counts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssessmentSummary {
    pub polygons: usize,
    pub polygons_with_assets: usize,
    pub events: usize,
    pub by_level: BTreeMap<RiskLevel, usize>,
}

impl AssessmentSummary {
    pub fn count(&self, level: RiskLevel) -> usize {
        self.by_level.get(&level).copied().unwrap_or(0)
    }

    /// Events at High or Critical
    pub fn high_or_critical(&self) -> usize {
        self.count(RiskLevel::High) + self.count(RiskLevel::Critical)
    }
}

/// Events of a run and their summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assessment {
    /// Ordered by change index, then distance
    pub events: Vec<RiskEvent>,
    pub summary: AssessmentSummary,
}

/// Proximity search and scoring for every polygon.
///
/// Polygons are processed concurrently over shared read-only terrain,
/// assets and scorer. A polygon that fails proximity is skipped without
/// affecting the others.
pub fn assess_changes(
    polygons: &[ChangePolygon],
    assets: &[AssetRecord],
    finder: &ProximityFinder,
    scorer: &RiskScorer,
    terrain: Option<&TerrainAnalyzer>,
) -> Assessment {
    let per_polygon: Vec<Vec<RiskEvent>> = polygons
        .into_par_iter()
        .enumerate()
        .filter_map(|(index, change)| nearby(finder, index, change, assets, terrain))
        .map(|(index, results)| {
            let change = &polygons[index];
            results
                .into_iter()
                .map(|prox| RiskEvent {
                    change_index: index,
                    score: scorer.score(change, &prox),
                    asset_id: prox.asset_id,
                    distance_meters: prox.distance_meters,
                })
                .collect()
        })
        .collect();

    let mut summary = AssessmentSummary {
        polygons: polygons.len(),
        polygons_with_assets: per_polygon.iter().filter(|e| !e.is_empty()).count(),
        ..Default::default()
    };
    let events: Vec<RiskEvent> = per_polygon.into_iter().flatten().collect();
    for event in &events {
        *summary.by_level.entry(event.level()).or_insert(0) += 1;
    }
    summary.events = events.len();

    info!(
        polygons = summary.polygons,
        events = summary.events,
        high_or_critical = summary.high_or_critical(),
        "risk assessment complete"
    );

    Assessment { events, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proximity::{Criticality, ProximityParams};
    use crate::terrain::DemData;
    use geo::{Geometry, LineString, Point, Polygon};
    use georisk_core::{Error, Result};

    /// Square of `half` degrees around (lon, lat)
    fn square(lon: f64, lat: f64, half: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (lon - half, lat - half),
                (lon + half, lat - half),
                (lon + half, lat + half),
                (lon - half, lat + half),
                (lon - half, lat - half),
            ]),
            vec![],
        )
    }

    fn tower(id: &str, lon: f64, lat: f64, criticality: Criticality) -> AssetRecord {
        AssetRecord::new(id, "Tower", criticality, &Geometry::Point(Point::new(lon, lat)))
    }

    fn change(lon: f64, lat: f64) -> ChangePolygon {
        ChangePolygon::new(square(lon, lat, 0.0005), 12_000.0, -0.45, -0.6)
    }

    struct FailingProvider;

    impl DemProvider for FailingProvider {
        fn dem_for_bbox(&self, _bbox: &BoundingBox) -> Result<Option<DemData>> {
            Err(Error::DataUnavailable("service down".into()))
        }
    }

    struct EmptyProvider;

    impl DemProvider for EmptyProvider {
        fn dem_for_bbox(&self, _bbox: &BoundingBox) -> Result<Option<DemData>> {
            Ok(None)
        }
    }

    #[test]
    fn test_changes_bbox() {
        assert!(changes_bbox(&[], 0.01).is_none());
        let bbox = changes_bbox(&[change(-122.4, 37.8), change(-122.0, 37.5)], 0.01).unwrap();
        assert!((bbox.min_x - (-122.4105)).abs() < 1e-9);
        assert!((bbox.max_y - 37.8105).abs() < 1e-9);
    }

    #[test]
    fn test_dem_failures_degrade() {
        let bbox = BoundingBox::new(-122.5, 37.7, -122.3, 37.9);
        assert!(load_dem(&FailingProvider, &bbox).is_none());
        assert!(load_dem(&EmptyProvider, &bbox).is_none());
    }

    #[test]
    fn test_assess_orders_and_summarizes() {
        let polygons = vec![change(-122.4, 37.8), change(-122.0, 37.5), change(-122.4, 37.801)];
        let assets = vec![
            tower("far", -122.4, 37.8035, Criticality::Low),
            tower("near", -122.4, 37.8012, Criticality::Critical),
        ];
        let finder = ProximityFinder::new(ProximityParams::default()).unwrap();
        let scorer = RiskScorer::default();

        let assessment = assess_changes(&polygons, &assets, &finder, &scorer, None);
        let order: Vec<(usize, &str)> = assessment
            .events
            .iter()
            .map(|e| (e.change_index, e.asset_id.as_str()))
            .collect();
        assert_eq!(order, vec![(0, "near"), (0, "far"), (2, "near"), (2, "far")]);
        assert!(assessment.events[0].distance_meters < assessment.events[1].distance_meters);

        let summary = &assessment.summary;
        assert_eq!(summary.polygons, 3);
        assert_eq!(summary.polygons_with_assets, 2);
        assert_eq!(summary.events, 4);
        assert_eq!(summary.by_level.values().sum::<usize>(), 4);
    }

    #[test]
    fn test_bad_polygon_is_skipped() {
        let mut bad = change(0.0, 0.0);
        bad.geometry = square(500_000.0, 4_000_000.0, 50.0);
        let polygons = vec![bad, change(-122.4, 37.8)];
        let assets = vec![tower("t1", -122.4, 37.8012, Criticality::High)];
        let finder = ProximityFinder::new(ProximityParams::default()).unwrap();

        let assessment = assess_changes(&polygons, &assets, &finder, &RiskScorer::default(), None);
        assert_eq!(assessment.events.len(), 1);
        assert_eq!(assessment.events[0].change_index, 1);

        let map = batch_proximity(&finder, &polygons, &assets, None);
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_event_record() {
        let polygons = vec![change(-122.4, 37.8)];
        let asset = tower("t1", -122.4, 37.8012, Criticality::High);
        let finder = ProximityFinder::new(ProximityParams::default()).unwrap();

        let assessment = assess_changes(&polygons, &[asset], &finder, &RiskScorer::default(), None);
        let record = serde_json::to_value(assessment.events[0].to_record(Some("poly-1"))).unwrap();
        assert_eq!(record["changePolygonId"], "poly-1");
        assert_eq!(record["assetId"], "t1");
        assert!(record["riskScore"].as_u64().unwrap() <= 100);
        assert!(record["scoringFactors"]["factors"].is_array());
    }
}

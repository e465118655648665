//! End-to-end assessment over synthetic scenes.
//!
//! A 1 km x 1 km Sentinel-like scene in UTM 33N loses vegetation in a
//! 200 m x 200 m block. The DEM is a plane falling 10 m per 30 m toward
//! the south, written to a temporary GeoTIFF and read back through the
//! local DEM provider.

use geo::{Geometry, LineString, Point};
use georisk_algorithms::prelude::*;
use georisk_algorithms::classification::{LandCoverPrediction, LandslidePrediction};
use georisk_algorithms::pipeline::changes_bbox;
use georisk_core::crs::utm::utm_to_wgs84;
use georisk_core::io::write_geotiff;
use std::path::Path;

const EPSG_UTM_33N: u32 = 32633;

fn scene_band(value: f64) -> Raster<f64> {
    Raster::filled(100, 100, value)
        .with_transform(GeoTransform::new(500_000.0, 4_985_000.0, 10.0, -10.0))
        .with_crs(CRS::from_epsg(EPSG_UTM_33N))
}

/// NDVI 0.8 everywhere before; 0.35 in rows/cols 40..60 after
fn scenes() -> (NdviResult, NdviResult) {
    let before = ndvi(
        &scene_band(0.1),
        &scene_band(0.9),
        NdviParams {
            scene_id: "S2A_before".into(),
            ..Default::default()
        },
    )
    .unwrap();

    let mut red = scene_band(0.1);
    let mut nir = scene_band(0.9);
    for row in 40..60 {
        for col in 40..60 {
            red.set(row, col, 0.325).unwrap();
            nir.set(row, col, 0.675).unwrap();
        }
    }
    let after = ndvi(
        &red,
        &nir,
        NdviParams {
            scene_id: "S2A_after".into(),
            ..Default::default()
        },
    )
    .unwrap();

    (before, after)
}

/// 30 m DEM, elevation 2000 - 10 * row
fn write_dem(path: &Path) {
    let mut dem: Raster<f64> = Raster::new(150, 150)
        .with_transform(GeoTransform::new(499_000.0, 4_986_000.0, 30.0, -30.0))
        .with_crs(CRS::from_epsg(EPSG_UTM_33N));
    for row in 0..150 {
        for col in 0..150 {
            dem.set(row, col, 2000.0 - 10.0 * row as f64).unwrap();
        }
    }
    write_geotiff(&dem, path).unwrap();
}

fn utm_point(easting: f64, northing: f64) -> Geometry<f64> {
    let (lon, lat) = utm_to_wgs84(easting, northing, 33, true);
    Geometry::Point(Point::new(lon, lat))
}

/// South tower 215 m downhill, north substation 615 m uphill and an
/// overhead line 100 m east of the change block
fn assets() -> Vec<AssetRecord> {
    let (lon0, lat0) = utm_to_wgs84(500_700.0, 4_984_000.0, 33, true);
    let (lon1, lat1) = utm_to_wgs84(500_700.0, 4_985_000.0, 33, true);
    let line = Geometry::LineString(LineString::from(vec![(lon0, lat0), (lon1, lat1)]));

    vec![
        AssetRecord::new("tower-s", "Tower", Criticality::High, &utm_point(500_500.0, 4_984_185.0)),
        AssetRecord::new("sub-n", "Substation", Criticality::Low, &utm_point(500_500.0, 4_985_215.0)),
        AssetRecord::new("line-e", "TransmissionLine", Criticality::Critical, &line),
    ]
}

fn detect() -> Vec<ChangePolygon> {
    let (before, after) = scenes();
    let result = detect_ndvi_changes(&before, &after, &ChangeParams::default()).unwrap();
    assert_eq!(result.before_scene_id.as_deref(), Some("S2A_before"));
    assert_eq!(result.stats.changed_pixels, 400);
    result.polygons
}

struct ForestModel;

impl LandCoverModel for ForestModel {
    fn model_version(&self) -> &str {
        "eurosat-resnet18-test"
    }

    fn classify(&self, _polygon: &ChangePolygon) -> Result<LandCoverPrediction> {
        let mut probs = [0.01; 10];
        probs[1] = 0.91;
        LandCoverPrediction::from_probabilities(&probs, self.model_version())
    }
}

struct SteepSlideModel;

impl LandslideModel for SteepSlideModel {
    fn model_version(&self) -> &str {
        "landslide-unet-test"
    }

    fn detect(&self, _polygon: &ChangePolygon, _dem: &DemData) -> Result<LandslidePrediction> {
        LandslidePrediction::from_probabilities(&[0.75; 64], 0.5, self.model_version())
    }
}

#[test]
fn change_polygon_is_detected_in_wgs84() {
    let polygons = detect();
    assert_eq!(polygons.len(), 1);

    let change = &polygons[0];
    assert!((change.area_sq_meters - 40_000.0).abs() < 1.0);
    assert!((change.ndvi_drop_mean + 0.45).abs() < 1e-6);
    assert_eq!(change.change_type, ChangeType::VegetationLoss);

    let c = change.geometry().centroid_point().unwrap();
    assert!((c.x() - 15.006).abs() < 0.01, "lon {}", c.x());
    assert!((c.y() - 45.0).abs() < 0.05, "lat {}", c.y());
}

#[test]
fn full_assessment_with_terrain() {
    let dir = tempfile::tempdir().unwrap();
    let dem_path = dir.path().join("dem.tif");
    write_dem(&dem_path);

    let mut polygons = detect();
    let bbox = changes_bbox(&polygons, 0.01).unwrap();
    let terrain = load_dem(&LocalDemProvider::new(&dem_path), &bbox).expect("DEM should load");

    assert_eq!(enrich_terrain(&terrain, &mut polygons), 1);
    let change = &polygons[0];
    assert!((change.slope_degree_mean.unwrap() - (1.0_f64 / 3.0).atan().to_degrees()).abs() < 0.01);
    assert!((change.aspect_degrees.unwrap() - 180.0).abs() < 0.01);
    assert!((change.elevation_m.unwrap() - 1505.0).abs() < 15.0);

    let finder = ProximityFinder::new(ProximityParams::default().with_max_distance(1000.0)).unwrap();
    let assessment = assess_changes(&polygons, &assets(), &finder, &RiskScorer::default(), Some(&terrain));

    let ids: Vec<&str> = assessment.events.iter().map(|e| e.asset_id.as_str()).collect();
    assert_eq!(ids, vec!["tower-s", "sub-n"]);

    let tower = &assessment.events[0];
    assert!((tower.distance_meters - 215.0).abs() < 2.0, "{}", tower.distance_meters);
    let codes: Vec<&str> = tower.score.factors.iter().map(|f| f.reason_code.as_str()).collect();
    assert!(codes.contains(&"SLOPE_UPSLOPE"), "{:?}", codes);
    assert!(codes.contains(&"ASPECT_SOUTH"));
    assert_eq!(tower.score.level, RiskLevel::Critical);

    let substation = &assessment.events[1];
    assert!(substation
        .score
        .factors
        .iter()
        .any(|f| f.reason_code == "SLOPE_DOWNSLOPE"));
    assert!(substation.score.score < tower.score.score);

    assert_eq!(assessment.summary.events, 2);
    assert_eq!(assessment.summary.count(RiskLevel::Critical), 1);
}

#[test]
fn missing_dem_reduces_factor_set() {
    let dir = tempfile::tempdir().unwrap();
    let polygons = detect();
    let bbox = changes_bbox(&polygons, 0.01).unwrap();

    let terrain = load_dem(&LocalDemProvider::new(dir.path().join("absent.tif")), &bbox);
    assert!(terrain.is_none());

    let finder = ProximityFinder::new(ProximityParams::default()).unwrap();
    let assessment = assess_changes(&polygons, &assets(), &finder, &RiskScorer::default(), terrain.as_ref());
    assert_eq!(assessment.events.len(), 1);

    let factors: Vec<&str> = assessment.events[0]
        .score
        .factors
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(factors, vec!["Distance", "NDVI Drop", "Area", "Criticality"]);
}

#[test]
fn classifiers_refine_change_type_and_score() {
    let dir = tempfile::tempdir().unwrap();
    let dem_path = dir.path().join("dem.tif");
    write_dem(&dem_path);

    let mut polygons = detect();
    let bbox = changes_bbox(&polygons, 0.01).unwrap();
    let terrain = load_dem(&LocalDemProvider::new(&dem_path), &bbox).unwrap();
    enrich_terrain(&terrain, &mut polygons);

    let finder = ProximityFinder::new(ProximityParams::default()).unwrap();
    let scorer = RiskScorer::default();
    let baseline = assess_changes(&polygons, &assets(), &finder, &scorer, Some(&terrain));

    assert_eq!(apply_land_cover(&Classifier::Available(ForestModel), &mut polygons), 1);
    assert_eq!(polygons[0].change_type, ChangeType::FireBurnScar);
    assert_eq!(polygons[0].land_cover_class.as_deref(), Some("Forest"));

    assert_eq!(apply_landslide(&Classifier::Available(SteepSlideModel), &mut polygons, terrain.dem()), 1);
    assert_eq!(polygons[0].change_type, ChangeType::LandslideDebris);
    assert_eq!(polygons[0].ml_confidence, Some(0.75));

    let refined = assess_changes(&polygons, &assets(), &finder, &scorer, Some(&terrain));
    let event = &refined.events[0];
    let landslide = event
        .score
        .factors
        .iter()
        .find(|f| f.name == "Landslide Detection")
        .expect("landslide factor");
    assert_eq!(landslide.reason_code, "LANDSLIDE_UPSLOPE");
    assert!(event.score.score >= baseline.events[0].score.score);

    let record = serde_json::to_value(event.to_record(None)).unwrap();
    assert!(record["changePolygonId"].is_null());
    assert_eq!(record["riskLevel"], 3);
}

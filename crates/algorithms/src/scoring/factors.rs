//! Individual scoring factors
//!
//! Each function turns one input into a [`ScoringFactor`] whose `points`
//! are what that factor added to the score. Multiplicative factors record
//! the signed change they made to the running total.

use super::config::{
    AspectConfig, DirectionalSlopeConfig, LandslideConfig, Threshold, ThresholdFactor,
};
use crate::terrain::compass_direction;
use serde::Serialize;

/// Transparency record for one contribution to a risk score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringFactor {
    pub name: String,
    pub points: i32,
    pub max_points: i32,
    pub reason_code: String,
    pub details: String,
}

impl ScoringFactor {
    fn new(
        name: &str,
        points: i32,
        max_points: i32,
        reason_code: impl Into<String>,
        details: String,
    ) -> Self {
        Self {
            name: name.to_string(),
            points,
            max_points,
            reason_code: reason_code.into(),
            details,
        }
    }
}

/// How a value is compared against a threshold row
#[derive(Debug, Clone, Copy)]
enum Comparison {
    Below,
    AtMost,
    AtLeast,
}

fn first_match(factor: &ThresholdFactor, value: f64, cmp: Comparison) -> Option<&Threshold> {
    factor.thresholds.iter().find(|t| match cmp {
        Comparison::Below => value < t.value,
        Comparison::AtMost => value <= t.value,
        Comparison::AtLeast => value >= t.value,
    })
}

/// Format with thousands separators and no decimals: `12345.6` -> `"12,346"`
pub(crate) fn group_thousands(value: f64) -> String {
    let raw = format!("{:.0}", value);
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(d) => ("-", d),
        None => ("", raw.as_str()),
    };

    let mut out = String::with_capacity(raw.len() + digits.len() / 3);
    out.push_str(sign);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub(crate) fn distance(config: &ThresholdFactor, distance_m: f64) -> ScoringFactor {
    let details = format!("Distance: {:.0}m", distance_m);
    match first_match(config, distance_m, Comparison::Below) {
        Some(t) => ScoringFactor::new("Distance", t.points, config.max_points, &t.reason_code, details),
        None => ScoringFactor::new(
            "Distance",
            0,
            config.max_points,
            "DISTANCE_FAR",
            format!("{} (beyond threshold)", details),
        ),
    }
}

pub(crate) fn ndvi_drop(config: &ThresholdFactor, drop: f64) -> ScoringFactor {
    let details = format!("NDVI drop: {:.3}", drop);
    match first_match(config, drop, Comparison::AtMost) {
        Some(t) => ScoringFactor::new("NDVI Drop", t.points, config.max_points, &t.reason_code, details),
        None => ScoringFactor::new(
            "NDVI Drop",
            0,
            config.max_points,
            "NDVI_DROP_MINIMAL",
            format!("{} (below threshold)", details),
        ),
    }
}

pub(crate) fn area(config: &ThresholdFactor, area_m2: f64) -> ScoringFactor {
    let details = format!("Area: {} m²", group_thousands(area_m2));
    match first_match(config, area_m2, Comparison::AtLeast) {
        Some(t) => ScoringFactor::new("Area", t.points, config.max_points, &t.reason_code, details),
        None => ScoringFactor::new(
            "Area",
            0,
            config.max_points,
            "AREA_SMALL",
            format!("{} (below threshold)", details),
        ),
    }
}

/// Base slope points, before any directional modifier
fn slope_base(config: &ThresholdFactor, slope_deg: f64) -> (i32, &str) {
    match first_match(config, slope_deg, Comparison::AtLeast) {
        Some(t) => (t.points, t.reason_code.as_str()),
        None => (0, "SLOPE_FLAT"),
    }
}

/// Multiplier applied to base slope points for a given elevation difference
/// (change minus asset), with its human-readable direction
pub(crate) fn directional_modifier(config: &DirectionalSlopeConfig, elevation_diff_m: f64) -> (f64, &'static str, String) {
    if elevation_diff_m > config.upslope_threshold_m {
        let span = config.upslope_multiplier_max - config.upslope_multiplier_base;
        let boost = span.min(span * elevation_diff_m / config.upslope_elev_scale);
        (
            config.upslope_multiplier_base + boost,
            "SLOPE_UPSLOPE",
            format!("upslope ({:.0}m higher)", elevation_diff_m),
        )
    } else if elevation_diff_m < config.downslope_threshold_m {
        let span = config.downslope_multiplier_base - config.downslope_multiplier_min;
        let cut = span.min(span * elevation_diff_m.abs() / config.downslope_elev_scale);
        (
            config.downslope_multiplier_base - cut,
            "SLOPE_DOWNSLOPE",
            format!("downslope ({:.0}m lower)", elevation_diff_m.abs()),
        )
    } else {
        (1.0, "SLOPE_LEVEL", "approximately level".to_string())
    }
}

/// Slope points, modified by direction when the elevation difference is known
pub(crate) fn directional_slope(
    slope: &ThresholdFactor,
    config: &DirectionalSlopeConfig,
    slope_deg: f64,
    elevation_diff_m: Option<f64>,
) -> ScoringFactor {
    let (base, base_code) = slope_base(slope, slope_deg);

    let Some(diff) = elevation_diff_m else {
        return ScoringFactor::new(
            "Slope",
            base,
            config.max_points,
            base_code,
            format!("Slope: {:.1}° (no elevation data)", slope_deg),
        );
    };

    let (modifier, code, description) = directional_modifier(config, diff);
    let points = ((f64::from(base) * modifier).floor() as i32).min(config.max_points);
    ScoringFactor::new(
        "Slope + Direction",
        points,
        config.max_points,
        code,
        format!("Slope: {:.1}°, {} (modifier: {:.2}x)", slope_deg, description, modifier),
    )
}

pub(crate) fn aspect(config: &AspectConfig, aspect_deg: f64) -> ScoringFactor {
    let bearing = aspect_deg.rem_euclid(360.0);
    let details = format!("Aspect: {:.0}° ({})", bearing, compass_direction(bearing));
    match config
        .ranges
        .iter()
        .find(|r| r.min_deg <= bearing && bearing < r.max_deg)
    {
        Some(r) => ScoringFactor::new("Aspect", r.points, config.max_points, &r.reason_code, details),
        None => ScoringFactor::new("Aspect", 0, config.max_points, "ASPECT_OTHER", details),
    }
}

/// Land cover adjustment of the running total. Returns the factor and the
/// new total.
pub(crate) fn land_cover(class: &str, multiplier: f64, subtotal: i32) -> (ScoringFactor, i32) {
    if multiplier == 1.0 {
        let factor = ScoringFactor::new(
            "Land Cover",
            0,
            0,
            format!("LANDCOVER_{}", class.to_uppercase()),
            format!("Land cover: {} (multiplier: 1.00x, baseline)", class),
        );
        return (factor, subtotal);
    }

    let adjusted = scale(subtotal, multiplier);
    let factor = ScoringFactor::new(
        "Land Cover",
        adjusted - subtotal,
        0,
        format!("LANDCOVER_{}", class.to_uppercase()),
        format!("Land cover: {} (multiplier: {:.2}x)", class, multiplier),
    );
    (factor, adjusted)
}

/// Landslide adjustment of the running total. Below the slope floor the
/// total is left unchanged.
pub(crate) fn landslide(
    config: &LandslideConfig,
    slope_deg: Option<f64>,
    elevation_diff_m: Option<f64>,
    subtotal: i32,
) -> (ScoringFactor, i32) {
    let slope = slope_deg.unwrap_or(0.0);
    if slope < config.min_slope_deg {
        let factor = ScoringFactor::new(
            "Landslide Detection",
            0,
            0,
            "LANDSLIDE_LOW_SLOPE",
            format!(
                "Landslide detected but slope {:.1}° < {:.0}° threshold",
                slope, config.min_slope_deg
            ),
        );
        return (factor, subtotal);
    }

    let upslope = elevation_diff_m.is_some_and(|d| d > 5.0);
    let multiplier = if upslope {
        (config.multiplier + config.upslope_boost).min(config.max_multiplier)
    } else {
        config.multiplier
    };
    let direction = match elevation_diff_m {
        Some(d) if d > 5.0 => format!("upslope ({:.0}m higher)", d),
        Some(d) if d < -5.0 => format!("downslope ({:.0}m lower)", d.abs()),
        _ => "level/unknown terrain".to_string(),
    };

    let adjusted = scale(subtotal, multiplier);
    let factor = ScoringFactor::new(
        "Landslide Detection",
        adjusted - subtotal,
        0,
        if upslope { "LANDSLIDE_UPSLOPE" } else { "LANDSLIDE_DETECTED" },
        format!(
            "Landslide on {:.1}° slope, {} (multiplier: {:.2}x)",
            slope, direction, multiplier
        ),
    );
    (factor, adjusted)
}

/// Criticality adjustment of the running total
pub(crate) fn criticality(name: &str, multiplier: f64, max_points: i32, subtotal: i32) -> (ScoringFactor, i32) {
    let adjusted = scale(subtotal, multiplier);
    let factor = ScoringFactor::new(
        "Criticality",
        adjusted - subtotal,
        max_points,
        format!("CRITICALITY_{}", name.to_uppercase()),
        format!("Multiplier: {:?}x for {} criticality", multiplier, name),
    );
    (factor, adjusted)
}

/// `floor(total * multiplier)`
fn scale(total: i32, multiplier: f64) -> i32 {
    (f64::from(total) * multiplier).floor() as i32
}

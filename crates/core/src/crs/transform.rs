//! Point transformation between supported CRS families

use super::utm;
use super::{CrsKind, CRS};
use crate::error::Result;

/// Transforms coordinates from one CRS to another, routing through WGS84.
///
/// Built once per frame pair and reused for every coordinate; construction
/// fails with [`crate::Error::UnsupportedCrs`] for CRS the pipeline cannot
/// compute with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transformer {
    from: CrsKind,
    to: CrsKind,
}

impl Transformer {
    pub fn new(from: &CRS, to: &CRS) -> Result<Self> {
        Ok(Self {
            from: from.kind()?,
            to: to.kind()?,
        })
    }

    /// Transformer between two already-resolved kinds
    pub fn from_kinds(from: CrsKind, to: CrsKind) -> Self {
        Self { from, to }
    }

    /// WGS84 into the given UTM zone
    pub fn wgs84_to_utm(zone: u32, north: bool) -> Self {
        Self::from_kinds(CrsKind::Geographic, CrsKind::Utm { zone, north })
    }

    pub fn source(&self) -> CrsKind {
        self.from
    }

    pub fn target(&self) -> CrsKind {
        self.to
    }

    /// Whether source and target are the same frame
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Transformer in the opposite direction
    pub fn inverse(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }

    /// Transform a single (x, y) coordinate
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_identity() {
            return (x, y);
        }
        let (lon, lat) = to_wgs84(self.from, x, y);
        from_wgs84(self.to, lon, lat)
    }
}

fn to_wgs84(kind: CrsKind, x: f64, y: f64) -> (f64, f64) {
    match kind {
        CrsKind::Geographic => (x, y),
        CrsKind::Utm { zone, north } => utm::utm_to_wgs84(x, y, zone, north),
        CrsKind::WebMercator => utm::web_mercator_to_wgs84(x, y),
    }
}

fn from_wgs84(kind: CrsKind, lon: f64, lat: f64) -> (f64, f64) {
    match kind {
        CrsKind::Geographic => (lon, lat),
        CrsKind::Utm { zone, north } => utm::wgs84_to_utm(lon, lat, zone, north),
        CrsKind::WebMercator => utm::wgs84_to_web_mercator(lon, lat),
    }
}

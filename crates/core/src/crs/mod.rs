//! Coordinate Reference System handling

mod transform;
pub mod utm;

pub use transform::Transformer;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG codes treated as geographic lon/lat on the WGS84 datum or close to it
const GEOGRAPHIC_EPSG: &[u32] = &[4326, 4269, 4258, 4283, 4617, 4979];

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

/// The projection families the risk pipeline can compute with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Longitude/latitude in degrees
    Geographic,
    /// WGS84 UTM zone
    Utm { zone: u32, north: bool },
    /// Spherical Web Mercator (EPSG:3857)
    WebMercator,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// WGS84 UTM zone CRS (EPSG 326xx / 327xx)
    pub fn utm(zone: u32, north: bool) -> Self {
        Self::from_epsg(utm::utm_epsg(zone, north))
    }

    /// UTM CRS of the zone containing a WGS84 point
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        let (zone, north) = utm::utm_zone_for(lon, lat);
        Self::utm(zone, north)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Resolve the projection family.
    ///
    /// EPSG codes are checked first, then PROJ strings, then WKT (by its
    /// trailing EPSG authority or its UTM zone name).
    pub fn kind(&self) -> Result<CrsKind> {
        if let Some(code) = self.epsg {
            return kind_from_epsg(code).ok_or_else(|| Error::UnsupportedCrs(self.identifier()));
        }
        if let Some(proj) = &self.proj {
            return kind_from_proj(proj).ok_or_else(|| Error::UnsupportedCrs(self.identifier()));
        }
        if let Some(wkt) = &self.wkt {
            return kind_from_wkt(wkt).ok_or_else(|| Error::UnsupportedCrs(self.identifier()));
        }
        Err(Error::UnsupportedCrs(self.identifier()))
    }

    /// Whether coordinates are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        matches!(self.kind(), Ok(CrsKind::Geographic))
    }

    /// Whether coordinates are metric projected coordinates
    pub fn is_projected(&self) -> bool {
        matches!(self.kind(), Ok(CrsKind::Utm { .. } | CrsKind::WebMercator))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Ok(a), Ok(b)) = (self.kind(), other.kind()) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }
        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

fn kind_from_epsg(code: u32) -> Option<CrsKind> {
    if GEOGRAPHIC_EPSG.contains(&code) {
        return Some(CrsKind::Geographic);
    }
    if code == 3857 || code == 900913 {
        return Some(CrsKind::WebMercator);
    }
    utm::parse_utm_epsg(code).map(|(zone, north)| CrsKind::Utm { zone, north })
}

fn kind_from_proj(proj: &str) -> Option<CrsKind> {
    let params: Vec<&str> = proj.split_whitespace().collect();
    let value = |key: &str| {
        params
            .iter()
            .find_map(|p| p.strip_prefix(key).and_then(|rest| rest.strip_prefix('=')))
    };

    match value("+proj")? {
        "longlat" | "latlong" => Some(CrsKind::Geographic),
        "utm" => {
            let zone: u32 = value("+zone")?.parse().ok()?;
            if !(1..=60).contains(&zone) {
                return None;
            }
            let north = !params.contains(&"+south");
            Some(CrsKind::Utm { zone, north })
        }
        "webmerc" => Some(CrsKind::WebMercator),
        _ => None,
    }
}

fn kind_from_wkt(wkt: &str) -> Option<CrsKind> {
    // Top-level authority is the last EPSG entry in WKT1 and WKT2 alike
    let upper = wkt.to_ascii_uppercase();
    if let Some(pos) = upper.rfind("\"EPSG\",") {
        let digits: String = upper[pos + 7..]
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Some(kind) = digits.parse().ok().and_then(kind_from_epsg) {
            return Some(kind);
        }
    }

    if let Some(pos) = upper.find("UTM ZONE ") {
        let rest = &upper[pos + 9..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let zone: u32 = digits.parse().ok()?;
        let north = rest[digits.len()..].starts_with('N');
        return (1..=60).contains(&zone).then_some(CrsKind::Utm { zone, north });
    }

    if upper.starts_with("GEOGCS") || upper.starts_with("GEOGCRS") {
        return Some(CrsKind::Geographic);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn test_crs_equivalence() {
        let a = CRS::from_epsg(32610);
        let b = CRS::from_proj("+proj=utm +zone=10 +datum=WGS84 +units=m");
        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&CRS::wgs84()));
    }

    #[test]
    fn test_kind_utm() {
        assert_eq!(
            CRS::utm_for(-58.4, -34.6).kind().unwrap(),
            CrsKind::Utm { zone: 21, north: false }
        );
        assert!(CRS::from_epsg(32721).is_projected());
        assert!(CRS::web_mercator().is_projected());
    }

    #[test]
    fn test_kind_proj_south() {
        let crs = CRS::from_proj("+proj=utm +zone=33 +south +datum=WGS84");
        assert_eq!(crs.kind().unwrap(), CrsKind::Utm { zone: 33, north: false });
    }

    #[test]
    fn test_kind_wkt() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 30N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32630"]]"#;
        assert_eq!(
            CRS::from_wkt(wkt).kind().unwrap(),
            CrsKind::Utm { zone: 30, north: true }
        );
        let geog = r#"GEOGCS["WGS 84",DATUM["WGS_1984"]]"#;
        assert!(CRS::from_wkt(geog).is_geographic());
    }

    #[test]
    fn test_unsupported() {
        let err = CRS::from_epsg(2154).kind().unwrap_err();
        assert!(matches!(err, Error::UnsupportedCrs(_)));
        assert!(!CRS::from_epsg(2154).is_projected());
    }
}

//! Geometry capability used by the risk pipeline

use super::BoundingBox;
use crate::crs::Transformer;
use crate::error::{Error, Result};
use geo::{Area, BoundingRect, Centroid, CoordsIter, Distance, Euclidean, Intersects, MapCoords};
use geo_types::{Coord, Geometry, LineString, Point};

/// Centroid, distance, area, bounds and reprojection over `geo` geometries.
///
/// All measures are in the geometry's own CRS units; reproject into a
/// metric frame before asking for meters.
pub trait GeometryExt {
    /// Centroid point, or a geometry error for empty geometries
    fn centroid_point(&self) -> Result<Point<f64>>;

    /// Minimum Euclidean distance to `other` (0 when they intersect)
    fn distance_to(&self, other: &Geometry<f64>) -> f64;

    /// Unsigned planar area
    fn planar_area(&self) -> f64;

    /// Axis-aligned bounds
    fn bounds(&self) -> Option<BoundingBox>;

    /// Copy with every coordinate passed through `transformer`
    fn reproject(&self, transformer: &Transformer) -> Result<Geometry<f64>>;

    /// Reject empty geometries, non-finite coordinates and unclosable rings
    fn validate(&self) -> Result<()>;
}

impl GeometryExt for Geometry<f64> {
    fn centroid_point(&self) -> Result<Point<f64>> {
        self.centroid()
            .filter(|p| p.x().is_finite() && p.y().is_finite())
            .ok_or_else(|| Error::Geometry("geometry has no centroid".into()))
    }

    fn distance_to(&self, other: &Geometry<f64>) -> f64 {
        if self.intersects(other) {
            return 0.0;
        }

        Euclidean::distance(self, other)
    }

    fn planar_area(&self) -> f64 {
        self.unsigned_area()
    }

    fn bounds(&self) -> Option<BoundingBox> {
        self.bounding_rect().map(|rect| BoundingBox {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        })
    }

    fn reproject(&self, transformer: &Transformer) -> Result<Geometry<f64>> {
        if transformer.is_identity() {
            return Ok(self.clone());
        }
        let out = self.map_coords(|c| {
            let (x, y) = transformer.transform(c.x, c.y);
            Coord { x, y }
        });
        if out.coords_iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(Error::Geometry("reprojection produced non-finite coordinates".into()));
        }
        Ok(out)
    }

    fn validate(&self) -> Result<()> {
        if self.coords_count() == 0 {
            return Err(Error::Geometry("empty geometry".into()));
        }
        if self.coords_iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(Error::Geometry("non-finite coordinate".into()));
        }
        let short_ring = |ring: &LineString<f64>| ring.0.len() < 4;
        let bad = match self {
            Geometry::Polygon(p) => short_ring(p.exterior()),
            Geometry::MultiPolygon(mp) => mp.0.iter().any(|p| short_ring(p.exterior())),
            Geometry::LineString(ls) => ls.0.len() < 2,
            _ => false,
        };
        if bad {
            return Err(Error::Geometry("degenerate ring or line".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use approx::assert_relative_eq;
    use geo_types::{line_string, point, polygon};

    fn square(x0: f64, y0: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
        ])
    }

    #[test]
    fn test_area_and_centroid() {
        let sq = square(0.0, 0.0, 10.0);
        assert_relative_eq!(sq.planar_area(), 100.0);
        let c = sq.centroid_point().unwrap();
        assert_relative_eq!(c.x(), 5.0);
        assert_relative_eq!(c.y(), 5.0);
    }

    #[test]
    fn test_distance_polygon_point() {
        let sq = square(0.0, 0.0, 10.0);
        let p = Geometry::Point(point!(x: 13.0, y: 14.0));
        assert_relative_eq!(sq.distance_to(&p), 5.0, epsilon = 1e-12);

        let inside = Geometry::Point(point!(x: 5.0, y: 5.0));
        assert_eq!(sq.distance_to(&inside), 0.0);
    }

    #[test]
    fn test_distance_polygon_line() {
        let sq = square(0.0, 0.0, 10.0);
        let line = Geometry::LineString(line_string![(x: 15.0, y: -5.0), (x: 15.0, y: 20.0)]);
        assert_relative_eq!(sq.distance_to(&line), 5.0, epsilon = 1e-12);
        assert_relative_eq!(line.distance_to(&sq), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_polygons() {
        let a = square(0.0, 0.0, 10.0);
        let b = square(13.0, 14.0, 2.0);
        assert_relative_eq!(a.distance_to(&b), 5.0, epsilon = 1e-12);
        let overlapping = square(5.0, 5.0, 10.0);
        assert_eq!(a.distance_to(&overlapping), 0.0);
    }

    #[test]
    fn test_distance_diagonal_gap() {
        let sq = square(0.0, 0.0, 10.0);
        let line = Geometry::LineString(line_string![(x: 20.0, y: 5.0), (x: 5.0, y: 20.0)]);
        // Nearest approach is from the corner (10, 10) to the line midpoint
        assert_relative_eq!(sq.distance_to(&line), 2.5 * 2f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_reproject_roundtrip() {
        let geom = Geometry::Point(point!(x: -3.7037, y: 40.4168));
        let to_utm = Transformer::new(&CRS::wgs84(), &CRS::utm(30, true)).unwrap();
        let utm = geom.reproject(&to_utm).unwrap();
        let back = utm.reproject(&to_utm.inverse()).unwrap();
        let p = back.centroid_point().unwrap();
        assert_relative_eq!(p.x(), -3.7037, epsilon = 1e-7);
        assert_relative_eq!(p.y(), 40.4168, epsilon = 1e-7);
    }

    #[test]
    fn test_validate() {
        assert!(square(0.0, 0.0, 1.0).validate().is_ok());
        let nan = Geometry::Point(point!(x: f64::NAN, y: 0.0));
        assert!(matches!(nan.validate(), Err(Error::Geometry(_))));
    }
}

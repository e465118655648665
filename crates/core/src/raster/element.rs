//! Cell value trait for rasters

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a raster cell.
///
/// Index rasters (NDVI, elevation, slope) use `f64`; change masks use `u8`.
pub trait RasterElement:
    Copy + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Value used for missing cells when none is configured
    fn default_nodata() -> Self;

    /// Whether this value is missing, given an optional configured nodata value
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Lossy conversion to `f64`
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Lossy conversion from `f64`, falling back to the default nodata value
    fn from_f64(value: f64) -> Self {
        NumCast::from(value).unwrap_or_else(Self::default_nodata)
    }
}

macro_rules! impl_raster_element_int {
    ($($t:ty),*) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    <$t>::MAX
                }

                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    nodata.map_or(false, |nd| *self == nd)
                }
            }
        )*
    };
}

macro_rules! impl_raster_element_float {
    ($($t:ty),*) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    <$t>::NAN
                }

                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    if self.is_nan() {
                        return true;
                    }
                    match nodata {
                        Some(nd) if nd.is_nan() => false,
                        Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                        None => false,
                    }
                }
            }
        )*
    };
}

impl_raster_element_int!(u8, u16, i16, i32, u32);
impl_raster_element_float!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_nan_is_nodata() {
        assert!(f64::NAN.is_nodata(None));
        assert!(!0.5_f64.is_nodata(Some(f64::NAN)));
        assert!((-9999.0_f64).is_nodata(Some(-9999.0)));
    }

    #[test]
    fn test_int_nodata() {
        assert!(255_u8.is_nodata(Some(255)));
        assert!(!1_u8.is_nodata(None));
        assert_eq!(u8::from_f64(300.0), u8::MAX);
    }
}

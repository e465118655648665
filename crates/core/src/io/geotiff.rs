//! Native GeoTIFF reading/writing on top of the `tiff` crate
//!
//! Georeferencing comes from ModelPixelScale + ModelTiepoint, the CRS from
//! the EPSG code in the GeoKeyDirectory and nodata from the GDAL_NODATA tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;
use tracing::debug;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Read the first band of a GeoTIFF file
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read the first band of a GeoTIFF held in memory
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let (rows, cols) = (height as usize, width as usize);

    // Tags are read before the image data
    let transform = read_geotransform(&mut decoder);
    let crs = read_crs(&mut decoder);
    let nodata = read_nodata(&mut decoder);

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(&buf),
        DecodingResult::F64(buf) => cast_all(&buf),
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::I8(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    // Multi-sample images keep only the first band
    let samples = data.len() / (rows * cols).max(1);
    let data = if samples > 1 {
        data.into_iter().step_by(samples).collect()
    } else {
        data
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = transform {
        raster.set_transform(transform);
    }
    raster.set_crs(crs);
    raster.set_nodata(nodata.map(T::from_f64));

    debug!(rows, cols, crs = ?raster.crs(), "decoded GeoTIFF");
    Ok(raster)
}

fn cast_all<S, T>(buf: &[S]) -> Vec<T>
where
    S: Copy + num_traits::NumCast,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u32_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if keys.len() < 4 {
        return None;
    }

    // Header [version, revision, minor, count] then 4-value key entries
    let count = keys[3] as usize;
    keys[4..]
        .chunks_exact(4)
        .take(count)
        .find_map(|entry| {
            let key = entry[0] as u16;
            let inline = entry[1] == 0;
            let value = entry[3];
            match key {
                PROJECTED_CS_TYPE_KEY | GEOGRAPHIC_TYPE_KEY
                    if inline && value > 0 && value != 32767 =>
                {
                    Some(CRS::from_epsg(value))
                }
                _ => None,
            }
        })
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_end_matches('\0').trim().parse::<f64>().ok())
}

/// Write a raster as a single-band 32-bit float GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a raster into an in-memory GeoTIFF
pub fn write_geotiff_to_buffer<T: RasterElement>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let tiff_err = |what: &str, e: tiff::TiffError| Error::Other(format!("{}: {}", what, e));

    let mut encoder = TiffEncoder::new(writer).map_err(|e| tiff_err("TIFF encoder error", e))?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| tiff_err("Cannot create TIFF image", e))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| tiff_err("Cannot write scale tag", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| tiff_err("Cannot write tiepoint tag", e))?;

    let geokeys = geo_key_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(|e| tiff_err("Cannot write geokey tag", e))?;

    if let Some(nodata) = raster.nodata().and_then(|v| v.to_f64()) {
        let text = format!("{}", nodata);
        image
            .encoder()
            .write_tag(Tag::GdalNodata, text.as_str())
            .map_err(|e| tiff_err("Cannot write nodata tag", e))?;
    }

    image
        .write_data(&data)
        .map_err(|e| tiff_err("Cannot write image data", e))?;

    Ok(())
}

/// GeoKeyDirectory with model type, raster type and the EPSG key when known
fn geo_key_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs
        .and_then(|c| c.epsg())
        .and_then(|code| u16::try_from(code).ok());
    let geographic = crs.map_or(false, |c| c.is_geographic());
    let model_type = if geographic { 2 } else { 1 };

    let mut keys: Vec<u16> = vec![
        1, 1, 0, 2, // version 1.1.0, key count patched below
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some(code) = epsg {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        keys.extend_from_slice(&[key, 0, 1, code]);
        keys[3] = 3;
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> Raster<f64> {
        let mut r = Raster::from_vec((0..12).map(|v| v as f64 * 0.1).collect(), 3, 4).unwrap();
        r.set_transform(GeoTransform::new(500_000.0, 4_200_000.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32610)));
        r.set_nodata(Some(-9999.0));
        r
    }

    #[test]
    fn test_buffer_roundtrip_keeps_georeferencing() {
        let raster = sample();
        let bytes = write_geotiff_to_buffer(&raster).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), (3, 4));
        assert_relative_eq!(back.get(2, 3).unwrap(), 1.1, epsilon = 1e-6);
        assert_eq!(back.transform(), raster.transform());
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32610));
        assert_eq!(back.nodata(), Some(-9999.0));
    }

    #[test]
    fn test_file_roundtrip_geographic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");

        let mut raster: Raster<f32> = Raster::filled(5, 5, 120.0);
        raster.set_transform(GeoTransform::new(-120.0, 38.0, 0.001, -0.001));
        raster.set_crs(Some(CRS::wgs84()));
        write_geotiff(&raster, &path).unwrap();

        let back: Raster<f32> = read_geotiff(&path).unwrap();
        assert_eq!(back.get(4, 4).unwrap(), 120.0);
        assert!(back.crs().map_or(false, |c| c.is_geographic()));
    }

    #[test]
    fn test_file_roundtrip_projected_dem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("utm.tif");

        let mut raster: Raster<f64> = Raster::filled(4, 6, 2000.0);
        raster.set_transform(GeoTransform::new(500_000.0, 4_985_000.0, 30.0, -30.0));
        raster.set_crs(Some(CRS::from_epsg(32633)));
        raster.set_nodata(Some(-32768.0));
        write_geotiff(&raster, &path).unwrap();

        let back: Raster<f64> = read_geotiff(&path).unwrap();
        let gt = back.transform();
        assert_relative_eq!(gt.origin_x, 500_000.0);
        assert_relative_eq!(gt.origin_y, 4_985_000.0);
        assert_relative_eq!(gt.pixel_width, 30.0);
        assert_relative_eq!(gt.pixel_height, -30.0);
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32633));
        assert_eq!(back.nodata(), Some(-32768.0));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_geotiff::<f64, _>("/nonexistent/dem.tif").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

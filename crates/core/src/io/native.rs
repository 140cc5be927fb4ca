//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Only the georeferencing needed to place a north-up
//! grid is read and written (pixel scale, tiepoint and the EPSG GeoKey), plus
//! the GDAL no-data tag so integer event rasters survive a round trip.
//! Integer rasters are written as signed 32-bit samples, float rasters as
//! 32-bit floats.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{ColorType, Gray32Float, GrayI32};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const KEY_MODEL_TYPE: u16 = 1024;
const KEY_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_PROJECTED: u16 = 1;
const MODEL_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Value written in place of no-data cells of float rasters. Defaults to
    /// NaN. Integer rasters always write their own no-data value.
    pub nodata_fill: Option<f32>,
}

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

/// Internal: decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder.dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let nodata_tag: Option<f64> = decoder
        .find_tag(Tag::GdalNodata)
        .map_err(|e| Error::Other(format!("Cannot read nodata tag: {}", e)))?
        .and_then(|v| v.into_string().ok())
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

    let transform = read_geotransform(&mut decoder)?;
    let crs = read_crs(&mut decoder)?;

    let result = decoder.read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let values: Vec<f64> = match result {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    if values.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    // NaN and the declared no-data value both map to the element's no-data.
    let data: Vec<T> = values
        .into_iter()
        .map(|v| {
            let is_nd = v.is_nan() || nodata_tag.map_or(false, |nd| (v - nd).abs() < 1e-9);
            if is_nd {
                T::default_nodata()
            } else {
                num_traits::cast(v).unwrap_or_else(T::default_nodata)
            }
        })
        .collect();

    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_nodata(Some(T::default_nodata()));
    raster.set_transform(transform);
    raster.set_crs(crs);

    Ok(raster)
}

/// GeoTransform from the model pixel scale and tiepoint tags.
///
/// A file without either tag has no usable georeference and is rejected.
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = read_f64_tag(decoder, Tag::ModelPixelScaleTag, "pixel scale")?;
    let tiepoint = read_f64_tag(decoder, Tag::ModelTiepointTag, "tiepoint")?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(Error::Other(format!(
            "Cannot determine geotransform: {} scale and {} tiepoint values",
            scale.len(),
            tiepoint.len()
        )));
    }

    // tiepoint: [I, J, K, X, Y, Z]
    // scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_f64_tag<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
    name: &str,
) -> Result<Vec<f64>> {
    decoder
        .find_tag(tag)
        .map_err(|e| Error::Other(format!("Cannot read {} tag: {}", name, e)))?
        .ok_or_else(|| Error::Other(format!("Missing {} tag, raster is not georeferenced", name)))?
        .into_f64_vec()
        .map_err(|e| Error::Other(format!("Malformed {} tag: {}", name, e)))
}

/// EPSG code from the GeoKey directory, when one is declared.
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Option<CRS>> {
    let keys = match decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .map_err(|e| Error::Other(format!("Cannot read geokey tag: {}", e)))?
    {
        Some(v) => v
            .into_u16_vec()
            .map_err(|e| Error::Other(format!("Malformed geokey tag: {}", e)))?,
        None => return Ok(None),
    };
    Ok(crs_from_geokeys(&keys))
}

/// Parse `[version, revision, minor, count, (key, location, count, value)*]`.
///
/// Only inline short values (location 0) are considered. A projected code
/// wins over a geographic one.
fn crs_from_geokeys(keys: &[u16]) -> Option<CRS> {
    let count = usize::from(*keys.get(3)?);
    let mut geographic = None;
    let mut projected = None;
    for entry in keys.get(4..)?.chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == 0 || value == 32767 {
            continue;
        }
        match key {
            KEY_GEOGRAPHIC_TYPE => geographic = Some(u32::from(value)),
            KEY_PROJECTED_CS_TYPE => projected = Some(u32::from(value)),
            _ => {}
        }
    }
    projected.or(geographic).map(CRS::from_epsg)
}

fn geokeys_for(crs: Option<&CRS>) -> Vec<u16> {
    let geographic = crs.map_or(false, |c| c.is_geographic());
    let model = if geographic { MODEL_GEOGRAPHIC } else { MODEL_PROJECTED };
    let mut entries = vec![
        [KEY_MODEL_TYPE, 0, 1, model],
        [KEY_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA],
    ];
    if let Some(code) = crs.and_then(|c| c.epsg()).and_then(|e| u16::try_from(e).ok()) {
        let key = if geographic { KEY_GEOGRAPHIC_TYPE } else { KEY_PROJECTED_CS_TYPE };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.into_iter().flatten());
    keys
}

/// Write a Raster to a GeoTIFF file.
///
/// Integer element types are written as `i32` samples, float types as `f32`.
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, BufWriter::new(file), options.unwrap_or_default())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

/// Internal: encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    if T::is_float() {
        let fill = options.nodata_fill.unwrap_or(f32::NAN);
        let data: Vec<f32> = samples(raster, fill);
        let nodata_text = if fill.is_nan() { "nan".to_string() } else { fill.to_string() };
        encode_image::<Gray32Float, _, _>(raster, writer, &data, &nodata_text)
    } else {
        let fill: i32 = raster
            .nodata()
            .and_then(num_traits::cast)
            .or_else(|| num_traits::cast(T::default_nodata()))
            .unwrap_or(i32::MIN);
        let data: Vec<i32> = samples(raster, fill);
        encode_image::<GrayI32, _, _>(raster, writer, &data, &fill.to_string())
    }
}

/// Cell values cast to the sample type, with `fill` in no-data cells.
fn samples<T, S>(raster: &Raster<T>, fill: S) -> Vec<S>
where
    T: RasterElement,
    S: num_traits::NumCast + Copy,
{
    raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                fill
            } else {
                num_traits::cast(v).unwrap_or(fill)
            }
        })
        .collect()
}

fn encode_image<C, T, W>(
    raster: &Raster<T>,
    writer: W,
    data: &[C::Inner],
    nodata_text: &str,
) -> Result<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();

    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, scale.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, tiepoint.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = geokeys_for(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    image
        .encoder()
        .write_tag(Tag::GdalNodata, nodata_text)
        .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;

    image
        .write_data(data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

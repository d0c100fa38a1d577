//! Single-band GeoTIFF decoding via the pure-Rust `tiff` crate.
//!
//! Georeferencing comes from ModelPixelScale + ModelTiepoint; the CRS from
//! the GeoKey directory. NaN cells and cells equal to the GDAL_NODATA value
//! are absent.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use super::{clip_raster, RasterCodec};
use crate::alignment::Alignment;
use crate::casting::u32_to_usize;
use crate::error::DecodeError;
use crate::geometry::{Extent, SnapType};
use crate::raster::Raster;

pub(crate) const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
pub(crate) const GEOTIFF_MODELTIEPOINT: u16 = 33922;
pub(crate) const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
pub(crate) const GDAL_NODATA: u16 = 42113;

pub(crate) const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
pub(crate) const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

/// GeoKey value meaning "user defined", which carries no EPSG code.
const USER_DEFINED: u16 = 32767;

/// Stateless GeoTIFF reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffCodec;

struct Header {
    alignment: Alignment,
    nodata: Option<f64>,
}

impl GeoTiffCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn open(path: &Path) -> Result<Decoder<BufReader<File>>, DecodeError> {
        let file = File::open(path)?;
        Decoder::new(BufReader::new(file)).map_err(|e| DecodeError::raster(path, e.to_string()))
    }

    fn read_header(path: &Path, decoder: &mut Decoder<BufReader<File>>) -> Result<Header, DecodeError> {
        let invalid = |e: tiff::TiffError| DecodeError::raster(path, e.to_string());

        let (width, height) = decoder.dimensions().map_err(invalid)?;
        let scale = decoder
            .find_tag(Tag::from_u16_exhaustive(GEOTIFF_MODELPIXELSCALE))
            .map_err(invalid)?
            .map(|v| v.into_f64_vec())
            .transpose()
            .map_err(invalid)?
            .ok_or_else(|| DecodeError::raster(path, "missing ModelPixelScale tag"))?;
        let tiepoint = decoder
            .find_tag(Tag::from_u16_exhaustive(GEOTIFF_MODELTIEPOINT))
            .map_err(invalid)?
            .map(|v| v.into_f64_vec())
            .transpose()
            .map_err(invalid)?
            .ok_or_else(|| DecodeError::raster(path, "missing ModelTiepoint tag"))?;

        if scale.len() < 2 || tiepoint.len() < 6 {
            return Err(DecodeError::raster(path, "truncated georeferencing tags"));
        }
        let (xres, yres) = (scale[0], scale[1].abs());
        if !(xres > 0.0 && yres > 0.0) {
            return Err(DecodeError::raster(
                path,
                format!("cell size {xres} x {yres} is not positive"),
            ));
        }

        let nrow = u32_to_usize(height);
        let ncol = u32_to_usize(width);
        let xmin = tiepoint[3] - tiepoint[0] * xres;
        let ymax = tiepoint[4] + tiepoint[1] * yres;
        #[allow(clippy::cast_precision_loss)]
        let ymin = ymax - nrow as f64 * yres;

        let crs = decoder
            .find_tag(Tag::from_u16_exhaustive(GEOTIFF_GEOKEYDIRECTORY))
            .map_err(invalid)?
            .and_then(|v| v.into_u16_vec().ok())
            .and_then(|keys| epsg_from_geokeys(&keys));

        let nodata = decoder
            .find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))
            .map_err(invalid)?
            .and_then(|v| v.into_string().ok())
            .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok());

        Ok(Header {
            alignment: Alignment::new(xmin, ymin, nrow, ncol, xres, yres, crs),
            nodata,
        })
    }
}

impl RasterCodec for GeoTiffCodec {
    fn read_alignment(&self, path: &Path) -> Result<Alignment, DecodeError> {
        let mut decoder = Self::open(path)?;
        Ok(Self::read_header(path, &mut decoder)?.alignment)
    }

    fn decode(&self, path: &Path, clip: Option<&Extent>) -> Result<Raster, DecodeError> {
        let mut decoder = Self::open(path)?;
        let header = Self::read_header(path, &mut decoder)?;
        if clip.is_some_and(|extent| header.alignment.crop(extent, SnapType::Out).is_none()) {
            return Ok(clip_raster(Raster::empty(header.alignment), clip));
        }
        let image = decoder
            .read_image()
            .map_err(|e| DecodeError::raster(path, e.to_string()))?;

        let values = first_band(image).ok_or_else(|| DecodeError::raster(path, "unsupported sample format"))?;
        let ncell = header.alignment.cell_count();
        if ncell == 0 || values.len() < ncell || values.len() % ncell != 0 {
            return Err(DecodeError::raster(
                path,
                format!("{} samples for {} cells", values.len(), ncell),
            ));
        }

        let stride = values.len() / ncell;
        let cells = values
            .into_iter()
            .step_by(stride)
            .map(|v| cell_value(v, header.nodata))
            .collect();

        let raster = Raster {
            alignment: header.alignment,
            cells,
        };
        tracing::debug!(
            path = %path.display(),
            nrow = raster.alignment.nrow,
            ncol = raster.alignment.ncol,
            "Decoded GeoTIFF"
        );
        Ok(clip_raster(raster, clip))
    }
}

/// EPSG code from a GeoKey directory: projected CS first, then geographic.
fn epsg_from_geokeys(keys: &[u16]) -> Option<i32> {
    let entries = keys.get(4..)?;
    let lookup = |wanted: u16| {
        entries
            .chunks_exact(4)
            .find(|k| k[0] == wanted && k[1] == 0)
            .map(|k| k[3])
            .filter(|&v| v != 0 && v != USER_DEFINED)
    };
    lookup(PROJECTED_CS_TYPE_GEO_KEY)
        .or_else(|| lookup(GEOGRAPHIC_TYPE_GEO_KEY))
        .map(i32::from)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn first_band(image: DecodingResult) -> Option<Vec<f64>> {
    let values = match image {
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(values)
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn cell_value(value: f64, nodata: Option<f64>) -> Option<f32> {
    if value.is_nan() || nodata.is_some_and(|nd| value == nd || (value as f32) == (nd as f32)) {
        None
    } else {
        Some(value as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geotiff_writer::GeoTiffWriter;

    fn sample() -> Raster {
        let a = Alignment::new(500_000.0, 4_000_000.0, 3, 4, 2.0, 2.0, Some(32610));
        let cells = (0..12)
            .map(|i| if i == 5 { None } else { Some(i as f32) })
            .collect();
        Raster::from_cells(a, cells).unwrap()
    }

    #[test]
    fn test_geokeys_projected_first() {
        let keys = [1, 1, 0, 3, 1024, 0, 1, 1, 2048, 0, 1, 4326, 3072, 0, 1, 32610];
        assert_eq!(epsg_from_geokeys(&keys), Some(32610));
        let keys = [1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326];
        assert_eq!(epsg_from_geokeys(&keys), Some(4326));
        let keys = [1, 1, 0, 1, 3072, 0, 1, USER_DEFINED];
        assert_eq!(epsg_from_geokeys(&keys), None);
    }

    #[test]
    fn test_cell_value_nodata() {
        assert_eq!(cell_value(f64::NAN, None), None);
        assert_eq!(cell_value(-9999.0, Some(-9999.0)), None);
        assert_eq!(cell_value(0.0, Some(-9999.0)), Some(0.0));
    }

    #[test]
    fn test_decode_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.tif");
        let raster = sample();
        GeoTiffWriter::new(&raster).write(&path).unwrap();

        let codec = GeoTiffCodec::new();
        let alignment = codec.read_alignment(&path).unwrap();
        assert_eq!(alignment, raster.alignment);

        let decoded = codec.decode(&path, None).unwrap();
        assert_eq!(decoded, raster);
    }

    #[test]
    fn test_decode_with_clip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.tif");
        GeoTiffWriter::new(&sample()).write(&path).unwrap();

        let clip = Extent::new(500_001.0, 4_000_003.0, 500_003.0, 4_000_005.0);
        let decoded = GeoTiffCodec::new().decode(&path, Some(&clip)).unwrap();
        assert_eq!((decoded.alignment.nrow, decoded.alignment.ncol), (2, 2));
        assert_eq!(decoded.alignment.xmin, 500_000.0);
        // top-left of the clip is row 0, col 0 of the file
        assert_eq!(decoded.get(0, 0), Some(0.0));
        assert_eq!(decoded.get(1, 1), None);
    }

    #[test]
    fn test_clip_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.tif");
        GeoTiffWriter::new(&sample()).write(&path).unwrap();

        let far = Extent::new(0.0, 0.0, 10.0, 10.0);
        let decoded = GeoTiffCodec::new().decode(&path, Some(&far)).unwrap();
        assert_eq!((decoded.alignment.nrow, decoded.alignment.ncol), (0, 0));
        assert!(decoded.cells.is_empty());
        assert_eq!(decoded.alignment.xres, 2.0);
    }

    #[test]
    fn test_missing_file() {
        let err = GeoTiffCodec::new()
            .decode(Path::new("/nonexistent/tile.tif"), None)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }

    #[test]
    fn test_not_a_tiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.tif");
        std::fs::write(&path, b"definitely not a tiff").unwrap();
        let err = GeoTiffCodec::new().read_alignment(&path).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidRaster { .. }));
    }
}

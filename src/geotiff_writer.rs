//! GeoTIFF writer for mosaics and tiles
//!
//! Writes a [`Raster`] as a single-band `f32` GeoTIFF with pixel scale,
//! tiepoint and (when the raster has a CRS) GeoKey metadata. Absent cells are
//! written as the nodata value and declared through the GDAL_NODATA tag, so
//! [`crate::codec::GeoTiffCodec`] reads them back as absent.
//!
//! # Example
//!
//! ```rust,no_run
//! use mosaicrs::{Alignment, Raster};
//! use mosaicrs::geotiff_writer::{GeoTiffCompression, GeoTiffWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let raster = Raster::empty(Alignment::new(0.0, 0.0, 10, 10, 1.0, 1.0, Some(32610)));
//! GeoTiffWriter::new(&raster)
//!     .compression(GeoTiffCompression::Lzw)
//!     .write("mosaic.tif")?;
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use thiserror::Error;
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::{Compression, TiffEncoder};
use tiff::tags::Tag;

use crate::casting::usize_to_u32;
use crate::codec::geotiff::{
    GDAL_NODATA, GEOGRAPHIC_TYPE_GEO_KEY, GEOTIFF_GEOKEYDIRECTORY, GEOTIFF_MODELPIXELSCALE,
    GEOTIFF_MODELTIEPOINT, PROJECTED_CS_TYPE_GEO_KEY,
};
use crate::geometry::projection::{get_proj_string, is_geographic_crs};
use crate::raster::Raster;

const GEOTIFF_GEOASCIIPARAMS: u16 = 34737;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Value written for absent cells unless overridden.
pub const DEFAULT_NODATA: f32 = -9999.0;

/// Compression method for GeoTIFF output
#[derive(Debug, Clone, Copy, Default)]
pub enum GeoTiffCompression {
    /// No compression - fastest but largest files
    #[default]
    None,
    /// LZW compression - good balance of speed and size
    Lzw,
    /// Deflate (zlib) compression - better compression, slower
    Deflate,
}

/// Error type for GeoTIFF writing operations
#[derive(Debug, Error)]
pub enum GeoTiffWriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TIFF encoding error: {0}")]
    TiffEncode(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<tiff::TiffError> for GeoTiffWriteError {
    fn from(e: tiff::TiffError) -> Self {
        Self::TiffEncode(e.to_string())
    }
}

/// Builder for configuring GeoTIFF output
pub struct GeoTiffWriter<'a> {
    raster: &'a Raster,
    compression: GeoTiffCompression,
    nodata: f32,
}

impl<'a> GeoTiffWriter<'a> {
    #[must_use]
    pub fn new(raster: &'a Raster) -> Self {
        Self {
            raster,
            compression: GeoTiffCompression::default(),
            nodata: DEFAULT_NODATA,
        }
    }

    #[must_use]
    pub fn compression(mut self, compression: GeoTiffCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Value stored for absent cells
    #[must_use]
    pub fn nodata(mut self, nodata: f32) -> Self {
        self.nodata = nodata;
        self
    }

    /// Write to a file path
    ///
    /// # Errors
    /// Fails on I/O errors, encoder errors, or a raster with no cells.
    pub fn write<P: AsRef<Path>>(self, path: P) -> Result<(), GeoTiffWriteError> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }

    /// Write to any writer that implements Write + Seek
    ///
    /// # Errors
    /// Fails on I/O errors, encoder errors, or a raster with no cells.
    pub fn write_to<W: Write + Seek>(self, writer: W) -> Result<(), GeoTiffWriteError> {
        let alignment = &self.raster.alignment;
        if alignment.nrow == 0 || alignment.ncol == 0 {
            return Err(GeoTiffWriteError::InvalidData(
                "Raster has zero dimensions".to_string(),
            ));
        }

        let width = usize_to_u32(alignment.ncol).map_err(GeoTiffWriteError::InvalidData)?;
        let height = usize_to_u32(alignment.nrow).map_err(GeoTiffWriteError::InvalidData)?;

        let compression = match self.compression {
            GeoTiffCompression::None => Compression::Uncompressed,
            GeoTiffCompression::Lzw => Compression::Lzw,
            GeoTiffCompression::Deflate => Compression::Deflate(tiff::encoder::DeflateLevel::Fast),
        };

        let mut encoder = TiffEncoder::new(writer)?.with_compression(compression);
        let pixels: Vec<f32> = self
            .raster
            .cells
            .iter()
            .map(|c| c.unwrap_or(self.nodata))
            .collect();

        let mut image = encoder.new_image::<Gray32Float>(width, height)?;
        self.write_geotiff_tags(image.encoder())?;
        image.write_data(&pixels)?;
        Ok(())
    }

    /// Encode to an in-memory buffer.
    ///
    /// # Errors
    /// See [`GeoTiffWriter::write_to`].
    pub fn to_bytes(self) -> Result<Vec<u8>, GeoTiffWriteError> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        self.write_to(&mut buffer)?;
        Ok(buffer.into_inner())
    }

    fn write_geotiff_tags<W: Write + Seek, K: tiff::encoder::TiffKind>(
        &self,
        dir: &mut tiff::encoder::DirectoryEncoder<W, K>,
    ) -> Result<(), GeoTiffWriteError> {
        let a = &self.raster.alignment;

        // ModelPixelScale: [ScaleX, ScaleY, ScaleZ]
        let pixel_scale = [a.xres, a.yres, 0.0];
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())?;

        // ModelTiepoint ties pixel (0, 0) to the top-left corner
        let tiepoint = [0.0, 0.0, 0.0, a.xmin, a.ymax(), 0.0];
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())?;

        let nodata = self.nodata.to_string();
        dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())?;

        if let Some(crs) = a.crs {
            let geokeys = build_geokey_directory(crs)?;
            dir.write_tag(Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())?;

            if let Some(proj_string) = get_proj_string(crs) {
                let ascii_params = format!("{proj_string}|");
                dir.write_tag(Tag::Unknown(GEOTIFF_GEOASCIIPARAMS), ascii_params.as_str())?;
            }
        }

        Ok(())
    }
}

fn build_geokey_directory(crs: i32) -> Result<Vec<u16>, GeoTiffWriteError> {
    let code = u16::try_from(crs)
        .map_err(|_| GeoTiffWriteError::InvalidData(format!("EPSG:{crs} does not fit a GeoKey")))?;
    let is_geographic = is_geographic_crs(crs);

    // [KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
    //  KeyID, TIFFTagLocation, Count, Value_Offset, ...]
    let mut keys = vec![1, 1, 0, 3];
    keys.extend_from_slice(&[
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        if is_geographic {
            MODEL_TYPE_GEOGRAPHIC
        } else {
            MODEL_TYPE_PROJECTED
        },
    ]);
    keys.extend_from_slice(&[GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA]);
    if is_geographic {
        keys.extend_from_slice(&[GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, code]);
    } else {
        keys.extend_from_slice(&[PROJECTED_CS_TYPE_GEO_KEY, 0, 1, code]);
    }
    Ok(keys)
}

impl Raster {
    /// Write this raster to a GeoTIFF file with default options.
    ///
    /// # Errors
    /// See [`GeoTiffWriter::write`].
    pub fn write_geotiff<P: AsRef<Path>>(&self, path: P) -> Result<(), GeoTiffWriteError> {
        GeoTiffWriter::new(self).write(path)
    }

    #[must_use]
    pub fn geotiff_writer(&self) -> GeoTiffWriter<'_> {
        GeoTiffWriter::new(self)
    }
}

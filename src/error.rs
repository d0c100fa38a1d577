//! Error types.
//!
//! [`DecodeError`] is raised by codecs and is recoverable per tile: the query
//! engines log it and move on to the next tile. [`MosaicError`] is what a
//! query returns to its caller.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to read one tile file.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}: not a valid grid file: {reason}", path.display())]
    InvalidRaster { path: PathBuf, reason: String },

    #[error("{}: not a valid vector file: {reason}", path.display())]
    InvalidVector { path: PathBuf, reason: String },
}

impl DecodeError {
    pub(crate) fn raster(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::InvalidRaster {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn vector(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Self::InvalidVector {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Grid axis, used when reporting alignment problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MosaicError {
    /// Resolution drift too large to be format noise.
    #[error(
        "unrepairable alignment on {axis} axis: resolution {observed} deviates from {expected} by more than {tolerance}"
    )]
    UnrepairableAlignment {
        axis: Axis,
        observed: f64,
        expected: f64,
        tolerance: f64,
    },

    /// A vector tile's field layout differs from the one fixed by the first tile.
    #[error("tile {tile}: field schema {found} does not match {expected}")]
    SchemaMismatch {
        tile: usize,
        expected: String,
        found: String,
    },

    #[error("no field matches {pattern}")]
    MissingField { pattern: String },

    #[error("invalid tile layout: {0}")]
    InvalidLayout(String),

    #[error("projection error: {0}")]
    Projection(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = MosaicError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrepairable_message_names_axis() {
        let e = MosaicError::UnrepairableAlignment {
            axis: Axis::Y,
            observed: 1.5,
            expected: 1.0,
            tolerance: 0.1,
        };
        let msg = e.to_string();
        assert!(msg.contains("y axis"), "{msg}");
        assert!(msg.contains("1.5"), "{msg}");
    }

    #[test]
    fn test_decode_error_wraps_transparently() {
        let inner = DecodeError::raster(std::path::Path::new("/tmp/a.tif"), "no tiepoint");
        let outer: MosaicError = inner.into();
        assert_eq!(outer.to_string(), "/tmp/a.tif: not a valid grid file: no tiepoint");
    }
}

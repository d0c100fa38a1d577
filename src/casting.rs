//! Numeric conversions between lattice indices, cell counts and coordinates.
//!
//! # Assumptions
//!
//! ## Cell counts (`usize` ↔ `f64`)
//! A grid dimension never approaches 2^53 cells, so `usize` → `f64` is exact
//! for every count we handle and is done without checks.
//!
//! ## Lattice indices (`isize` ↔ `usize`)
//! Snapped indices can be negative (an extent extending past the grid origin).
//! Conversion back to a cell index is checked.
//!
//! ## TIFF dimensions (`u32` ↔ `usize`)
//! Widening is free; narrowing for the writer is checked.

use std::convert::TryFrom;

/// Convert a `usize` to `u32`, failing on 64-bit overflow.
///
/// # Errors
/// Returns an error string if the value exceeds `u32::MAX`.
#[inline]
pub fn usize_to_u32(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("Value {value} exceeds u32 maximum"))
}

#[inline]
#[must_use]
pub fn u32_to_usize(value: u32) -> usize {
    // u32 always fits on the 32/64-bit targets we build for
    value as usize
}

/// Convert a signed lattice index to a cell index, returning `None` if negative.
#[inline]
#[must_use]
pub fn isize_to_usize(value: isize) -> Option<usize> {
    usize::try_from(value).ok()
}

/// Convert a cell count to a signed lattice index, saturating at `isize::MAX`.
#[inline]
#[must_use]
pub fn usize_to_isize(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn usize_to_f64(value: usize) -> f64 {
    value as f64
}

#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn isize_to_f64(value: isize) -> f64 {
    value as f64
}

/// Round a float to the nearest signed lattice index. NaN maps to 0.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn f64_to_lattice(value: f64) -> isize {
    if value.is_nan() {
        return 0;
    }
    value.round() as isize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usize_to_u32() {
        assert_eq!(usize_to_u32(0), Ok(0));
        assert_eq!(usize_to_u32(4096), Ok(4096));
        #[cfg(target_pointer_width = "64")]
        assert!(usize_to_u32(usize::MAX).is_err());
    }

    #[test]
    fn test_isize_to_usize() {
        assert_eq!(isize_to_usize(0), Some(0));
        assert_eq!(isize_to_usize(100), Some(100));
        assert_eq!(isize_to_usize(-1), None);
    }

    #[test]
    fn test_usize_to_isize_saturates() {
        assert_eq!(usize_to_isize(7), 7);
        assert_eq!(usize_to_isize(usize::MAX), isize::MAX);
    }

    #[test]
    fn test_f64_to_lattice() {
        assert_eq!(f64_to_lattice(2.4), 2);
        assert_eq!(f64_to_lattice(-2.6), -3);
        assert_eq!(f64_to_lattice(2.999_999_9), 3);
        assert_eq!(f64_to_lattice(f64::NAN), 0);
    }
}

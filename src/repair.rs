//! Snapping slightly drifted grids back onto a reference lattice.
//!
//! Some intermediate formats store resolution and origin with limited
//! precision, so a tile written as 1.0 m cells can come back as 1.0000001 m
//! cells at a fractionally shifted origin. Small drift is corrected here;
//! large drift is reported as [`MosaicError::UnrepairableAlignment`].

use tracing::debug;

use crate::alignment::Alignment;
use crate::casting::f64_to_lattice;
use crate::casting::isize_to_f64;
use crate::config::DEFAULT_REPAIR_TOLERANCE;
use crate::error::{Axis, MosaicError, Result};
use crate::raster::Raster;

/// Per-axis resolution check and origin snap against a reference lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentRepair {
    tolerance: f64,
}

impl Default for AlignmentRepair {
    fn default() -> Self {
        Self::new(DEFAULT_REPAIR_TOLERANCE)
    }
}

impl AlignmentRepair {
    /// `tolerance` is relative: 0.1 accepts resolutions within 10% of the reference.
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    #[must_use]
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Repair `observed` against the lattice of `expected`.
    ///
    /// For each axis: an exactly matching resolution leaves the axis alone;
    /// a resolution within tolerance is replaced by the expected one and the
    /// origin is moved to the nearest lattice line of `expected`. Row and
    /// column counts never change.
    ///
    /// # Errors
    /// Returns [`MosaicError::UnrepairableAlignment`] for the first axis whose
    /// resolution is out of tolerance. Nothing is modified in that case.
    pub fn repair_alignment(&self, observed: &Alignment, expected: &Alignment) -> Result<Alignment> {
        let (xmin, xres) = self.repair_axis(
            Axis::X,
            observed.xmin,
            observed.xres,
            expected.xmin,
            expected.xres,
        )?;
        let (ymin, yres) = self.repair_axis(
            Axis::Y,
            observed.ymin,
            observed.yres,
            expected.ymin,
            expected.yres,
        )?;
        Ok(Alignment {
            xmin,
            ymin,
            xres,
            yres,
            ..*observed
        })
    }

    /// Repair a decoded raster's metadata, keeping each cell at its index.
    ///
    /// # Errors
    /// See [`AlignmentRepair::repair_alignment`].
    pub fn repair_raster(&self, raster: Raster, expected: &Alignment) -> Result<Raster> {
        let repaired = self.repair_alignment(&raster.alignment, expected)?;
        if repaired == raster.alignment {
            return Ok(raster);
        }
        debug!(
            from_x = raster.alignment.xmin,
            from_y = raster.alignment.ymin,
            to_x = repaired.xmin,
            to_y = repaired.ymin,
            "Snapped raster onto reference lattice"
        );
        Ok(raster.with_alignment(repaired))
    }

    fn repair_axis(
        &self,
        axis: Axis,
        origin: f64,
        res: f64,
        expected_origin: f64,
        expected_res: f64,
    ) -> Result<(f64, f64)> {
        #[allow(clippy::float_cmp)]
        if res == expected_res {
            return Ok((origin, res));
        }
        if ((res - expected_res) / expected_res).abs() < self.tolerance {
            let steps = f64_to_lattice((origin - expected_origin) / expected_res);
            return Ok((expected_origin + isize_to_f64(steps) * expected_res, expected_res));
        }
        Err(MosaicError::UnrepairableAlignment {
            axis,
            observed: res,
            expected: expected_res,
            tolerance: self.tolerance,
        })
    }
}

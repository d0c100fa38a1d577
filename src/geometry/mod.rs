//! Coordinate types and lattice snapping.
//!
//! - [`Extent`]: axis-aligned rectangle with an optional EPSG tag
//! - [`Point`]: a planar coordinate
//! - [`SnapType`]: how a fractional cell index lands on an integer lattice
//! - [`projection`]: CRS transforms backed by proj4rs

pub mod projection;

/// Slack (in cell units) under which a fractional index counts as an integer.
///
/// Cell edges computed as `origin + n * res` rarely divide back to exactly `n`,
/// so snapping without this slack would add phantom rows and columns.
pub const LATTICE_EPSILON: f64 = 1e-6;

/// A planar coordinate in some CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, optionally tagged with an EPSG code.
///
/// Two extents with different CRS tags must be reprojected (see
/// [`projection::reproject_extent`]) before they are compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    /// EPSG code of the coordinates, if known
    pub crs: Option<i32>,
}

impl Extent {
    /// Create an untagged extent. Coordinates are reordered so that
    /// `xmin <= xmax` and `ymin <= ymax` always hold.
    #[must_use]
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            xmin: x1.min(x2),
            ymin: y1.min(y2),
            xmax: x1.max(x2),
            ymax: y1.max(y2),
            crs: None,
        }
    }

    /// Tag this extent with an EPSG code
    #[must_use]
    pub fn with_crs(mut self, crs: Option<i32>) -> Self {
        self.crs = crs;
        self
    }

    #[inline]
    #[must_use]
    pub fn xspan(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[inline]
    #[must_use]
    pub fn yspan(&self) -> f64 {
        self.ymax - self.ymin
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            self.xmin + self.xspan() / 2.0,
            self.ymin + self.yspan() / 2.0,
        )
    }

    /// True if the two rectangles share some interior.
    ///
    /// Rectangles that only touch along an edge do not overlap. A degenerate
    /// extent (a point or a line) overlaps a rectangle it lies strictly inside.
    #[must_use]
    pub fn overlaps(&self, other: &Extent) -> bool {
        self.xmin < other.xmax
            && other.xmin < self.xmax
            && self.ymin < other.ymax
            && other.ymin < self.ymax
    }

    /// Overlapping part of two extents, keeping this extent's CRS tag.
    #[must_use]
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Extent {
            xmin: self.xmin.max(other.xmin),
            ymin: self.ymin.max(other.ymin),
            xmax: self.xmax.min(other.xmax),
            ymax: self.ymax.min(other.ymax),
            crs: self.crs,
        })
    }

    /// True if the two rectangles share at least one point, edges included.
    #[must_use]
    pub fn touches(&self, other: &Extent) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    /// Like [`Extent::intersection`], but rectangles meeting only along an
    /// edge or at a corner yield that (degenerate) shared part.
    #[must_use]
    pub fn closed_intersection(&self, other: &Extent) -> Option<Extent> {
        if !self.touches(other) {
            return None;
        }
        Some(Extent {
            xmin: self.xmin.max(other.xmin),
            ymin: self.ymin.max(other.ymin),
            xmax: self.xmax.min(other.xmax),
            ymax: self.ymax.min(other.ymax),
            crs: self.crs,
        })
    }

    /// Smallest extent covering both, keeping this extent's CRS tag.
    #[must_use]
    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
            crs: self.crs,
        }
    }

    /// Closed containment test: points on the boundary are inside.
    #[inline]
    #[must_use]
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    #[must_use]
    pub fn contains(&self, other: &Extent) -> bool {
        other.xmin >= self.xmin
            && other.xmax <= self.xmax
            && other.ymin >= self.ymin
            && other.ymax <= self.ymax
    }

    /// True when both extents carry a CRS tag and the tags differ.
    #[must_use]
    pub fn crs_conflicts(&self, other: &Extent) -> bool {
        matches!((self.crs, other.crs), (Some(a), Some(b)) if a != b)
    }
}

/// How a fractional lattice index is turned into an integer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapType {
    /// Round to the nearest lattice line
    Near,
    /// Shrink: lower bounds round up, upper bounds round down
    In,
    /// Grow: lower bounds round down, upper bounds round up
    #[default]
    Out,
}

impl SnapType {
    /// Snap a fractional index used as the lower bound of a range.
    #[must_use]
    pub fn lower(self, index: f64) -> isize {
        snap_index(index, self, true)
    }

    /// Snap a fractional index used as the exclusive upper bound of a range.
    #[must_use]
    pub fn upper(self, index: f64) -> isize {
        snap_index(index, self, false)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn snap_index(index: f64, snap: SnapType, lower: bool) -> isize {
    let nearest = index.round();
    if (index - nearest).abs() < LATTICE_EPSILON {
        return nearest as isize;
    }
    let snapped = match (snap, lower) {
        (SnapType::Near, _) => nearest,
        (SnapType::Out, true) | (SnapType::In, false) => index.floor(),
        (SnapType::Out, false) | (SnapType::In, true) => index.ceil(),
    };
    snapped as isize
}

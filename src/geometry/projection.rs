use super::Extent;
use crate::error::{MosaicError, Result};

/// Samples taken along each edge when reprojecting an extent.
///
/// Projected edges are curves, so the four corners alone under-estimate the
/// covered area. 21 samples keeps the outer extent tight for tile-sized boxes.
const EDGE_SAMPLES: usize = 21;

/// Project a point from one CRS to another using pure Rust (proj4rs + crs-definitions).
///
/// # Errors
/// Returns an error if either EPSG code is not in the crs-definitions database
/// or the transform itself fails.
#[inline]
pub fn project_point(source_epsg: i32, target_epsg: i32, x: f64, y: f64) -> Result<(f64, f64), String> {
    if source_epsg == target_epsg {
        return Ok((x, y));
    }

    project_with_proj4rs(source_epsg, target_epsg, x, y)
}

/// Reproject an extent into `target_crs`, returning the outer extent of the
/// densified boundary.
///
/// Extents with no CRS tag, a target of `None`, or a tag already equal to the
/// target pass through unchanged (the tag is set to the target when known).
///
/// # Errors
/// Returns [`MosaicError::Projection`] if any boundary sample fails to project.
pub fn reproject_extent(extent: &Extent, target_crs: Option<i32>) -> Result<Extent> {
    let (source, target) = match (extent.crs, target_crs) {
        (Some(s), Some(t)) if s != t => (s, t),
        (_, None) => return Ok(*extent),
        (_, Some(t)) => return Ok(extent.with_crs(Some(t))),
    };

    let mut xmin = f64::INFINITY;
    let mut ymin = f64::INFINITY;
    let mut xmax = f64::NEG_INFINITY;
    let mut ymax = f64::NEG_INFINITY;

    for (x, y) in boundary_samples(extent) {
        let (px, py) = project_point(source, target, x, y).map_err(MosaicError::Projection)?;
        if !px.is_finite() || !py.is_finite() {
            return Err(MosaicError::Projection(format!(
                "EPSG:{source} -> EPSG:{target} produced a non-finite coordinate at ({x}, {y})"
            )));
        }
        xmin = xmin.min(px);
        ymin = ymin.min(py);
        xmax = xmax.max(px);
        ymax = ymax.max(py);
    }

    Ok(Extent::new(xmin, ymin, xmax, ymax).with_crs(Some(target)))
}

#[allow(clippy::cast_precision_loss)]
fn boundary_samples(extent: &Extent) -> impl Iterator<Item = (f64, f64)> + '_ {
    let steps = EDGE_SAMPLES - 1;
    (0..=steps).flat_map(move |i| {
        let t = i as f64 / steps as f64;
        let x = extent.xmin + t * extent.xspan();
        let y = extent.ymin + t * extent.yspan();
        [
            (x, extent.ymin),
            (x, extent.ymax),
            (extent.xmin, y),
            (extent.xmax, y),
        ]
    })
}

/// Get PROJ4 string for an EPSG code using the crs-definitions database
#[inline]
pub fn get_proj_string(epsg: i32) -> Option<&'static str> {
    u16::try_from(epsg).ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Check if an EPSG code represents a geographic (lon/lat) CRS
#[inline]
#[must_use]
pub fn is_geographic_crs(epsg: i32) -> bool {
    if let Some(proj_str) = get_proj_string(epsg) {
        proj_str.contains("+proj=longlat")
    } else {
        epsg == 4326 || (4000..5000).contains(&epsg)
    }
}

fn project_with_proj4rs(source_epsg: i32, target_epsg: i32, x: f64, y: f64) -> Result<(f64, f64), String> {
    use proj4rs::proj::Proj;
    use proj4rs::transform::transform;

    let source_str = get_proj_string(source_epsg)
        .ok_or_else(|| format!("EPSG:{source_epsg} is not in the crs-definitions database"))?;
    let target_str = get_proj_string(target_epsg)
        .ok_or_else(|| format!("EPSG:{target_epsg} is not in the crs-definitions database"))?;

    let source_proj = Proj::from_proj_string(source_str)
        .map_err(|e| format!("Invalid source projection EPSG:{source_epsg}: {e:?}"))?;
    let target_proj = Proj::from_proj_string(target_str)
        .map_err(|e| format!("Invalid target projection EPSG:{target_epsg}: {e:?}"))?;

    // proj4rs works in radians for geographic systems
    let (x_in, y_in) = if is_geographic_crs(source_epsg) {
        (x.to_radians(), y.to_radians())
    } else {
        (x, y)
    };

    let mut point = (x_in, y_in, 0.0);
    transform(&source_proj, &target_proj, &mut point)
        .map_err(|e| format!("Transform from EPSG:{source_epsg} to EPSG:{target_epsg} failed: {e:?}"))?;

    if is_geographic_crs(target_epsg) {
        Ok((point.0.to_degrees(), point.1.to_degrees()))
    } else {
        Ok((point.0, point.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_project_point_same_crs() {
        let (x, y) = project_point(32610, 32610, 550_000.0, 4_180_000.0).unwrap();
        assert!(approx_eq(x, 550_000.0));
        assert!(approx_eq(y, 4_180_000.0));
    }

    #[test]
    fn test_project_point_roundtrip_utm() {
        let (lon, lat) = (-122.4, 37.78);
        let (x, y) = project_point(4326, 32610, lon, lat).unwrap();
        assert!(x > 500_000.0 && x < 600_000.0, "UTM easting: {x}");
        let (lon2, lat2) = project_point(32610, 4326, x, y).unwrap();
        assert!((lon - lon2).abs() < 1e-5, "lon roundtrip: {lon} -> {lon2}");
        assert!((lat - lat2).abs() < 1e-5, "lat roundtrip: {lat} -> {lat2}");
    }

    #[test]
    fn test_unsupported_epsg_code() {
        let result = project_point(4326, 999_999, 0.0, 0.0);
        assert!(result.unwrap_err().contains("not in the crs-definitions database"));
    }

    #[test]
    fn test_is_geographic_crs() {
        assert!(is_geographic_crs(4326));
        assert!(!is_geographic_crs(3857));
        assert!(!is_geographic_crs(32610));
    }

    #[test]
    fn test_reproject_extent_passthrough() {
        let untagged = Extent::new(0.0, 0.0, 10.0, 10.0);
        let out = reproject_extent(&untagged, Some(32610)).unwrap();
        assert_eq!(out.xmin, 0.0);
        assert_eq!(out.crs, Some(32610));

        let tagged = untagged.with_crs(Some(32610));
        assert_eq!(reproject_extent(&tagged, Some(32610)).unwrap(), tagged);
        assert_eq!(reproject_extent(&tagged, None).unwrap(), tagged);
    }

    #[test]
    fn test_reproject_extent_covers_corners() {
        let geo = Extent::new(-122.5, 37.7, -122.3, 37.9).with_crs(Some(4326));
        let utm = reproject_extent(&geo, Some(32610)).unwrap();
        assert_eq!(utm.crs, Some(32610));

        for (lon, lat) in [(-122.5, 37.7), (-122.3, 37.7), (-122.5, 37.9), (-122.3, 37.9)] {
            let (x, y) = project_point(4326, 32610, lon, lat).unwrap();
            assert!(utm.contains_point(x, y), "corner ({lon}, {lat}) outside {utm:?}");
        }
    }

    #[test]
    fn test_reproject_extent_unknown_code() {
        let e = Extent::new(0.0, 0.0, 1.0, 1.0).with_crs(Some(999_999));
        assert!(matches!(
            reproject_extent(&e, Some(4326)),
            Err(MosaicError::Projection(_))
        ));
    }
}

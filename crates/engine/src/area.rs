//! Per-pixel area-weight raster
//!
//! Converts pixel counts into physical area totals: each valid pixel of
//! the reference classification gets the ground area it represents,
//! scaled by a unit multiplier (e.g. 1e-4 for m² to hectares).

use geo::{Area, LineString, Polygon};
use rayon::prelude::*;

use gridshift_core::{Error, LambertAzimuthalEqualArea, Raster, Result};

use crate::domain::ClassDomain;
use crate::roi::RoiMask;

/// Parameters for area-raster construction
#[derive(Debug, Clone)]
pub struct AreaRasterParams {
    /// Scale applied to every pixel area, e.g. for unit conversion
    pub multiplier: f64,
}

impl Default for AreaRasterParams {
    fn default() -> Self {
        Self { multiplier: 1.0 }
    }
}

/// Build the per-pixel area register for a computation.
///
/// Pixel (row, col) holds `multiplier * ground_area(row, col)` when the
/// reference pixel carries a non-zero domain class and lies inside the
/// ROI; all other pixels hold 0.0 (unset).
///
/// Ground area is the area of the projected pixel corner polygon, never a
/// flat width×height product: under a geographic CRS the four corners are
/// run through a Lambert azimuthal equal-area projection centered on the
/// raster envelope, so pixel footprints that shrink toward the poles (or
/// shear under rotation terms) are measured correctly. Under a projected
/// CRS the corner polygon is measured directly in world units.
///
/// Fails with [`Error::Geometry`] when the grid transform is degenerate or
/// a corner cannot be projected. Pure function of its inputs.
pub fn area_raster(
    reference: &Raster<u16>,
    domain: &ClassDomain,
    roi: Option<&RoiMask>,
    params: &AreaRasterParams,
) -> Result<Raster<f64>> {
    if !params.multiplier.is_finite() || params.multiplier <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "multiplier",
            value: params.multiplier.to_string(),
            reason: "area multiplier must be finite and positive".into(),
        });
    }

    let (rows, cols) = reference.shape();
    if let Some(roi) = roi {
        if roi.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: roi.shape().0,
                ac: roi.shape().1,
            });
        }
    }

    let transform = *reference.transform();
    if !transform.is_invertible() {
        return Err(Error::Geometry(
            "cannot derive pixel footprints from a degenerate geotransform".into(),
        ));
    }

    let projection = match reference.crs() {
        Some(crs) if crs.is_geographic() => {
            let (lon_0, lat_0) = transform.center(cols, rows);
            Some(LambertAzimuthalEqualArea::centered_at(lon_0, lat_0))
        }
        _ => None,
    };

    let multiplier = params.multiplier;
    let data: Vec<Vec<f64>> = (0..rows)
        .into_par_iter()
        .map(|row| -> Result<Vec<f64>> {
            let mut row_data = vec![0.0f64; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let class = unsafe { reference.get_unchecked(row, col) };
                if class == 0 || !domain.contains(class) {
                    continue;
                }
                if let Some(roi) = roi {
                    if !unsafe { roi.contains_unchecked(row, col) } {
                        continue;
                    }
                }

                let corners = transform.pixel_corners(col, row);
                *out = multiplier * pixel_ground_area(&corners, projection.as_ref())?;
            }
            Ok(row_data)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut output: Raster<f64> = reference.like();
    for (row, row_data) in data.into_iter().enumerate() {
        for (col, value) in row_data.into_iter().enumerate() {
            output.set(row, col, value)?;
        }
    }

    Ok(output)
}

/// Area of one pixel footprint, optionally after equal-area projection
fn pixel_ground_area(
    corners: &[(f64, f64); 4],
    projection: Option<&LambertAzimuthalEqualArea>,
) -> Result<f64> {
    let ring: Vec<(f64, f64)> = match projection {
        Some(proj) => {
            let mut projected = Vec::with_capacity(4);
            for &(lon, lat) in corners {
                projected.push(proj.forward(lon, lat)?);
            }
            projected
        }
        None => corners.to_vec(),
    };

    let polygon = Polygon::new(LineString::from(ring), vec![]);
    Ok(polygon.unsigned_area())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gridshift_core::{Crs, GeoTransform};

    fn classified(rows: usize, cols: usize, class: u16) -> Raster<u16> {
        let mut r = Raster::filled(rows, cols, class);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    #[test]
    fn test_unit_pixels_planar() {
        let reference = classified(4, 4, 1);
        let domain = ClassDomain::new([1]).unwrap();

        let area =
            area_raster(&reference, &domain, None, &AreaRasterParams::default()).unwrap();
        assert_relative_eq!(area.get(2, 2).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_multiplier_scales() {
        let reference = classified(3, 3, 2);
        let domain = ClassDomain::new([2]).unwrap();

        let area = area_raster(
            &reference,
            &domain,
            None,
            &AreaRasterParams { multiplier: 1e-4 },
        )
        .unwrap();
        assert_relative_eq!(area.get(0, 0).unwrap(), 1e-4, epsilon = 1e-16);
    }

    #[test]
    fn test_nodata_and_out_of_domain_unset() {
        let mut reference = classified(2, 2, 1);
        reference.set(0, 0, 0).unwrap();
        reference.set(0, 1, 9).unwrap();
        let domain = ClassDomain::new([1]).unwrap();

        let area =
            area_raster(&reference, &domain, None, &AreaRasterParams::default()).unwrap();
        assert_eq!(area.get(0, 0).unwrap(), 0.0);
        assert_eq!(area.get(0, 1).unwrap(), 0.0);
        assert_relative_eq!(area.get(1, 1).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_roi_restricts() {
        let reference = classified(4, 4, 1);
        let domain = ClassDomain::new([1]).unwrap();
        let roi = RoiMask::from_fn(4, 4, |row, _| row == 0);

        let area =
            area_raster(&reference, &domain, Some(&roi), &AreaRasterParams::default()).unwrap();
        assert!(area.get(0, 1).unwrap() > 0.0);
        assert_eq!(area.get(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_geographic_pixels_in_square_meters() {
        // 0.01-degree pixels centered near the equator: each is roughly
        // 1.112 km on a side, so ~1.237e6 m².
        let mut reference = Raster::filled(4, 4, 1u16);
        reference.set_transform(GeoTransform::new(10.0, 0.02, 0.01, -0.01));
        reference.set_crs(Some(Crs::wgs84()));
        let domain = ClassDomain::new([1]).unwrap();

        let area =
            area_raster(&reference, &domain, None, &AreaRasterParams::default()).unwrap();
        let a = area.get(1, 1).unwrap();
        assert_relative_eq!(a, 1.237e6, max_relative = 0.01);
    }

    #[test]
    fn test_degenerate_transform_fails() {
        let mut reference = Raster::filled(2, 2, 1u16);
        reference.set_transform(GeoTransform::new(0.0, 0.0, 0.0, 0.0));
        let domain = ClassDomain::new([1]).unwrap();

        assert!(matches!(
            area_raster(&reference, &domain, None, &AreaRasterParams::default()),
            Err(Error::Geometry(_))
        ));
    }

    #[test]
    fn test_invalid_multiplier_rejected() {
        let reference = classified(2, 2, 1);
        let domain = ClassDomain::new([1]).unwrap();
        assert!(matches!(
            area_raster(
                &reference,
                &domain,
                None,
                &AreaRasterParams { multiplier: 0.0 }
            ),
            Err(Error::InvalidParameter { .. })
        ));
    }
}

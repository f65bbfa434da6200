//! Coordinate reference system handling and equal-area projection

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Authalic sphere radius in meters (sphere with the WGS84 ellipsoid's
/// surface area), the conventional radius for spherical equal-area work.
pub const AUTHALIC_RADIUS_M: f64 = 6_371_007.181;

/// Coordinate reference system identity.
///
/// The engine does not run a full CRS database; it only needs to know a
/// CRS identifier and whether coordinates are angular (degrees) or
/// linear, which decides how pixel ground areas are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    epsg: Option<u32>,
    wkt: Option<String>,
}

impl Crs {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether coordinates in this CRS are angular (longitude/latitude
    /// degrees) rather than projected linear units.
    pub fn is_geographic(&self) -> bool {
        match self.epsg {
            // Common geographic codes: WGS84, NAD83, ETRS89, WGS72
            Some(4326) | Some(4269) | Some(4258) | Some(4322) => true,
            Some(_) => false,
            None => self
                .wkt
                .as_deref()
                .is_some_and(|w| w.trim_start().starts_with("GEOGCS")),
        }
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{code}");
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Spherical Lambert azimuthal equal-area projection.
///
/// Projects longitude/latitude (degrees) onto a plane where areas are
/// preserved, which is what makes polygon areas of projected pixel
/// footprints physically meaningful. Centered per raster on the envelope
/// center so distortion stays negligible across the grid.
#[derive(Debug, Clone, Copy)]
pub struct LambertAzimuthalEqualArea {
    lon_0: f64,
    lat_0: f64,
    sin_lat_0: f64,
    cos_lat_0: f64,
}

impl LambertAzimuthalEqualArea {
    /// Create a projection centered at (lon_0, lat_0), in degrees
    pub fn centered_at(lon_0: f64, lat_0: f64) -> Self {
        let lat_0_rad = lat_0.to_radians();
        Self {
            lon_0: lon_0.to_radians(),
            lat_0: lat_0_rad,
            sin_lat_0: lat_0_rad.sin(),
            cos_lat_0: lat_0_rad.cos(),
        }
    }

    /// Forward projection of (lon, lat) degrees to planar meters.
    ///
    /// Undefined at the antipode of the projection center, where the
    /// scale factor denominator vanishes; that is reported as a
    /// [`Error::Geometry`] failure rather than returning infinities.
    pub fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        let lam = lon.to_radians() - self.lon_0;
        let phi = lat.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let cos_lam = lam.cos();

        let denom = 1.0 + self.sin_lat_0 * sin_phi + self.cos_lat_0 * cos_phi * cos_lam;
        if denom <= 1e-12 {
            return Err(Error::Geometry(format!(
                "point ({lon}, {lat}) is antipodal to the projection center \
                 ({}, {})",
                self.lon_0.to_degrees(),
                self.lat_0.to_degrees()
            )));
        }

        let k = AUTHALIC_RADIUS_M * (2.0 / denom).sqrt();
        let x = k * cos_phi * lam.sin();
        let y = k * (self.cos_lat_0 * sin_phi - self.sin_lat_0 * cos_phi * cos_lam);

        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_crs_epsg() {
        let crs = Crs::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
    }

    #[test]
    fn test_geographic_detection() {
        assert!(Crs::wgs84().is_geographic());
        assert!(!Crs::from_epsg(3857).is_geographic());
        assert!(Crs::from_wkt("GEOGCS[\"WGS 84\", ...]").is_geographic());
        assert!(!Crs::from_wkt("PROJCS[\"WGS 84 / UTM 32N\", ...]").is_geographic());
    }

    #[test]
    fn test_laea_center_maps_to_origin() {
        let proj = LambertAzimuthalEqualArea::centered_at(12.5, 42.0);
        let (x, y) = proj.forward(12.5, 42.0).unwrap();
        assert_relative_eq!(x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_laea_small_northward_step() {
        // 0.001 deg of latitude is ~111.2 m of northing anywhere.
        let proj = LambertAzimuthalEqualArea::centered_at(0.0, 0.0);
        let (x, y) = proj.forward(0.0, 0.001).unwrap();
        assert_relative_eq!(x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(y, 111.2, epsilon = 0.2);
    }

    #[test]
    fn test_laea_antipode_fails() {
        let proj = LambertAzimuthalEqualArea::centered_at(0.0, 0.0);
        assert!(matches!(
            proj.forward(180.0, 0.0),
            Err(Error::Geometry(_))
        ));
    }
}

//! # gridshift core
//!
//! Core types for the gridshift change-matrix engine.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced raster grid
//! - `GeoTransform`: affine pixel/world transform with pixel footprints
//! - `Crs` / `LambertAzimuthalEqualArea`: CRS identity and the equal-area
//!   projection used for physical pixel areas
//! - The workspace error taxonomy

pub mod crs;
pub mod error;
pub mod raster;

pub use crs::{Crs, LambertAzimuthalEqualArea};
pub use error::{Error, Result};
pub use raster::{CellValue, GeoTransform, Raster};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{Crs, LambertAzimuthalEqualArea};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{CellValue, GeoTransform, Raster};
}

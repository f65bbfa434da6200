//! Raster data structures

mod element;
mod geotransform;
mod grid;

pub use element::CellValue;
pub use geotransform::GeoTransform;
pub use grid::Raster;

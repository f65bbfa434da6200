//! Raster grid type

use ndarray::{Array2, ArrayView2};

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{CellValue, GeoTransform};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in row-major order with an affine
/// transform and an optional CRS. The change-matrix engine uses three
/// instantiations: `Raster<u16>` for classification grids (label 0 is the
/// reserved no-data class), `Raster<u8>` for ROI masks, and `Raster<f64>`
/// for the per-pixel area register.
#[derive(Debug, Clone)]
pub struct Raster<T: CellValue> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<Crs>,
}

impl<T: CellValue> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GeoTransform::default(),
            crs: None,
        }
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
            crs: None,
        }
    }

    /// Create a raster from a row-major vector
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self {
            data: array,
            transform: GeoTransform::default(),
            crs: None,
        })
    }

    /// Create a raster of a different cell type carrying this raster's
    /// transform and CRS, filled with zeros
    pub fn like<U: CellValue>(&self) -> Raster<U> {
        let (rows, cols) = self.shape();
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
        }
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Row-major contiguous slice over all cells.
    ///
    /// The backing store is always standard-layout here, so this never
    /// fails in practice; it is how the GPU backend serializes grids.
    pub fn as_flat_slice(&self) -> Result<&[T]> {
        self.data
            .as_slice()
            .ok_or_else(|| Error::Other("raster storage is not contiguous".into()))
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<Crs>) {
        self.crs = crs;
    }

    /// Check that another raster shares this raster's grid.
    ///
    /// Co-registration requires equal dimensions and an equal transform;
    /// the class-pair counting loops index both grids with one (row, col).
    pub fn co_registered_with<U: CellValue>(&self, other: &Raster<U>) -> Result<()> {
        let (rows, cols) = self.shape();
        if other.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: other.rows(),
                ac: other.cols(),
            });
        }
        if self.transform != *other.transform() {
            return Err(Error::Geometry(
                "rasters share dimensions but not a grid (transform mismatch)".into(),
            ));
        }
        Ok(())
    }
}

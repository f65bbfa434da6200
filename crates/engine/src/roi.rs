//! Region-of-interest mask

use gridshift_core::{Raster, Result};

/// Per-pixel region-of-interest predicate on the computation grid.
///
/// A non-zero byte marks a pixel as inside the region. The mask is owned
/// by the caller and read-only to the engine; geometry rasterization and
/// reprojection happen upstream.
#[derive(Debug, Clone)]
pub struct RoiMask {
    mask: Raster<u8>,
}

impl RoiMask {
    /// Wrap an existing byte raster (non-zero = inside)
    pub fn from_raster(mask: Raster<u8>) -> Self {
        Self { mask }
    }

    /// Build a mask from a per-pixel predicate
    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let mut mask = Raster::zeros(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                if f(row, col) {
                    // Freshly allocated with matching bounds, set cannot fail
                    let _ = mask.set(row, col, 1);
                }
            }
        }
        Self { mask }
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.mask.shape()
    }

    /// Whether pixel (row, col) participates in the computation
    ///
    /// # Safety
    /// Caller must ensure row and col are within the mask bounds
    pub unsafe fn contains_unchecked(&self, row: usize, col: usize) -> bool {
        unsafe { self.mask.get_unchecked(row, col) != 0 }
    }

    /// Whether pixel (row, col) participates in the computation
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.mask.get(row, col).map(|v| v != 0).unwrap_or(false)
    }

    /// Number of pixels inside the region
    pub fn cardinality(&self) -> usize {
        self.mask.view().iter().filter(|&&v| v != 0).count()
    }

    /// Row-major byte view for device transfer
    pub fn as_bytes(&self) -> Result<&[u8]> {
        self.mask.as_flat_slice()
    }

    /// The underlying mask raster
    pub fn raster(&self) -> &Raster<u8> {
        &self.mask
    }
}

//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and world coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up images, `row_rotation` and `col_rotation` are 0 and
/// `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Convert pixel coordinates to world coordinates (pixel center)
    pub fn pixel_to_world(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Convert fractional pixel coordinates to world coordinates
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// World coordinates of the four corners of pixel (col, row).
    ///
    /// Corners are returned in ring order (UL, UR, LR, LL), suitable for
    /// closing into a polygon. Pixel footprints are parallelograms under
    /// rotation/shear, so the ground area of a pixel is the area of this
    /// ring, not `pixel_width * pixel_height`.
    pub fn pixel_corners(&self, col: usize, row: usize) -> [(f64, f64); 4] {
        let c = col as f64;
        let r = row as f64;
        [
            self.apply(c, r),
            self.apply(c + 1.0, r),
            self.apply(c + 1.0, r + 1.0),
            self.apply(c, r + 1.0),
        ]
    }

    /// Convert world coordinates to fractional pixel coordinates.
    ///
    /// Fails with [`Error::Geometry`] when the transform is degenerate
    /// (zero determinant) and cannot be inverted.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-12 {
            return Err(Error::Geometry(format!(
                "geotransform is not invertible (determinant {det:e})"
            )));
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        Ok((col, row))
    }

    /// Whether the transform can be inverted
    pub fn is_invertible(&self) -> bool {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        det.abs() >= 1e-12
    }

    /// Bounding box for a raster of `width` x `height` pixels
    /// as (min_x, min_y, max_x, max_y)
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.apply(0.0, 0.0);
        let (x1, y1) = self.apply(width as f64, 0.0);
        let (x2, y2) = self.apply(0.0, height as f64);
        let (x3, y3) = self.apply(width as f64, height as f64);

        (
            x0.min(x1).min(x2).min(x3),
            y0.min(y1).min(y2).min(y3),
            x0.max(x1).max(x2).max(x3),
            y0.max(y1).max(y2).max(y3),
        )
    }

    /// World coordinates of the envelope center for a raster of
    /// `width` x `height` pixels
    pub fn center(&self, width: usize, height: usize) -> (f64, f64) {
        self.apply(width as f64 / 2.0, height as f64 / 2.0)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

//! Cell value trait for generic raster grids

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// The engine only needs numeric casting and a zero value from its cell
/// types: classification grids hold integer labels (0 reserved for
/// no-data) and the area register holds `f64` weights (0.0 = unset).
pub trait CellValue:
    Copy + Clone + Debug + PartialEq + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

impl<T> CellValue for T where
    T: Copy + Clone + Debug + PartialEq + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_cast() {
        assert_eq!(CellValue::to_f64(42u16), Some(42.0));
        assert_eq!(CellValue::to_f64(0u8), Some(0.0));
    }

    #[test]
    fn test_float_cast() {
        assert_eq!(CellValue::to_f64(1.5f64), Some(1.5));
    }
}

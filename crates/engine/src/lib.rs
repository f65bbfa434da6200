//! # gridshift engine
//!
//! Change-matrix computation for co-registered classified rasters: for
//! every ordered class pair (reference, current), how many pixels
//! transitioned between the two periods, optionally restricted to a
//! region of interest and weighted by per-pixel ground area.
//!
//! Modules:
//! - **domain**: the class label set under analysis
//! - **roi**: per-pixel region-of-interest mask
//! - **accumulator**: thread-safe pair counting with a freeze protocol
//! - **area**: per-pixel area-weight raster (equal-area projected)
//! - **cpu**: tile-parallel backend on a bounded worker pool
//! - **gpu** (feature `gpu`): device-kernel backend
//! - **result**: the immutable, serializable matrix DTO

pub mod accumulator;
pub mod area;
pub mod cpu;
pub mod domain;
pub mod result;
pub mod roi;

#[cfg(feature = "gpu")]
pub mod gpu;

use gridshift_core::{Raster, Result};

use crate::area::{area_raster, AreaRasterParams};
use crate::cpu::{compute_cpu, CpuParams};
use crate::domain::ClassDomain;
use crate::result::{ChangeMatrixResult, MatrixMetadata};
use crate::roi::RoiMask;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::accumulator::ChangeMatrixAccumulator;
    pub use crate::area::{area_raster, AreaRasterParams};
    pub use crate::cpu::{compute_cpu, CpuParams};
    pub use crate::domain::ClassDomain;
    pub use crate::result::{ChangeMatrixElement, ChangeMatrixResult, MatrixMetadata};
    pub use crate::roi::RoiMask;
    pub use crate::{compute_change_matrix, Backend, ChangeMatrixParams};
    pub use gridshift_core::prelude::*;
}

/// Computation backend, selected by the caller at call time.
///
/// Exactly two strategies exist; both honor the same contract. The GPU
/// variant carries the explicitly-constructed device context.
pub enum Backend {
    /// Tile-parallel execution on a bounded worker pool
    Cpu(CpuParams),
    /// Device-kernel execution (pixel counts only)
    #[cfg(feature = "gpu")]
    Gpu(gpu::GpuContext),
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Cpu(CpuParams::default())
    }
}

/// Parameters for a change-matrix computation
pub struct ChangeMatrixParams {
    /// Execution strategy
    pub backend: Backend,
    /// Weight pixel counts by per-pixel ground area
    pub area_weighting: bool,
    /// Scale applied to pixel areas, e.g. for unit conversion
    pub area_multiplier: f64,
    /// Result identification
    pub metadata: MatrixMetadata,
}

impl Default for ChangeMatrixParams {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            area_weighting: false,
            area_multiplier: 1.0,
            metadata: MatrixMetadata::default(),
        }
    }
}

/// Compute the change matrix between two classified rasters.
///
/// The single entry point over both backends. With `area_weighting` set,
/// the CPU path builds the per-pixel area register first and every
/// element carries an area sum; the GPU path counts pixels only, so
/// requesting area weighting there is rejected with
/// [`Error::InvalidParameter`] rather than silently ignored.
pub fn compute_change_matrix(
    reference: &Raster<u16>,
    current: &Raster<u16>,
    domain: &ClassDomain,
    roi: Option<&RoiMask>,
    params: &ChangeMatrixParams,
) -> Result<ChangeMatrixResult> {
    match &params.backend {
        Backend::Cpu(cpu_params) => {
            let area = if params.area_weighting {
                Some(area_raster(
                    reference,
                    domain,
                    roi,
                    &AreaRasterParams {
                        multiplier: params.area_multiplier,
                    },
                )?)
            } else {
                None
            };

            let accumulator =
                compute_cpu(reference, current, domain, roi, area.as_ref(), cpu_params)?;
            ChangeMatrixResult::from_accumulator(&accumulator, params.metadata.clone())
        }
        #[cfg(feature = "gpu")]
        Backend::Gpu(ctx) => {
            if params.area_weighting {
                return Err(gridshift_core::Error::InvalidParameter {
                    name: "area_weighting",
                    value: "true".into(),
                    reason: "the device path produces pixel counts only; run the \
                             area pass on the CPU backend"
                        .into(),
                });
            }

            let artifacts = gpu::compute_gpu(ctx, reference, current, domain, roi)?;
            ChangeMatrixResult::from_dense(
                &artifacts.matrix,
                artifacts.class_count as usize,
                domain,
                params.metadata.clone(),
            )
        }
    }
}

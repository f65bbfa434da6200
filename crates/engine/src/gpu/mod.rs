//! GPU backend (feature `gpu`)
//!
//! Single-host-thread orchestration of the massively parallel device
//! kernels: serialize inputs, upload, dispatch `changemap` then
//! `changemat`, read back the dense matrix and output image.

mod backend;
mod device;

pub use backend::{compute_gpu, compute_raw, normalize_classes, GpuArtifacts};
pub use device::GpuContext;

//! Device-kernel change-matrix computation
//!
//! Serializes both classifications and the ROI into flat per-pixel
//! buffers, runs the `changemap`/`changemat` kernel pair, and reads back
//! the dense matrix and the output pair-code image. Produces pixel
//! counts only; area accounting is a CPU-path capability.

use tracing::debug;

use gridshift_core::{Error, Raster, Result};

use crate::domain::ClassDomain;
use crate::gpu::GpuContext;
use crate::roi::RoiMask;

/// Uniform parameters shared by both kernels (must match MatrixParams in
/// change_matrix.wgsl)
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct MatrixParams {
    width: u32,
    height: u32,
    class_count: u32,
    _pad: u32,
}

/// Artifacts copied back from the device
#[derive(Debug, Clone)]
pub struct GpuArtifacts {
    /// Dense `class_count` x `class_count` pixel counts, indexed
    /// `ref + cur * class_count`; dense code 0 is the reserved no-data
    /// class
    pub matrix: Vec<u64>,
    /// Per-pixel output pair code, row-major; 0 outside the ROI
    pub output: Vec<u32>,
    /// Side length of the dense matrix, including the reserved class
    pub class_count: u32,
}

/// Map classification labels onto dense device codes.
///
/// Domain label at index `i` becomes code `i + 1`; label 0 and labels
/// outside the domain become 0. One byte per pixel, row-major, so the
/// domain may hold at most 255 labels on this path.
pub fn normalize_classes(raster: &Raster<u16>, domain: &ClassDomain) -> Result<Vec<u8>> {
    if domain.len() > u8::MAX as usize {
        return Err(Error::InvalidParameter {
            name: "domain",
            value: domain.len().to_string(),
            reason: "device path encodes classes as bytes (at most 255 labels)".into(),
        });
    }

    Ok(raster
        .as_flat_slice()?
        .iter()
        .map(|&label| match domain.index_of(label) {
            Some(idx) => (idx + 1) as u8,
            None => 0,
        })
        .collect())
}

/// Run both kernels over pre-serialized byte buffers.
///
/// `reference`, `current` and `roi` are one byte per pixel, row-major,
/// `width * height` long; class values are dense codes below
/// `class_count` (which includes the reserved 0 class). All device
/// buffers live inside this call and are released on every exit path.
pub fn compute_raw(
    ctx: &GpuContext,
    reference: &[u8],
    current: &[u8],
    roi: &[u8],
    class_count: u32,
    width: u32,
    height: u32,
) -> Result<GpuArtifacts> {
    let pixels = (width as usize) * (height as usize);
    if pixels == 0 {
        return Err(Error::InvalidDimensions {
            width: width as usize,
            height: height as usize,
        });
    }
    for (name, buf) in [("reference", reference), ("current", current), ("roi", roi)] {
        if buf.len() != pixels {
            return Err(Error::InvalidParameter {
                name: "buffers",
                value: format!("{name}: {}", buf.len()),
                reason: format!("expected {pixels} bytes ({width}x{height})"),
            });
        }
    }
    if class_count < 2 {
        return Err(Error::InvalidParameter {
            name: "class_count",
            value: class_count.to_string(),
            reason: "need the reserved class plus at least one label".into(),
        });
    }
    for (name, buf) in [("reference", reference), ("current", current)] {
        if let Some(&bad) = buf.iter().find(|&&v| v as u32 >= class_count) {
            return Err(Error::InvalidParameter {
                name: "buffers",
                value: format!("{name}: {bad}"),
                reason: format!("class code exceeds class_count {class_count}"),
            });
        }
    }

    let cc2 = (class_count as u64) * (class_count as u64);
    let partial_bytes = (height as u64) * cc2 * 4;
    if partial_bytes > ctx.max_storage_binding() {
        return Err(Error::Device(format!(
            "per-row partial matrices need {partial_bytes} bytes, above the \
             device storage binding limit {}",
            ctx.max_storage_binding()
        )));
    }

    debug!(width, height, class_count, "dispatching change-matrix kernels");

    // Storage words: WGSL storage has no byte scalar, so each input byte
    // is widened to a u32 word for the transfer.
    let widen = |bytes: &[u8]| -> Vec<u32> { bytes.iter().map(|&b| b as u32).collect() };

    let storage_init = |label: &str, words: &[u32]| {
        use wgpu::util::DeviceExt;
        ctx.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(words),
                usage: wgpu::BufferUsages::STORAGE,
            })
    };

    let params = MatrixParams {
        width,
        height,
        class_count,
        _pad: 0,
    };
    let params_buf = {
        use wgpu::util::DeviceExt;
        ctx.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("matrix params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            })
    };

    let ref_buf = storage_init("reference classes", &widen(reference));
    let cur_buf = storage_init("current classes", &widen(current));
    let roi_buf = storage_init("roi mask", &widen(roi));

    let output_bytes = (pixels * 4) as u64;
    let matrix_bytes = cc2 * 4;

    let output_buf = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("output pair codes"),
        size: output_bytes,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });
    // Zero-initialized on creation, as the reduction requires.
    let partial_buf = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("per-row partial matrices"),
        size: partial_bytes,
        usage: wgpu::BufferUsages::STORAGE,
        mapped_at_creation: false,
    });
    let matrix_buf = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("dense matrix"),
        size: matrix_bytes,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });
    let readback_buf = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: output_bytes + matrix_bytes,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("change-matrix BG"),
        layout: &ctx.bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: ref_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: cur_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: roi_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: output_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: partial_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 6,
                resource: matrix_buf.as_entire_binding(),
            },
        ],
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("change-matrix"),
        });

    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("changemap"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&ctx.changemap_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(width.div_ceil(16), height.div_ceil(16), 1);
    }
    {
        // Pass boundary orders the slab writes before the reduction.
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("changemat"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&ctx.changemat_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups((cc2 as u32).div_ceil(64), 1, 1);
    }

    encoder.copy_buffer_to_buffer(&output_buf, 0, &readback_buf, 0, output_bytes);
    encoder.copy_buffer_to_buffer(&matrix_buf, 0, &readback_buf, output_bytes, matrix_bytes);
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let slice = readback_buf.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = tx.send(r);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| Error::Device("device dropped the readback request".into()))?
        .map_err(|e| Error::Device(format!("readback mapping failed: {e}")))?;

    let (output, matrix) = {
        let mapped = slice.get_mapped_range();
        let words: &[u32] = bytemuck::cast_slice(&mapped);
        let output = words[..pixels].to_vec();
        let matrix = words[pixels..].iter().map(|&v| v as u64).collect();
        (output, matrix)
    };
    readback_buf.unmap();

    Ok(GpuArtifacts {
        matrix,
        output,
        class_count,
    })
}

/// Device-path computation over raster inputs.
///
/// Normalizes both classifications onto dense byte codes (labels outside
/// the domain collapse to the reserved 0 class), serializes the ROI (all
/// ones when absent), and runs the kernels.
pub fn compute_gpu(
    ctx: &GpuContext,
    reference: &Raster<u16>,
    current: &Raster<u16>,
    domain: &ClassDomain,
    roi: Option<&RoiMask>,
) -> Result<GpuArtifacts> {
    reference.co_registered_with(current)?;
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

    let ref_bytes = normalize_classes(reference, domain)?;
    let cur_bytes = normalize_classes(current, domain)?;
    let roi_bytes = match roi {
        Some(roi) => roi.as_bytes()?.to_vec(),
        None => vec![1u8; rows * cols],
    };

    compute_raw(
        ctx,
        &ref_bytes,
        &cur_bytes,
        &roi_bytes,
        domain.len() as u32 + 1,
        cols as u32,
        rows as u32,
    )
}

//! Compute device context
//!
//! One-time, explicit device setup: adapter selection, device/queue
//! acquisition, kernel compilation and pipeline layout. Created by the
//! caller and passed into each computation, never registered globally.

use tracing::debug;

use gridshift_core::{Error, Result};

/// Handle to the compute device and the compiled change-matrix kernels.
///
/// Construction is the expensive step (shader compilation); a context can
/// be reused across invocations. Per-invocation buffers are created and
/// dropped inside each computation, so no device memory outlives a call.
pub struct GpuContext {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
    pub(crate) changemap_pipeline: wgpu::ComputePipeline,
    pub(crate) changemat_pipeline: wgpu::ComputePipeline,
}

impl GpuContext {
    /// Acquire the default high-performance adapter and compile the
    /// kernels.
    ///
    /// Fails with [`Error::Device`] when no compatible adapter is present
    /// or the device cannot be acquired.
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| Error::Device("no compatible compute adapter found".into()))?;

        debug!(adapter = %adapter.get_info().name, "acquired compute adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("change-matrix device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| Error::Device(format!("failed to acquire device: {e}")))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("change_matrix.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/change_matrix.wgsl").into()),
        });

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("change-matrix BGL"),
            entries: &[
                // 0 — params (uniform)
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // 1..3 — classification and ROI inputs
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                // 4 — output pair-code image
                storage_entry(4, false),
                // 5 — per-row partial matrices
                storage_entry(5, false),
                // 6 — reduced dense matrix
                storage_entry(6, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("change-matrix pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        };

        let changemap_pipeline = pipeline("changemap");
        let changemat_pipeline = pipeline("changemat");

        Ok(Self {
            device,
            queue,
            bind_group_layout,
            changemap_pipeline,
            changemat_pipeline,
        })
    }

    /// Largest storage buffer binding the device supports, in bytes
    pub(crate) fn max_storage_binding(&self) -> u64 {
        self.device.limits().max_storage_buffer_binding_size as u64
    }
}

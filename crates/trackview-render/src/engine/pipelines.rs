//! Per-program GPU state and render pipeline creation.

use std::num::NonZeroU64;

use crate::device::ProgramHandle;
use crate::error::RenderResult;
use crate::shader::{
    ProgramKind, ProgramSource, ShaderBuilder, FRAGMENT_ENTRY, VERTEX_ENTRY,
};

use super::textures::DEPTH_FORMAT;

/// Everything that selects a distinct render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub program: ProgramHandle,
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub depth_write: bool,
}

/// A compiled program and its current uniform block.
pub(crate) struct GpuProgram {
    pub kind: ProgramKind,
    pub module: wgpu::ShaderModule,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub layout: wgpu::PipelineLayout,
    pub attributes: Vec<wgpu::VertexAttribute>,
    /// CPU copy of the uniform block, snapshotted into the frame at each draw.
    pub block: Vec<u8>,
}

impl GpuProgram {
    pub fn new(device: &wgpu::Device, source: &ProgramSource) -> RenderResult<Self> {
        let module = ShaderBuilder::from_source(source).build_module(device)?;
        let bind_group_layout = create_bind_group_layout(device, source);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(source.kind.label()),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let attributes = source
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: if a.components == 2 {
                    wgpu::VertexFormat::Float32x2
                } else {
                    wgpu::VertexFormat::Float32x3
                },
                offset: 0,
                shader_location: a.location,
            })
            .collect();

        Ok(Self {
            kind: source.kind,
            module,
            bind_group_layout,
            layout,
            attributes,
            block: vec![0; source.block_size as usize],
        })
    }

    pub fn block_size(&self) -> u64 {
        self.block.len() as u64
    }
}

/// Mesh programs read one uniform block; filter programs also read a texture.
fn create_bind_group_layout(
    device: &wgpu::Device,
    source: &ProgramSource,
) -> wgpu::BindGroupLayout {
    let uniforms = |binding, visibility| wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: NonZeroU64::new(u64::from(source.block_size)),
        },
        count: None,
    };

    if source.kind.draws_mesh() {
        return device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("model shading bind group layout"),
            entries: &[uniforms(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("filter bind group layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            uniforms(2, wgpu::ShaderStages::FRAGMENT),
        ],
    })
}

/// Creates the pipeline for one program/target combination.
pub(crate) fn create_render_pipeline(
    device: &wgpu::Device,
    program: &GpuProgram,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = program
        .attributes
        .iter()
        .map(|attribute| wgpu::VertexBufferLayout {
            array_stride: attribute.format.size(),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: std::slice::from_ref(attribute),
        })
        .collect();

    let mesh = program.kind.draws_mesh();
    let (cull_mode, depth_compare) = if mesh {
        (Some(wgpu::Face::Back), wgpu::CompareFunction::LessEqual)
    } else {
        // The quad covers the whole target regardless of stored depth.
        (None, wgpu::CompareFunction::Always)
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.kind.label()),
        layout: Some(&program.layout),
        vertex: wgpu::VertexState {
            module: &program.module,
            entry_point: Some(VERTEX_ENTRY),
            buffers: &buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.module,
            entry_point: Some(FRAGMENT_ENTRY),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            ..wgpu::PrimitiveState::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_write,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: key.sample_count,
            ..wgpu::MultisampleState::default()
        },
        multiview: None,
        cache: None,
    })
}

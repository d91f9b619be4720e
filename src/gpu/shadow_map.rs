//! Shadow-map pass: walls rasterized as lines into a `W×1` depth target,
//! plus asynchronous readback of that target.

use std::sync::mpsc::{self, Receiver, TryRecvError};

use super::context::GpuContext;
use super::uniforms::{SpotlightUniform, WallVertex, wall_vertices};
use crate::occlusion::DepthMap;
use crate::occlusion::depth_map::DEPTH_CLEAR;
use crate::scene::{Spotlight, Wall};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Staging buffers kept around for readback.
const READBACK_POOL_SIZE: usize = 3;

/// Row size of a `width`-texel depth copy, padded to the copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * std::mem::size_of::<f32>() as u32;
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

pub struct ShadowMapPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    width: u32,
    wall_buffer: wgpu::Buffer,
    wall_vertex_count: u32,
    readback: DepthReadback,
}

impl ShadowMapPass {
    pub fn new(ctx: &GpuContext, width: u32) -> Self {
        let device = &ctx.device;
        let width = width.max(1);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Shadow Map Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow_map.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Spotlight Uniform"),
            size: std::mem::size_of::<SpotlightUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Map Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Map Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Map Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Depth only: no fragment stage, no color targets
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Map Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[WallVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Map Texture"),
            size: wgpu::Extent3d {
                width,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&Default::default());

        let wall_buffer = Self::create_wall_buffer(ctx, 0);

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            depth_texture,
            depth_view,
            width,
            wall_buffer,
            wall_vertex_count: 0,
            readback: DepthReadback::new(width),
        }
    }

    fn create_wall_buffer(ctx: &GpuContext, vertex_count: usize) -> wgpu::Buffer {
        // wgpu rejects zero-sized vertex buffers
        let size = (vertex_count.max(2) * std::mem::size_of::<WallVertex>()) as wgpu::BufferAddress;
        ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Wall Vertex Buffer"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn uniform_buffer(&self) -> &wgpu::Buffer {
        &self.uniform_buffer
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    pub fn update_spotlight(&self, ctx: &GpuContext, spotlight: &Spotlight) {
        let uniform = SpotlightUniform::new(spotlight);
        ctx.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    /// Replace the wall list, recreating the vertex buffer.
    pub fn update_walls(&mut self, ctx: &GpuContext, walls: &[Wall]) {
        let vertices = wall_vertices(walls);
        self.wall_buffer = Self::create_wall_buffer(ctx, vertices.len());
        if !vertices.is_empty() {
            ctx.queue
                .write_buffer(&self.wall_buffer, 0, bytemuck::cast_slice(&vertices));
        }
        self.wall_vertex_count = vertices.len() as u32;
        log::debug!("Uploaded {} walls to the shadow map pass", walls.len());
    }

    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Map Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(DEPTH_CLEAR),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if self.wall_vertex_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.wall_buffer.slice(..));
        pass.draw(0..self.wall_vertex_count, 0..1);
    }

    /// Copy the depth target into a staging buffer, if one is free.
    pub fn encode_readback(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        spotlight: &Spotlight,
    ) {
        self.readback
            .encode_copy(&ctx.device, encoder, &self.depth_texture, spotlight);
    }

    /// Start mapping whatever [`Self::encode_readback`] copied. Call after submit.
    pub fn begin_readback(&mut self) {
        self.readback.begin_map();
    }

    /// Collect finished readbacks without blocking; returns the newest.
    pub fn poll_readback(&mut self, ctx: &GpuContext) -> Option<DepthMap> {
        self.readback.collect(&ctx.device)
    }
}

struct InFlight {
    buffer: wgpu::Buffer,
    spotlight: Spotlight,
    done: Receiver<Result<(), wgpu::BufferAsyncError>>,
}

/// Pool of staging buffers the depth target is copied into and mapped
/// asynchronously. Completions arrive in any order.
struct DepthReadback {
    width: u32,
    bytes_per_row: u32,
    free: Vec<wgpu::Buffer>,
    allocated: usize,
    copied: Option<(wgpu::Buffer, Spotlight)>,
    in_flight: Vec<InFlight>,
}

impl DepthReadback {
    fn new(width: u32) -> Self {
        Self {
            width,
            bytes_per_row: padded_bytes_per_row(width),
            free: Vec::new(),
            allocated: 0,
            copied: None,
            in_flight: Vec::new(),
        }
    }

    fn take_buffer(&mut self, device: &wgpu::Device) -> Option<wgpu::Buffer> {
        if let Some(buffer) = self.free.pop() {
            return Some(buffer);
        }
        if self.allocated >= READBACK_POOL_SIZE {
            return None;
        }
        self.allocated += 1;
        Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Depth Readback Buffer"),
            size: self.bytes_per_row as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        }))
    }

    fn encode_copy(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
        spotlight: &Spotlight,
    ) {
        if self.copied.is_some() {
            return;
        }
        let Some(buffer) = self.take_buffer(device) else {
            log::trace!("All readback buffers in flight; skipping this frame");
            return;
        };

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::DepthOnly,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.bytes_per_row),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.copied = Some((buffer, *spotlight));
    }

    fn begin_map(&mut self) {
        let Some((buffer, spotlight)) = self.copied.take() else {
            return;
        };
        let (sender, done) = mpsc::channel();
        buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.in_flight.push(InFlight { buffer, spotlight, done });
    }

    fn collect(&mut self, device: &wgpu::Device) -> Option<DepthMap> {
        if self.in_flight.is_empty() {
            return None;
        }
        let _ = device.poll(wgpu::Maintain::Poll);

        let mut latest = None;
        for pending in std::mem::take(&mut self.in_flight) {
            match pending.done.try_recv() {
                Ok(Ok(())) => {
                    let map = {
                        let bytes = pending.buffer.slice(..).get_mapped_range();
                        DepthMap::from_readback(&pending.spotlight, &bytes, self.width as usize)
                    };
                    pending.buffer.unmap();
                    if let Some(map) = &map {
                        log::debug!(
                            "Depth readback: {}/{} columns occluded, first {:?}",
                            map.coverage(),
                            map.width(),
                            map.depths().first()
                        );
                    }
                    latest = map.or(latest);
                    self.free.push(pending.buffer);
                }
                Ok(Err(e)) => {
                    log::warn!("Depth readback failed: {}", e);
                    self.free.push(pending.buffer);
                }
                Err(TryRecvError::Empty) => self.in_flight.push(pending),
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Depth readback callback dropped");
                    self.allocated -= 1;
                }
            }
        }
        latest
    }
}

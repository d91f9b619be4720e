//! CPU-side mirrors of the shader inputs.

use bytemuck::{Pod, Zeroable};

use crate::render::overlay_lines;
use crate::scene::{Scene, Spotlight, Wall};
use crate::transform::view_projection;

/// Matches `struct Spotlight` in both shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SpotlightUniform {
    pub position: [f32; 2],
    pub focal_length: f32,
    pub max_distance: f32,
    pub view_projection: [[f32; 4]; 4],
}

impl SpotlightUniform {
    pub fn new(spotlight: &Spotlight) -> Self {
        Self {
            position: spotlight.pos.to_array(),
            focal_length: spotlight.focal_length,
            max_distance: spotlight.max_distance,
            view_projection: view_projection(spotlight).to_cols_array_2d(),
        }
    }
}

/// Wall endpoints for the shadow-map pass, two vertices per wall.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WallVertex {
    pub position: [f32; 2],
}

impl WallVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

pub fn wall_vertices(walls: &[Wall]) -> Vec<WallVertex> {
    walls
        .iter()
        .flat_map(|wall| [wall.start, wall.end])
        .map(|p| WallVertex { position: p.to_array() })
        .collect()
}

/// Colored debug line endpoint.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 2],
    pub color: [f32; 3],
}

impl LineVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[inline]
fn unpack_color(pixel: u32) -> [f32; 3] {
    crate::render::to_rgb(pixel).map(|c| c as f32 / 255.0)
}

/// The same debug overlay the CPU renderer draws, as a line list.
pub fn overlay_vertices(scene: &Scene) -> Vec<LineVertex> {
    overlay_lines(scene)
        .into_iter()
        .flat_map(|(from, to, color)| {
            let color = unpack_color(color);
            [
                LineVertex { position: from.to_array(), color },
                LineVertex { position: to.to_array(), color },
            ]
        })
        .collect()
}

//! GPU strategy using wgpu
//!
//! The shadow-map pass rasterizes walls into a `W×1` depth target through
//! the spotlight's view-projection; the rendering pass then tests every
//! screen pixel against it. Both share one spotlight uniform.

pub mod context;
pub mod pipelines;
pub mod renderer;
pub mod shadow_map;
pub mod uniforms;

pub use context::{GpuContext, GpuError};
pub use renderer::SpotlightRenderer;

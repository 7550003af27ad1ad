//! CPU rasterization pipeline
//!
//! Stages:
//! - Geometry: vertex shading, perspective divide, primitive assembly, winding
//! - Rasterizer: culling, scanline fill, clipped Bresenham lines, points
//!
//! Shading is injected as closures; textures double as render targets,
//! depth buffers and sampled material inputs.

mod math;
mod types;
mod texture;
mod geometry;
mod render;
mod shaders;

pub use math::*;
pub use types::*;
pub use texture::*;
pub use geometry::*;
pub use render::*;
pub use shaders::*;

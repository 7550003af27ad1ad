//! Bonnie pipeline: a CPU rendering pipeline for skinned, animated meshes
//!
//! - `rasterizer`: geometry and rasterizer stages, textures, reference shaders
//! - `animation`: skeletons, keyframe clips and the animator
//! - `scene`: meshes, models, camera, resource cache, RON assets, frame renderer

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod animation;
pub mod config;
pub mod error;
pub mod rasterizer;
pub mod scene;

pub use error::{AssetError, ResourceError, Result};

//! Scene layer: meshes, models, camera, resource cache, asset files and the frame renderer

mod mesh;
mod model;
mod camera;
mod loader;
mod resources;
mod renderer;

pub use mesh::*;
pub use model::*;
pub use camera::*;
pub use loader::*;
pub use resources::{
    instance, is_started, resource_key, shut_down, skeleton_mesh, start_up, ResourceCache, ResourceKey, CUBE_ASSET,
};
pub use renderer::*;

//! Skeletal animation: bone arena, keyframe clips and the animator

mod skeleton;
mod clip;
mod animator;

pub use skeleton::*;
pub use clip::*;
pub use animator::*;

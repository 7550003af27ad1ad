//! Reference shaders: skinned vertex transform, diffuse and flat-color pixel shading

use std::sync::Arc;

use super::geometry::{GeometryConstantBuffer, VertexShader};
use super::math::{Mat4, Vec3};
use super::render::{PixelShader, RasterizerConstantBuffer};
use super::texture::Material;
use super::types::{AddressMode, LinearColor, SampleFilter, Vertex};

/// Blend up to four weighted bone matrices into one skinning matrix
///
/// Returns None when the first weight is zero (unskinned vertex). Indices
/// past the palette end clamp to its last entry.
pub fn skinning_matrix(vertex: &Vertex, bones: &[Mat4]) -> Option<Mat4> {
    if vertex.bone_weights.x == 0.0 || bones.is_empty() {
        return None;
    }

    let last = bones.len() - 1;
    let mut skin = Mat4::ZERO;
    for i in 0..4 {
        let weight = vertex.bone_weights[i];
        if weight == 0.0 {
            continue;
        }
        let index = (vertex.bone_indices[i] as usize).min(last);
        skin += bones[index] * weight;
    }
    Some(skin)
}

/// Skin, then apply world, view and projection
///
/// Normal, binormal and tangent only see the world transform and come out
/// re-normalized.
pub fn transform_vertex(vertex: &Vertex, constants: &GeometryConstantBuffer) -> Vertex {
    let mut out = *vertex;
    let mut position = vertex.position;
    let mut normal = vertex.normal;
    let mut binormal = vertex.binormal;
    let mut tangent = vertex.tangent;

    if let Some(skin) = skinning_matrix(vertex, &constants.bones) {
        position = skin * position;
        normal = skin.transform_vector3(normal);
        binormal = skin.transform_vector3(binormal);
        tangent = skin.transform_vector3(tangent);
    }

    let world_dir = |d: Vec3| constants.world.transform_vector3(d).normalize_or_zero();

    out.position = constants.projection * (constants.view * (constants.world * position));
    out.normal = world_dir(normal);
    out.binormal = world_dir(binormal);
    out.tangent = world_dir(tangent);
    out
}

pub fn skinned_vertex_shader() -> VertexShader {
    Arc::new(transform_vertex)
}

/// Sample the material's diffuse texture at the vertex UV, white without one
pub fn diffuse_shader(filter: SampleFilter, address: AddressMode) -> PixelShader {
    Arc::new(
        move |v: &Vertex, material: Option<&Material>, _: &RasterizerConstantBuffer| {
            match material.and_then(Material::diffuse) {
                Some(tex) => tex.sample_color(v.tex_coord, address, filter),
                None => LinearColor::WHITE,
            }
        },
    )
}

pub fn flat_color_shader(color: LinearColor) -> PixelShader {
    Arc::new(move |_: &Vertex, _: Option<&Material>, _: &RasterizerConstantBuffer| color)
}

//! RON asset files: models with skeletons, animation sets and scene descriptions

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::animation::{Animation, Skeleton};
use crate::error::AssetError;
use crate::rasterizer::{Mat4, Quat, Topology, Vec2, Vec3, Vertex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexAsset {
    pub position: Vec3,
    #[serde(default)]
    pub uv: Vec2,
    #[serde(default)]
    pub normal: Vec3,
    /// (bone name, weight); only the first four are used
    #[serde(default)]
    pub weights: Vec<(String, f32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshAsset {
    #[serde(default)]
    pub name: String,
    pub vertices: Vec<VertexAsset>,
    pub indices: Vec<u32>,
    #[serde(default = "default_topology")]
    pub topology: Topology,
    /// Diffuse texture, relative to the model file
    #[serde(default)]
    pub diffuse: Option<String>,
}

fn default_topology() -> Topology {
    Topology::TriangleList
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneAsset {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub translation: Vec3,
    #[serde(default = "default_rotation")]
    pub rotation: Quat,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    /// Bind-pose offset; the inverse rest pose when omitted
    #[serde(default)]
    pub offset: Option<Mat4>,
}

fn default_rotation() -> Quat {
    Quat::IDENTITY
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAsset {
    pub name: String,
    pub meshes: Vec<MeshAsset>,
    #[serde(default)]
    pub bones: Vec<BoneAsset>,
}

impl ModelAsset {
    pub fn has_skeleton(&self) -> bool {
        !self.bones.is_empty()
    }

    /// Build the bone arena
    ///
    /// Parents that are only referenced by name are created with an identity
    /// transform. The first parentless bone becomes the root; other parentless
    /// bones keep their own subtrees and are propagated after it.
    pub fn build_skeleton(&self) -> Skeleton {
        let mut skeleton = Skeleton::new();
        for bone in &self.bones {
            let id = skeleton.bone_or_insert(&bone.name);
            if let Some(b) = skeleton.bone_mut(id) {
                b.transform = Mat4::from_scale_rotation_translation(bone.scale, bone.rotation, bone.translation);
            }
        }

        let mut root = None;
        for bone in &self.bones {
            let id = skeleton.bone_or_insert(&bone.name);
            match &bone.parent {
                Some(parent) => {
                    let parent = skeleton.bone_or_insert(parent);
                    skeleton.add_child(parent, id);
                }
                None => {
                    if let Some(first) = root.and_then(|r| skeleton.bone(r)) {
                        log::warn!(
                            "Model '{}' has several root bones, '{}' is walked after '{}'",
                            self.name,
                            bone.name,
                            first.name
                        );
                    }
                    root.get_or_insert(id);
                }
            }
        }
        if let Some(root) = root {
            skeleton.set_root(root);
        }

        let mut rest = vec![Mat4::IDENTITY; skeleton.len()];
        skeleton.propagate(|b| b.transform, |b, world| rest[b.index] = world);
        for bone in &self.bones {
            let Some(id) = skeleton.bone_id(&bone.name) else {
                continue;
            };
            let offset = bone.offset.unwrap_or_else(|| rest[id].inverse());
            if let Some(b) = skeleton.bone_mut(id) {
                b.offset = offset;
            }
        }
        skeleton
    }

    /// Convert a mesh's vertices, resolving bone names against `skeleton`
    pub fn build_vertices(mesh: &MeshAsset, skeleton: &Skeleton) -> Vec<Vertex> {
        mesh.vertices
            .iter()
            .map(|src| {
                let mut v = Vertex::new(src.position, src.uv, src.normal);
                let mut slot = 0;
                for (name, weight) in &src.weights {
                    if slot == 4 {
                        break;
                    }
                    let Some(id) = skeleton.bone_id(name) else {
                        log::warn!("Mesh '{}' weights unknown bone '{}'", mesh.name, name);
                        continue;
                    };
                    v.bone_indices[slot] = id as u32;
                    v.bone_weights[slot] = *weight;
                    slot += 1;
                }
                v
            })
            .collect()
    }
}

/// Keyframe times are in ticks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelAsset {
    pub bone: String,
    #[serde(default)]
    pub positions: Vec<(f32, Vec3)>,
    #[serde(default)]
    pub rotations: Vec<(f32, Quat)>,
    #[serde(default)]
    pub scales: Vec<(f32, Vec3)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationAsset {
    #[serde(default)]
    pub name: String,
    /// Cycle length in ticks
    pub duration: f32,
    #[serde(default)]
    pub ticks_per_second: f32,
    pub channels: Vec<ChannelAsset>,
}

impl AnimationAsset {
    /// Convert to seconds and bind channels to bones by name
    ///
    /// Channels for bones the skeleton does not have are dropped.
    pub fn build(&self, name: &str, skeleton: &Skeleton) -> Animation {
        let to_seconds = Animation::tick_scale(self.ticks_per_second);
        let mut animation = Animation::new(name, self.duration * to_seconds);

        for src in &self.channels {
            let Some(bone) = skeleton.bone_id(&src.bone) else {
                log::warn!("Animation '{}' drives unknown bone '{}'", name, src.bone);
                continue;
            };
            let channel = animation.channel_mut(bone);
            for &(time, value) in &src.positions {
                channel.positions.add_key(time * to_seconds, value);
            }
            for &(time, value) in &src.rotations {
                channel.rotations.add_key(time * to_seconds, value);
            }
            for &(time, value) in &src.scales {
                channel.scales.add_key(time * to_seconds, value);
            }
        }
        animation
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimationSet {
    pub animations: Vec<AnimationAsset>,
}

/// One model placed in a scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneModel {
    /// Model file, or "cube" for the built-in test cube
    pub asset: String,
    #[serde(default)]
    pub position: Vec3,
    /// Rotation about Y in degrees
    #[serde(default)]
    pub yaw: f32,
    #[serde(default = "default_uniform_scale")]
    pub scale: f32,
    #[serde(default)]
    pub animations: Vec<String>,
    #[serde(default)]
    pub play: Option<String>,
    #[serde(default)]
    pub show_skeleton: bool,
}

fn default_uniform_scale() -> f32 {
    1.0
}

impl SceneModel {
    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            Quat::from_rotation_y(self.yaw.to_radians()),
            self.position,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDescription {
    pub models: Vec<SceneModel>,
}

/// Load a model from a RON file
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<ModelAsset, AssetError> {
    let contents = fs::read_to_string(path)?;
    model_from_str(&contents)
}

pub fn model_from_str(s: &str) -> Result<ModelAsset, AssetError> {
    Ok(ron::from_str(s)?)
}

/// Load an animation set from a RON file
pub fn load_animations<P: AsRef<Path>>(path: P) -> Result<AnimationSet, AssetError> {
    let contents = fs::read_to_string(path)?;
    animations_from_str(&contents)
}

pub fn animations_from_str(s: &str) -> Result<AnimationSet, AssetError> {
    Ok(ron::from_str(s)?)
}

/// Load a scene description from a RON file
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<SceneDescription, AssetError> {
    let contents = fs::read_to_string(path)?;
    scene_from_str(&contents)
}

pub fn scene_from_str(s: &str) -> Result<SceneDescription, AssetError> {
    Ok(ron::from_str(s)?)
}

/// Save a scene description to a RON file
pub fn save_scene<P: AsRef<Path>>(scene: &SceneDescription, path: P) -> Result<(), AssetError> {
    let config = ron::ser::PrettyConfig::new()
        .depth_limit(4)
        .indentor("  ".to_string());

    let contents = ron::ser::to_string_pretty(scene, config)?;
    fs::write(path, contents)?;
    Ok(())
}

//! Resource cache: owns shared assets, hands out weak references

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::animation::{Animation, Animator, Skeleton};
use crate::error::{AssetError, ResourceError};
use crate::rasterizer::{Color, Material, Texture, Topology, Vertex};

use super::loader::{self, ModelAsset, SceneModel};
use super::mesh::Mesh;
use super::model::Model3D;

pub type ResourceKey = u64;

/// Name of the built-in cube model
pub const CUBE_ASSET: &str = "cube";

/// Hash a resource path (plus any suffix) into its cache key
pub fn resource_key(path: &str) -> ResourceKey {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    hasher.finish()
}

/// Line mesh joining every bone to its children
///
/// Vertex `i` sits at the origin, fully weighted to bone `i`, so drawing it
/// with the joint palette places it at the joint.
pub fn skeleton_mesh(skeleton: &Skeleton) -> Mesh {
    let vertices: Vec<Vertex> = skeleton
        .bones()
        .iter()
        .map(|b| Vertex::from_pos(0.0, 0.0, 0.0).with_bone(b.index as u32))
        .collect();
    let indices: Vec<u32> = skeleton
        .bones()
        .iter()
        .flat_map(|b| b.children.iter().flat_map(move |&c| [b.index as u32, c as u32]))
        .collect();

    let mut mesh = Mesh::new(vertices, indices, Topology::LineList);
    mesh.name = "skeleton".to_string();
    mesh
}

pub struct ResourceCache {
    model_assets: HashMap<ResourceKey, Arc<ModelAsset>>,
    meshes: HashMap<ResourceKey, Arc<Mesh>>,
    materials: HashMap<ResourceKey, Arc<Material>>,
    textures: HashMap<ResourceKey, Arc<Texture>>,
    skeletons: HashMap<ResourceKey, Arc<Skeleton>>,
    skeleton_meshes: HashMap<ResourceKey, Arc<Mesh>>,
    animations: HashMap<ResourceKey, Arc<Animation>>,
    animators: HashMap<ResourceKey, Arc<RwLock<Animator>>>,
    models: HashMap<ResourceKey, Arc<RwLock<Model3D>>>,
    error_texture: Arc<Texture>,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCache {
    pub fn new() -> Self {
        let mut error_texture = Texture::checkerboard(16, 16, Color::MAGENTA, Color::BLACK);
        error_texture.name = "error".to_string();
        Self {
            model_assets: HashMap::new(),
            meshes: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            skeletons: HashMap::new(),
            skeleton_meshes: HashMap::new(),
            animations: HashMap::new(),
            animators: HashMap::new(),
            models: HashMap::new(),
            error_texture: Arc::new(error_texture),
        }
    }

    pub fn error_texture(&self) -> Weak<Texture> {
        Arc::downgrade(&self.error_texture)
    }

    /// Load (once) and return the texture at `path`, the error texture on failure
    pub fn texture(&mut self, path: &str) -> Weak<Texture> {
        let key = resource_key(path);
        if let Some(tex) = self.textures.get(&key) {
            return Arc::downgrade(tex);
        }
        match Texture::from_file(path) {
            Ok(tex) => {
                let tex = Arc::new(tex);
                self.textures.insert(key, tex.clone());
                Arc::downgrade(&tex)
            }
            Err(e) => {
                log::warn!("Failed to load texture {}: {}, using error texture", path, e);
                self.error_texture()
            }
        }
    }

    pub fn insert_texture(&mut self, path: &str, texture: Texture) -> Weak<Texture> {
        let tex = Arc::new(texture);
        self.textures.insert(resource_key(path), tex.clone());
        Arc::downgrade(&tex)
    }

    pub fn insert_mesh(&mut self, path: &str, mesh: Mesh) -> Weak<Mesh> {
        let mesh = Arc::new(mesh);
        self.meshes.insert(resource_key(path), mesh.clone());
        Arc::downgrade(&mesh)
    }

    pub fn insert_material(&mut self, path: &str, material: Material) -> Weak<Material> {
        let material = Arc::new(material);
        self.materials.insert(resource_key(path), material.clone());
        Arc::downgrade(&material)
    }

    pub fn insert_animation(&mut self, name: &str, animation: Animation) -> Weak<Animation> {
        let animation = Arc::new(animation);
        self.animations.insert(resource_key(name), animation.clone());
        Arc::downgrade(&animation)
    }

    pub fn mesh(&self, path: &str) -> Option<Weak<Mesh>> {
        self.meshes.get(&resource_key(path)).map(Arc::downgrade)
    }

    pub fn animation(&self, name: &str) -> Option<Weak<Animation>> {
        self.animations.get(&resource_key(name)).map(Arc::downgrade)
    }

    pub fn skeleton(&self, path: &str) -> Option<Weak<Skeleton>> {
        self.skeletons.get(&resource_key(path)).map(Arc::downgrade)
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn animator_count(&self) -> usize {
        self.animators.len()
    }

    /// All live model instances
    pub fn models(&self) -> Vec<Arc<RwLock<Model3D>>> {
        self.models.values().cloned().collect()
    }

    pub fn animators(&self) -> Vec<Arc<RwLock<Animator>>> {
        self.animators.values().cloned().collect()
    }

    fn model_asset(&mut self, path: &str) -> Result<Arc<ModelAsset>, AssetError> {
        let key = resource_key(path);
        if let Some(asset) = self.model_assets.get(&key) {
            return Ok(asset.clone());
        }
        let asset = Arc::new(loader::load_model(path)?);
        self.model_assets.insert(key, asset.clone());
        Ok(asset)
    }

    fn ensure_skeleton(&mut self, path: &str, asset: &ModelAsset) -> Arc<Skeleton> {
        let key = resource_key(path);
        self.skeletons
            .entry(key)
            .or_insert_with(|| Arc::new(asset.build_skeleton()))
            .clone()
    }

    /// Shared meshes (and their materials) for a model file, built once
    fn ensure_meshes(&mut self, path: &str) -> Result<Vec<Weak<Mesh>>, AssetError> {
        if path == CUBE_ASSET {
            return Ok(vec![self.ensure_cube()]);
        }

        let asset = self.model_asset(path)?;
        let skeleton = self.ensure_skeleton(path, &asset);
        let base = Path::new(path).parent().unwrap_or_else(|| Path::new(""));

        let mut out = Vec::with_capacity(asset.meshes.len());
        for (index, src) in asset.meshes.iter().enumerate() {
            let mesh_path = format!("{}_{}", path, index);
            if let Some(mesh) = self.mesh(&mesh_path) {
                out.push(mesh);
                continue;
            }

            let mut material = Material::new(&src.name);
            if let Some(diffuse) = &src.diffuse {
                let tex_path = base.join(diffuse);
                material.add_texture(self.texture(&tex_path.to_string_lossy()));
            }
            let material = self.insert_material(&format!("{}_material_{}", path, index), material);

            let vertices = ModelAsset::build_vertices(src, &skeleton);
            let mut mesh = Mesh::new(vertices, src.indices.clone(), src.topology).with_material(material);
            mesh.name = src.name.clone();
            out.push(self.insert_mesh(&mesh_path, mesh));
        }
        Ok(out)
    }

    fn ensure_cube(&mut self) -> Weak<Mesh> {
        if let Some(mesh) = self.mesh(CUBE_ASSET) {
            return mesh;
        }
        let tex = self.insert_texture(
            "cube_checker",
            Texture::checkerboard(32, 32, Color::WHITE, Color::new(96, 96, 160)),
        );
        let mut material = Material::new(CUBE_ASSET);
        material.add_texture(tex);
        let material = self.insert_material(CUBE_ASSET, material);
        self.insert_mesh(CUBE_ASSET, Mesh::test_cube(1.0).with_material(material))
    }

    /// New model instance of `path` (or the built-in cube)
    pub fn create_model(&mut self, path: &str) -> Result<Weak<RwLock<Model3D>>, AssetError> {
        let meshes = self.ensure_meshes(path)?;

        let instance = format!("{}_{}", path, self.models.len());
        let mut model = Model3D::new(&instance);
        for mesh in meshes {
            model.add_mesh(mesh);
        }

        let model = Arc::new(RwLock::new(model));
        self.models.insert(resource_key(&instance), model.clone());
        log::info!("Created model {}", instance);
        Ok(Arc::downgrade(&model))
    }

    /// New animator over the skeleton of `path`, with its skeleton line mesh
    pub fn create_animator(&mut self, path: &str) -> Result<Weak<RwLock<Animator>>, AssetError> {
        let asset = self.model_asset(path)?;
        if !asset.has_skeleton() {
            return Err(AssetError::Invalid {
                path: path.to_string(),
                reason: "model has no bones".to_string(),
            });
        }
        let skeleton = self.ensure_skeleton(path, &asset);

        let key = resource_key(path);
        let lines = self
            .skeleton_meshes
            .entry(key)
            .or_insert_with(|| Arc::new(skeleton_mesh(&skeleton)))
            .clone();

        let mut animator = Animator::new();
        animator.set_skeleton_mesh(Arc::downgrade(&lines));
        animator.set_skeleton(Arc::downgrade(&skeleton));

        let instance = format!("{}_{}", path, self.animators.len());
        let animator = Arc::new(RwLock::new(animator));
        self.animators.insert(resource_key(&instance), animator.clone());
        Ok(Arc::downgrade(&animator))
    }

    /// Load every clip in an animation file and register it with `animator`
    ///
    /// Clips are named `"<path>_<name>"`, or `"<path>_<index>"` when unnamed.
    /// Returns the registered names.
    pub fn bind_animations(
        &mut self,
        path: &str,
        animator: &Weak<RwLock<Animator>>,
    ) -> Result<Vec<String>, AssetError> {
        let Some(animator) = animator.upgrade() else {
            return Ok(Vec::new());
        };
        let Some(skeleton) = animator.read().skeleton() else {
            return Ok(Vec::new());
        };

        let set = loader::load_animations(path)?;
        let mut names = Vec::with_capacity(set.animations.len());
        for (index, src) in set.animations.iter().enumerate() {
            let name = if src.name.is_empty() {
                format!("{}_{}", path, index)
            } else {
                format!("{}_{}", path, src.name)
            };

            let clip = match self.animation(&name) {
                Some(clip) => clip,
                None => self.insert_animation(&name, src.build(&name, &skeleton)),
            };
            animator.write().add_animation(&name, clip);
            names.push(name);
        }
        Ok(names)
    }

    /// Instantiate one scene entry: model, transform and optional animator
    pub fn instantiate(&mut self, entry: &SceneModel) -> Result<Weak<RwLock<Model3D>>, AssetError> {
        let model = self.create_model(&entry.asset)?;
        let Some(shared) = model.upgrade() else {
            return Ok(model);
        };
        {
            let mut m = shared.write();
            m.transform = entry.transform();
            m.show_skeleton = entry.show_skeleton;
        }

        let animated = entry.asset != CUBE_ASSET && self.model_asset(&entry.asset)?.has_skeleton();
        if animated {
            let animator = self.create_animator(&entry.asset)?;
            for file in &entry.animations {
                self.bind_animations(file, &animator)?;
            }
            if let (Some(play), Some(a)) = (&entry.play, animator.upgrade()) {
                let mut a = a.write();
                // Accept either the bare clip name or the full registered name
                let full = a
                    .animation_names()
                    .find(|n| *n == play.as_str() || n.ends_with(&format!("_{}", play)))
                    .map(str::to_string)
                    .unwrap_or_else(|| play.clone());
                a.play_animation(&full);
            }
            shared.write().bind_animator(animator);
        }
        shared.write().update();
        Ok(model)
    }

    pub fn clear(&mut self) {
        self.models.clear();
        self.animators.clear();
        self.animations.clear();
        self.skeleton_meshes.clear();
        self.skeletons.clear();
        self.meshes.clear();
        self.materials.clear();
        self.textures.clear();
        self.model_assets.clear();
    }
}

static INSTANCE: Mutex<Option<ResourceCache>> = parking_lot::const_mutex(None);

/// Create the global cache
pub fn start_up() -> Result<(), ResourceError> {
    let mut slot = INSTANCE.lock();
    if slot.is_some() {
        return Err(ResourceError::AlreadyInitialized);
    }
    *slot = Some(ResourceCache::new());
    Ok(())
}

/// Drop the global cache and every asset it owns
pub fn shut_down() -> Result<(), ResourceError> {
    INSTANCE
        .lock()
        .take()
        .map(|_| ())
        .ok_or(ResourceError::NotInitialized)
}

pub fn is_started() -> bool {
    INSTANCE.lock().is_some()
}

/// Run `f` against the global cache
pub fn instance<R>(f: impl FnOnce(&mut ResourceCache) -> R) -> Result<R, ResourceError> {
    let mut slot = INSTANCE.lock();
    let cache = slot.as_mut().ok_or(ResourceError::NotInitialized)?;
    Ok(f(cache))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_differ_by_suffix() {
        assert_eq!(resource_key("a.ron"), resource_key("a.ron"));
        assert_ne!(resource_key("a.ron_0"), resource_key("a.ron_1"));
    }

    #[test]
    fn test_cube_instances_share_mesh() {
        let mut cache = ResourceCache::new();
        let a = cache.create_model(CUBE_ASSET).unwrap().upgrade().unwrap();
        let b = cache.create_model(CUBE_ASSET).unwrap().upgrade().unwrap();
        assert_eq!(cache.model_count(), 2);
        assert_ne!(a.read().name, b.read().name);

        let ma: Vec<_> = a.read().meshes().collect();
        let mb: Vec<_> = b.read().meshes().collect();
        assert!(Arc::ptr_eq(&ma[0], &mb[0]));
        assert!(ma[0].material().upgrade().unwrap().diffuse().is_some());
    }

    #[test]
    fn test_missing_texture_uses_error_texture() {
        let mut cache = ResourceCache::new();
        let tex = cache.texture("does/not/exist.png").upgrade().unwrap();
        assert_eq!(tex.name, "error");
    }

    #[test]
    fn test_missing_model_file_is_error() {
        let mut cache = ResourceCache::new();
        assert!(matches!(cache.create_model("does/not/exist.ron"), Err(AssetError::Io(_))));
    }

    #[test]
    fn test_skeleton_mesh_links_parents() {
        let mut skel = Skeleton::new();
        let a = skel.bone_or_insert("a");
        let b = skel.bone_or_insert("b");
        let c = skel.bone_or_insert("c");
        skel.add_child(a, b);
        skel.add_child(b, c);

        let mesh = skeleton_mesh(&skel);
        assert_eq!(mesh.topology(), Topology::LineList);
        assert_eq!(mesh.indices().as_slice(), &[0, 1, 1, 2]);
        assert_eq!(mesh.vertices()[2].bone_indices[0], 2);
        assert_eq!(mesh.vertices()[2].bone_weights.x, 1.0);
    }

    #[test]
    fn test_global_lifecycle() {
        assert_eq!(instance(|c| c.model_count()), Err(ResourceError::NotInitialized));
        assert_eq!(shut_down(), Err(ResourceError::NotInitialized));

        start_up().unwrap();
        assert_eq!(start_up(), Err(ResourceError::AlreadyInitialized));
        assert_eq!(instance(|c| c.model_count()), Ok(0));
        shut_down().unwrap();
        assert!(!is_started());
    }
}

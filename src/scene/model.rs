//! 3D model instance: mesh references, world transform, optional animator

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::animation::Animator;
use crate::rasterizer::{Mat4, MAX_BONES};

use super::mesh::Mesh;

#[derive(Debug)]
pub struct Model3D {
    pub name: String,
    pub transform: Mat4,
    /// Draw the animator's skeleton lines on top of the meshes
    pub show_skeleton: bool,
    meshes: Vec<Weak<Mesh>>,
    animator: Weak<RwLock<Animator>>,
    bones: Vec<Mat4>,
}

impl Default for Model3D {
    fn default() -> Self {
        Self::new("")
    }
}

impl Model3D {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Mat4::IDENTITY,
            show_skeleton: false,
            meshes: Vec::new(),
            animator: Weak::new(),
            bones: vec![Mat4::IDENTITY; MAX_BONES],
        }
    }

    pub fn add_mesh(&mut self, mesh: Weak<Mesh>) {
        self.meshes.push(mesh);
    }

    /// Live meshes; expired references are skipped
    pub fn meshes(&self) -> impl Iterator<Item = Arc<Mesh>> + '_ {
        self.meshes.iter().filter_map(Weak::upgrade)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn bind_animator(&mut self, animator: Weak<RwLock<Animator>>) {
        self.animator = animator;
    }

    pub fn animator(&self) -> Option<Arc<RwLock<Animator>>> {
        self.animator.upgrade()
    }

    pub fn bones(&self) -> &[Mat4] {
        &self.bones
    }

    /// Pull the animator's skinning palette while it is playing
    pub fn update(&mut self) {
        let Some(animator) = self.animator() else {
            return;
        };
        let mut animator = animator.write();
        animator.set_transform(self.transform);
        if animator.is_playing() {
            animator.transfer_bone_data(&mut self.bones);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Animation, Skeleton};
    use crate::rasterizer::Vec3;

    #[test]
    fn test_update_copies_palette_only_while_playing() {
        let mut skel = Skeleton::new();
        let root = skel.bone_or_insert("root");
        skel.bone_mut(root).unwrap().transform = Mat4::from_translation(Vec3::X);
        let skel = Arc::new(skel);

        let anim = Arc::new(Animation::new("idle", 1.0));
        let animator = Arc::new(RwLock::new(Animator::new()));
        animator.write().set_skeleton(Arc::downgrade(&skel));
        animator.write().add_animation("idle", Arc::downgrade(&anim));

        let mut model = Model3D::new("m");
        model.bind_animator(Arc::downgrade(&animator));
        model.update();
        assert_eq!(model.bones()[0], Mat4::IDENTITY);

        animator.write().play_animation("idle");
        model.update();
        assert_eq!(model.bones()[0], Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn test_expired_mesh_skipped() {
        let keep = Arc::new(Mesh::test_cube(1.0));
        let gone = Arc::new(Mesh::test_cube(1.0));
        let mut model = Model3D::new("m");
        model.add_mesh(Arc::downgrade(&keep));
        model.add_mesh(Arc::downgrade(&gone));
        drop(gone);
        assert_eq!(model.mesh_count(), 2);
        assert_eq!(model.meshes().count(), 1);
    }
}

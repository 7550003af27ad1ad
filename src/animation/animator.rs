//! Plays animation clips over a skeleton and fills the bone matrix palettes

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::rasterizer::{Mat4, MAX_BONES};
use crate::scene::Mesh;

use super::clip::Animation;
use super::skeleton::Skeleton;

/// Per-model animation state
///
/// Holds two palettes indexed by bone id: skinning matrices
/// (`animated * offset`) for deforming meshes and raw joint transforms for
/// drawing the skeleton mesh.
#[derive(Debug)]
pub struct Animator {
    animations: HashMap<String, Weak<Animation>>,
    active: Option<Weak<Animation>>,
    skeleton: Weak<Skeleton>,
    skeleton_mesh: Weak<Mesh>,
    transform: Mat4,
    time: f32,
    bone_transforms: Vec<Mat4>,
    joint_transforms: Vec<Mat4>,
}

impl Default for Animator {
    fn default() -> Self {
        Self::new()
    }
}

impl Animator {
    pub fn new() -> Self {
        Self {
            animations: HashMap::new(),
            active: None,
            skeleton: Weak::new(),
            skeleton_mesh: Weak::new(),
            transform: Mat4::IDENTITY,
            time: 0.0,
            bone_transforms: vec![Mat4::IDENTITY; MAX_BONES],
            joint_transforms: vec![Mat4::IDENTITY; MAX_BONES],
        }
    }

    /// Register a clip under `name`; the first registration of a name wins
    pub fn add_animation(&mut self, name: &str, animation: Weak<Animation>) {
        self.animations.entry(name.to_string()).or_insert(animation);
    }

    pub fn animation_count(&self) -> usize {
        self.animations.len()
    }

    pub fn animation_names(&self) -> impl Iterator<Item = &str> {
        self.animations.keys().map(String::as_str)
    }

    /// Bind a skeleton and evaluate its pose right away
    pub fn set_skeleton(&mut self, skeleton: Weak<Skeleton>) {
        self.skeleton = skeleton;
        self.evaluate();
    }

    pub fn skeleton(&self) -> Option<Arc<Skeleton>> {
        self.skeleton.upgrade()
    }

    pub fn set_skeleton_mesh(&mut self, mesh: Weak<Mesh>) {
        self.skeleton_mesh = mesh;
    }

    pub fn skeleton_mesh(&self) -> Option<Arc<Mesh>> {
        self.skeleton_mesh.upgrade()
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// World transform used when drawing the skeleton mesh
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Start `name` from time zero
    ///
    /// An unknown name stops playback and leaves the skeleton in its rest pose.
    pub fn play_animation(&mut self, name: &str) {
        self.active = self.animations.get(name).cloned();
        if self.active.is_none() {
            log::warn!("Animation '{}' not found, using rest pose", name);
        }
        self.time = 0.0;
        self.evaluate();
    }

    pub fn stop_animation(&mut self) {
        self.active = None;
    }

    pub fn is_playing(&self) -> bool {
        self.active_animation().is_some()
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    fn active_animation(&self) -> Option<Arc<Animation>> {
        self.active.as_ref().and_then(Weak::upgrade)
    }

    /// Advance playback by `tick` seconds and re-evaluate the pose
    ///
    /// Past the clip's duration the time resets to zero (no carry-over).
    pub fn update(&mut self, tick: f32) {
        let Some(animation) = self.active_animation() else {
            return;
        };
        if self.skeleton.strong_count() == 0 {
            return;
        }

        self.time += tick;
        if self.time > animation.duration {
            self.time = 0.0;
        }
        self.evaluate();
    }

    fn evaluate(&mut self) {
        let Some(skeleton) = self.skeleton.upgrade() else {
            return;
        };
        let animation = self.active_animation();
        let time = self.time;

        let bones = &mut self.bone_transforms;
        let joints = &mut self.joint_transforms;
        skeleton.propagate(
            |bone| {
                animation
                    .as_ref()
                    .and_then(|a| a.channel(bone.index))
                    .map(|c| c.sample(time))
                    .unwrap_or(bone.transform)
            },
            |bone, world| {
                let (Some(joint), Some(skin)) = (joints.get_mut(bone.index), bones.get_mut(bone.index)) else {
                    log::debug!("Bone '{}' ({}) exceeds the palette", bone.name, bone.index);
                    return;
                };
                *joint = world;
                *skin = world * bone.offset;
            },
        );
    }

    /// Skinning matrix for a bone, index clamped to the palette
    pub fn bone_transform(&self, index: usize) -> Mat4 {
        self.bone_transforms[index.min(MAX_BONES - 1)]
    }

    pub fn joint_transform(&self, index: usize) -> Mat4 {
        self.joint_transforms[index.min(MAX_BONES - 1)]
    }

    pub fn bone_transforms(&self) -> &[Mat4] {
        &self.bone_transforms
    }

    pub fn joint_transforms(&self) -> &[Mat4] {
        &self.joint_transforms
    }

    /// Copy the skinning palette into `dst`, as much as fits
    pub fn transfer_bone_data(&self, dst: &mut [Mat4]) {
        let n = dst.len().min(self.bone_transforms.len());
        dst[..n].copy_from_slice(&self.bone_transforms[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::Vec3;

    fn chain() -> Arc<Skeleton> {
        let mut skel = Skeleton::new();
        let root = skel.bone_or_insert("root");
        let child = skel.bone_or_insert("child");
        skel.add_child(root, child);
        skel.bone_mut(root).unwrap().transform = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        skel.bone_mut(child).unwrap().transform = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        Arc::new(skel)
    }

    fn slide() -> Arc<Animation> {
        let mut anim = Animation::new("slide", 1.0);
        let channel = anim.channel_mut(0);
        channel.positions.add_key(0.0, Vec3::ZERO);
        channel.positions.add_key(1.0, Vec3::new(10.0, 0.0, 0.0));
        Arc::new(anim)
    }

    fn origin(m: Mat4) -> Vec3 {
        m.transform_point3(Vec3::ZERO)
    }

    #[test]
    fn test_set_skeleton_evaluates_rest_pose() {
        let skel = chain();
        let mut animator = Animator::new();
        animator.set_skeleton(Arc::downgrade(&skel));
        assert!((origin(animator.joint_transform(1)) - Vec3::new(1.0, 1.0, 0.0)).length() < 0.001);
    }

    #[test]
    fn test_update_interpolates() {
        let skel = chain();
        let anim = slide();
        let mut animator = Animator::new();
        animator.set_skeleton(Arc::downgrade(&skel));
        animator.add_animation("slide", Arc::downgrade(&anim));
        animator.play_animation("slide");
        assert!(animator.is_playing());

        animator.update(0.5);
        assert!((origin(animator.joint_transform(0)) - Vec3::new(5.0, 0.0, 0.0)).length() < 0.001);
        // Child keeps its rest transform under the animated root
        assert!((origin(animator.joint_transform(1)) - Vec3::new(5.0, 1.0, 0.0)).length() < 0.001);
    }

    #[test]
    fn test_update_wraps_to_zero() {
        let skel = chain();
        let anim = slide();
        let mut animator = Animator::new();
        animator.set_skeleton(Arc::downgrade(&skel));
        animator.add_animation("slide", Arc::downgrade(&anim));
        animator.play_animation("slide");

        animator.update(1.5);
        assert_eq!(animator.time(), 0.0);
        assert!(origin(animator.joint_transform(0)).length() < 0.001);
    }

    #[test]
    fn test_skinning_palette_applies_offset() {
        let mut skel = Skeleton::new();
        let root = skel.bone_or_insert("root");
        {
            let bone = skel.bone_mut(root).unwrap();
            bone.transform = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
            bone.offset = Mat4::from_translation(Vec3::new(0.0, -2.0, 0.0));
        }
        let skel = Arc::new(skel);
        let mut animator = Animator::new();
        animator.set_skeleton(Arc::downgrade(&skel));
        assert!(animator.bone_transform(0).abs_diff_eq(Mat4::IDENTITY, 0.0001));
    }

    #[test]
    fn test_missing_animation_falls_back_to_rest() {
        let skel = chain();
        let anim = slide();
        let mut animator = Animator::new();
        animator.set_skeleton(Arc::downgrade(&skel));
        animator.add_animation("slide", Arc::downgrade(&anim));
        animator.play_animation("slide");
        animator.update(0.5);

        animator.play_animation("run");
        assert!(!animator.is_playing());
        assert!((origin(animator.joint_transform(0)) - Vec3::new(1.0, 0.0, 0.0)).length() < 0.001);
    }

    #[test]
    fn test_update_without_animation_is_noop() {
        let skel = chain();
        let mut animator = Animator::new();
        animator.set_skeleton(Arc::downgrade(&skel));
        animator.update(0.3);
        assert_eq!(animator.time(), 0.0);
    }

    #[test]
    fn test_first_registration_wins() {
        let a = slide();
        let b = Arc::new(Animation::new("other", 2.0));
        let mut animator = Animator::new();
        animator.add_animation("clip", Arc::downgrade(&a));
        animator.add_animation("clip", Arc::downgrade(&b));
        assert_eq!(animator.animation_count(), 1);
        animator.play_animation("clip");
        assert_eq!(animator.active_animation().unwrap().name, "slide");
    }

    #[test]
    fn test_palette_reads_clamp_and_transfer() {
        let animator = Animator::new();
        assert_eq!(animator.bone_transform(10_000), Mat4::IDENTITY);

        let mut dst = vec![Mat4::ZERO; 4];
        animator.transfer_bone_data(&mut dst);
        assert!(dst.iter().all(|m| *m == Mat4::IDENTITY));
    }
}

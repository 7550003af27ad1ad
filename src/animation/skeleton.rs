//! Bone hierarchy stored as an arena indexed by dense bone ids

use std::collections::HashMap;

use crate::rasterizer::Mat4;

/// Stable bone handle, also the bone's slot in every matrix palette
pub type BoneId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub index: BoneId,
    /// Bind-pose offset (mesh space to bone space)
    pub offset: Mat4,
    /// Local rest transform relative to the parent
    pub transform: Mat4,
    pub parent: Option<BoneId>,
    pub children: Vec<BoneId>,
}

impl Bone {
    fn new(name: &str, index: BoneId) -> Self {
        Self {
            name: name.to_string(),
            index,
            offset: Mat4::IDENTITY,
            transform: Mat4::IDENTITY,
            parent: None,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    by_name: HashMap<String, BoneId>,
    root: Option<BoneId>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a bone by name, creating it with the next free index if absent
    ///
    /// The first bone created becomes the root until `set_root` says otherwise.
    pub fn bone_or_insert(&mut self, name: &str) -> BoneId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.bones.len();
        self.bones.push(Bone::new(name, id));
        self.by_name.insert(name.to_string(), id);
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    pub fn bone_id(&self, name: &str) -> Option<BoneId> {
        self.by_name.get(name).copied()
    }

    pub fn bone(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id)
    }

    pub fn bone_mut(&mut self, id: BoneId) -> Option<&mut Bone> {
        self.bones.get_mut(id)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn root(&self) -> Option<BoneId> {
        self.root
    }

    pub fn set_root(&mut self, id: BoneId) {
        if id < self.bones.len() {
            self.root = Some(id);
        }
    }

    /// Link `child` under `parent`. Unknown ids and self-links are ignored.
    pub fn add_child(&mut self, parent: BoneId, child: BoneId) {
        if parent == child || parent >= self.bones.len() || child >= self.bones.len() {
            return;
        }
        if let Some(old) = self.bones[child].parent.take() {
            self.bones[old].children.retain(|&c| c != child);
        }
        self.bones[child].parent = Some(parent);
        if !self.bones[parent].children.contains(&child) {
            self.bones[parent].children.push(child);
        }
    }

    /// Walk the tree depth-first from the root, composing `parent * local`
    ///
    /// Other parentless bones are walked afterwards, in index order, so a
    /// skeleton with several roots still reaches every bone. `local` supplies
    /// each bone's local transform, `visit` receives the bone with its
    /// accumulated world transform. Each bone is visited once even if the
    /// links form a cycle.
    pub fn propagate<L, V>(&self, mut local: L, mut visit: V)
    where
        L: FnMut(&Bone) -> Mat4,
        V: FnMut(&Bone, Mat4),
    {
        let Some(root) = self.root else {
            return;
        };

        let others = self
            .bones
            .iter()
            .filter(|b| b.parent.is_none() && b.index != root)
            .map(|b| b.index);

        let mut visited = vec![false; self.bones.len()];
        for start in std::iter::once(root).chain(others) {
            let mut stack = vec![(start, Mat4::IDENTITY)];
            while let Some((id, parent)) = stack.pop() {
                let Some(bone) = self.bones.get(id) else {
                    continue;
                };
                if std::mem::replace(&mut visited[id], true) {
                    continue;
                }

                let world = parent * local(bone);
                visit(bone, world);
                for &child in bone.children.iter().rev() {
                    stack.push((child, world));
                }
            }
        }
    }
}

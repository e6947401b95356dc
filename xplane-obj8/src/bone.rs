//! Bone tree construction.
//!
//! Every export pass builds one [`BoneTree`] from the host scene: an arena of
//! [`Bone`] nodes rooted at a synthetic [`BoneKind::Root`]. Objects become
//! one bone each; armatures expand into one bone per skeleton joint,
//! following the joint hierarchy rather than the scene hierarchy. The baker
//! later annotates each bone with its matrices in place.

use std::collections::{BTreeMap, HashSet};

use glam::DMat4;

use crate::context::ExportContext;
use crate::error::{ExportError, Result};
use crate::keyframe::{Keyframe, KeyframeCollection, ReducedKeyframeTable};
use crate::scene::{
    DatarefCurve, DatarefInfo, JointId, LodBuckets, ObjectId, PoseSampler, PoseTarget, Scene,
};

/// Index of a [`Bone`] inside its [`BoneTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoneId(pub usize);

/// What a bone stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoneKind {
    /// The synthetic tree root. Exactly one per tree, always index 0.
    Root,
    Object(ObjectId),
    Joint { armature: ObjectId, joint: JointId },
}

impl BoneKind {
    /// The pose-sampler target for this bone, if it has one.
    pub fn pose_target(self) -> Option<PoseTarget> {
        match self {
            Self::Root => None,
            Self::Object(object) => Some(PoseTarget::Object(object)),
            Self::Joint { armature, joint } => Some(PoseTarget::Joint { armature, joint }),
        }
    }
}

/// One dataref's collected keyframes plus its reduced rotation table.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneAnimation {
    pub keyframes: KeyframeCollection,
    pub rotation_table: ReducedKeyframeTable,
}

/// Matrix annotations filled in by the transform baker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BakedMatrices {
    pub world: Option<DMat4>,
    pub pre_animation: Option<DMat4>,
    pub post_animation: Option<DMat4>,
    pub bake_for_animation: Option<DMat4>,
    pub bake_for_attached: Option<DMat4>,
}

/// A node in the animation hierarchy.
#[derive(Debug, Clone)]
pub struct Bone {
    pub kind: BoneKind,
    pub name: String,
    pub parent: Option<BoneId>,
    pub children: Vec<BoneId>,
    pub payload: Option<ObjectId>,
    /// Dataref path → animation, iterated in sorted key order.
    pub animations: BTreeMap<String, BoneAnimation>,
    pub datarefs: BTreeMap<String, DatarefInfo>,
    pub weight: i32,
    /// Effective LOD bucket membership after inheritance.
    pub buckets: LodBuckets,
    pub baked: BakedMatrices,
}

impl Bone {
    fn new(kind: BoneKind, name: String, parent: Option<BoneId>) -> Self {
        Self {
            kind,
            name,
            parent,
            children: Vec::new(),
            payload: None,
            animations: BTreeMap::new(),
            datarefs: BTreeMap::new(),
            weight: 0,
            buckets: LodBuckets::empty(),
            baked: BakedMatrices::default(),
        }
    }

    /// True when any dataref's keyframes carry actual motion. Curves whose
    /// samples never change do not make a bone animated.
    pub fn is_animated(&self) -> bool {
        self.is_translation_animated() || self.is_rotation_animated()
    }

    /// True when any dataref's sampled rotations actually change. A constant
    /// non-zero rotation is static and belongs in a bake matrix.
    pub fn is_rotation_animated(&self) -> bool {
        self.animations
            .values()
            .any(|a| a.keyframes.has_rotation_motion())
    }

    /// True when any dataref's sampled locations actually move.
    pub fn is_translation_animated(&self) -> bool {
        self.animations
            .values()
            .any(|a| a.keyframes.has_translation_motion())
    }
}

/// Arena-owned bone hierarchy. Index 0 is always the root.
#[derive(Debug, Clone)]
pub struct BoneTree {
    bones: Vec<Bone>,
}

impl BoneTree {
    /// Build the tree for one exportable root object.
    ///
    /// The sampler's current frame is restored after keyframe collection.
    /// Fails with [`ExportError::Structural`] on a nested exportable root, a
    /// parent-link cycle, or an animated bone with neither payload nor
    /// children.
    pub fn build(
        scene: &Scene,
        sampler: &mut dyn PoseSampler,
        root: ObjectId,
        precision: u32,
        ctx: &mut ExportContext,
    ) -> Result<Self> {
        let mut tree = Self {
            bones: vec![Bone::new(BoneKind::Root, "ROOT".into(), None)],
        };
        let restore_frame = sampler.frame();
        let mut visited = HashSet::new();
        let result = tree.attach_object(
            scene,
            sampler,
            root,
            root,
            BoneId(0),
            precision,
            &mut visited,
            ctx,
        );
        sampler.set_frame(restore_frame);
        result?;
        tree.sort_children(BoneId(0));
        tree.inherit_buckets(BoneId(0), LodBuckets::empty());
        tree.check_animated_leaves(ctx)?;
        Ok(tree)
    }

    pub fn root(&self) -> BoneId {
        BoneId(0)
    }

    pub fn bone(&self, id: BoneId) -> &Bone {
        &self.bones[id.0]
    }

    pub fn bone_mut(&mut self, id: BoneId) -> &mut Bone {
        &mut self.bones[id.0]
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Ids in index order. Captures no borrow, so the tree may be mutated
    /// while iterating.
    pub fn ids(&self) -> impl Iterator<Item = BoneId> + use<> {
        (0..self.bones.len()).map(BoneId)
    }

    /// Number of ancestors above `id`.
    pub fn depth(&self, id: BoneId) -> usize {
        let mut depth = 0;
        let mut current = self.bones[id.0].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.bones[parent.0].parent;
        }
        depth
    }

    /// The nearest ancestor that anchors this bone's animation: the first
    /// animated parent, or the tree root (which always counts as an anchor).
    pub fn first_animated_parent(&self, id: BoneId) -> Option<BoneId> {
        let parent = self.bones[id.0].parent?;
        if self.bones[parent.0].is_animated() || self.bones[parent.0].parent.is_none() {
            Some(parent)
        } else {
            self.first_animated_parent(parent)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn attach_object(
        &mut self,
        scene: &Scene,
        sampler: &mut dyn PoseSampler,
        object_id: ObjectId,
        export_root: ObjectId,
        parent: BoneId,
        precision: u32,
        visited: &mut HashSet<ObjectId>,
        ctx: &mut ExportContext,
    ) -> Result<()> {
        let object = scene.object(object_id);
        if !visited.insert(object_id) {
            let message = format!(
                "'{}' appears twice in the hierarchy under '{}'; its parent links form a cycle",
                object.name,
                scene.object(export_root).name
            );
            ctx.error(&message);
            return Err(ExportError::Structural(message));
        }
        if object.exportable_root && object_id != export_root {
            let message = format!(
                "'{}' is a nested exportable root inside '{}'",
                object.name,
                scene.object(export_root).name
            );
            ctx.error(&message);
            return Err(ExportError::Structural(message));
        }

        let bone_id = BoneId(self.bones.len());
        let mut bone = Bone::new(BoneKind::Object(object_id), object.name.clone(), Some(parent));
        bone.payload = object.kind.has_payload().then_some(object_id);
        bone.weight = object.weight;
        bone.datarefs = object.datarefs.clone();
        bone.buckets = object.lod.unwrap_or_default();
        bone.animations = collect_animations(
            sampler,
            PoseTarget::Object(object_id),
            &object.curves,
            precision,
            ctx,
        );
        self.bones.push(bone);
        self.bones[parent.0].children.push(bone_id);

        // Armatures expand per joint before their plain scene children.
        for (index, joint) in object.joints.iter().enumerate() {
            if joint.parent.is_none() {
                self.attach_joint(
                    scene,
                    sampler,
                    object_id,
                    export_root,
                    JointId(index),
                    bone_id,
                    precision,
                    visited,
                    ctx,
                )?;
            }
        }

        for child in scene.children(object_id) {
            let link = scene.object(child).parent;
            if link.and_then(|p| p.joint).is_none() {
                self.attach_object(
                    scene, sampler, child, export_root, bone_id, precision, visited, ctx,
                )?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn attach_joint(
        &mut self,
        scene: &Scene,
        sampler: &mut dyn PoseSampler,
        armature: ObjectId,
        export_root: ObjectId,
        joint_id: JointId,
        parent: BoneId,
        precision: u32,
        visited: &mut HashSet<ObjectId>,
        ctx: &mut ExportContext,
    ) -> Result<()> {
        let joint = &scene.object(armature).joints[joint_id.0];

        let bone_id = BoneId(self.bones.len());
        let mut bone = Bone::new(
            BoneKind::Joint {
                armature,
                joint: joint_id,
            },
            joint.name.clone(),
            Some(parent),
        );
        bone.datarefs = joint.datarefs.clone();
        bone.animations = collect_animations(
            sampler,
            PoseTarget::Joint {
                armature,
                joint: joint_id,
            },
            &joint.curves,
            precision,
            ctx,
        );
        self.bones.push(bone);
        self.bones[parent.0].children.push(bone_id);

        for (index, candidate) in scene.object(armature).joints.iter().enumerate() {
            if candidate.parent == Some(joint_id) {
                self.attach_joint(
                    scene,
                    sampler,
                    armature,
                    export_root,
                    JointId(index),
                    bone_id,
                    precision,
                    visited,
                    ctx,
                )?;
            }
        }

        // Objects pinned to this joint hang off the joint bone, not the
        // armature bone.
        for child in scene.joint_children(armature, joint_id) {
            self.attach_object(
                scene, sampler, child, export_root, bone_id, precision, visited, ctx,
            )?;
        }
        Ok(())
    }

    fn sort_children(&mut self, id: BoneId) {
        let mut children = self.bones[id.0].children.clone();
        children.sort_by_key(|&child| self.bones[child.0].weight);
        self.bones[id.0].children = children.clone();
        for child in children {
            self.sort_children(child);
        }
    }

    fn inherit_buckets(&mut self, id: BoneId, inherited: LodBuckets) {
        if self.bones[id.0].buckets.is_empty() {
            self.bones[id.0].buckets = inherited;
        }
        let next = if self.bones[id.0].payload.is_some() {
            self.bones[id.0].buckets
        } else {
            inherited
        };
        for child in self.bones[id.0].children.clone() {
            self.inherit_buckets(child, next);
        }
    }

    fn check_animated_leaves(&self, ctx: &mut ExportContext) -> Result<()> {
        for bone in &self.bones {
            if bone.is_animated() && bone.payload.is_none() && bone.children.is_empty() {
                let message = format!(
                    "'{}' is animated but drives neither a payload nor any children",
                    bone.name
                );
                ctx.error(&message);
                return Err(ExportError::Structural(message));
            }
        }
        Ok(())
    }
}

/// Sample every curve of `target` into keyframe collections, advancing the
/// sampler once per keyframe in increasing frame order.
fn collect_animations(
    sampler: &mut dyn PoseSampler,
    target: PoseTarget,
    curves: &[DatarefCurve],
    precision: u32,
    ctx: &mut ExportContext,
) -> BTreeMap<String, BoneAnimation> {
    let mut animations = BTreeMap::new();
    for curve in curves {
        if curve.samples.len() < 2 {
            ctx.warn(&format!(
                "dataref '{}' has fewer than 2 keyframes and is ignored",
                curve.dataref
            ));
            continue;
        }
        let mut samples = curve.samples.clone();
        samples.sort_by_key(|s| s.frame);

        let mut frames = Vec::with_capacity(samples.len());
        for sample in &samples {
            sampler.set_frame(sample.frame);
            let local = sampler.local_sample(target, curve.rotation_mode);
            frames.push(Keyframe {
                dataref_value: sample.dataref_value,
                location: local.location,
                rotation: local.rotation,
                scale: local.scale,
            });
        }
        match KeyframeCollection::new(frames) {
            Ok(keyframes) => {
                let rotation_table = keyframes.reduce(precision);
                animations.insert(
                    curve.dataref.clone(),
                    BoneAnimation {
                        keyframes,
                        rotation_table,
                    },
                );
            }
            Err(err) => ctx.error(&format!(
                "dataref '{}' produced an unusable keyframe list: {err}",
                curve.dataref
            )),
        }
    }
    animations
}

//! Input scene model.
//!
//! The host application hands the exporter a flat list of scene objects with
//! parent links, attribute sets and animation curves, plus a [`PoseSampler`]
//! that can answer "where is this object at frame F". Nothing in here knows
//! about directives; it is the boundary the rest of the crate consumes.

use std::collections::BTreeMap;

use bitflags::bitflags;
use glam::{DMat4, DVec3};

use crate::attribute::{AttributeSet, Condition};
use crate::keyframe::{RotationMode, RotationRep};

/// Index of a [`SceneObject`] inside its [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

/// Index of a [`Joint`] inside its armature's joint list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub usize);

/// What a scene object renders as (armatures render nothing themselves).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Mesh,
    Light,
    Empty,
    Armature,
}

impl ObjectKind {
    /// Does this kind contribute renderable payload directives?
    pub fn has_payload(self) -> bool {
        !matches!(self, Self::Armature)
    }
}

bitflags! {
    /// Level-of-detail bucket membership. An object in no bucket is written
    /// in every pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LodBuckets: u8 {
        const LOD_1 = 0b0001;
        const LOD_2 = 0b0010;
        const LOD_3 = 0b0100;
        const LOD_4 = 0b1000;
    }
}

impl LodBuckets {
    pub fn bucket(index: usize) -> Self {
        Self::from_bits_truncate(1 << index)
    }
}

/// A near/far range for one `ATTR_LOD` block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodRange {
    pub near: f64,
    pub far: f64,
}

/// Descriptor for one dataref a bone animates on.
#[derive(Debug, Clone, PartialEq)]
pub struct DatarefInfo {
    pub path: String,
    /// Loop period; zero means no `ANIM_keyframe_loop` directive.
    pub loop_value: f64,
}

impl DatarefInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            loop_value: 0.0,
        }
    }

    pub fn with_loop(path: impl Into<String>, loop_value: f64) -> Self {
        Self {
            path: path.into(),
            loop_value,
        }
    }
}

/// One authored sample on an animation curve: a scene frame and the dataref
/// value keyed there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSample {
    pub frame: i32,
    pub dataref_value: f64,
}

/// All samples for one (target, dataref) pair, plus the rotation
/// representation the channel was authored in.
#[derive(Debug, Clone, PartialEq)]
pub struct DatarefCurve {
    pub dataref: String,
    pub rotation_mode: RotationMode,
    pub samples: Vec<CurveSample>,
}

/// One skeleton joint of an armature. Joint hierarchy is independent of the
/// scene-object hierarchy.
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub parent: Option<JointId>,
    /// Rest matrix in armature space.
    pub rest: DMat4,
    pub datarefs: BTreeMap<String, DatarefInfo>,
    pub curves: Vec<DatarefCurve>,
}

impl Joint {
    pub fn new(name: impl Into<String>, parent: Option<JointId>, rest: DMat4) -> Self {
        Self {
            name: name.into(),
            parent,
            rest,
            datarefs: BTreeMap::new(),
            curves: Vec::new(),
        }
    }
}

/// Where an object hangs in the scene: under another object, optionally
/// pinned to one of its joints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub object: ObjectId,
    pub joint: Option<JointId>,
}

/// One node of the host scene.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub parent: Option<ParentLink>,
    /// Flagged as the root of its own independent export.
    pub exportable_root: bool,
    /// Sibling ordering weight; lower writes first.
    pub weight: i32,
    /// Renderer-state attributes owned by the object itself.
    pub attributes: AttributeSet,
    /// Attributes contributed by the object's material.
    pub material_attributes: AttributeSet,
    /// Cockpit and manipulator attributes.
    pub cockpit_attributes: AttributeSet,
    /// Attributes written inside the object's ANIM block without state
    /// tracking (show/hide and friends).
    pub anim_attributes: AttributeSet,
    pub conditions: Vec<Condition>,
    pub datarefs: BTreeMap<String, DatarefInfo>,
    pub curves: Vec<DatarefCurve>,
    /// Joint list when `kind` is [`ObjectKind::Armature`].
    pub joints: Vec<Joint>,
    /// LOD buckets this object belongs to; `None` inherits from the nearest
    /// ancestor carrying a payload.
    pub lod: Option<LodBuckets>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            exportable_root: false,
            weight: 0,
            attributes: AttributeSet::new(),
            material_attributes: AttributeSet::new(),
            cockpit_attributes: AttributeSet::new(),
            anim_attributes: AttributeSet::new(),
            conditions: Vec::new(),
            datarefs: BTreeMap::new(),
            curves: Vec::new(),
            joints: Vec::new(),
            lod: None,
        }
    }

    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(ParentLink {
            object: parent,
            joint: None,
        });
        self
    }

    pub fn with_joint_parent(mut self, parent: ObjectId, joint: JointId) -> Self {
        self.parent = Some(ParentLink {
            object: parent,
            joint: Some(joint),
        });
        self
    }
}

/// Flat object storage; hierarchy lives in the objects' parent links.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(object);
        id
    }

    pub fn object(&self, id: ObjectId) -> &SceneObject {
        &self.objects[id.0]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut SceneObject {
        &mut self.objects[id.0]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        (0..self.objects.len()).map(ObjectId)
    }

    /// Direct children of `id`, in insertion order.
    pub fn children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.ids()
            .filter(|&child| self.objects[child.0].parent.map(|p| p.object) == Some(id))
            .collect()
    }

    /// Children of `id` that are parented to a specific joint of it.
    pub fn joint_children(&self, id: ObjectId, joint: JointId) -> Vec<ObjectId> {
        self.ids()
            .filter(|&child| {
                self.objects[child.0].parent
                    == Some(ParentLink {
                        object: id,
                        joint: Some(joint),
                    })
            })
            .collect()
    }
}

/// What a pose query is about: a whole object or one joint of an armature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoseTarget {
    Object(ObjectId),
    Joint { armature: ObjectId, joint: JointId },
}

/// Local transform channels of one target at the sampler's current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalSample {
    pub location: DVec3,
    pub rotation: RotationRep,
    pub scale: DVec3,
}

/// Per-frame world pose oracle supplied by the host.
///
/// Ordering contract: callers advance the sampler to the rest frame before
/// reading any baseline matrix, then once per keyframe in increasing order
/// per target, then restore the original frame. The sampler is never queried
/// concurrently.
pub trait PoseSampler {
    fn set_frame(&mut self, frame: i32);

    fn frame(&self) -> i32;

    /// World-space matrix of `target` at the current frame. For a joint this
    /// is the armature's world matrix times the joint's pose matrix.
    fn world_matrix(&self, target: PoseTarget) -> DMat4;

    /// The target's own animation block at the current frame: an object's
    /// local transform channels, or a joint's pose relative to its rest.
    fn basis_matrix(&self, target: PoseTarget) -> DMat4;

    /// Local transform channels at the current frame, in the representation
    /// the channel was authored with. The default decomposes
    /// [`Self::basis_matrix`]; hosts that keep authored axis-angle signs
    /// should override it.
    fn local_sample(&self, target: PoseTarget, mode: RotationMode) -> LocalSample {
        let (scale, rotation, location) = self.basis_matrix(target).to_scale_rotation_translation();
        LocalSample {
            location,
            rotation: RotationRep::from_quat(mode, rotation),
            scale,
        }
    }
}

/// In-memory sampler keyed on pre-recorded frames. Targets without a record
/// at the current frame report identity; mainly useful in tests and for
/// hosts that precompute poses.
#[derive(Debug, Default)]
pub struct KeyedPoseSampler {
    frame: i32,
    world: std::collections::HashMap<(i32, PoseTarget), DMat4>,
    basis: std::collections::HashMap<(i32, PoseTarget), DMat4>,
    samples: std::collections::HashMap<(i32, PoseTarget), LocalSample>,
}

impl KeyedPoseSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_world(&mut self, frame: i32, target: PoseTarget, matrix: DMat4) {
        self.world.insert((frame, target), matrix);
    }

    pub fn record_basis(&mut self, frame: i32, target: PoseTarget, matrix: DMat4) {
        self.basis.insert((frame, target), matrix);
    }

    pub fn record_sample(&mut self, frame: i32, target: PoseTarget, sample: LocalSample) {
        self.samples.insert((frame, target), sample);
    }
}

impl PoseSampler for KeyedPoseSampler {
    fn set_frame(&mut self, frame: i32) {
        self.frame = frame;
    }

    fn frame(&self) -> i32 {
        self.frame
    }

    fn world_matrix(&self, target: PoseTarget) -> DMat4 {
        self.world
            .get(&(self.frame, target))
            .copied()
            .unwrap_or(DMat4::IDENTITY)
    }

    fn basis_matrix(&self, target: PoseTarget) -> DMat4 {
        self.basis
            .get(&(self.frame, target))
            .copied()
            .unwrap_or(DMat4::IDENTITY)
    }

    fn local_sample(&self, target: PoseTarget, mode: RotationMode) -> LocalSample {
        if let Some(sample) = self.samples.get(&(self.frame, target)) {
            return *sample;
        }
        let (scale, rotation, location) = self.basis_matrix(target).to_scale_rotation_translation();
        LocalSample {
            location,
            rotation: RotationRep::from_quat(mode, rotation),
            scale,
        }
    }
}

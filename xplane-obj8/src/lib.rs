//! Transform baking and directive serialization for X-Plane OBJ8 exports.
//!
//! Converts a scene hierarchy of meshes, lights, empties and skeleton joints
//! (each possibly keyframe-animated) into the minimal, stateful stream of
//! `ANIM_*` and `ATTR_*` directives of X-Plane's OBJ8 text format. The host
//! application supplies the scene description and a per-frame pose oracle;
//! this crate builds the bone tree, bakes static transforms into deltas,
//! reduces rotation keyframes onto the fewest possible axes, and serializes
//! directives through a state tracker that suppresses redundant output.
//!
//! # Example
//!
//! ```
//! use xplane_obj8::{
//!     export, ExportContext, ExportOptions, KeyedPoseSampler, NoopEmitter, ObjectKind, Scene,
//!     SceneObject,
//! };
//!
//! let mut scene = Scene::new();
//! let root = scene.add_object(SceneObject::new("fuselage", ObjectKind::Mesh));
//! scene.object_mut(root).exportable_root = true;
//!
//! let mut sampler = KeyedPoseSampler::new();
//! let mut ctx = ExportContext::new(false);
//! let commands = export(
//!     &scene,
//!     &mut sampler,
//!     root,
//!     &mut NoopEmitter,
//!     &ExportOptions::default(),
//!     &mut ctx,
//! )
//! .unwrap();
//! assert!(commands.is_empty());
//! ```

pub mod attribute;
pub mod bone;
pub mod common;
pub mod context;
pub mod coordinate;
pub mod error;
pub mod keyframe;
pub mod scene;
pub mod state;
pub mod transform;
pub mod writer;

// Re-export common types
pub use attribute::{AttrValue, Attribute, AttributeSet, Condition};
pub use bone::{Bone, BoneId, BoneKind, BoneTree};
pub use context::ExportContext;
pub use error::{ExportError, Result};
pub use keyframe::{EulerOrder, Keyframe, KeyframeCollection, ReducedKeyframeTable, RotationMode, RotationRep};
pub use scene::{
    CurveSample, DatarefCurve, DatarefInfo, Joint, JointId, KeyedPoseSampler, LodBuckets,
    LodRange, ObjectId, ObjectKind, ParentLink, PoseSampler, PoseTarget, Scene, SceneObject,
};
pub use state::{AttributeState, SetterGroup};
pub use writer::{export, CommandsWriter, ExportOptions, NoopEmitter, ObjectEmitter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

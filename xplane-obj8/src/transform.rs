//! Transform baking.
//!
//! For every animated bone the serializer needs four matrices: the world
//! pose, the pose just before the bone's own animation, the pose just after
//! it, and the static deltas ("bake matrices") that bridge between animated
//! bones. Static structure is folded into those deltas so the directive
//! stream only carries transforms that actually move.

use glam::{DMat4, DVec3, DVec4};

use crate::bone::{BoneId, BoneKind, BoneTree};
use crate::common::safe_inverse;
use crate::error::{ExportError, Result};
use crate::scene::{PoseSampler, PoseTarget, Scene};

/// World-space pose of `id` at the sampler's current frame. Identity for the
/// synthetic root.
pub fn world_matrix(tree: &BoneTree, sampler: &dyn PoseSampler, id: BoneId) -> DMat4 {
    match tree.bone(id).kind.pose_target() {
        Some(target) => sampler.world_matrix(target),
        None => DMat4::IDENTITY,
    }
}

/// World-space pose of `id` immediately before its own animation applies.
///
/// Only meaningful for an animated, non-root bone; anything else is a
/// caller bug and fails with [`ExportError::Internal`].
pub fn pre_animation_matrix(
    tree: &BoneTree,
    scene: &Scene,
    sampler: &dyn PoseSampler,
    id: BoneId,
) -> Result<DMat4> {
    let bone = tree.bone(id);
    if bone.parent.is_none() {
        return Err(ExportError::Internal(
            "pre-animation matrix requested for the root bone".into(),
        ));
    }
    if !bone.is_animated() {
        return Err(ExportError::Internal(format!(
            "pre-animation matrix requested for non-animated bone '{}'",
            bone.name
        )));
    }

    match bone.kind {
        BoneKind::Root => unreachable!("root has no parent"),
        BoneKind::Joint { armature, joint } => {
            let target = PoseTarget::Joint { armature, joint };
            let joints = &scene.object(armature).joints;
            let rest = joints[joint.0].rest;

            // A static translation on an otherwise rotation-only joint must
            // survive into the pre-animation pose.
            let static_translation = if bone.is_translation_animated() {
                DMat4::IDENTITY
            } else {
                DMat4::from_translation(sampler.basis_matrix(target).w_axis.truncate())
            };

            if let Some(parent_joint) = joints[joint.0].parent {
                // Joint poses are stored relative to the armature, so the
                // pose between the parent's animation and ours has to be
                // reassembled from the rest offset between the two joints.
                let parent_world = sampler.world_matrix(PoseTarget::Joint {
                    armature,
                    joint: parent_joint,
                });
                let rest_to_rest = safe_inverse(&joints[parent_joint.0].rest) * rest;
                Ok(parent_world * rest_to_rest * static_translation)
            } else {
                let armature_world = sampler.world_matrix(PoseTarget::Object(armature));
                Ok(armature_world * rest * static_translation)
            }
        }
        BoneKind::Object(object) => {
            let target = PoseTarget::Object(object);
            // The object's own animation block is the last transform applied,
            // so backing it out of the final pose gives the pre-animation
            // pose without simulating the parenting chain.
            let my_final = sampler.world_matrix(target);
            let mut my_block = sampler.basis_matrix(target);
            if !bone.is_translation_animated() {
                // Rotation-only animation: keep the legitimately-static
                // translation in place and back out only the rotation part.
                my_block.w_axis = DVec4::W;
            }
            Ok(my_final * safe_inverse(&my_block))
        }
    }
}

/// World-space pose of `id` immediately after its own animation.
///
/// The root returns its plain world pose. Scale never survives into the
/// pose (it is pushed through the next bake into payload geometry), and a
/// bone that is not rotation-animated has its own static rotation backed
/// out so the next bake captures it instead.
pub fn post_animation_matrix(
    tree: &BoneTree,
    sampler: &dyn PoseSampler,
    id: BoneId,
) -> Result<DMat4> {
    let bone = tree.bone(id);
    if bone.parent.is_none() {
        return Ok(world_matrix(tree, sampler, id));
    }
    if !bone.is_animated() {
        return Err(ExportError::Internal(format!(
            "post-animation matrix requested for non-animated bone '{}'",
            bone.name
        )));
    }

    let world = world_matrix(tree, sampler, id);
    let (scale, rotation, translation) = world.to_scale_rotation_translation();
    let world_no_scale = if scale == DVec3::ONE {
        // Skip the decompose/recompose round trip when it would only
        // accumulate floating error.
        world
    } else {
        DMat4::from_translation(translation) * DMat4::from_quat(rotation)
    };

    if bone.is_rotation_animated() {
        Ok(world_no_scale)
    } else {
        let target = bone
            .kind
            .pose_target()
            .ok_or_else(|| ExportError::Internal("animated bone without pose target".into()))?;
        let (_, own_rotation, _) = sampler.basis_matrix(target).to_scale_rotation_translation();
        Ok(world_no_scale * DMat4::from_quat(own_rotation.inverse()))
    }
}

/// The static delta applied before `id`'s own keyframes: from the anchor
/// bone's post-animation pose to `id`'s pre-animation pose.
pub fn bake_matrix_for_my_animations(
    tree: &BoneTree,
    scene: &Scene,
    sampler: &dyn PoseSampler,
    id: BoneId,
) -> Result<DMat4> {
    let pre = pre_animation_matrix(tree, scene, sampler, id)?;
    match tree.first_animated_parent(id) {
        None => Ok(pre),
        Some(anchor) => {
            let anchor_post = post_animation_matrix(tree, sampler, anchor)?;
            Ok(safe_inverse(&anchor_post) * pre)
        }
    }
}

/// The static delta from the nearest animated bone (self, or the closest
/// animated ancestor) to `id`'s final world pose. Identity when the whole
/// chain is static and unparented.
pub fn bake_matrix_for_attached(
    tree: &BoneTree,
    sampler: &dyn PoseSampler,
    id: BoneId,
) -> Result<DMat4> {
    let anchor = if tree.bone(id).is_animated() {
        Some(id)
    } else {
        tree.first_animated_parent(id)
    };
    match anchor {
        None => Ok(DMat4::IDENTITY),
        Some(anchor) => {
            let anchor_post = post_animation_matrix(tree, sampler, anchor)?;
            Ok(safe_inverse(&anchor_post) * world_matrix(tree, sampler, id))
        }
    }
}

/// Annotate every bone with its matrices, sampled at `rest_frame`. The
/// sampler's current frame is restored afterwards.
pub fn bake(
    tree: &mut BoneTree,
    scene: &Scene,
    sampler: &mut dyn PoseSampler,
    rest_frame: i32,
) -> Result<()> {
    let restore_frame = sampler.frame();
    sampler.set_frame(rest_frame);
    let result = bake_at_current_frame(tree, scene, sampler);
    sampler.set_frame(restore_frame);
    result
}

fn bake_at_current_frame(
    tree: &mut BoneTree,
    scene: &Scene,
    sampler: &dyn PoseSampler,
) -> Result<()> {
    for id in tree.ids() {
        let world = world_matrix(tree, sampler, id);
        let is_root = tree.bone(id).parent.is_none();
        let animated = tree.bone(id).is_animated();

        let baked = &mut tree.bone_mut(id).baked;
        baked.world = Some(world);
        if is_root {
            baked.post_animation = Some(world);
        }

        if animated && !is_root {
            let pre = pre_animation_matrix(tree, scene, sampler, id)?;
            let post = post_animation_matrix(tree, sampler, id)?;
            let bake_for_animation = bake_matrix_for_my_animations(tree, scene, sampler, id)?;
            let baked = &mut tree.bone_mut(id).baked;
            baked.pre_animation = Some(pre);
            baked.post_animation = Some(post);
            baked.bake_for_animation = Some(bake_for_animation);
        }

        let bake_for_attached = bake_matrix_for_attached(tree, sampler, id)?;
        tree.bone_mut(id).baked.bake_for_attached = Some(bake_for_attached);
    }
    Ok(())
}

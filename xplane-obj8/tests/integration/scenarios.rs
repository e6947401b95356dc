//! End-to-end animation scenarios comparing whole directive streams.

use glam::{DMat4, DVec3};
use pretty_assertions::assert_eq;
use xplane_obj8::{
    export, CurveSample, DatarefCurve, DatarefInfo, ExportContext, ExportOptions, Joint, JointId,
    KeyedPoseSampler, NoopEmitter, ObjectId, ObjectKind, PoseTarget, RotationMode, RotationRep,
    Scene, SceneObject,
};

/// Writes a fixed `TRIS` line per payload so geometry placement is visible.
struct TrisEmitter;

impl xplane_obj8::ObjectEmitter for TrisEmitter {
    fn emit_object(
        &mut self,
        _: &Scene,
        _: ObjectId,
        _: DMat4,
        indent: &str,
    ) -> xplane_obj8::Result<String> {
        Ok(format!("{indent}TRIS\t0\t12\n"))
    }
}

fn curve(dataref: &str, mode: RotationMode) -> DatarefCurve {
    DatarefCurve {
        dataref: dataref.into(),
        rotation_mode: mode,
        samples: vec![
            CurveSample {
                frame: 1,
                dataref_value: 0.0,
            },
            CurveSample {
                frame: 2,
                dataref_value: 1.0,
            },
        ],
    }
}

fn rotation_sample(degrees: f64) -> xplane_obj8::scene::LocalSample {
    xplane_obj8::scene::LocalSample {
        location: DVec3::ZERO,
        rotation: RotationRep::AxisAngle {
            axis: DVec3::Z,
            angle: degrees.to_radians(),
        },
        scale: DVec3::ONE,
    }
}

#[test]
fn test_translation_scenario_bracket_structure() {
    let mut scene = Scene::new();
    let a = scene.add_object(SceneObject::new("a", ObjectKind::Mesh));
    scene.object_mut(a).exportable_root = true;
    scene
        .object_mut(a)
        .datarefs
        .insert("d1".into(), DatarefInfo::new("d1"));
    scene
        .object_mut(a)
        .curves
        .push(curve("d1", RotationMode::AxisAngle));
    let b = scene.add_object(SceneObject::new("b", ObjectKind::Mesh).with_parent(a));
    let _ = b;

    let mut sampler = KeyedPoseSampler::new();
    sampler.record_basis(1, PoseTarget::Object(a), DMat4::IDENTITY);
    sampler.record_basis(
        2,
        PoseTarget::Object(a),
        DMat4::from_translation(DVec3::new(0.0, 2.0, 0.0)),
    );
    sampler.record_world(1, PoseTarget::Object(a), DMat4::IDENTITY);

    let mut ctx = ExportContext::new(false);
    let out = export(
        &scene,
        &mut sampler,
        a,
        &mut NoopEmitter,
        &ExportOptions::default(),
        &mut ctx,
    )
    .unwrap();

    // Exactly one ANIM bracket around a's block; b's (empty) payload falls
    // strictly inside it.
    assert_eq!(
        out,
        "\tANIM_begin\n\
         \tANIM_trans_begin\td1\n\
         \tANIM_trans_key\t0\t0\t0\t0\n\
         \tANIM_trans_key\t1\t0\t0\t-2\n\
         \tANIM_trans_end\n\
         \tANIM_end\n"
    );
    assert!(!ctx.has_errors());
}

#[test]
fn test_rotation_scenario_axis_mapping() {
    let mut scene = Scene::new();
    let a = scene.add_object(SceneObject::new("a", ObjectKind::Mesh));
    scene.object_mut(a).exportable_root = true;
    scene
        .object_mut(a)
        .curves
        .push(curve("d1", RotationMode::AxisAngle));

    let mut sampler = KeyedPoseSampler::new();
    sampler.record_sample(1, PoseTarget::Object(a), rotation_sample(0.0));
    sampler.record_sample(2, PoseTarget::Object(a), rotation_sample(90.0));

    let mut ctx = ExportContext::new(false);
    let out = export(
        &scene,
        &mut sampler,
        a,
        &mut NoopEmitter,
        &ExportOptions::default(),
        &mut ctx,
    )
    .unwrap();

    // A rotation about the source Z axis is written on the target's Y axis.
    assert_eq!(
        out,
        "\tANIM_begin\n\
         \tANIM_rotate_begin\t0\t1\t0\td1\n\
         \tANIM_rotate_key\t0\t0\n\
         \tANIM_rotate_key\t1\t90\n\
         \tANIM_rotate_end\n\
         \tANIM_end\n"
    );
}

#[test]
fn test_constant_rotation_emits_nothing() {
    let mut scene = Scene::new();
    let a = scene.add_object(SceneObject::new("a", ObjectKind::Mesh));
    scene.object_mut(a).exportable_root = true;
    scene
        .object_mut(a)
        .curves
        .push(curve("d1", RotationMode::AxisAngle));

    let mut sampler = KeyedPoseSampler::new();
    sampler.record_sample(1, PoseTarget::Object(a), rotation_sample(45.0));
    sampler.record_sample(2, PoseTarget::Object(a), rotation_sample(45.0));

    let mut ctx = ExportContext::new(false);
    let out = export(
        &scene,
        &mut sampler,
        a,
        &mut NoopEmitter,
        &ExportOptions::default(),
        &mut ctx,
    )
    .unwrap();

    // Constant samples are no animation at all: no scaffold, no rotations.
    assert_eq!(out, "");
}

#[test]
fn test_motionless_dataref_channel_is_silently_omitted() {
    let mut scene = Scene::new();
    let a = scene.add_object(SceneObject::new("a", ObjectKind::Mesh));
    scene.object_mut(a).exportable_root = true;
    scene
        .object_mut(a)
        .curves
        .push(curve("d1", RotationMode::AxisAngle));
    // A second channel keyed on frames where nothing moves.
    scene.object_mut(a).curves.push(DatarefCurve {
        dataref: "d2".into(),
        rotation_mode: RotationMode::AxisAngle,
        samples: vec![
            CurveSample {
                frame: 3,
                dataref_value: 0.0,
            },
            CurveSample {
                frame: 4,
                dataref_value: 1.0,
            },
        ],
    });

    let mut sampler = KeyedPoseSampler::new();
    sampler.record_basis(1, PoseTarget::Object(a), DMat4::IDENTITY);
    sampler.record_basis(
        2,
        PoseTarget::Object(a),
        DMat4::from_translation(DVec3::new(0.0, 2.0, 0.0)),
    );
    sampler.record_basis(3, PoseTarget::Object(a), DMat4::IDENTITY);
    sampler.record_basis(4, PoseTarget::Object(a), DMat4::IDENTITY);

    let mut ctx = ExportContext::new(false);
    let out = export(
        &scene,
        &mut sampler,
        a,
        &mut NoopEmitter,
        &ExportOptions::default(),
        &mut ctx,
    )
    .unwrap();

    // d2 never moves: it contributes no directives and no diagnostics.
    assert_eq!(
        out,
        "\tANIM_begin\n\
         \tANIM_trans_begin\td1\n\
         \tANIM_trans_key\t0\t0\t0\t0\n\
         \tANIM_trans_key\t1\t0\t0\t-2\n\
         \tANIM_trans_end\n\
         \tANIM_end\n"
    );
    assert!(!ctx.has_errors());
}

#[test]
fn test_loop_directive_placement() {
    let mut scene = Scene::new();
    let a = scene.add_object(SceneObject::new("a", ObjectKind::Mesh));
    scene.object_mut(a).exportable_root = true;
    scene
        .object_mut(a)
        .datarefs
        .insert("d1".into(), DatarefInfo::with_loop("d1", 5.0));
    scene
        .object_mut(a)
        .curves
        .push(curve("d1", RotationMode::AxisAngle));

    let mut sampler = KeyedPoseSampler::new();
    sampler.record_basis(1, PoseTarget::Object(a), DMat4::IDENTITY);
    sampler.record_basis(
        2,
        PoseTarget::Object(a),
        DMat4::from_translation(DVec3::new(0.0, 2.0, 0.0)),
    );

    let mut ctx = ExportContext::new(false);
    let out = export(
        &scene,
        &mut sampler,
        a,
        &mut NoopEmitter,
        &ExportOptions::default(),
        &mut ctx,
    )
    .unwrap();

    // Loop lines sit one tab deeper than their keyframe block.
    assert_eq!(
        out,
        "\tANIM_begin\n\
         \tANIM_trans_begin\td1\n\
         \tANIM_trans_key\t0\t0\t0\t0\n\
         \tANIM_trans_key\t1\t0\t0\t-2\n\
         \t\tANIM_keyframe_loop\t5\n\
         \tANIM_trans_end\n\
         \tANIM_end\n"
    );
}

#[test]
fn test_armature_joint_animation() {
    let mut scene = Scene::new();
    let mut rig = SceneObject::new("rig", ObjectKind::Armature);
    rig.exportable_root = true;
    let mut hub = Joint::new("hub", None, DMat4::IDENTITY);
    hub.curves.push(curve("d1", RotationMode::AxisAngle));
    rig.joints.push(hub);
    let rig = scene.add_object(rig);
    let blade = scene
        .add_object(SceneObject::new("blade", ObjectKind::Mesh).with_joint_parent(rig, JointId(0)));
    let _ = blade;

    let joint_target = PoseTarget::Joint {
        armature: rig,
        joint: JointId(0),
    };
    let mut sampler = KeyedPoseSampler::new();
    sampler.record_sample(1, joint_target, rotation_sample(0.0));
    sampler.record_sample(2, joint_target, rotation_sample(90.0));

    let mut ctx = ExportContext::new(false);
    let out = export(
        &scene,
        &mut sampler,
        rig,
        &mut TrisEmitter,
        &ExportOptions::default(),
        &mut ctx,
    )
    .unwrap();

    // The armature bone itself writes nothing; its joint carries the ANIM
    // block, and the joint-parented mesh lands inside it.
    assert_eq!(
        out,
        "\t\tANIM_begin\n\
         \t\tANIM_rotate_begin\t0\t1\t0\td1\n\
         \t\tANIM_rotate_key\t0\t0\n\
         \t\tANIM_rotate_key\t1\t90\n\
         \t\tANIM_rotate_end\n\
         \t\t\tTRIS\t0\t12\n\
         \t\tANIM_end\n"
    );
}

#[test]
fn test_static_bake_translation_above_animation() {
    // A static offset parent folds into the animated child's bake directive.
    let mut scene = Scene::new();
    let root = scene.add_object(SceneObject::new("root", ObjectKind::Mesh));
    scene.object_mut(root).exportable_root = true;
    let mover = scene.add_object(SceneObject::new("mover", ObjectKind::Mesh).with_parent(root));
    scene
        .object_mut(mover)
        .curves
        .push(curve("d1", RotationMode::AxisAngle));

    let root_world = DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0));
    let mut sampler = KeyedPoseSampler::new();
    for (frame, offset) in [(1, 0.0), (2, 2.0)] {
        let basis = DMat4::from_translation(DVec3::new(0.0, offset, 0.0));
        sampler.record_world(frame, PoseTarget::Object(root), root_world);
        sampler.record_basis(frame, PoseTarget::Object(mover), basis);
        sampler.record_world(frame, PoseTarget::Object(mover), root_world * basis);
    }

    let mut ctx = ExportContext::new(false);
    let out = export(
        &scene,
        &mut sampler,
        root,
        &mut NoopEmitter,
        &ExportOptions::default(),
        &mut ctx,
    )
    .unwrap();

    assert_eq!(
        out,
        "\t\tANIM_begin\n\
         \t\tANIM_trans\t1\t0\t0\t1\t0\t0\n\
         \t\tANIM_trans_begin\td1\n\
         \t\tANIM_trans_key\t0\t0\t0\t0\n\
         \t\tANIM_trans_key\t1\t0\t0\t-2\n\
         \t\tANIM_trans_end\n\
         \t\tANIM_end\n"
    );
}

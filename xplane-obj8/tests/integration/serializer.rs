//! Serializer state behavior across payloads, conditions and LOD passes.

use glam::DMat4;
use pretty_assertions::assert_eq;
use xplane_obj8::{
    export, AttrValue, Attribute, Condition, ExportContext, ExportError, ExportOptions,
    KeyedPoseSampler, LodBuckets, LodRange, NoopEmitter, ObjectId, ObjectKind, Scene, SceneObject,
};

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

/// Fails validation for one named payload, emits geometry for the rest.
struct FailingEmitter {
    fail_for: &'static str,
}

impl xplane_obj8::ObjectEmitter for FailingEmitter {
    fn emit_object(
        &mut self,
        scene: &Scene,
        object: ObjectId,
        _: DMat4,
        indent: &str,
    ) -> xplane_obj8::Result<String> {
        let name = &scene.object(object).name;
        if name == self.fail_for {
            Err(ExportError::Validation(format!("bad geometry on '{name}'")))
        } else {
            Ok(format!("{indent}TRIS\t0\t12\n"))
        }
    }
}

fn run(scene: &Scene, root: ObjectId, options: &ExportOptions) -> (String, ExportContext) {
    let mut sampler = KeyedPoseSampler::new();
    let mut ctx = ExportContext::new(options.debug);
    let out = export(scene, &mut sampler, root, &mut NoopEmitter, options, &mut ctx).unwrap();
    (out, ctx)
}

#[test]
fn test_resetter_between_payloads() {
    let mut scene = Scene::new();
    let root = scene.add_object(SceneObject::new("root", ObjectKind::Empty));
    scene.object_mut(root).exportable_root = true;
    let lit = scene.add_object(SceneObject::new("lit", ObjectKind::Mesh).with_parent(root));
    scene.object_mut(lit).attributes.add(Attribute::new(
        "ATTR_light_level",
        AttrValue::Floats(vec![0.0, 1.0]),
    ));
    let plain = scene.add_object(SceneObject::new("plain", ObjectKind::Mesh).with_parent(root));
    let _ = plain;

    let (out, ctx) = run(&scene, root, &ExportOptions::default());
    assert_eq!(
        out,
        "\t\tATTR_light_level\t0\t1\n\
         \t\tATTR_light_level_reset\n"
    );
    assert!(!ctx.has_errors());
}

#[test]
fn test_unchanged_attribute_not_re_emitted() {
    let mut scene = Scene::new();
    let root = scene.add_object(SceneObject::new("root", ObjectKind::Empty));
    scene.object_mut(root).exportable_root = true;
    for name in ["first", "second"] {
        let mesh = scene.add_object(SceneObject::new(name, ObjectKind::Mesh).with_parent(root));
        scene
            .object_mut(mesh)
            .attributes
            .add(Attribute::flag("ATTR_no_blend"));
    }

    let (out, _) = run(&scene, root, &ExportOptions::default());
    // Both payloads set the same value; the runtime already holds it for
    // the second one, and no resetter fires in between.
    assert_eq!(out, "\t\tATTR_no_blend\n");
}

#[test]
fn test_always_considered_suppresses_resetter() {
    let mut scene = Scene::new();
    let root = scene.add_object(SceneObject::new("root", ObjectKind::Empty));
    scene.object_mut(root).exportable_root = true;
    let lit = scene.add_object(SceneObject::new("lit", ObjectKind::Mesh).with_parent(root));
    scene.object_mut(lit).attributes.add(Attribute::new(
        "ATTR_light_level",
        AttrValue::Floats(vec![0.0, 1.0]),
    ));
    let plain = scene.add_object(SceneObject::new("plain", ObjectKind::Mesh).with_parent(root));
    let _ = plain;

    let options = ExportOptions {
        always_considered: vec!["ATTR_light_level".into()],
        ..ExportOptions::default()
    };
    let (out, _) = run(&scene, root, &options);
    assert_eq!(out, "\t\tATTR_light_level\t0\t1\n");
}

#[test]
fn test_lod_passes_share_tracker_state() {
    let mut scene = Scene::new();
    let root = scene.add_object(SceneObject::new("root", ObjectKind::Empty));
    scene.object_mut(root).exportable_root = true;
    let near = scene.add_object(SceneObject::new("near", ObjectKind::Mesh).with_parent(root));
    scene.object_mut(near).lod = Some(LodBuckets::LOD_1);
    scene
        .object_mut(near)
        .attributes
        .add(Attribute::flag("ATTR_draw_disable"));
    let shared = scene.add_object(SceneObject::new("shared", ObjectKind::Mesh).with_parent(root));
    let _ = shared;

    let options = ExportOptions {
        lods: vec![
            LodRange {
                near: 0.0,
                far: 100.0,
            },
            LodRange {
                near: 100.0,
                far: 500.0,
            },
        ],
        ..ExportOptions::default()
    };
    let (out, _) = run(&scene, root, &options);

    // The draw-disable set in the first pass is reset before the shared
    // payload; the later passes have nothing left to write. Ranges stop at
    // 500, so a closing unfiltered block keeps bucket-less payloads visible
    // out to the maximum draw distance.
    assert_eq!(
        out,
        "ATTR_LOD\t0\t100\n\
         \t\tATTR_draw_disable\n\
         \t\tATTR_draw_enable\n\
         ATTR_LOD\t100\t500\n\
         ATTR_LOD\t500\t100000\n"
    );
}

#[test]
fn test_lod_base_and_closing_blocks_carry_bucketless_payloads() {
    let mut scene = Scene::new();
    let root = scene.add_object(SceneObject::new("root", ObjectKind::Empty));
    scene.object_mut(root).exportable_root = true;
    let near = scene.add_object(SceneObject::new("near", ObjectKind::Mesh).with_parent(root));
    scene.object_mut(near).lod = Some(LodBuckets::LOD_1);
    let shared = scene.add_object(SceneObject::new("shared", ObjectKind::Mesh).with_parent(root));
    let _ = shared;

    let options = ExportOptions {
        lods: vec![LodRange {
            near: 100.0,
            far: 500.0,
        }],
        ..ExportOptions::default()
    };
    let mut sampler = KeyedPoseSampler::new();
    let mut ctx = ExportContext::new(false);
    let out = export(
        &scene,
        &mut sampler,
        root,
        &mut TrisEmitter,
        &options,
        &mut ctx,
    )
    .unwrap();

    // The configured range starts above zero and stops short of the maximum
    // draw distance, so unfiltered blocks bracket it on both sides. The
    // bucket-less root and shared payloads appear in every block; the
    // bucketed one is confined to its own range.
    assert_eq!(
        out,
        "ATTR_LOD\t0\t100\n\
         \tTRIS\t0\t12\n\
         \t\tTRIS\t0\t12\n\
         ATTR_LOD\t100\t500\n\
         \tTRIS\t0\t12\n\
         \t\tTRIS\t0\t12\n\
         \t\tTRIS\t0\t12\n\
         ATTR_LOD\t500\t100000\n\
         \tTRIS\t0\t12\n\
         \t\tTRIS\t0\t12\n"
    );
    assert!(!ctx.has_errors());
}

#[test]
fn test_conditions_bracket_payload_and_children() {
    let mut scene = Scene::new();
    let root = scene.add_object(SceneObject::new("glass", ObjectKind::Mesh));
    scene.object_mut(root).exportable_root = true;
    scene.object_mut(root).conditions.push(Condition {
        variable: "GLASS".into(),
        value: true,
    });
    scene.object_mut(root).conditions.push(Condition {
        variable: "INTERIOR".into(),
        value: false,
    });
    let inner = scene.add_object(SceneObject::new("inner", ObjectKind::Mesh).with_parent(root));
    let _ = inner;

    let mut sampler = KeyedPoseSampler::new();
    let mut ctx = ExportContext::new(false);
    let out = export(
        &scene,
        &mut sampler,
        root,
        &mut TrisEmitter,
        &ExportOptions::default(),
        &mut ctx,
    )
    .unwrap();

    assert_eq!(
        out,
        "\tIF\tGLASS\n\
         \tIF NOT\tINTERIOR\n\
         \tTRIS\t0\t12\n\
         \t\tTRIS\t0\t12\n\
         \tENDIF\n\
         \tENDIF\n"
    );
}

#[test]
fn test_validation_error_skips_single_payload() {
    let mut scene = Scene::new();
    let root = scene.add_object(SceneObject::new("root", ObjectKind::Empty));
    scene.object_mut(root).exportable_root = true;
    let bad = scene.add_object(SceneObject::new("bad", ObjectKind::Mesh).with_parent(root));
    let good = scene.add_object(SceneObject::new("good", ObjectKind::Mesh).with_parent(root));
    let _ = (bad, good);

    let mut sampler = KeyedPoseSampler::new();
    let mut ctx = ExportContext::new(false);
    let out = export(
        &scene,
        &mut sampler,
        root,
        &mut FailingEmitter { fail_for: "bad" },
        &ExportOptions::default(),
        &mut ctx,
    )
    .unwrap();

    // The root empty and the good mesh both emit; only 'bad' is skipped.
    assert_eq!(out, "\tTRIS\t0\t12\n\t\tTRIS\t0\t12\n");
    assert!(ctx.has_errors());
}

#[test]
fn test_debug_comments_name_bones() {
    let mut scene = Scene::new();
    let root = scene.add_object(SceneObject::new("fuselage", ObjectKind::Mesh));
    scene.object_mut(root).exportable_root = true;

    let options = ExportOptions {
        debug: true,
        ..ExportOptions::default()
    };
    let (out, _) = run(&scene, root, &options);
    assert_eq!(out, "# ROOT\n\t# fuselage\n");
}

#[test]
fn test_anim_attributes_bypass_tracker() {
    let mut scene = Scene::new();
    let root = scene.add_object(SceneObject::new("door", ObjectKind::Mesh));
    scene.object_mut(root).exportable_root = true;
    scene.object_mut(root).anim_attributes.add(Attribute::new(
        "ANIM_show",
        AttrValue::Text("0\t1\tsim/cockpit/doors".into()),
    ));

    let (out, _) = run(&scene, root, &ExportOptions::default());
    // Not animated, but anim attributes still force a scaffold of their own.
    assert_eq!(
        out,
        "\tANIM_begin\n\
         \tANIM_show\t0\t1\tsim/cockpit/doors\n\
         \tANIM_end\n"
    );
}

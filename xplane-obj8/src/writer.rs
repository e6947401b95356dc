//! Directive serialization.
//!
//! Walks a baked [`BoneTree`] depth-first and emits the OBJ8 command stream:
//! `ANIM_*` scaffolding for animated bones, renderer-state attributes gated
//! through the [`AttributeState`] tracker, and payload geometry via an
//! [`ObjectEmitter`]. LOD-filtered passes share one tracker and differ only
//! in which payload bodies are written, so bone structure stays identical
//! across `ATTR_LOD` blocks.

use glam::DMat4;

use crate::attribute::Attribute;
use crate::bone::{Bone, BoneAnimation, BoneId, BoneTree};
use crate::common::{float_to_str, is_zero, round_to, DEFAULT_KEYFRAME_PRECISION};
use crate::context::ExportContext;
use crate::coordinate::vec_to_xplane;
use crate::error::{ExportError, Result};
use crate::keyframe::quat_to_euler_xyz;
use crate::scene::{LodBuckets, LodRange, ObjectId, PoseSampler, Scene};
use crate::state::AttributeState;
use crate::transform;

/// Farthest distance the runtime draws anything at; a closing unfiltered
/// `ATTR_LOD` block covers up to here when the configured ranges stop short.
const MAX_LOD_DISTANCE: f64 = 100_000.0;

/// Per-pass configuration.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Frame every baseline matrix is sampled at.
    pub rest_frame: i32,
    /// Write `#` comments naming bones and block kinds.
    pub debug: bool,
    /// Decimal digits for zero/equality checks on rotations and translations.
    pub precision: u32,
    /// Attribute names treated as present on every payload when computing
    /// resetters.
    pub always_considered: Vec<String>,
    /// LOD ranges; empty means a single unfiltered pass.
    pub lods: Vec<LodRange>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            rest_frame: 1,
            debug: false,
            precision: DEFAULT_KEYFRAME_PRECISION,
            always_considered: Vec::new(),
            lods: Vec::new(),
        }
    }
}

/// Geometry handoff for payload bodies. The returned text is appended
/// verbatim after the payload's attributes.
pub trait ObjectEmitter {
    /// `bake_matrix` is the static delta from the nearest animated bone to
    /// the payload's final world pose; geometry must be pre-transformed by
    /// it. A [`ExportError::Validation`] return skips only this payload.
    fn emit_object(
        &mut self,
        scene: &Scene,
        object: ObjectId,
        bake_matrix: DMat4,
        indent: &str,
    ) -> Result<String>;
}

/// Emitter that writes no geometry; useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct NoopEmitter;

impl ObjectEmitter for NoopEmitter {
    fn emit_object(&mut self, _: &Scene, _: ObjectId, _: DMat4, _: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// Build, bake and serialize one exportable root in a single pass.
pub fn export(
    scene: &Scene,
    sampler: &mut dyn PoseSampler,
    root: ObjectId,
    emitter: &mut dyn ObjectEmitter,
    options: &ExportOptions,
    ctx: &mut ExportContext,
) -> Result<String> {
    let mut tree = BoneTree::build(scene, sampler, root, options.precision, ctx)?;
    transform::bake(&mut tree, scene, sampler, options.rest_frame)?;
    let mut writer = CommandsWriter::new(scene, &tree, options);
    writer.write(emitter, ctx)
}

/// Serializes one baked tree. One instance per export pass; the attribute
/// tracker inside persists across the pass's LOD blocks.
pub struct CommandsWriter<'a> {
    scene: &'a Scene,
    tree: &'a BoneTree,
    options: &'a ExportOptions,
    state: AttributeState,
}

impl<'a> CommandsWriter<'a> {
    pub fn new(scene: &'a Scene, tree: &'a BoneTree, options: &'a ExportOptions) -> Self {
        Self {
            scene,
            tree,
            options,
            state: AttributeState::new(),
        }
    }

    /// The full command stream: a single pass, or one pass per configured
    /// LOD range wrapped in `ATTR_LOD` directives. Bucket-less payloads must
    /// stay visible across the whole distance range, so ranges not starting
    /// at zero get a base unfiltered block and ranges stopping short of the
    /// maximum draw distance get a closing one.
    pub fn write(
        &mut self,
        emitter: &mut dyn ObjectEmitter,
        ctx: &mut ExportContext,
    ) -> Result<String> {
        self.state.clear();
        if self.options.lods.is_empty() {
            return self.write_bone(self.tree.root(), None, emitter, ctx);
        }

        let smallest_near = self
            .options
            .lods
            .iter()
            .map(|range| range.near)
            .fold(f64::INFINITY, f64::min);
        let tallest_far = self
            .options
            .lods
            .iter()
            .map(|range| range.far)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut out = String::new();
        if smallest_near > 0.0 {
            out.push_str(&format!("ATTR_LOD\t0\t{}\n", float_to_str(smallest_near)));
            out.push_str(&self.write_bone(self.tree.root(), None, emitter, ctx)?);
        }
        for (index, range) in self.options.lods.iter().enumerate() {
            out.push_str(&format!(
                "ATTR_LOD\t{}\t{}\n",
                float_to_str(range.near),
                float_to_str(range.far)
            ));
            out.push_str(&self.write_bone(self.tree.root(), Some(index), emitter, ctx)?);
        }
        if tallest_far < MAX_LOD_DISTANCE {
            out.push_str(&format!(
                "ATTR_LOD\t{}\t{}\n",
                float_to_str(tallest_far),
                float_to_str(MAX_LOD_DISTANCE)
            ));
            out.push_str(&self.write_bone(self.tree.root(), None, emitter, ctx)?);
        }
        Ok(out)
    }

    fn write_bone(
        &mut self,
        id: BoneId,
        lod: Option<usize>,
        emitter: &mut dyn ObjectEmitter,
        ctx: &mut ExportContext,
    ) -> Result<String> {
        let mut out = self.animation_prefix(id, ctx)?;

        let bone = self.tree.bone(id);
        let payload = bone
            .payload
            .filter(|_| payload_active(bone.buckets, lod));
        let mut opened_conditions = 0;
        if let Some(object) = payload {
            let (text, conditions) = self.write_payload(id, object, emitter, ctx)?;
            out.push_str(&text);
            opened_conditions = conditions;
        }

        for child in self.tree.bone(id).children.clone() {
            out.push_str(&self.write_bone(child, lod, emitter, ctx)?);
        }

        let indent = self.indent(id);
        for _ in 0..opened_conditions {
            out.push_str(&indent);
            out.push_str("ENDIF\n");
        }

        out.push_str(&self.animation_suffix(id));
        Ok(out)
    }

    fn indent(&self, id: BoneId) -> String {
        "\t".repeat(self.tree.depth(id))
    }

    fn animation_prefix(&self, id: BoneId, ctx: &mut ExportContext) -> Result<String> {
        let bone = self.tree.bone(id);
        let indent = self.indent(id);
        let mut out = String::new();

        if self.options.debug {
            out.push_str(&format!("{indent}# {}\n", bone.name));
        }

        let anim_attrs = bone
            .payload
            .map(|object| &self.scene.object(object).anim_attributes)
            .filter(|set| !set.is_empty());
        if !bone.is_animated() && anim_attrs.is_none() {
            return Ok(out);
        }

        out.push_str(&indent);
        out.push_str("ANIM_begin\n");

        if bone.is_animated() {
            let bake = bone.baked.bake_for_animation.ok_or_else(|| {
                ExportError::Internal(format!("bone '{}' was not baked before writing", bone.name))
            })?;
            out.push_str(&self.static_translation(&indent, bake));
            out.push_str(&self.static_rotation(&indent, bake));

            for (dataref, anim) in &bone.animations {
                out.push_str(&self.translation_keyframes(bone, &indent, dataref, anim, ctx)?);
            }
            for (dataref, anim) in &bone.animations {
                out.push_str(&self.rotation_keyframes(bone, &indent, dataref, anim, ctx));
            }
        }

        if let Some(attrs) = anim_attrs {
            // Show/hide and friends bypass the state tracker; their effect
            // is scoped to this ANIM block.
            for attr in attrs.by_weight() {
                for value in &attr.values {
                    let rendered = value.to_string();
                    out.push_str(&indent);
                    out.push_str(&attr.name);
                    if !rendered.is_empty() {
                        out.push('\t');
                        out.push_str(&rendered);
                    }
                    out.push('\n');
                }
            }
        }

        Ok(out)
    }

    fn animation_suffix(&self, id: BoneId) -> String {
        let bone = self.tree.bone(id);
        let has_anim_attrs = bone
            .payload
            .is_some_and(|object| !self.scene.object(object).anim_attributes.is_empty());
        if bone.is_animated() || has_anim_attrs {
            format!("{}ANIM_end\n", self.indent(id))
        } else {
            String::new()
        }
    }

    fn static_translation(&self, indent: &str, bake: DMat4) -> String {
        let precision = self.options.precision;
        let translation = bake.w_axis.truncate();
        let rounded = glam::DVec3::new(
            round_to(translation.x, precision),
            round_to(translation.y, precision),
            round_to(translation.z, precision),
        );
        if rounded == glam::DVec3::ZERO {
            return String::new();
        }

        let mut out = String::new();
        if self.options.debug {
            out.push_str(&format!("{indent}# static translation\n"));
        }
        let mapped = vec_to_xplane(rounded);
        let triple = format!(
            "{}\t{}\t{}",
            float_to_str(mapped.x),
            float_to_str(mapped.y),
            float_to_str(mapped.z)
        );
        out.push_str(&format!("{indent}ANIM_trans\t{triple}\t{triple}\n"));
        out
    }

    fn static_rotation(&self, indent: &str, bake: DMat4) -> String {
        let precision = self.options.precision;
        let (_, rotation, _) = bake.to_scale_rotation_translation();
        let euler = quat_to_euler_xyz(rotation);
        // Rounding is only for the zero checks; emitted degrees stay exact.
        if euler.map(|radians| round_to(radians, precision)) == [0.0; 3] {
            return String::new();
        }

        let mut out = String::new();
        if self.options.debug {
            out.push_str(&format!("{indent}# static rotation\n"));
        }

        // The euler components were decomposed X-then-Y-then-Z in global
        // axes, so the runtime has to re-apply them backward: Z, Y, X.
        let order = [
            (2usize, glam::DVec3::Z),
            (1, glam::DVec3::Y),
            (0, glam::DVec3::X),
        ];
        for (index, axis) in order {
            let degrees = euler[index].to_degrees();
            if is_zero(degrees, precision) {
                continue;
            }
            let mapped = vec_to_xplane(axis);
            out.push_str(&format!(
                "{indent}ANIM_rotate\t{}\t{}\t{}\t{}\t{}\n",
                float_to_str(mapped.x),
                float_to_str(mapped.y),
                float_to_str(mapped.z),
                float_to_str(degrees),
                float_to_str(degrees)
            ));
        }
        out
    }

    fn keyframe_loop(&self, bone: &Bone, indent: &str, dataref: &str) -> String {
        match bone.datarefs.get(dataref) {
            Some(info) if info.loop_value > 0.0 => {
                format!("{indent}\tANIM_keyframe_loop\t{}\n", float_to_str(info.loop_value))
            }
            _ => String::new(),
        }
    }

    fn translation_keyframes(
        &self,
        bone: &Bone,
        indent: &str,
        dataref: &str,
        anim: &BoneAnimation,
        ctx: &mut ExportContext,
    ) -> Result<String> {
        // Motion is per dataref: a motionless channel sharing the bone with a
        // translating one is degenerate, not an error.
        if !anim.keyframes.has_translation_motion() {
            return Ok(String::new());
        }
        let table = match anim.keyframes.translation_table_no_clamps() {
            Ok(table) => table,
            Err(ExportError::AnimationShape(message)) => {
                ctx.error(&format!("dataref '{dataref}' on '{}': {message}", bone.name));
                return Ok(String::new());
            }
            Err(err) => return Err(err),
        };

        // Scale above the animation is baked into the emitted translations.
        let pre = bone.baked.pre_animation.ok_or_else(|| {
            ExportError::Internal(format!("bone '{}' was not baked before writing", bone.name))
        })?;
        let (pre_scale, _, _) = pre.to_scale_rotation_translation();

        let mut out = String::new();
        if self.options.debug {
            out.push_str(&format!("{indent}# translation keyframes\n"));
        }
        out.push_str(&format!("{indent}ANIM_trans_begin\t{dataref}\n"));
        for (value, location) in table {
            let scaled = location * pre_scale;
            let mapped = vec_to_xplane(scaled);
            out.push_str(&format!(
                "{indent}ANIM_trans_key\t{}\t{}\t{}\t{}\n",
                float_to_str(value),
                float_to_str(mapped.x),
                float_to_str(mapped.y),
                float_to_str(mapped.z)
            ));
        }
        out.push_str(&self.keyframe_loop(bone, indent, dataref));
        out.push_str(&format!("{indent}ANIM_trans_end\n"));
        Ok(out)
    }

    fn rotation_keyframes(
        &self,
        bone: &Bone,
        indent: &str,
        dataref: &str,
        anim: &BoneAnimation,
        ctx: &mut ExportContext,
    ) -> String {
        if !anim.keyframes.has_rotation_motion() || anim.rotation_table.is_empty() {
            return String::new();
        }
        let table = match anim.rotation_table.without_clamps() {
            Ok(table) => table,
            Err(err) => {
                ctx.error(&format!("dataref '{dataref}' on '{}': {err}", bone.name));
                return String::new();
            }
        };

        let mut out = String::new();
        if self.options.debug {
            out.push_str(&format!("{indent}# rotation keyframes\n"));
        }
        for group in &table.groups {
            let mapped = vec_to_xplane(group.axis);
            out.push_str(&format!(
                "{indent}ANIM_rotate_begin\t{}\t{}\t{}\t{dataref}\n",
                float_to_str(mapped.x),
                float_to_str(mapped.y),
                float_to_str(mapped.z)
            ));
            for entry in &group.entries {
                out.push_str(&format!(
                    "{indent}ANIM_rotate_key\t{}\t{}\n",
                    float_to_str(entry.value),
                    float_to_str(entry.degrees)
                ));
            }
            out.push_str(&self.keyframe_loop(bone, indent, dataref));
            out.push_str(&format!("{indent}ANIM_rotate_end\n"));
        }
        out
    }

    /// Resetters, conditions, attributes and geometry for one payload.
    /// Returns the text plus the number of `IF` directives left open.
    fn write_payload(
        &mut self,
        id: BoneId,
        object_id: ObjectId,
        emitter: &mut dyn ObjectEmitter,
        ctx: &mut ExportContext,
    ) -> Result<(String, usize)> {
        let bone = self.tree.bone(id);
        let object = self.scene.object(object_id);
        let indent = self.indent(id);
        let mut out = String::new();

        let relevant: Vec<&str> = object
            .attributes
            .names()
            .chain(object.material_attributes.names())
            .chain(object.cockpit_attributes.names())
            .chain(self.options.always_considered.iter().map(String::as_str))
            .collect();
        out.push_str(&self.state.write_resetters(relevant.iter().copied(), &indent));

        for condition in &object.conditions {
            if condition.value {
                out.push_str(&format!("{indent}IF\t{}\n", condition.variable));
            } else {
                out.push_str(&format!("{indent}IF NOT\t{}\n", condition.variable));
            }
        }

        let mut attrs: Vec<&Attribute> = object
            .attributes
            .by_weight()
            .into_iter()
            .chain(object.material_attributes.by_weight())
            .chain(object.cockpit_attributes.by_weight())
            .collect();
        attrs.sort_by_key(|a| a.weight);
        for attr in attrs {
            out.push_str(&self.state.emit(attr, &indent));
        }

        let bake = bone.baked.bake_for_attached.unwrap_or(DMat4::IDENTITY);
        match emitter.emit_object(self.scene, object_id, bake, &indent) {
            Ok(text) => out.push_str(&text),
            Err(ExportError::Validation(message)) => {
                ctx.error(&format!("payload '{}' skipped: {message}", object.name));
            }
            Err(err) => return Err(err),
        }

        Ok((out, object.conditions.len()))
    }
}

fn payload_active(buckets: LodBuckets, lod: Option<usize>) -> bool {
    match lod {
        // The unfiltered pass carries only objects assigned to no bucket.
        None => buckets.is_empty(),
        // A filtered pass carries its bucket's objects plus bucket-less ones.
        Some(index) => buckets.is_empty() || buckets.contains(LodBuckets::bucket(index)),
    }
}

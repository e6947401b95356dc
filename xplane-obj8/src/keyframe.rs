//! Keyframe data model and the rotation reducer.
//!
//! Every animated (bone, dataref) pair carries an ordered list of at least two
//! keyframes sharing one rotation representation. The reducer collapses that
//! list onto the fewest possible reference axes: a single axis when every
//! non-zero sample rotates about the same line (sign-normalizing opposed
//! samples), or the three fixed world axes in the rotation mode's application
//! order when it cannot.

use glam::{DMat3, DQuat, DVec3};

use crate::common::{is_zero, round_to};
use crate::error::{ExportError, Result};

/// Euler application order (first listed axis is applied first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EulerOrder {
    Xyz,
    Xzy,
    Yxz,
    Yzx,
    Zxy,
    Zyx,
}

impl EulerOrder {
    /// Axis indices (into an `[x, y, z]` angle triple) in the order the
    /// rotation groups must be emitted. Axes are applied globally, so the
    /// runtime has to re-apply them exactly backward: the emission order is
    /// the reverse of the application order.
    pub fn emission_indices(self) -> [usize; 3] {
        match self {
            Self::Zyx => [0, 1, 2],
            Self::Zxy => [1, 0, 2],
            Self::Yzx => [0, 2, 1],
            Self::Yxz => [2, 0, 1],
            Self::Xzy => [1, 2, 0],
            Self::Xyz => [2, 1, 0],
        }
    }

    /// World axes in emission order.
    pub fn emission_axes(self) -> [DVec3; 3] {
        self.emission_indices().map(axis_unit)
    }

    fn application_indices(self) -> [usize; 3] {
        match self {
            Self::Xyz => [0, 1, 2],
            Self::Xzy => [0, 2, 1],
            Self::Yxz => [1, 0, 2],
            Self::Yzx => [1, 2, 0],
            Self::Zxy => [2, 0, 1],
            Self::Zyx => [2, 1, 0],
        }
    }
}

fn axis_unit(index: usize) -> DVec3 {
    match index {
        0 => DVec3::X,
        1 => DVec3::Y,
        _ => DVec3::Z,
    }
}

/// How a scene object's rotation channel is authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationMode {
    Euler(EulerOrder),
    AxisAngle,
    Quaternion,
}

/// One sampled rotation in its authored representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotationRep {
    Euler { order: EulerOrder, angles: [f64; 3] },
    AxisAngle { axis: DVec3, angle: f64 },
    Quaternion(DQuat),
}

impl RotationRep {
    pub fn mode(&self) -> RotationMode {
        match self {
            Self::Euler { order, .. } => RotationMode::Euler(*order),
            Self::AxisAngle { .. } => RotationMode::AxisAngle,
            Self::Quaternion(_) => RotationMode::Quaternion,
        }
    }

    pub fn to_quat(&self) -> DQuat {
        match *self {
            Self::Euler { order, angles } => quat_from_euler(order, angles),
            Self::AxisAngle { axis, angle } => {
                if axis.length_squared() <= f64::EPSILON {
                    DQuat::IDENTITY
                } else {
                    DQuat::from_axis_angle(axis.normalize(), angle)
                }
            }
            Self::Quaternion(q) => q,
        }
    }

    /// Build the representation `mode` asks for from a plain quaternion.
    pub fn from_quat(mode: RotationMode, q: DQuat) -> Self {
        match mode {
            RotationMode::Quaternion => Self::Quaternion(q),
            RotationMode::AxisAngle => {
                let (axis, angle) = quat_to_axis_angle(q);
                Self::AxisAngle { axis, angle }
            }
            // A quaternion only decomposes canonically to XYZ; samplers that
            // keep authored angles in other orders supply them directly.
            RotationMode::Euler(_) => Self::Euler {
                order: EulerOrder::Xyz,
                angles: quat_to_euler_xyz(q),
            },
        }
    }
}

/// Compose a quaternion from Euler `angles` (radians, `[x, y, z]` storage)
/// applied globally in `order`.
pub fn quat_from_euler(order: EulerOrder, angles: [f64; 3]) -> DQuat {
    let component = |index: usize| match index {
        0 => DQuat::from_rotation_x(angles[0]),
        1 => DQuat::from_rotation_y(angles[1]),
        _ => DQuat::from_rotation_z(angles[2]),
    };
    let [a, b, c] = order.application_indices();
    // Applied a-first in world space, so the matrix product runs backward.
    component(c) * component(b) * component(a)
}

/// Deterministic axis-angle extraction: angle in `[0, π]`, axis normalized.
pub fn quat_to_axis_angle(q: DQuat) -> (DVec3, f64) {
    let q = if q.w < 0.0 { -q.normalize() } else { q.normalize() };
    let angle = 2.0 * q.w.clamp(-1.0, 1.0).acos();
    let s = (1.0 - q.w * q.w).sqrt();
    if s <= 1e-9 {
        (DVec3::X, 0.0)
    } else {
        (DVec3::new(q.x, q.y, q.z) / s, angle)
    }
}

/// Decompose to XYZ-order Euler angles (`R = Rz · Ry · Rx`).
pub fn quat_to_euler_xyz(q: DQuat) -> [f64; 3] {
    let m = DMat3::from_quat(q.normalize());
    // m.col(c)[r] is M[r][c]
    let m20 = m.x_axis.z;
    if m20.abs() < 1.0 - 1e-9 {
        let y = (-m20).asin();
        let x = m.y_axis.z.atan2(m.z_axis.z);
        let z = m.x_axis.y.atan2(m.x_axis.x);
        [x, y, z]
    } else if m20 <= -1.0 + 1e-9 {
        // Gimbal lock, y = +π/2
        [
            m.y_axis.x.atan2(m.z_axis.x),
            std::f64::consts::FRAC_PI_2,
            0.0,
        ]
    } else {
        // Gimbal lock, y = -π/2
        [
            (-m.y_axis.x).atan2(-m.z_axis.x),
            -std::f64::consts::FRAC_PI_2,
            0.0,
        ]
    }
}

/// One animation sample: the dataref value it is keyed to plus the local
/// transform channels at that sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Dataref value (not a time unit).
    pub dataref_value: f64,
    pub location: DVec3,
    pub rotation: RotationRep,
    pub scale: DVec3,
}

impl Keyframe {
    pub fn as_axis_angle(&self) -> Self {
        let rotation = match self.rotation {
            rep @ RotationRep::AxisAngle { .. } => rep,
            rep => {
                let (axis, angle) = quat_to_axis_angle(rep.to_quat());
                RotationRep::AxisAngle { axis, angle }
            }
        };
        Self { rotation, ..*self }
    }

    pub fn as_euler(&self) -> Self {
        let rotation = match self.rotation {
            rep @ RotationRep::Euler { .. } => rep,
            rep => RotationRep::Euler {
                order: EulerOrder::Xyz,
                angles: quat_to_euler_xyz(rep.to_quat()),
            },
        };
        Self { rotation, ..*self }
    }

    pub fn as_quaternion(&self) -> Self {
        Self {
            rotation: RotationRep::Quaternion(self.rotation.to_quat()),
            ..*self
        }
    }
}

/// One entry of a rotation group: dataref value and rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableEntry {
    pub value: f64,
    pub degrees: f64,
}

/// All entries for one reference axis.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationGroup {
    pub axis: DVec3,
    pub entries: Vec<TableEntry>,
}

impl RotationGroup {
    pub fn total_degrees(&self) -> f64 {
        self.entries.iter().map(|e| e.degrees.abs()).sum()
    }
}

/// Reducer output: one group (axis-angle/quaternion) or up to three (Euler),
/// with zero-net-rotation groups already dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReducedKeyframeTable {
    pub groups: Vec<RotationGroup>,
}

impl ReducedKeyframeTable {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The table with leading/trailing clamping entries removed per group.
    pub fn without_clamps(&self) -> Result<Self> {
        let groups = self
            .groups
            .iter()
            .map(|g| {
                let pairs: Vec<(f64, f64)> = g.entries.iter().map(|e| (e.value, e.degrees)).collect();
                let trimmed = trim_clamping(&pairs)?;
                Ok(RotationGroup {
                    axis: g.axis,
                    entries: trimmed
                        .into_iter()
                        .map(|(value, degrees)| TableEntry { value, degrees })
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { groups })
    }
}

/// Strip the maximal leading and trailing runs of entries whose payload
/// equals its neighbor's. Fewer than two survivors means the channel carries
/// no usable animation.
pub fn trim_clamping<T: PartialEq + Clone>(entries: &[(f64, T)]) -> Result<Vec<(f64, T)>> {
    let mut start = 0;
    while start + 1 < entries.len() && entries[start].1 == entries[start + 1].1 {
        start += 1;
    }
    let mut end = entries.len();
    while end >= 2 && end - 2 >= start && entries[end - 1].1 == entries[end - 2].1 {
        end -= 1;
    }
    if end <= start || end - start < 2 {
        return Err(ExportError::AnimationShape(format!(
            "fewer than 2 keyframes remain after clamp trimming ({} of {})",
            end.saturating_sub(start),
            entries.len()
        )));
    }
    Ok(entries[start..end].to_vec())
}

/// Ordered list of ≥ 2 keyframes sharing one rotation representation.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeCollection {
    frames: Vec<Keyframe>,
}

impl KeyframeCollection {
    pub fn new(frames: Vec<Keyframe>) -> Result<Self> {
        if frames.len() < 2 {
            return Err(ExportError::Internal(format!(
                "keyframe collection requires at least 2 samples, got {}",
                frames.len()
            )));
        }
        let mode = frames[0].rotation.mode();
        if frames.iter().any(|f| f.rotation.mode() != mode) {
            return Err(ExportError::Internal(
                "keyframe collection mixes rotation representations".into(),
            ));
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn frames(&self) -> &[Keyframe] {
        &self.frames
    }

    pub fn rotation_mode(&self) -> RotationMode {
        self.frames[0].rotation.mode()
    }

    pub fn as_axis_angle(&self) -> Self {
        Self {
            frames: self.frames.iter().map(Keyframe::as_axis_angle).collect(),
        }
    }

    pub fn as_euler(&self) -> Self {
        Self {
            frames: self.frames.iter().map(Keyframe::as_euler).collect(),
        }
    }

    pub fn as_quaternion(&self) -> Self {
        Self {
            frames: self.frames.iter().map(Keyframe::as_quaternion).collect(),
        }
    }

    /// Do the sampled locations actually move?
    pub fn has_translation_motion(&self) -> bool {
        self.frames.iter().any(|f| f.location != self.frames[0].location)
    }

    /// Do the sampled rotations actually change?
    pub fn has_rotation_motion(&self) -> bool {
        self.frames.iter().any(|f| f.rotation != self.frames[0].rotation)
    }

    /// The reference axis (or the three world axes in emission order) this
    /// collection's rotations are expressed on, plus the representation the
    /// reducer settles on.
    pub fn reference_axes(&self, precision: u32) -> (Vec<DVec3>, RotationMode) {
        match self.rotation_mode() {
            RotationMode::Euler(order) => (order.emission_axes().to_vec(), RotationMode::Euler(order)),
            RotationMode::Quaternion => self.as_axis_angle().reference_axes(precision),
            RotationMode::AxisAngle => match self.scan_reference_axis(precision) {
                Some(axis) => (vec![axis], RotationMode::AxisAngle),
                None => (
                    EulerOrder::Xyz.emission_axes().to_vec(),
                    RotationMode::Euler(EulerOrder::Xyz),
                ),
            },
        }
    }

    /// Reduce onto the fewest possible reference axes.
    pub fn reduce(&self, precision: u32) -> ReducedKeyframeTable {
        match self.rotation_mode() {
            RotationMode::Quaternion => self.as_axis_angle().reduce_axis_angle(precision),
            RotationMode::AxisAngle => self.reduce_axis_angle(precision),
            RotationMode::Euler(_) => self.reduce_euler(precision),
        }
    }

    /// `(dataref value, location)` per keyframe.
    pub fn translation_table(&self) -> Vec<(f64, DVec3)> {
        self.frames.iter().map(|f| (f.dataref_value, f.location)).collect()
    }

    /// Translation table without clamping keyframes.
    pub fn translation_table_no_clamps(&self) -> Result<Vec<(f64, DVec3)>> {
        trim_clamping(&self.translation_table())
    }

    /// Rotation table without clamping keyframes.
    pub fn rotation_table_no_clamps(&self, precision: u32) -> Result<ReducedKeyframeTable> {
        self.reduce(precision).without_clamps()
    }

    fn scan_reference_axis(&self, precision: u32) -> Option<DVec3> {
        let mut ref_axis: Option<DVec3> = None;
        for frame in &self.frames {
            let (axis, angle) = match frame.rotation {
                RotationRep::AxisAngle { axis, angle } => (axis, angle),
                rep => quat_to_axis_angle(rep.to_quat()),
            };
            if is_zero(angle, precision) {
                continue;
            }
            match ref_axis {
                None => ref_axis = Some(axis),
                Some(r) if axis_eq(axis, r, precision) => {}
                Some(r) if axis_eq(axis, -r, precision) => {}
                Some(_) => return None,
            }
        }
        // All-zero rotation still gets a well-defined (conventional) axis.
        Some(ref_axis.unwrap_or(DVec3::X))
    }

    fn reduce_axis_angle(&self, precision: u32) -> ReducedKeyframeTable {
        let mut ref_axis: Option<DVec3> = None;
        let mut entries = Vec::with_capacity(self.frames.len());

        for frame in &self.frames {
            let (axis, angle) = match frame.rotation {
                RotationRep::AxisAngle { axis, angle } => (axis, angle),
                rep => quat_to_axis_angle(rep.to_quat()),
            };
            if is_zero(angle, precision) {
                entries.push(TableEntry {
                    value: frame.dataref_value,
                    degrees: 0.0,
                });
                continue;
            }
            let degrees = match ref_axis {
                None => {
                    ref_axis = Some(axis);
                    angle.to_degrees()
                }
                Some(r) if axis_eq(axis, r, precision) => angle.to_degrees(),
                // Opposed axis: sign-normalize onto the reference axis.
                Some(r) if axis_eq(axis, -r, precision) => -angle.to_degrees(),
                Some(_) => return self.as_euler().reduce_euler(precision),
            };
            entries.push(TableEntry {
                value: frame.dataref_value,
                degrees,
            });
        }

        let group = RotationGroup {
            axis: ref_axis.unwrap_or(DVec3::X),
            entries,
        };
        let groups = if is_zero(group.total_degrees(), precision) {
            Vec::new()
        } else {
            vec![group]
        };
        ReducedKeyframeTable { groups }
    }

    fn reduce_euler(&self, precision: u32) -> ReducedKeyframeTable {
        let collection = self.as_euler();
        let order = match collection.rotation_mode() {
            RotationMode::Euler(order) => order,
            // Unreachable after as_euler; keep the reducer total.
            _ => EulerOrder::Xyz,
        };

        let mut groups = Vec::with_capacity(3);
        for index in order.emission_indices() {
            let entries: Vec<TableEntry> = collection
                .frames
                .iter()
                .map(|f| {
                    let angles = match f.rotation {
                        RotationRep::Euler { angles, .. } => angles,
                        _ => [0.0; 3],
                    };
                    TableEntry {
                        value: f.dataref_value,
                        degrees: angles[index].to_degrees(),
                    }
                })
                .collect();
            let group = RotationGroup {
                axis: axis_unit(index),
                entries,
            };
            if !is_zero(group.total_degrees(), precision) {
                groups.push(group);
            }
        }
        ReducedKeyframeTable { groups }
    }
}

fn axis_eq(a: DVec3, b: DVec3, precision: u32) -> bool {
    round_to(a.x, precision) == round_to(b.x, precision)
        && round_to(a.y, precision) == round_to(b.y, precision)
        && round_to(a.z, precision) == round_to(b.z, precision)
}

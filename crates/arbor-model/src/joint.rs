//! Joint types and definitions.
//!
//! A joint connects a parent link to its child. Its transform is split into a
//! constant `parent_to_joint` part and a configuration-dependent joint motion,
//! so the full parent → child transform is `joint_transform(q) ∘ parent_to_joint`.

use arbor_math::{DMat, Mat3, Quat, SpatialTransform, SpatialVec, Vec3, skew};
use serde::{Deserialize, Serialize};

/// Joint kinds. The set is closed; every match on it is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointType {
    /// Single rotational DOF about `axis`.
    Revolute,
    /// Single translational DOF along `axis`.
    Prismatic,
    /// Ball joint: quaternion configuration, body-frame angular velocity.
    Spherical,
    /// Floating joint: position + quaternion, body-frame spatial velocity.
    Free,
    /// Rigid attachment, zero DOF.
    Fixed,
}

impl JointType {
    /// Velocity dimension.
    pub fn ndof(self) -> usize {
        match self {
            JointType::Revolute | JointType::Prismatic => 1,
            JointType::Spherical => 3,
            JointType::Free => 6,
            JointType::Fixed => 0,
        }
    }

    /// Configuration dimension.
    pub fn nq(self) -> usize {
        match self {
            JointType::Revolute | JointType::Prismatic => 1,
            JointType::Spherical => 4,
            JointType::Free => 7,
            JointType::Fixed => 0,
        }
    }
}

/// Position and velocity bounds for a 1-DOF joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    pub lower: f64,
    pub upper: f64,
    /// Maximum absolute joint speed, if any.
    #[serde(default)]
    pub velocity: Option<f64>,
}

impl JointLimits {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            velocity: None,
        }
    }

    pub fn with_velocity(mut self, max: f64) -> Self {
        self.velocity = Some(max);
        self
    }

    /// Whether `(q, qd)` lies inside the bounds.
    pub fn contains(&self, q: f64, qd: f64) -> bool {
        let pos_ok = q >= self.lower && q <= self.upper;
        let vel_ok = self.velocity.is_none_or(|max| qd.abs() <= max);
        pos_ok && vel_ok
    }
}

/// A joint connecting a link to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub joint_type: JointType,
    /// Transform from parent link frame to joint frame (constant).
    pub parent_to_joint: SpatialTransform,
    /// Unit axis in the joint frame (revolute and prismatic only).
    pub axis: Vec3,
    /// Viscous damping coefficient, `τ = -d q̇` per DOF.
    pub damping: f64,
    pub limits: Option<JointLimits>,
}

impl Joint {
    fn with_type(joint_type: JointType, parent_to_joint: SpatialTransform, axis: Vec3) -> Self {
        Self {
            name: String::new(),
            joint_type,
            parent_to_joint,
            axis,
            damping: 0.0,
            limits: None,
        }
    }

    /// Revolute joint about `axis`.
    pub fn revolute(parent_to_joint: SpatialTransform, axis: Vec3) -> Self {
        Self::with_type(JointType::Revolute, parent_to_joint, axis)
    }

    /// Prismatic joint along `axis`.
    pub fn prismatic(parent_to_joint: SpatialTransform, axis: Vec3) -> Self {
        Self::with_type(JointType::Prismatic, parent_to_joint, axis)
    }

    pub fn spherical(parent_to_joint: SpatialTransform) -> Self {
        Self::with_type(JointType::Spherical, parent_to_joint, Vec3::zeros())
    }

    pub fn free(parent_to_joint: SpatialTransform) -> Self {
        Self::with_type(JointType::Free, parent_to_joint, Vec3::zeros())
    }

    pub fn fixed(parent_to_joint: SpatialTransform) -> Self {
        Self::with_type(JointType::Fixed, parent_to_joint, Vec3::zeros())
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_limits(mut self, limits: JointLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Velocity dimension.
    pub fn ndof(&self) -> usize {
        self.joint_type.ndof()
    }

    /// Configuration dimension.
    pub fn nq(&self) -> usize {
        self.joint_type.nq()
    }

    /// Joint motion transform (joint frame → child frame) for configuration `q`.
    ///
    /// `q` must hold at least `nq()` entries.
    pub fn joint_transform(&self, q: &[f64]) -> SpatialTransform {
        match self.joint_type {
            JointType::Revolute => {
                // Passive rotation: coordinates rotate by -q.
                let (s, c) = (-q[0]).sin_cos();
                let ax = skew(&self.axis);
                let rot = Mat3::identity() + ax * s + ax * ax * (1.0 - c);
                SpatialTransform::new(rot, Vec3::zeros())
            }
            JointType::Prismatic => SpatialTransform::from_translation(self.axis * q[0]),
            JointType::Spherical => {
                let quat = Quat::from_slice(&q[0..4]).normalize();
                SpatialTransform::from_pose(quat.to_matrix(), Vec3::zeros())
            }
            JointType::Free => {
                let pos = Vec3::new(q[0], q[1], q[2]);
                let quat = Quat::from_slice(&q[3..7]).normalize();
                SpatialTransform::from_pose(quat.to_matrix(), pos)
            }
            JointType::Fixed => SpatialTransform::identity(),
        }
    }

    /// Motion subspace S (6 × ndof) in the child frame.
    pub fn motion_subspace_matrix(&self) -> DMat {
        match self.joint_type {
            JointType::Revolute => {
                DMat::from_column_slice(
                    6,
                    1,
                    SpatialVec::new(self.axis, Vec3::zeros()).data.as_slice(),
                )
            }
            JointType::Prismatic => {
                DMat::from_column_slice(
                    6,
                    1,
                    SpatialVec::new(Vec3::zeros(), self.axis).data.as_slice(),
                )
            }
            JointType::Spherical => {
                let mut s = DMat::zeros(6, 3);
                s.fixed_view_mut::<3, 3>(0, 0).fill_with_identity();
                s
            }
            JointType::Free => DMat::identity(6, 6),
            JointType::Fixed => DMat::zeros(6, 0),
        }
    }

    /// Motion subspace as a single spatial vector for 1-DOF joints.
    pub fn motion_subspace(&self) -> Option<SpatialVec> {
        match self.joint_type {
            JointType::Revolute => Some(SpatialVec::new(self.axis, Vec3::zeros())),
            JointType::Prismatic => Some(SpatialVec::new(Vec3::zeros(), self.axis)),
            JointType::Spherical | JointType::Free | JointType::Fixed => None,
        }
    }

    /// Relative spatial velocity `S q̇` across the joint, in the child frame.
    pub fn joint_velocity(&self, qd: &[f64]) -> SpatialVec {
        match self.joint_type {
            JointType::Revolute => SpatialVec::new(self.axis * qd[0], Vec3::zeros()),
            JointType::Prismatic => SpatialVec::new(Vec3::zeros(), self.axis * qd[0]),
            JointType::Spherical => SpatialVec::new(Vec3::new(qd[0], qd[1], qd[2]), Vec3::zeros()),
            JointType::Free => SpatialVec::from_slice(&qd[0..6]),
            JointType::Fixed => SpatialVec::zero(),
        }
    }

    /// Write the configuration reached from `q` by moving with velocity `v`
    /// for `dt` into `out`.
    ///
    /// Revolute and prismatic coordinates add; orientations compose through
    /// the quaternion exponential of the body-frame angular velocity.
    pub fn integrate_configuration(&self, q: &[f64], v: &[f64], dt: f64, out: &mut [f64]) {
        match self.joint_type {
            JointType::Revolute | JointType::Prismatic => out[0] = q[0] + v[0] * dt,
            JointType::Spherical => {
                let quat = Quat::from_slice(&q[0..4]);
                let omega = Vec3::new(v[0], v[1], v[2]);
                quat.integrate_body(&omega, dt).write_to(&mut out[0..4]);
            }
            JointType::Free => {
                let quat = Quat::from_slice(&q[3..7]).normalize();
                let omega = Vec3::new(v[0], v[1], v[2]);
                let lin = quat.rotate(&Vec3::new(v[3], v[4], v[5]));
                for k in 0..3 {
                    out[k] = q[k] + lin[k] * dt;
                }
                quat.integrate_body(&omega, dt).write_to(&mut out[3..7]);
            }
            JointType::Fixed => {}
        }
    }

    /// Write the zero-motion configuration into `out` (identity orientations).
    pub fn neutral_configuration(&self, out: &mut [f64]) {
        match self.joint_type {
            JointType::Revolute | JointType::Prismatic => out[0] = 0.0,
            JointType::Spherical => Quat::identity().write_to(&mut out[0..4]),
            JointType::Free => {
                out[0..3].fill(0.0);
                Quat::identity().write_to(&mut out[3..7]);
            }
            JointType::Fixed => {}
        }
    }

    /// Whether the configuration lies inside this joint's limits.
    /// Joints without limits, and multi-DOF joints, are always inside.
    pub fn within_limits(&self, q: &[f64], qd: &[f64]) -> bool {
        match (self.joint_type, &self.limits) {
            (JointType::Revolute | JointType::Prismatic, Some(lim)) => lim.contains(q[0], qd[0]),
            (JointType::Revolute | JointType::Prismatic, None)
            | (JointType::Spherical | JointType::Free | JointType::Fixed, _) => true,
        }
    }
}

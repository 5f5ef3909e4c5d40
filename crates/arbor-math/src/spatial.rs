//! 6D spatial algebra following Featherstone's "Rigid Body Dynamics Algorithms".
//!
//! Convention: spatial vectors are [angular; linear] (Featherstone order).
//! A spatial motion vector (twist): [ω; v]
//! A spatial force vector (wrench): [τ; f]

use crate::{Mat3, Mat6, Vec3, Vec6, skew};
use nalgebra as na;
use serde::{Deserialize, Serialize};

/// 6D spatial vector, either a motion vector (twist) or force vector (wrench).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialVec {
    /// The underlying 6D vector [angular(3); linear(3)].
    pub data: Vec6,
}

impl SpatialVec {
    /// Create from angular and linear parts.
    #[inline]
    pub fn new(angular: Vec3, linear: Vec3) -> Self {
        Self {
            data: Vec6::new(
                angular.x, angular.y, angular.z, linear.x, linear.y, linear.z,
            ),
        }
    }

    /// Zero spatial vector.
    #[inline]
    pub fn zero() -> Self {
        Self {
            data: Vec6::zeros(),
        }
    }

    /// Create from a 6-element slice laid out as [angular; linear].
    #[inline]
    pub fn from_slice(s: &[f64]) -> Self {
        Self {
            data: Vec6::from_column_slice(s),
        }
    }

    /// Angular (top 3) component.
    #[inline]
    pub fn angular(&self) -> Vec3 {
        Vec3::new(self.data[0], self.data[1], self.data[2])
    }

    /// Linear (bottom 3) component.
    #[inline]
    pub fn linear(&self) -> Vec3 {
        Vec3::new(self.data[3], self.data[4], self.data[5])
    }

    /// Spatial cross product for motion vectors: v ×ₘ w
    /// Used in velocity propagation.
    pub fn cross_motion(&self, other: &SpatialVec) -> SpatialVec {
        let w = self.angular();
        let v = self.linear();
        let w2 = other.angular();
        let v2 = other.linear();
        SpatialVec::new(w.cross(&w2), w.cross(&v2) + v.cross(&w2))
    }

    /// Spatial cross product for force vectors: v ×f f
    /// Used in bias force computation.
    pub fn cross_force(&self, other: &SpatialVec) -> SpatialVec {
        let w = self.angular();
        let v = self.linear();
        let t = other.angular();
        let f = other.linear();
        SpatialVec::new(w.cross(&t) + v.cross(&f), w.cross(&f))
    }

    /// Dot product of two spatial vectors (power when pairing motion with force).
    #[inline]
    pub fn dot(&self, other: &SpatialVec) -> f64 {
        self.data.dot(&other.data)
    }
}

impl std::ops::Add for SpatialVec {
    type Output = SpatialVec;
    #[inline]
    fn add(self, rhs: SpatialVec) -> SpatialVec {
        SpatialVec {
            data: self.data + rhs.data,
        }
    }
}

impl std::ops::AddAssign for SpatialVec {
    #[inline]
    fn add_assign(&mut self, rhs: SpatialVec) {
        self.data += rhs.data;
    }
}

impl std::ops::Sub for SpatialVec {
    type Output = SpatialVec;
    #[inline]
    fn sub(self, rhs: SpatialVec) -> SpatialVec {
        SpatialVec {
            data: self.data - rhs.data,
        }
    }
}

impl std::ops::Mul<f64> for SpatialVec {
    type Output = SpatialVec;
    #[inline]
    fn mul(self, rhs: f64) -> SpatialVec {
        SpatialVec {
            data: self.data * rhs,
        }
    }
}

impl std::ops::Neg for SpatialVec {
    type Output = SpatialVec;
    #[inline]
    fn neg(self) -> SpatialVec {
        SpatialVec { data: -self.data }
    }
}

/// 6x6 spatial matrix (inertia, transforms acting on spatial vectors).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialMat {
    pub data: Mat6,
}

impl SpatialMat {
    /// Create from a 6x6 nalgebra matrix.
    #[inline]
    pub fn from_mat6(data: Mat6) -> Self {
        Self { data }
    }

    /// Zero matrix.
    #[inline]
    pub fn zero() -> Self {
        Self {
            data: Mat6::zeros(),
        }
    }

    /// Identity matrix.
    #[inline]
    pub fn identity() -> Self {
        Self {
            data: Mat6::identity(),
        }
    }

    /// Outer product a bᵀ of two spatial vectors.
    #[inline]
    pub fn outer(a: &SpatialVec, b: &SpatialVec) -> Self {
        Self {
            data: a.data * b.data.transpose(),
        }
    }

    /// Multiply by a spatial vector.
    #[inline]
    pub fn mul_vec(&self, v: &SpatialVec) -> SpatialVec {
        SpatialVec {
            data: self.data * v.data,
        }
    }

    /// Matrix-matrix multiply.
    #[inline]
    pub fn mul_mat(&self, other: &SpatialMat) -> SpatialMat {
        SpatialMat {
            data: self.data * other.data,
        }
    }

    /// Transpose.
    #[inline]
    pub fn transpose(&self) -> SpatialMat {
        SpatialMat {
            data: self.data.transpose(),
        }
    }
}

impl std::ops::Add for SpatialMat {
    type Output = SpatialMat;
    #[inline]
    fn add(self, rhs: SpatialMat) -> SpatialMat {
        SpatialMat {
            data: self.data + rhs.data,
        }
    }
}

impl std::ops::AddAssign for SpatialMat {
    #[inline]
    fn add_assign(&mut self, rhs: SpatialMat) {
        self.data += rhs.data;
    }
}

impl std::ops::Sub for SpatialMat {
    type Output = SpatialMat;
    #[inline]
    fn sub(self, rhs: SpatialMat) -> SpatialMat {
        SpatialMat {
            data: self.data - rhs.data,
        }
    }
}

impl std::ops::Mul<f64> for SpatialMat {
    type Output = SpatialMat;
    #[inline]
    fn mul(self, rhs: f64) -> SpatialMat {
        SpatialMat {
            data: self.data * rhs,
        }
    }
}

/// Plücker transform: rigid body transformation acting on spatial vectors.
///
/// Represents a coordinate transform from frame A to frame B.
/// Stored as rotation E and translation r (position of B's origin in A's frame).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialTransform {
    /// Rotation from frame A coordinates to frame B coordinates.
    pub rot: Mat3,
    /// Position of frame B's origin expressed in frame A.
    pub pos: Vec3,
}

impl SpatialTransform {
    /// Create from rotation matrix and translation.
    pub fn new(rot: Mat3, pos: Vec3) -> Self {
        Self { rot, pos }
    }

    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            rot: Mat3::identity(),
            pos: Vec3::zeros(),
        }
    }

    /// Transform into a frame B whose pose in A is given by `orientation`
    /// (B axes expressed in A, i.e. B→A rotation) and `origin`.
    pub fn from_pose(orientation: Mat3, origin: Vec3) -> Self {
        Self {
            rot: orientation.transpose(),
            pos: origin,
        }
    }

    /// Transform from a URDF-style origin: roll/pitch/yaw (fixed XYZ) and xyz.
    pub fn from_rpy_xyz(rpy: Vec3, xyz: Vec3) -> Self {
        let r = na::Rotation3::from_euler_angles(rpy.x, rpy.y, rpy.z);
        Self::from_pose(*r.matrix(), xyz)
    }

    /// Pure rotation about the X axis.
    pub fn rot_x(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            rot: Mat3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c),
            pos: Vec3::zeros(),
        }
    }

    /// Pure rotation about the Z axis.
    pub fn rot_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            rot: Mat3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0),
            pos: Vec3::zeros(),
        }
    }

    /// Pure translation.
    pub fn from_translation(pos: Vec3) -> Self {
        Self {
            rot: Mat3::identity(),
            pos,
        }
    }

    /// Get the 6x6 Plücker transform matrix for motion vectors.
    ///
    /// X = | E      0 |
    ///     | -E[r]× E |
    pub fn to_motion_matrix(&self) -> Mat6 {
        let e = self.rot;
        let neg_erx = -e * skew(&self.pos);

        let mut m = Mat6::zeros();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&e);
        m.fixed_view_mut::<3, 3>(3, 0).copy_from(&neg_erx);
        m.fixed_view_mut::<3, 3>(3, 3).copy_from(&e);
        m
    }

    /// Transform a spatial motion vector from frame A to frame B.
    pub fn apply_motion(&self, v: &SpatialVec) -> SpatialVec {
        let w = v.angular();
        let vel = v.linear();
        let new_w = self.rot * w;
        let new_v = self.rot * (vel - self.pos.cross(&w));
        SpatialVec::new(new_w, new_v)
    }

    /// Transform a spatial force vector from frame A to frame B.
    pub fn apply_force(&self, f: &SpatialVec) -> SpatialVec {
        let tau = f.angular();
        let force = f.linear();
        let new_f = self.rot * force;
        let new_tau = self.rot * (tau - self.pos.cross(&force));
        SpatialVec::new(new_tau, new_f)
    }

    /// Inverse transform a spatial motion vector (from B to A).
    pub fn inv_apply_motion(&self, v: &SpatialVec) -> SpatialVec {
        let rt = self.rot.transpose();
        let w = v.angular();
        let vel = v.linear();
        let new_w = rt * w;
        let new_v = rt * vel + self.pos.cross(&new_w);
        SpatialVec::new(new_w, new_v)
    }

    /// Inverse transform a spatial force vector (from B to A).
    pub fn inv_apply_force(&self, f: &SpatialVec) -> SpatialVec {
        let rt = self.rot.transpose();
        let tau = f.angular();
        let force = f.linear();
        let new_f = rt * force;
        let new_tau = rt * tau + self.pos.cross(&new_f);
        SpatialVec::new(new_tau, new_f)
    }

    /// Express an articulated or rigid inertia given in frame B in frame A:
    /// Xᵀ I X.
    pub fn inertia_to_parent(&self, inertia: &SpatialMat) -> SpatialMat {
        let x = SpatialMat::from_mat6(self.to_motion_matrix());
        x.transpose().mul_mat(inertia).mul_mat(&x)
    }

    /// Compose two transforms: self ∘ other (apply `other` first).
    pub fn compose(&self, other: &SpatialTransform) -> SpatialTransform {
        SpatialTransform {
            rot: self.rot * other.rot,
            pos: other.pos + other.rot.transpose() * self.pos,
        }
    }

    /// Inverse of this transform.
    pub fn inverse(&self) -> SpatialTransform {
        SpatialTransform {
            rot: self.rot.transpose(),
            pos: -(self.rot * self.pos),
        }
    }

    /// Origin of frame B expressed in frame A.
    pub fn origin(&self) -> Vec3 {
        self.pos
    }

    /// Axes of frame B expressed in frame A (the B→A rotation).
    pub fn orientation(&self) -> Mat3 {
        self.rot.transpose()
    }

    /// Map a point given in frame B coordinates to frame A coordinates.
    pub fn point_to_parent(&self, p: &Vec3) -> Vec3 {
        self.rot.transpose() * p + self.pos
    }
}

/// Spatial inertia of a rigid body.
///
/// Stored as mass, center of mass offset (in the body frame), and rotational
/// inertia about the center of mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialInertia {
    /// Mass of the body.
    pub mass: f64,
    /// Center of mass position in body frame.
    pub com: Vec3,
    /// Rotational inertia about the center of mass (3x3 symmetric).
    pub inertia: Mat3,
}

impl SpatialInertia {
    /// Create a spatial inertia with the given mass, CoM offset, and inertia matrix.
    pub fn new(mass: f64, com: Vec3, inertia: Mat3) -> Self {
        Self { mass, com, inertia }
    }

    /// Massless body.
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            com: Vec3::zeros(),
            inertia: Mat3::zeros(),
        }
    }

    /// Create spatial inertia for a point mass at a given position.
    pub fn point_mass(mass: f64, pos: Vec3) -> Self {
        Self {
            mass,
            com: pos,
            inertia: Mat3::zeros(),
        }
    }

    /// Create spatial inertia for a uniform rod of given mass and length along Y axis.
    /// Rod is centered at origin.
    pub fn rod(mass: f64, length: f64) -> Self {
        let i = mass * length * length / 12.0;
        Self {
            mass,
            com: Vec3::zeros(),
            inertia: Mat3::new(i, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, i),
        }
    }

    /// Create spatial inertia for a uniform sphere.
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 2.0 / 5.0 * mass * radius * radius;
        Self {
            mass,
            com: Vec3::zeros(),
            inertia: Mat3::from_diagonal(&Vec3::new(i, i, i)),
        }
    }

    /// Create spatial inertia for a solid box with full edge lengths `size`.
    pub fn cuboid(mass: f64, size: Vec3) -> Self {
        let (x2, y2, z2) = (size.x * size.x, size.y * size.y, size.z * size.z);
        let k = mass / 12.0;
        Self {
            mass,
            com: Vec3::zeros(),
            inertia: Mat3::from_diagonal(&Vec3::new(k * (y2 + z2), k * (x2 + z2), k * (x2 + y2))),
        }
    }

    /// Convert to 6x6 spatial inertia matrix (about the body frame origin).
    ///
    /// I_spatial = | I + m[c]×[c]×ᵀ   m[c]× |
    ///             | m[c]×ᵀ             mE    |
    pub fn to_matrix(&self) -> SpatialMat {
        let cx = skew(&self.com);
        let m = self.mass;

        let mut mat = Mat6::zeros();
        let top_left = self.inertia + cx * cx.transpose() * m;
        mat.fixed_view_mut::<3, 3>(0, 0).copy_from(&top_left);
        let mcx = cx * m;
        mat.fixed_view_mut::<3, 3>(0, 3).copy_from(&mcx);
        mat.fixed_view_mut::<3, 3>(3, 0).copy_from(&mcx.transpose());
        mat.fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&(Mat3::identity() * m));

        SpatialMat::from_mat6(mat)
    }

    /// Re-express this inertia (given in frame B) in frame A, where
    /// `parent_to_self` is the transform A → B.
    ///
    /// Equivalent to Xᵀ I X, computed in closed form so the result stays
    /// exactly symmetric.
    pub fn to_parent_frame(&self, parent_to_self: &SpatialTransform) -> SpatialInertia {
        let et = parent_to_self.rot.transpose();
        SpatialInertia {
            mass: self.mass,
            com: parent_to_self.point_to_parent(&self.com),
            inertia: et * self.inertia * parent_to_self.rot,
        }
    }

    /// Inertia of two bodies rigidly attached, both expressed in the same frame.
    pub fn combine(&self, other: &SpatialInertia) -> SpatialInertia {
        let mass = self.mass + other.mass;
        if mass <= 0.0 {
            return SpatialInertia {
                mass: 0.0,
                com: Vec3::zeros(),
                inertia: self.inertia + other.inertia,
            };
        }
        let com = (self.com * self.mass + other.com * other.mass) / mass;
        let shift = |si: &SpatialInertia| {
            let d = skew(&(si.com - com));
            si.inertia + d * d.transpose() * si.mass
        };
        SpatialInertia {
            mass,
            com,
            inertia: shift(self) + shift(other),
        }
    }

    /// Whether this inertia is physically meaningful: non-negative mass,
    /// symmetric rotational inertia with non-negative principal moments
    /// satisfying the triangle inequality.
    pub fn is_physical(&self) -> bool {
        const TOL: f64 = 1e-9;
        if !(self.mass >= 0.0 && self.mass.is_finite()) {
            return false;
        }
        let asym = (self.inertia - self.inertia.transpose()).abs().max();
        if asym > TOL * (1.0 + self.inertia.abs().max()) {
            return false;
        }
        let eig = self.inertia.symmetric_eigenvalues();
        let (a, b, c) = (eig[0], eig[1], eig[2]);
        a >= -TOL
            && b >= -TOL
            && c >= -TOL
            && a + b >= c - TOL
            && a + c >= b - TOL
            && b + c >= a - TOL
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::quaternion::Quat;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn arb_pos() -> impl Strategy<Value = Vec3> {
        (-10.0..10.0_f64, -10.0..10.0_f64, -10.0..10.0_f64)
            .prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    fn arb_angle() -> impl Strategy<Value = f64> {
        -std::f64::consts::PI..std::f64::consts::PI
    }

    fn arb_unit_axis() -> impl Strategy<Value = na::Unit<Vec3>> {
        (-1.0..1.0_f64, -1.0..1.0_f64, -1.0..1.0_f64)
            .prop_filter("non-zero axis", |(x, y, z)| x * x + y * y + z * z > 0.01)
            .prop_map(|(x, y, z)| na::Unit::new_normalize(Vec3::new(x, y, z)))
    }

    fn arb_transform() -> impl Strategy<Value = SpatialTransform> {
        (arb_unit_axis(), arb_angle(), arb_pos()).prop_map(|(axis, angle, pos)| {
            let rot = na::Rotation3::from_axis_angle(&axis, angle);
            SpatialTransform::new(*rot.matrix(), pos)
        })
    }

    fn arb_spatial_vec() -> impl Strategy<Value = SpatialVec> {
        (arb_pos(), arb_pos()).prop_map(|(a, l)| SpatialVec::new(a, l))
    }

    proptest! {
        #[test]
        fn compose_with_inverse_is_identity(xf in arb_transform()) {
            let result = xf.compose(&xf.inverse());
            let id = SpatialTransform::identity();
            for i in 0..3 {
                for j in 0..3 {
                    prop_assert!((result.rot[(i, j)] - id.rot[(i, j)]).abs() < EPS,
                        "rot[{},{}]: {} vs {}", i, j, result.rot[(i, j)], id.rot[(i, j)]);
                }
            }
            for i in 0..3 {
                prop_assert!((result.pos[i] - id.pos[i]).abs() < EPS,
                    "pos[{}]: {} vs {}", i, result.pos[i], id.pos[i]);
            }
        }

        #[test]
        fn compose_is_associative(
            a in arb_transform(),
            b in arb_transform(),
            c in arb_transform(),
        ) {
            let ab_c = a.compose(&b).compose(&c);
            let a_bc = a.compose(&b.compose(&c));
            for i in 0..3 {
                for j in 0..3 {
                    prop_assert!((ab_c.rot[(i, j)] - a_bc.rot[(i, j)]).abs() < EPS);
                }
            }
            for i in 0..3 {
                prop_assert!((ab_c.pos[i] - a_bc.pos[i]).abs() < 1e-8);
            }
        }

        #[test]
        fn compose_matches_matrix_product(a in arb_transform(), b in arb_transform()) {
            let composed = a.compose(&b).to_motion_matrix();
            let product = a.to_motion_matrix() * b.to_motion_matrix();
            for i in 0..6 {
                for j in 0..6 {
                    prop_assert!((composed[(i, j)] - product[(i, j)]).abs() < 1e-8);
                }
            }
        }

        #[test]
        fn apply_force_matches_transposed_inverse(xf in arb_transform(), f in arb_spatial_vec()) {
            let applied = xf.apply_force(&f);
            let x_star = xf.inverse().to_motion_matrix().transpose();
            let mat_result = SpatialMat::from_mat6(x_star).mul_vec(&f);
            for i in 0..6 {
                prop_assert!((applied.data[i] - mat_result.data[i]).abs() < 1e-8,
                    "component {}: {} vs {}", i, applied.data[i], mat_result.data[i]);
            }
        }

        #[test]
        fn apply_motion_matches_matrix(xf in arb_transform(), v in arb_spatial_vec()) {
            let applied = xf.apply_motion(&v);
            let mat_result = SpatialMat::from_mat6(xf.to_motion_matrix()).mul_vec(&v);
            for i in 0..6 {
                prop_assert!((applied.data[i] - mat_result.data[i]).abs() < 1e-8,
                    "component {}: {} vs {}", i, applied.data[i], mat_result.data[i]);
            }
        }

        #[test]
        fn power_is_frame_invariant(
            xf in arb_transform(),
            v in arb_spatial_vec(),
            f in arb_spatial_vec(),
        ) {
            let p_a = v.dot(&f);
            let p_b = xf.apply_motion(&v).dot(&xf.apply_force(&f));
            prop_assert!((p_a - p_b).abs() < 1e-7 * (1.0 + p_a.abs()));
        }

        #[test]
        fn sphere_inertia_matrix_is_symmetric(
            mass in 0.1..100.0_f64,
            radius in 0.01..10.0_f64,
        ) {
            let si = SpatialInertia::sphere(mass, radius);
            let mat = si.to_matrix().data;
            for i in 0..6 {
                for j in 0..6 {
                    prop_assert!((mat[(i, j)] - mat[(j, i)]).abs() < EPS);
                }
            }
        }

        #[test]
        fn quat_to_matrix_is_rotation(
            axis in arb_unit_axis(),
            angle in arb_angle(),
        ) {
            let q = Quat::from_axis_angle(&axis.into_inner(), angle).normalize();
            let m = q.to_matrix();
            let det = m.determinant();
            prop_assert!((det - 1.0).abs() < EPS, "det = {}", det);
            let rrt = m * m.transpose();
            let id = Mat3::identity();
            for i in 0..3 {
                for j in 0..3 {
                    prop_assert!((rrt[(i, j)] - id[(i, j)]).abs() < EPS);
                }
            }
        }
    }
}

//! Quaternions for orientation coordinates of spherical and free joints.
//!
//! Convention: q = [w; x; y; z], scalar first. A joint quaternion maps
//! child-frame vectors into the parent frame.

use crate::{Mat3, Vec3};

/// Rotation quaternion. Not forced to unit length; call [`Quat::normalize`]
/// after integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    /// Scalar part.
    pub w: f64,
    /// Vector part.
    pub v: Vec3,
}

impl Quat {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self {
            w,
            v: Vec3::new(x, y, z),
        }
    }

    pub fn identity() -> Self {
        Self {
            w: 1.0,
            v: Vec3::zeros(),
        }
    }

    /// Read `[w, x, y, z]` from the first four entries of `s`.
    pub fn from_slice(s: &[f64]) -> Self {
        Self::new(s[0], s[1], s[2], s[3])
    }

    /// Write `[w, x, y, z]` into the first four entries of `out`.
    pub fn write_to(&self, out: &mut [f64]) {
        out[0] = self.w;
        out[1] = self.v.x;
        out[2] = self.v.y;
        out[3] = self.v.z;
    }

    /// Axis must be unit length; angle in radians.
    pub fn from_axis_angle(axis: &Vec3, angle: f64) -> Self {
        let (s, c) = (angle * 0.5).sin_cos();
        Self { w: c, v: *axis * s }
    }

    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.v.norm_squared()).sqrt()
    }

    /// Unit-length copy. A near-zero quaternion collapses to identity.
    pub fn normalize(&self) -> Self {
        let n = self.norm();
        if n < 1e-12 {
            return Self::identity();
        }
        Self {
            w: self.w / n,
            v: self.v / n,
        }
    }

    /// Hamilton product `self * other`.
    pub fn mul(&self, other: &Quat) -> Quat {
        Quat {
            w: self.w * other.w - self.v.dot(&other.v),
            v: self.v.cross(&other.v) + other.v * self.w + self.v * other.w,
        }
    }

    /// Rotate a vector by this (unit) quaternion.
    pub fn rotate(&self, p: &Vec3) -> Vec3 {
        let t = self.v.cross(p) * 2.0;
        p + t * self.w + self.v.cross(&t)
    }

    /// Rotation matrix of this (unit) quaternion.
    pub fn to_matrix(&self) -> Mat3 {
        let (w, x, y, z) = (self.w, self.v.x, self.v.y, self.v.z);
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);

        Mat3::new(
            1.0 - 2.0 * (yy + zz),
            2.0 * (xy - wz),
            2.0 * (xz + wy),
            2.0 * (xy + wz),
            1.0 - 2.0 * (xx + zz),
            2.0 * (yz - wx),
            2.0 * (xz - wy),
            2.0 * (yz + wx),
            1.0 - 2.0 * (xx + yy),
        )
    }

    /// Exponential map from a rotation vector θu to a unit quaternion.
    pub fn exp(w: &Vec3) -> Quat {
        let theta = w.norm();
        if theta < 1e-10 {
            return Quat {
                w: 1.0,
                v: *w * 0.5,
            }
            .normalize();
        }
        let (s, c) = (theta * 0.5).sin_cos();
        Quat {
            w: c,
            v: *w * (s / theta),
        }
    }

    /// Advance an orientation by a body-frame angular velocity over `dt`:
    /// q ⊗ exp(ω dt), renormalized.
    pub fn integrate_body(&self, omega_body: &Vec3, dt: f64) -> Quat {
        self.mul(&Quat::exp(&(omega_body * dt))).normalize()
    }
}

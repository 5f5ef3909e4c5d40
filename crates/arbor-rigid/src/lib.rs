//! Featherstone articulated rigid-body dynamics.
//!
//! Implements:
//! - Forward kinematics
//! - Articulated Body Algorithm (ABA) for forward dynamics
//! - Recursive Newton-Euler Algorithm (RNEA) for inverse dynamics
//! - Composite Rigid Body Algorithm (CRBA) for the mass matrix
//! - Link Jacobians and mechanical energy
//!
//! Gravity enters every algorithm as a bias force `I_i · (X_i0 [0; g])` on
//! each link; the world frame itself never accelerates.

pub mod aba;
pub mod crba;
pub mod energy;
pub mod jacobian;
pub mod kinematics;
pub mod rnea;

pub use aba::{AbaOutput, aba, aba_with_external_forces};
pub use crba::crba;
pub use energy::{center_of_mass, kinetic_energy, potential_energy, total_energy};
pub use jacobian::link_jacobian;
pub use kinematics::{LinkKinematics, forward_kinematics};
pub use rnea::{rnea, rnea_with_external_forces};

use arbor_math::{DMat, DVec, Mat6, SpatialMat, SpatialVec, Vec3};
use arbor_model::Model;

/// Gravity as a world-frame spatial acceleration.
fn gravity_acceleration(model: &Model) -> SpatialVec {
    SpatialVec::new(Vec3::zeros(), model.gravity)
}

fn external_force(ext: Option<&[SpatialVec]>, link: usize) -> SpatialVec {
    ext.map_or_else(SpatialVec::zero, |f| f[link])
}

fn to_dvec(v: &SpatialVec) -> DVec {
    DVec::from_column_slice(v.data.as_slice())
}

fn to_spatial(v: &DVec) -> SpatialVec {
    SpatialVec::from_slice(v.as_slice())
}

fn to_dmat(m: &SpatialMat) -> DMat {
    DMat::from_column_slice(6, 6, m.data.as_slice())
}

fn to_spatial_mat(m: &DMat) -> SpatialMat {
    SpatialMat::from_mat6(Mat6::from_column_slice(m.as_slice()))
}

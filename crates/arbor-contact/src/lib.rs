//! Compliant contact model for arbor.
//!
//! Contacts are supplied per step as plain [`ContactPoint`]s (world-frame
//! position, outward normal, penetration depth, link). A spring-damper law
//! produces the normal force and a regularized Coulomb law the friction;
//! each point force is mapped to generalized coordinates through the
//! transpose of its link's Jacobian.

pub mod params;
pub mod solver;
pub mod terrain;

pub use params::ContactParams;
pub use solver::{
    ContactForces, PointForce, contact_forces, generalized_from_link_wrench, point_force,
};
pub use terrain::FlatTerrain;

use arbor_math::Vec3;
use serde::{Deserialize, Serialize};

/// One externally detected contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    /// Contact location in world coordinates.
    pub position: Vec3,
    /// Outward surface normal (pointing away from the obstacle, into the link).
    pub normal: Vec3,
    /// Penetration depth; non-positive means no contact.
    pub depth: f64,
    /// Index of the link in contact.
    pub link: usize,
}

impl ContactPoint {
    pub fn new(position: Vec3, normal: Vec3, depth: f64, link: usize) -> Self {
        Self {
            position,
            normal,
            depth,
            link,
        }
    }
}

//! Flat ground plane producing contacts from link collision points.

use crate::ContactPoint;
use arbor_math::Vec3;
use arbor_model::Model;
use arbor_rigid::LinkKinematics;
use serde::{Deserialize, Serialize};

/// Horizontal plane `z = height` with normal `+z`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatTerrain {
    pub height: f64,
}

impl FlatTerrain {
    pub fn new(height: f64) -> Self {
        Self { height }
    }

    /// Contacts for every collision point below the plane.
    pub fn contacts(&self, model: &Model, kin: &LinkKinematics) -> Vec<ContactPoint> {
        let mut out = Vec::new();
        for (i, link) in model.links.iter().enumerate() {
            for p in &link.collision_points {
                let world = kin.point_to_world(i, p);
                let depth = self.height - world.z;
                if depth > 0.0 {
                    out.push(ContactPoint::new(world, Vec3::z(), depth, i));
                }
            }
        }
        out
    }
}

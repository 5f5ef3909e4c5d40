//! Rigid links of the kinematic tree.

use arbor_math::{SpatialInertia, Vec3};

/// A rigid link. Link `i` is attached to its parent through joint `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub name: String,
    /// Spatial inertia in the link frame.
    pub inertia: SpatialInertia,
    /// Parent link index, `None` for the root (attached to the world).
    pub parent: Option<usize>,
    /// Points (link frame) that may touch terrain.
    pub collision_points: Vec<Vec3>,
}

impl Link {
    pub fn new(name: impl Into<String>, parent: Option<usize>, inertia: SpatialInertia) -> Self {
        Self {
            name: name.into(),
            inertia,
            parent,
            collision_points: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

//! Forward kinematics: link transforms and velocities.

use arbor_math::{Mat3, SpatialTransform, SpatialVec, Vec3};
use arbor_model::{Model, Result, State};

/// Per-link kinematic quantities for one configuration.
#[derive(Debug, Clone)]
pub struct LinkKinematics {
    /// Parent frame → link frame.
    pub x_tree: Vec<SpatialTransform>,
    /// World frame → link frame.
    pub x_world: Vec<SpatialTransform>,
    /// Link spatial velocity in link coordinates.
    pub velocities: Vec<SpatialVec>,
    /// Velocity-product acceleration `v × S q̇` in link coordinates.
    pub bias_accelerations: Vec<SpatialVec>,
}

impl LinkKinematics {
    pub fn nlinks(&self) -> usize {
        self.x_tree.len()
    }

    /// Link origin in world coordinates.
    pub fn position(&self, link: usize) -> Vec3 {
        self.x_world[link].origin()
    }

    /// Link axes in world coordinates (link → world rotation).
    pub fn orientation(&self, link: usize) -> Mat3 {
        self.x_world[link].orientation()
    }

    /// Map a point from link coordinates to world coordinates.
    pub fn point_to_world(&self, link: usize, p: &Vec3) -> Vec3 {
        self.x_world[link].point_to_parent(p)
    }

    /// Link spatial velocity expressed in world coordinates.
    pub fn world_velocity(&self, link: usize) -> SpatialVec {
        self.x_world[link].inv_apply_motion(&self.velocities[link])
    }

    /// World-frame linear velocity of the material point of `link` currently
    /// at `p_world`.
    pub fn point_velocity(&self, link: usize, p_world: &Vec3) -> Vec3 {
        let v = self.world_velocity(link);
        v.linear() + v.angular().cross(p_world)
    }

    /// Spatial force on `link`, in link coordinates, of a world-frame force
    /// `f` acting at the world point `p_world`.
    pub fn wrench_at_point(&self, link: usize, p_world: &Vec3, f: &Vec3) -> SpatialVec {
        let world = SpatialVec::new(p_world.cross(f), *f);
        self.x_world[link].apply_force(&world)
    }
}

/// Compute link transforms and spatial velocities in one top-down pass.
///
/// Child transform = joint motion ∘ fixed joint placement ∘ parent transform;
/// child velocity = transformed parent velocity + S q̇.
pub fn forward_kinematics(model: &Model, state: &State) -> Result<LinkKinematics> {
    model.check_state(state)?;

    let nl = model.nlinks();
    let mut kin = LinkKinematics {
        x_tree: Vec::with_capacity(nl),
        x_world: Vec::with_capacity(nl),
        velocities: Vec::with_capacity(nl),
        bias_accelerations: Vec::with_capacity(nl),
    };
    let q = state.q.as_slice();
    let v = state.v.as_slice();

    for i in model.topological_order() {
        let joint = &model.joints[i];
        let qi = &q[model.q_offsets[i]..model.q_offsets[i] + joint.nq()];
        let vi = &v[model.v_offsets[i]..model.v_offsets[i] + joint.ndof()];

        let x_tree = joint.joint_transform(qi).compose(&joint.parent_to_joint);
        let v_joint = joint.joint_velocity(vi);

        let (x_world, vel) = match model.parent(i) {
            None => (x_tree, v_joint),
            Some(p) => (
                x_tree.compose(&kin.x_world[p]),
                x_tree.apply_motion(&kin.velocities[p]) + v_joint,
            ),
        };

        kin.bias_accelerations.push(vel.cross_motion(&v_joint));
        kin.x_tree.push(x_tree);
        kin.x_world.push(x_world);
        kin.velocities.push(vel);
    }

    Ok(kin)
}

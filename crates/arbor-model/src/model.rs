//! Immutable kinematic tree shared by every instance.

use crate::error::check_dim;
use crate::{Error, Joint, JointLimits, Link, Result, State};
use arbor_math::{DMat, DVec, GRAVITY, SpatialInertia, SpatialTransform, Vec3};
use tracing::debug;

/// Kinematic tree stored as flat arrays in topological order.
///
/// Link `i` hangs from `links[i].parent` through `joints[i]`; every parent
/// index is smaller than its child's, so a forward sweep visits parents first.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub links: Vec<Link>,
    pub joints: Vec<Joint>,
    /// Gravity vector in world frame.
    pub gravity: Vec3,
    /// Total number of position coordinates.
    pub nq: usize,
    /// Total number of velocity DOFs.
    pub nv: usize,
    /// Position offset for each joint.
    pub q_offsets: Vec<usize>,
    /// Velocity offset for each joint.
    pub v_offsets: Vec<usize>,
}

impl Model {
    pub fn nlinks(&self) -> usize {
        self.links.len()
    }

    pub fn parent(&self, link: usize) -> Option<usize> {
        self.links[link].parent
    }

    /// Motion subspace (6 × ndof) of joint `i`, derived from the joint itself.
    pub fn motion_subspace(&self, i: usize) -> DMat {
        self.joints[i].motion_subspace_matrix()
    }

    /// Link indices with every parent before its children.
    pub fn topological_order(&self) -> std::ops::Range<usize> {
        0..self.links.len()
    }

    /// Link indices with every child before its parent.
    pub fn reverse_topological_order(&self) -> std::iter::Rev<std::ops::Range<usize>> {
        (0..self.links.len()).rev()
    }

    /// `link`, then its parent, up to the root.
    pub fn ancestors(&self, link: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(link), move |&i| self.links[i].parent)
    }

    pub fn link_index(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|l| l.name == name)
    }

    pub fn total_mass(&self) -> f64 {
        self.links.iter().map(|l| l.inertia.mass).sum()
    }

    /// Same topology and joint kinds, so states of one are valid for the other.
    pub fn is_isomorphic(&self, other: &Model) -> bool {
        self.links.len() == other.links.len()
            && self
                .links
                .iter()
                .zip(&other.links)
                .all(|(a, b)| a.parent == b.parent)
            && self
                .joints
                .iter()
                .zip(&other.joints)
                .all(|(a, b)| a.joint_type == b.joint_type)
    }

    /// State at rest in the neutral configuration.
    pub fn default_state(&self) -> State {
        let mut state = State::new(self.nq, self.nv);
        let q = state.q.as_mut_slice();
        for (joint, &off) in self.joints.iter().zip(&self.q_offsets) {
            joint.neutral_configuration(&mut q[off..off + joint.nq()]);
        }
        state
    }

    /// Check that `state` matches this model's dimensions.
    pub fn check_state(&self, state: &State) -> Result<()> {
        check_dim("q", self.nq, state.q.len())?;
        check_dim("v", self.nv, state.v.len())
    }

    /// Configuration reached from `q` by moving with velocity `v` for `dt`,
    /// joint by joint (orientations compose on the unit-quaternion manifold).
    pub fn integrate_configuration(&self, q: &DVec, v: &DVec, dt: f64) -> Result<DVec> {
        check_dim("q", self.nq, q.len())?;
        check_dim("v", self.nv, v.len())?;
        let mut out = q.clone();
        let (q, v) = (q.as_slice(), v.as_slice());
        let dst = out.as_mut_slice();
        for (i, joint) in self.joints.iter().enumerate() {
            let (qo, vo) = (self.q_offsets[i], self.v_offsets[i]);
            joint.integrate_configuration(
                &q[qo..qo + joint.nq()],
                &v[vo..vo + joint.ndof()],
                dt,
                &mut dst[qo..qo + joint.nq()],
            );
        }
        Ok(out)
    }

    /// Indices of joints whose position or speed is outside their limits.
    pub fn limit_violations(&self, state: &State) -> Result<Vec<usize>> {
        self.check_state(state)?;
        Ok(self
            .joints
            .iter()
            .enumerate()
            .filter(|(i, joint)| {
                let q = &state.q.as_slice()[self.q_offsets[*i]..];
                let v = &state.v.as_slice()[self.v_offsets[*i]..];
                !joint.within_limits(q, v)
            })
            .map(|(i, _)| i)
            .collect())
    }
}

/// Builder for constructing models link by link.
pub struct ModelBuilder {
    name: String,
    links: Vec<Link>,
    joints: Vec<Joint>,
    gravity: Vec3,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            links: Vec::new(),
            joints: Vec::new(),
            gravity: Vec3::new(0.0, 0.0, -GRAVITY),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the gravity vector.
    pub fn gravity(mut self, g: Vec3) -> Self {
        self.gravity = g;
        self
    }

    /// Add a link attached to `parent` (or the world) through `joint`.
    ///
    /// `parent` must refer to a link added earlier.
    pub fn add_link(
        mut self,
        name: &str,
        parent: Option<usize>,
        joint: Joint,
        inertia: SpatialInertia,
    ) -> Self {
        let joint = if joint.name.is_empty() {
            joint.named(format!("{name}_joint"))
        } else {
            joint
        };
        self.joints.push(joint);
        self.links.push(Link::new(name, parent, inertia));
        self
    }

    pub fn add_revolute_link(
        self,
        name: &str,
        parent: Option<usize>,
        parent_to_joint: SpatialTransform,
        axis: Vec3,
        inertia: SpatialInertia,
    ) -> Self {
        self.add_link(name, parent, Joint::revolute(parent_to_joint, axis), inertia)
    }

    pub fn add_prismatic_link(
        self,
        name: &str,
        parent: Option<usize>,
        parent_to_joint: SpatialTransform,
        axis: Vec3,
        inertia: SpatialInertia,
    ) -> Self {
        self.add_link(name, parent, Joint::prismatic(parent_to_joint, axis), inertia)
    }

    pub fn add_spherical_link(
        self,
        name: &str,
        parent: Option<usize>,
        parent_to_joint: SpatialTransform,
        inertia: SpatialInertia,
    ) -> Self {
        self.add_link(name, parent, Joint::spherical(parent_to_joint), inertia)
    }

    pub fn add_free_link(
        self,
        name: &str,
        parent: Option<usize>,
        parent_to_joint: SpatialTransform,
        inertia: SpatialInertia,
    ) -> Self {
        self.add_link(name, parent, Joint::free(parent_to_joint), inertia)
    }

    pub fn add_fixed_link(
        self,
        name: &str,
        parent: Option<usize>,
        parent_to_joint: SpatialTransform,
        inertia: SpatialInertia,
    ) -> Self {
        self.add_link(name, parent, Joint::fixed(parent_to_joint), inertia)
    }

    /// Attach collision points (link frame) to the most recently added link.
    pub fn collision_points(mut self, points: Vec<Vec3>) -> Self {
        if let Some(link) = self.links.last_mut() {
            link.collision_points.extend(points);
        }
        self
    }

    /// Set damping on the most recently added joint.
    pub fn damping(mut self, damping: f64) -> Self {
        if let Some(joint) = self.joints.last_mut() {
            joint.damping = damping;
        }
        self
    }

    /// Set limits on the most recently added joint.
    pub fn limits(mut self, limits: JointLimits) -> Self {
        if let Some(joint) = self.joints.last_mut() {
            joint.limits = Some(limits);
        }
        self
    }

    /// Validate and build the model.
    pub fn build(mut self) -> Result<Model> {
        if self.links.is_empty() {
            return Err(Error::invalid_model("model has no links"));
        }
        let roots = self.links.iter().filter(|l| l.is_root()).count();
        if roots != 1 || !self.links[0].is_root() {
            return Err(Error::invalid_model(format!(
                "expected exactly one root as the first link, found {roots}"
            )));
        }
        for (i, (link, joint)) in self.links.iter().zip(self.joints.iter_mut()).enumerate() {
            if let Some(p) = link.parent.filter(|&p| p >= i) {
                return Err(Error::invalid_model(format!(
                    "link '{}' has parent {p}, which is not an earlier link",
                    link.name
                )));
            }
            if !link.inertia.is_physical() {
                return Err(Error::invalid_model(format!(
                    "link '{}' has non-physical inertia",
                    link.name
                )));
            }
            validate_joint(joint)?;
        }

        let mut nq = 0;
        let mut nv = 0;
        let mut q_offsets = Vec::with_capacity(self.joints.len());
        let mut v_offsets = Vec::with_capacity(self.joints.len());
        for joint in &self.joints {
            q_offsets.push(nq);
            v_offsets.push(nv);
            nq += joint.nq();
            nv += joint.ndof();
        }

        debug!(
            name = %self.name,
            links = self.links.len(),
            nq,
            nv,
            "built model"
        );

        Ok(Model {
            name: self.name,
            links: self.links,
            joints: self.joints,
            gravity: self.gravity,
            nq,
            nv,
            q_offsets,
            v_offsets,
        })
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks a joint's parameters against its kind and normalizes its axis.
fn validate_joint(joint: &mut Joint) -> Result<()> {
    use crate::JointType;
    match joint.joint_type {
        JointType::Revolute | JointType::Prismatic => {
            let n = joint.axis.norm();
            if !(n > 1e-12 && n.is_finite()) {
                return Err(Error::invalid_model(format!(
                    "joint '{}' needs a non-zero axis",
                    joint.name
                )));
            }
            joint.axis /= n;
        }
        JointType::Spherical | JointType::Free | JointType::Fixed => {
            if joint.limits.is_some() {
                return Err(Error::invalid_model(format!(
                    "joint '{}' of kind {:?} cannot carry scalar limits",
                    joint.name, joint.joint_type
                )));
            }
        }
    }
    if !(joint.damping >= 0.0) {
        return Err(Error::invalid_model(format!(
            "joint '{}' has negative damping",
            joint.name
        )));
    }
    if let Some(lim) = joint.limits.filter(|l| !(l.lower <= l.upper)) {
        return Err(Error::invalid_model(format!(
            "joint '{}' has lower limit {} above upper limit {}",
            joint.name, lim.lower, lim.upper
        )));
    }
    Ok(())
}

//! Contact force computation and mapping to generalized coordinates.

use crate::{ContactParams, ContactPoint};
use arbor_math::{DVec, SpatialVec, Vec3};
use arbor_model::{Error, Model, Result};
use arbor_rigid::LinkKinematics;
use tracing::trace;

/// Output of [`contact_forces`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContactForces {
    /// Generalized force Σ Jᵀ f over all contacts, length `nv`.
    pub generalized: DVec,
    /// Normal force magnitude per contact.
    pub normal: Vec<f64>,
    /// Tangential (friction) force magnitude per contact.
    pub tangential: Vec<f64>,
    /// World-frame force applied at each contact point.
    pub forces: Vec<Vec3>,
}

impl ContactForces {
    fn empty(nv: usize) -> Self {
        Self {
            generalized: DVec::zeros(nv),
            normal: Vec::new(),
            tangential: Vec::new(),
            forces: Vec::new(),
        }
    }

    /// Largest normal force over all contacts (0 with no contacts).
    pub fn max_normal(&self) -> f64 {
        self.normal.iter().copied().fold(0.0, f64::max)
    }
}

/// Contact force at a single point, split into its components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointForce {
    /// Normal force magnitude (≥ 0).
    pub normal: f64,
    /// Friction force magnitude (≤ μ · normal).
    pub friction: f64,
    /// Total world-frame force on the link.
    pub force: Vec3,
}

impl PointForce {
    const ZERO: PointForce = PointForce {
        normal: 0.0,
        friction: 0.0,
        force: Vec3::new(0.0, 0.0, 0.0),
    };
}

/// Force on the link at one contact, given the world-frame velocity of the
/// contact point. Contacts without penetration or with a zero normal exert
/// no force.
pub fn point_force(
    contact: &ContactPoint,
    point_velocity: &Vec3,
    params: &ContactParams,
) -> PointForce {
    let n_norm = contact.normal.norm();
    if contact.depth <= 0.0 || n_norm < 1e-12 {
        return PointForce::ZERO;
    }
    let n = contact.normal / n_norm;
    let vn = n.dot(point_velocity);
    let depth_rate = -vn;
    let f_n = (params.stiffness * contact.depth + params.damping * depth_rate).max(0.0);

    let v_t = point_velocity - n * vn;
    let denom = (v_t.norm_squared() + params.regularization * params.regularization).sqrt();
    let f_t = if denom > 0.0 {
        v_t * (-params.friction * f_n / denom)
    } else {
        Vec3::zeros()
    };

    PointForce {
        normal: f_n,
        friction: f_t.norm(),
        force: n * f_n + f_t,
    }
}

/// Compute compliant contact forces and their generalized equivalent.
///
/// Each contact's wrench is mapped through the transpose of its link's
/// Jacobian by walking the support chain, so the cost scales with the number
/// of contacts and their chain depths, not with the tree size.
pub fn contact_forces(
    model: &Model,
    kin: &LinkKinematics,
    contacts: &[ContactPoint],
    params: &ContactParams,
) -> Result<ContactForces> {
    check_kinematics(model, kin)?;
    let mut out = ContactForces::empty(model.nv);
    if contacts.is_empty() {
        return Ok(out);
    }
    out.normal.reserve(contacts.len());
    out.tangential.reserve(contacts.len());
    out.forces.reserve(contacts.len());

    for contact in contacts {
        check_link(model, "contact link index", contact.link)?;
        let v_p = kin.point_velocity(contact.link, &contact.position);
        let pf = point_force(contact, &v_p, params);
        out.normal.push(pf.normal);
        out.tangential.push(pf.friction);
        out.forces.push(pf.force);

        let f = pf.force;
        if f != Vec3::zeros() {
            let wrench_link = kin.wrench_at_point(contact.link, &contact.position, &f);
            accumulate_link_wrench(model, kin, contact.link, wrench_link, &mut out.generalized);
        }
    }

    trace!(contacts = contacts.len(), max_normal = out.max_normal(), "contact forces");
    Ok(out)
}

/// Generalized force `Jᵀ f` for a spatial force `wrench` acting on `link`
/// (link coordinates).
pub fn generalized_from_link_wrench(
    model: &Model,
    kin: &LinkKinematics,
    link: usize,
    wrench: &SpatialVec,
) -> Result<DVec> {
    check_kinematics(model, kin)?;
    check_link(model, "wrench link index", link)?;
    let mut tau = DVec::zeros(model.nv);
    accumulate_link_wrench(model, kin, link, *wrench, &mut tau);
    Ok(tau)
}

fn check_kinematics(model: &Model, kin: &LinkKinematics) -> Result<()> {
    if kin.nlinks() != model.nlinks() {
        return Err(Error::ShapeMismatch {
            what: "kinematics links",
            expected: model.nlinks(),
            actual: kin.nlinks(),
        });
    }
    Ok(())
}

fn check_link(model: &Model, what: &'static str, link: usize) -> Result<()> {
    if link >= model.nlinks() {
        return Err(Error::ShapeMismatch {
            what,
            expected: model.nlinks(),
            actual: link,
        });
    }
    Ok(())
}

fn accumulate_link_wrench(
    model: &Model,
    kin: &LinkKinematics,
    link: usize,
    mut f: SpatialVec,
    tau: &mut DVec,
) {
    for j in model.ancestors(link) {
        let s = model.motion_subspace(j);
        let off = model.v_offsets[j];
        for k in 0..s.ncols() {
            tau[off + k] += (0..6).map(|r| s[(r, k)] * f.data[r]).sum::<f64>();
        }
        f = kin.x_tree[j].inv_apply_force(&f);
    }
}

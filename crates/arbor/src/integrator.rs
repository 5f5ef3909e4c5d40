//! Time integration of `(q, v)` under ABA accelerations.
//!
//! Positions always advance through [`Model::integrate_configuration`], so
//! spherical and free-joint orientations stay on the unit-quaternion
//! manifold whichever scheme is used.

use crate::config::Integrator;
use arbor_contact::{ContactForces, ContactParams, ContactPoint, contact_forces};
use arbor_math::{DVec, SpatialVec};
use arbor_model::{Model, Result, State};
use arbor_rigid::{aba_with_external_forces, forward_kinematics};

/// Result of one integration step.
pub(crate) struct Advance {
    pub state: State,
    /// Contact forces at the start of the step.
    pub contact: ContactForces,
    pub degenerate_joints: Vec<usize>,
}

/// Inputs held constant over a step.
pub(crate) struct Inputs<'a> {
    pub tau: &'a DVec,
    pub contacts: &'a [ContactPoint],
    pub params: &'a ContactParams,
    /// Per-link spatial forces in link coordinates.
    pub external: Option<&'a [SpatialVec]>,
}

struct Evaluation {
    qdd: DVec,
    contact: ContactForces,
    degenerate_joints: Vec<usize>,
}

fn evaluate(model: &Model, state: &State, inputs: &Inputs<'_>) -> Result<Evaluation> {
    let kin = forward_kinematics(model, state)?;
    let contact = contact_forces(model, &kin, inputs.contacts, inputs.params)?;
    let tau = inputs.tau + &contact.generalized;
    let out = aba_with_external_forces(model, state, &tau, inputs.external)?;
    Ok(Evaluation {
        qdd: out.qdd,
        contact,
        degenerate_joints: out.degenerate_joints,
    })
}

pub(crate) fn merge(into: &mut Vec<usize>, from: &[usize]) {
    for &j in from {
        if !into.contains(&j) {
            into.push(j);
        }
    }
}

impl Integrator {
    /// Advance `state` by `dt`.
    pub(crate) fn advance(
        self,
        model: &Model,
        state: &State,
        inputs: &Inputs<'_>,
        dt: f64,
    ) -> Result<Advance> {
        model.check_state(state)?;
        match self {
            Integrator::SemiImplicitEuler => {
                let e = evaluate(model, state, inputs)?;
                let v = &state.v + &e.qdd * dt;
                let q = model.integrate_configuration(&state.q, &v, dt)?;
                Ok(Advance {
                    state: next_state(state, q, v, dt),
                    contact: e.contact,
                    degenerate_joints: e.degenerate_joints,
                })
            }
            Integrator::ExplicitEuler => {
                let e = evaluate(model, state, inputs)?;
                let q = model.integrate_configuration(&state.q, &state.v, dt)?;
                let v = &state.v + &e.qdd * dt;
                Ok(Advance {
                    state: next_state(state, q, v, dt),
                    contact: e.contact,
                    degenerate_joints: e.degenerate_joints,
                })
            }
            Integrator::Rk4 => rk4(model, state, inputs, dt),
        }
    }
}

/// Each stage position is reached from `q0` along the previous stage's
/// velocity; the final position moves along the weighted mean velocity.
fn rk4(model: &Model, state: &State, inputs: &Inputs<'_>, dt: f64) -> Result<Advance> {
    let k1 = evaluate(model, state, inputs)?;
    let mut degenerate = k1.degenerate_joints.clone();

    let stage = |v_prev: &DVec, a_prev: &DVec, h: f64| -> Result<State> {
        let v = &state.v + a_prev * h;
        let q = model.integrate_configuration(&state.q, v_prev, h)?;
        Ok(State {
            q,
            v,
            time: state.time + h,
        })
    };

    let s2 = stage(&state.v, &k1.qdd, 0.5 * dt)?;
    let k2 = evaluate(model, &s2, inputs)?;
    merge(&mut degenerate, &k2.degenerate_joints);

    let s3 = stage(&s2.v, &k2.qdd, 0.5 * dt)?;
    let k3 = evaluate(model, &s3, inputs)?;
    merge(&mut degenerate, &k3.degenerate_joints);

    let s4 = stage(&s3.v, &k3.qdd, dt)?;
    let k4 = evaluate(model, &s4, inputs)?;
    merge(&mut degenerate, &k4.degenerate_joints);

    let v_mean = (&state.v + &s2.v * 2.0 + &s3.v * 2.0 + &s4.v) / 6.0;
    let a_mean = (&k1.qdd + &k2.qdd * 2.0 + &k3.qdd * 2.0 + &k4.qdd) / 6.0;
    let q = model.integrate_configuration(&state.q, &v_mean, dt)?;
    let v = &state.v + a_mean * dt;
    degenerate.sort_unstable();

    Ok(Advance {
        state: next_state(state, q, v, dt),
        contact: k1.contact,
        degenerate_joints: degenerate,
    })
}

fn next_state(prev: &State, q: DVec, v: DVec, dt: f64) -> State {
    State {
        q,
        v,
        time: prev.time + dt,
    }
}

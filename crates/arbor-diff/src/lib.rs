//! Step Jacobians by finite differences.
//!
//! Every dynamics operation in arbor is plain linear algebra, so a host with
//! its own autodiff can differentiate through it directly. These central
//! differences are the reference those gradients are checked against.

use arbor_math::{DMat, DVec};
use arbor_model::{Error, Model, Result, State, check_dim};
use arbor_rigid::aba;

/// Jacobians of one step `(q, v, τ) → (q', v')`.
#[derive(Debug, Clone)]
pub struct StepJacobians {
    /// ∂q'/∂q (nq × nq)
    pub dqnext_dq: DMat,
    /// ∂q'/∂v (nq × nv)
    pub dqnext_dv: DMat,
    /// ∂v'/∂q (nv × nq)
    pub dvnext_dq: DMat,
    /// ∂v'/∂v (nv × nv)
    pub dvnext_dv: DMat,
    /// ∂v'/∂τ (nv × nv)
    pub dvnext_dtau: DMat,
}

/// One semi-implicit Euler step: `v' = v + dt·q̈`, then `q' = q ⊕ v'·dt`.
pub fn semi_implicit_step(
    model: &Model,
    state: &State,
    tau: &DVec,
    dt: f64,
) -> Result<(DVec, DVec)> {
    let qdd = aba(model, state, tau)?.qdd;
    let v_next = &state.v + qdd * dt;
    let q_next = model.integrate_configuration(&state.q, &v_next, dt)?;
    Ok((q_next, v_next))
}

/// Central-difference Jacobians of [`semi_implicit_step`] with step `eps`.
///
/// Quaternion coordinates are perturbed without renormalization; the step
/// renormalizes orientations, so the q-columns of those coordinates describe
/// the step's response off the unit sphere.
pub fn finite_diff_jacobians(
    model: &Model,
    state: &State,
    tau: &DVec,
    dt: f64,
    eps: f64,
) -> Result<StepJacobians> {
    model.check_state(state)?;
    check_dim("tau", model.nv, tau.len())?;
    finite_diff_jacobians_with(state, tau, eps, |s, t| semi_implicit_step(model, s, t, dt))
}

/// Central-difference Jacobians of an arbitrary step `(state, τ) → (q', v')`.
///
/// `step` is called `2·(nq + 2·nv)` times; dimensions come from `state` and
/// `tau`, so the caller validates them against its model.
pub fn finite_diff_jacobians_with<F>(
    state: &State,
    tau: &DVec,
    eps: f64,
    step: F,
) -> Result<StepJacobians>
where
    F: Fn(&State, &DVec) -> Result<(DVec, DVec)>,
{
    if !(eps > 0.0 && eps.is_finite()) {
        return Err(Error::InvalidConfig(format!(
            "finite-difference step must be positive, got {eps}"
        )));
    }
    let (nq, nv, nu) = (state.q.len(), state.v.len(), tau.len());
    let inv_2eps = 1.0 / (2.0 * eps);

    let mut dqnext_dq = DMat::zeros(nq, nq);
    let mut dvnext_dq = DMat::zeros(nv, nq);
    for j in 0..nq {
        let mut plus = state.clone();
        plus.q[j] += eps;
        let mut minus = state.clone();
        minus.q[j] -= eps;
        let (qp, vp) = step(&plus, tau)?;
        let (qm, vm) = step(&minus, tau)?;
        dqnext_dq.set_column(j, &((qp - qm) * inv_2eps));
        dvnext_dq.set_column(j, &((vp - vm) * inv_2eps));
    }

    let mut dqnext_dv = DMat::zeros(nq, nv);
    let mut dvnext_dv = DMat::zeros(nv, nv);
    for j in 0..nv {
        let mut plus = state.clone();
        plus.v[j] += eps;
        let mut minus = state.clone();
        minus.v[j] -= eps;
        let (qp, vp) = step(&plus, tau)?;
        let (qm, vm) = step(&minus, tau)?;
        dqnext_dv.set_column(j, &((qp - qm) * inv_2eps));
        dvnext_dv.set_column(j, &((vp - vm) * inv_2eps));
    }

    let mut dvnext_dtau = DMat::zeros(nv, nu);
    for j in 0..nu {
        let mut plus = tau.clone();
        plus[j] += eps;
        let mut minus = tau.clone();
        minus[j] -= eps;
        let (_, vp) = step(state, &plus)?;
        let (_, vm) = step(state, &minus)?;
        dvnext_dtau.set_column(j, &((vp - vm) * inv_2eps));
    }

    Ok(StepJacobians {
        dqnext_dq,
        dqnext_dv,
        dvnext_dq,
        dvnext_dv,
        dvnext_dtau,
    })
}

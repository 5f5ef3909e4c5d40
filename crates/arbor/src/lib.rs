//! arbor: batched articulated rigid-body dynamics.
//!
//! This is the umbrella crate that provides the [`Simulator`] and
//! [`BatchSim`] drivers and re-exports the core types from the sub-crates.
//!
//! One step runs kinematics, turns contacts into generalized forces, solves
//! forward dynamics with ABA (applied + contact + gravity + Coriolis), and
//! integrates.

pub mod batch;
pub mod config;
pub mod diagnostics;
mod integrator;

pub use batch::{BatchSim, BatchSnapshot};
pub use config::{Integrator, SimulationConfig};
pub use diagnostics::StepDiagnostics;

pub use arbor_contact::{self, ContactForces, ContactParams, ContactPoint, FlatTerrain};
pub use arbor_diff::{self, StepJacobians, finite_diff_jacobians, finite_diff_jacobians_with};
pub use arbor_math::{self, DMat, DVec, SpatialInertia, SpatialTransform, SpatialVec, Vec3};
pub use arbor_model::{
    self, Error, Joint, JointType, Model, ModelBuilder, ModelDescription, Result, State,
};
pub use arbor_rigid::{self, AbaOutput, LinkKinematics, aba, crba, forward_kinematics, rnea};

use arbor_model::check_dim;
use arbor_rigid::{kinetic_energy, potential_energy};
use integrator::{Inputs, merge};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::trace;

/// Single-instance simulation driver over a shared model.
#[derive(Debug, Clone)]
pub struct Simulator {
    model: Arc<Model>,
    config: SimulationConfig,
}

impl Simulator {
    pub fn new(model: Arc<Model>, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { model, config })
    }

    /// Simulator with default settings.
    pub fn with_defaults(model: Arc<Model>) -> Self {
        Self {
            model,
            config: SimulationConfig::default(),
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Neutral configuration at rest, time zero.
    pub fn reset(&self) -> State {
        self.model.default_state()
    }

    /// Advance one step of the configured `dt`.
    pub fn step(
        &self,
        state: &State,
        tau: &DVec,
        contacts: &[ContactPoint],
    ) -> Result<(State, StepDiagnostics)> {
        self.advance(state, tau, contacts, None, self.config.dt)
    }

    /// Advance one step of the configured `dt` with a spatial force on every
    /// link (link coordinates, one entry per link) held for the whole step.
    pub fn step_with_external_forces(
        &self,
        state: &State,
        tau: &DVec,
        contacts: &[ContactPoint],
        external: &[SpatialVec],
    ) -> Result<(State, StepDiagnostics)> {
        self.advance(state, tau, contacts, Some(external), self.config.dt)
    }

    /// Advance one step of length `dt`, split into the configured sub-steps.
    ///
    /// `contacts` are held fixed for the whole step; terrain contacts, when
    /// configured, are regenerated at every sub-step.
    pub fn step_with_dt(
        &self,
        state: &State,
        tau: &DVec,
        contacts: &[ContactPoint],
        dt: f64,
    ) -> Result<(State, StepDiagnostics)> {
        self.advance(state, tau, contacts, None, dt)
    }

    fn advance(
        &self,
        state: &State,
        tau: &DVec,
        contacts: &[ContactPoint],
        external: Option<&[SpatialVec]>,
        dt: f64,
    ) -> Result<(State, StepDiagnostics)> {
        let model = self.model.as_ref();
        model.check_state(state)?;
        check_dim("tau", model.nv, tau.len())?;
        if let Some(ext) = external {
            check_dim("external_forces", model.nlinks(), ext.len())?;
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(Error::InvalidConfig(format!("dt must be positive, got {dt}")));
        }

        let h = dt / self.config.substeps as f64;
        let mut current = state.clone();
        let mut degenerate = Vec::new();
        let mut contact = None;
        for _ in 0..self.config.substeps {
            let active = self.active_contacts(&current, contacts)?;
            let inputs = Inputs {
                tau,
                contacts: &active,
                params: &self.config.contact,
                external,
            };
            let adv = self.config.integrator.advance(model, &current, &inputs, h)?;
            merge(&mut degenerate, &adv.degenerate_joints);
            current = adv.state;
            contact = Some(adv.contact);
        }
        degenerate.sort_unstable();

        let kin = forward_kinematics(model, &current)?;
        let (contact_normal, contact_tangential) =
            contact.map_or_else(Default::default, |c| (c.normal, c.tangential));
        let diag = StepDiagnostics {
            kinetic_energy: kinetic_energy(model, &kin),
            potential_energy: potential_energy(model, &kin),
            contact_normal,
            contact_tangential,
            degenerate_joints: degenerate,
            limit_violations: model.limit_violations(&current)?,
        };
        trace!(
            time = current.time,
            energy = diag.total_energy(),
            contacts = diag.contact_normal.len(),
            "step"
        );
        Ok((current, diag))
    }

    fn active_contacts<'a>(
        &self,
        state: &State,
        contacts: &'a [ContactPoint],
    ) -> Result<Cow<'a, [ContactPoint]>> {
        match &self.config.terrain {
            None => Ok(Cow::Borrowed(contacts)),
            Some(terrain) => {
                let kin = forward_kinematics(&self.model, state)?;
                let mut all = contacts.to_vec();
                all.extend(terrain.contacts(&self.model, &kin));
                Ok(Cow::Owned(all))
            }
        }
    }

    /// Step once per control, returning the state after each step.
    pub fn rollout(&self, state: &State, controls: &[DVec]) -> Result<Vec<State>> {
        let mut trajectory = Vec::with_capacity(controls.len());
        let mut current = state.clone();
        for tau in controls {
            current = self.step(&current, tau, &[])?.0;
            trajectory.push(current.clone());
        }
        Ok(trajectory)
    }

    /// Joint accelerations for applied forces `tau` (no contacts).
    pub fn forward_dynamics(&self, state: &State, tau: &DVec) -> Result<AbaOutput> {
        aba(&self.model, state, tau)
    }

    /// Generalized forces producing accelerations `qdd`.
    pub fn inverse_dynamics(&self, state: &State, qdd: &DVec) -> Result<DVec> {
        rnea(&self.model, state, qdd)
    }

    /// Central-difference Jacobians of [`Simulator::step`] as configured:
    /// its integrator, sub-steps and terrain, with `contacts` held fixed.
    pub fn step_jacobians(
        &self,
        state: &State,
        tau: &DVec,
        contacts: &[ContactPoint],
        eps: f64,
    ) -> Result<StepJacobians> {
        self.model.check_state(state)?;
        check_dim("tau", self.model.nv, tau.len())?;
        finite_diff_jacobians_with(state, tau, eps, |s, t| {
            let (next, _) = self.step(s, t, contacts)?;
            Ok((next.q, next.v))
        })
    }
}

//! Batched simulation: B independent instances over one tree or a stack of
//! isomorphic trees.
//!
//! Instances never read each other's state, so stepping is data-parallel
//! across the batch (rayon when the `parallel` feature is enabled, a plain
//! loop otherwise, identical results either way). Output for instance `i`
//! equals [`Simulator::step`] run on that instance alone.

use crate::{Simulator, SimulationConfig, StepDiagnostics};
use arbor_contact::ContactPoint;
use arbor_math::batch::{
    apply_force_all, apply_motion_all, compose_all, inverse_all, split_rows, stack_rows,
};
use arbor_math::{DMat, DVec, SpatialTransform, SpatialVec};
use arbor_model::{Error, Model, Result, State, check_dim};
use arbor_rigid::{AbaOutput, LinkKinematics, forward_kinematics};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Row-major persisted layout of a batch.
///
/// `q` is `[batch, nq]` and `v` is `[batch, nv]`, each instance's coordinates
/// in topological joint order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub batch: usize,
    pub nq: usize,
    pub nv: usize,
    /// Simulation time per instance.
    pub time: Vec<f64>,
    pub q: Vec<f64>,
    pub v: Vec<f64>,
}

/// B instances stepped together.
///
/// Holds either one simulator shared by every instance or one simulator per
/// instance over isomorphic trees (for per-instance inertias).
#[derive(Debug, Clone)]
pub struct BatchSim {
    sims: Vec<Simulator>,
    states: Vec<State>,
}

impl BatchSim {
    /// `batch` instances of `model`, all at the neutral configuration.
    pub fn new(model: Arc<Model>, config: SimulationConfig, batch: usize) -> Result<Self> {
        let sim = Simulator::new(model, config)?;
        let states = vec![sim.reset(); batch];
        Ok(Self { sims: vec![sim], states })
    }

    /// One instance per model. Every model must share the first one's
    /// topology and joint kinds.
    pub fn stacked(models: Vec<Arc<Model>>, config: SimulationConfig) -> Result<Self> {
        let Some(first) = models.first().cloned() else {
            return Err(Error::InvalidModel("stacked batch needs at least one model".into()));
        };
        if let Some(i) = models.iter().position(|m| !first.is_isomorphic(m)) {
            return Err(Error::InvalidModel(format!(
                "model {i} ({}) is not isomorphic to model 0 ({})",
                models[i].name, first.name
            )));
        }
        debug!(batch = models.len(), model = %first.name, "stacked batch");
        let sims = models
            .into_iter()
            .map(|m| Simulator::new(m, config.clone()))
            .collect::<Result<Vec<_>>>()?;
        let states = sims.iter().map(Simulator::reset).collect();
        Ok(Self { sims, states })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn is_stacked(&self) -> bool {
        self.sims.len() > 1
    }

    /// Simulator driving instance `i`.
    pub fn simulator(&self, i: usize) -> &Simulator {
        sim_for(&self.sims, i)
    }

    pub fn model(&self, i: usize) -> &Model {
        self.simulator(i).model()
    }

    pub fn nq(&self) -> usize {
        self.sims[0].model().nq
    }

    pub fn nv(&self) -> usize {
        self.sims[0].model().nv
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, i: usize) -> Option<&State> {
        self.states.get(i)
    }

    pub fn state_mut(&mut self, i: usize) -> Option<&mut State> {
        self.states.get_mut(i)
    }

    /// Reset to `batch` instances at the neutral configuration. A stacked
    /// batch keeps its size, so `batch` must equal its length.
    pub fn reset(&mut self, batch: usize) -> Result<()> {
        if self.is_stacked() {
            check_batch("batch size", self.sims.len(), batch)?;
        }
        let sims = &self.sims;
        self.states = (0..batch).map(|i| sim_for(sims, i).reset()).collect();
        Ok(())
    }

    /// Reset the instances where `mask[i]` is true; the rest are untouched.
    /// Entries past the batch length are ignored.
    pub fn reset_where(&mut self, mask: &[bool]) {
        let sims = &self.sims;
        for (i, state) in self.states.iter_mut().enumerate() {
            if mask.get(i).copied().unwrap_or(false) {
                *state = sim_for(sims, i).reset();
            }
        }
    }

    /// Step every instance once with its applied forces and contacts.
    ///
    /// `contacts` is either empty (no external contacts anywhere) or holds
    /// one list per instance. The batch is left untouched if any instance
    /// fails.
    pub fn step(
        &mut self,
        tau: &[DVec],
        contacts: &[Vec<ContactPoint>],
    ) -> Result<Vec<StepDiagnostics>> {
        self.step_instances(tau, contacts, &[])
    }

    /// [`BatchSim::step`] with per-link spatial forces (link coordinates).
    ///
    /// `external` holds one list per instance, each with one force per link.
    pub fn step_with_external_forces(
        &mut self,
        tau: &[DVec],
        contacts: &[Vec<ContactPoint>],
        external: &[Vec<SpatialVec>],
    ) -> Result<Vec<StepDiagnostics>> {
        check_batch("external force lists", self.len(), external.len())?;
        self.step_instances(tau, contacts, external)
    }

    fn step_instances(
        &mut self,
        tau: &[DVec],
        contacts: &[Vec<ContactPoint>],
        external: &[Vec<SpatialVec>],
    ) -> Result<Vec<StepDiagnostics>> {
        check_batch("applied forces", self.len(), tau.len())?;
        if !contacts.is_empty() {
            check_batch("contact lists", self.len(), contacts.len())?;
        }
        let sims = &self.sims;
        let step_one = |(i, state): (usize, &State)| {
            let c = contacts.get(i).map_or(&[][..], Vec::as_slice);
            let sim = sim_for(sims, i);
            match external.get(i) {
                Some(ext) => sim.step_with_external_forces(state, &tau[i], c, ext),
                None => sim.step(state, &tau[i], c),
            }
        };

        #[cfg(feature = "parallel")]
        let results: Result<Vec<(State, StepDiagnostics)>> = {
            use rayon::prelude::*;
            self.states.par_iter().enumerate().map(step_one).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let results: Result<Vec<(State, StepDiagnostics)>> =
            self.states.iter().enumerate().map(step_one).collect();

        let (states, diags): (Vec<_>, Vec<_>) = results?.into_iter().unzip();
        for (i, d) in diags.iter().enumerate().filter(|(_, d)| d.is_degenerate()) {
            warn!(instance = i, joints = ?d.degenerate_joints, "degenerate articulated inertia");
        }
        self.states = states;
        Ok(diags)
    }

    /// Joint accelerations per instance for applied forces `tau`.
    pub fn forward_dynamics(&self, tau: &[DVec]) -> Result<Vec<AbaOutput>> {
        check_batch("applied forces", self.len(), tau.len())?;
        self.map_instances(|i, sim, state| sim.forward_dynamics(state, &tau[i]))
    }

    /// Generalized forces per instance producing accelerations `qdd`.
    pub fn inverse_dynamics(&self, qdd: &[DVec]) -> Result<Vec<DVec>> {
        check_batch("accelerations", self.len(), qdd.len())?;
        self.map_instances(|i, sim, state| sim.inverse_dynamics(state, &qdd[i]))
    }

    fn map_instances<T, F>(&self, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize, &Simulator, &State) -> Result<T> + Sync,
    {
        let sims = &self.sims;
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.states
                .par_iter()
                .enumerate()
                .map(|(i, s)| f(i, sim_for(sims, i), s))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.states
                .iter()
                .enumerate()
                .map(|(i, s)| f(i, sim_for(sims, i), s))
                .collect()
        }
    }

    /// World → link transform of `link` in every instance.
    pub fn link_transforms(&self, link: usize) -> Result<Vec<SpatialTransform>> {
        Ok(self.link_kinematics(link)?.iter().map(|k| k.x_world[link]).collect())
    }

    /// Link → world pose of `link` in every instance.
    pub fn link_poses(&self, link: usize) -> Result<Vec<SpatialTransform>> {
        Ok(inverse_all(&self.link_transforms(link)?))
    }

    /// Spatial velocity of `link` in world coordinates, per instance.
    pub fn link_world_velocities(&self, link: usize) -> Result<Vec<SpatialVec>> {
        let kins = self.link_kinematics(link)?;
        let x: Vec<SpatialTransform> = kins.iter().map(|k| k.x_world[link]).collect();
        let v: Vec<SpatialVec> = kins.iter().map(|k| k.velocities[link]).collect();
        Ok(apply_motion_all(&inverse_all(&x), &v)?)
    }

    /// Transform from link `from`'s frame to link `to`'s frame, per instance.
    pub fn relative_transforms(&self, from: usize, to: usize) -> Result<Vec<SpatialTransform>> {
        let x_from = self.link_transforms(from)?;
        let x_to = self.link_transforms(to)?;
        Ok(compose_all(&x_to, &inverse_all(&x_from))?)
    }

    /// Express one world-frame spatial force per instance in `link`
    /// coordinates, ready for [`BatchSim::step_with_external_forces`].
    pub fn world_wrenches_to_link(
        &self,
        link: usize,
        wrenches: &[SpatialVec],
    ) -> Result<Vec<SpatialVec>> {
        check_batch("wrenches", self.len(), wrenches.len())?;
        Ok(apply_force_all(&self.link_transforms(link)?, wrenches)?)
    }

    fn link_kinematics(&self, link: usize) -> Result<Vec<LinkKinematics>> {
        let nlinks = self.sims[0].model().nlinks();
        if link >= nlinks {
            return Err(Error::ShapeMismatch {
                what: "link index",
                expected: nlinks,
                actual: link,
            });
        }
        self.map_instances(|_, sim, state| forward_kinematics(sim.model(), state))
    }

    /// Positions as a `[batch, nq]` matrix.
    pub fn positions(&self) -> Result<DMat> {
        let rows: Vec<DVec> = self.states.iter().map(|s| s.q.clone()).collect();
        Ok(stack_rows(&rows)?)
    }

    /// Velocities as a `[batch, nv]` matrix.
    pub fn velocities(&self) -> Result<DMat> {
        let rows: Vec<DVec> = self.states.iter().map(|s| s.v.clone()).collect();
        Ok(stack_rows(&rows)?)
    }

    /// Replace every instance's positions from a `[batch, nq]` matrix.
    pub fn set_positions(&mut self, q: &DMat) -> Result<()> {
        let rows = self.checked_rows("position rows", "q", self.nq(), q)?;
        for (state, row) in self.states.iter_mut().zip(rows) {
            state.q = row;
        }
        Ok(())
    }

    /// Replace every instance's velocities from a `[batch, nv]` matrix.
    pub fn set_velocities(&mut self, v: &DMat) -> Result<()> {
        let rows = self.checked_rows("velocity rows", "v", self.nv(), v)?;
        for (state, row) in self.states.iter_mut().zip(rows) {
            state.v = row;
        }
        Ok(())
    }

    fn checked_rows(
        &self,
        rows_what: &'static str,
        cols_what: &'static str,
        ncols: usize,
        m: &DMat,
    ) -> Result<Vec<DVec>> {
        check_batch(rows_what, self.len(), m.nrows())?;
        check_dim(cols_what, ncols, m.ncols())?;
        Ok(split_rows(m, self.len())?)
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        BatchSnapshot {
            batch: self.len(),
            nq: self.nq(),
            nv: self.nv(),
            time: self.states.iter().map(|s| s.time).collect(),
            q: self.states.iter().flat_map(|s| s.q.iter().copied()).collect(),
            v: self.states.iter().flat_map(|s| s.v.iter().copied()).collect(),
        }
    }

    /// Replace every instance's state from `snap`. A stacked batch only
    /// accepts snapshots of its own size.
    pub fn restore(&mut self, snap: &BatchSnapshot) -> Result<()> {
        check_dim("nq", self.nq(), snap.nq)?;
        check_dim("nv", self.nv(), snap.nv)?;
        if self.is_stacked() {
            check_batch("batch size", self.sims.len(), snap.batch)?;
        }
        check_batch("snapshot times", snap.batch, snap.time.len())?;
        check_batch("snapshot positions", snap.batch * snap.nq, snap.q.len())?;
        check_batch("snapshot velocities", snap.batch * snap.nv, snap.v.len())?;

        self.states = (0..snap.batch)
            .map(|i| State {
                q: DVec::from_column_slice(&snap.q[i * snap.nq..(i + 1) * snap.nq]),
                v: DVec::from_column_slice(&snap.v[i * snap.nv..(i + 1) * snap.nv]),
                time: snap.time[i],
            })
            .collect();
        Ok(())
    }
}

fn sim_for(sims: &[Simulator], i: usize) -> &Simulator {
    if sims.len() == 1 { &sims[0] } else { &sims[i] }
}

fn check_batch(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            what,
            expected,
            actual,
        })
    }
}

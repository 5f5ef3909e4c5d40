//! Simulation settings.

use arbor_contact::{ContactParams, FlatTerrain};
use arbor_model::{Error, Result};
use serde::{Deserialize, Serialize};

/// Time-integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integrator {
    /// Velocity first, then position with the new velocity.
    #[default]
    SemiImplicitEuler,
    /// Position with the old velocity, then velocity.
    ExplicitEuler,
    /// Classical fourth-order Runge-Kutta.
    Rk4,
}

/// Settings shared by every instance a simulator steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Step size (s).
    pub dt: f64,
    /// Integrator sub-steps per step; supplied contacts are held fixed
    /// across them.
    pub substeps: usize,
    pub integrator: Integrator,
    pub contact: ContactParams,
    /// Ground plane turned into contacts from link collision points.
    pub terrain: Option<FlatTerrain>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.001,
            substeps: 1,
            integrator: Integrator::SemiImplicitEuler,
            contact: ContactParams::default(),
            terrain: None,
        }
    }
}

impl SimulationConfig {
    /// 240 Hz control loop with four sub-steps and ground at z = 0.
    pub fn realtime() -> Self {
        Self {
            dt: 1.0 / 240.0,
            substeps: 4,
            terrain: Some(FlatTerrain::default()),
            ..Self::default()
        }
    }

    /// Small RK4 steps for reference trajectories.
    pub fn high_fidelity() -> Self {
        Self {
            dt: 1e-4,
            integrator: Integrator::Rk4,
            ..Self::default()
        }
    }

    /// Coarse steps with soft ground, for fast rollouts.
    pub fn fast() -> Self {
        Self {
            dt: 0.005,
            contact: ContactParams::soft(),
            terrain: Some(FlatTerrain::default()),
            ..Self::default()
        }
    }

    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_substeps(mut self, substeps: usize) -> Self {
        self.substeps = substeps;
        self
    }

    pub fn with_integrator(mut self, integrator: Integrator) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn with_contact(mut self, contact: ContactParams) -> Self {
        self.contact = contact;
        self
    }

    pub fn with_terrain(mut self, terrain: FlatTerrain) -> Self {
        self.terrain = Some(terrain);
        self
    }

    /// Duration of one sub-step.
    pub fn substep_dt(&self) -> f64 {
        self.dt / self.substeps as f64
    }

    pub fn validate(&self) -> Result<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(Error::InvalidConfig(format!("dt must be positive, got {}", self.dt)));
        }
        if self.substeps == 0 {
            return Err(Error::InvalidConfig("substeps must be at least 1".into()));
        }
        let c = &self.contact;
        if c.stiffness < 0.0 || c.damping < 0.0 || c.friction < 0.0 {
            return Err(Error::InvalidConfig(
                "contact stiffness, damping and friction must be non-negative".into(),
            ));
        }
        if c.regularization <= 0.0 {
            return Err(Error::InvalidConfig(
                "friction regularization must be positive".into(),
            ));
        }
        Ok(())
    }
}

//! Per-step diagnostics.

use serde::{Deserialize, Serialize};

/// What one step observed besides the new state.
///
/// Singular articulated-inertia blocks are reported here rather than as
/// errors: the affected joints were held locked for the step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDiagnostics {
    /// Kinetic energy after the step.
    pub kinetic_energy: f64,
    /// Gravitational potential energy after the step.
    pub potential_energy: f64,
    /// Normal force magnitude per contact (last sub-step).
    pub contact_normal: Vec<f64>,
    /// Friction force magnitude per contact (last sub-step).
    pub contact_tangential: Vec<f64>,
    /// Joints locked because their reduced inertia was singular.
    pub degenerate_joints: Vec<usize>,
    /// Joints outside their position or velocity limits after the step.
    pub limit_violations: Vec<usize>,
}

impl StepDiagnostics {
    pub fn total_energy(&self) -> f64 {
        self.kinetic_energy + self.potential_energy
    }

    pub fn is_degenerate(&self) -> bool {
        !self.degenerate_joints.is_empty()
    }

    pub fn max_contact_force(&self) -> f64 {
        self.contact_normal.iter().copied().fold(0.0, f64::max)
    }
}

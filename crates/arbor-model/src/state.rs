//! Simulation state, the only data that changes between steps.

use arbor_math::DVec;
use serde::{Deserialize, Serialize};

/// Generalized positions and velocities of one instance.
///
/// Layout follows the model's joint order: joint `i` owns
/// `q[q_offsets[i]..][..nq_i]` and `v[v_offsets[i]..][..nv_i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub q: DVec,
    pub v: DVec,
    /// Simulation time (s).
    pub time: f64,
}

impl State {
    /// All-zero state. Orientation quaternions are *not* valid until the
    /// model writes its neutral configuration; prefer `Model::default_state`.
    pub fn new(nq: usize, nv: usize) -> Self {
        Self {
            q: DVec::zeros(nq),
            v: DVec::zeros(nv),
            time: 0.0,
        }
    }

    pub fn from_parts(q: DVec, v: DVec) -> Self {
        Self { q, v, time: 0.0 }
    }

    pub fn nq(&self) -> usize {
        self.q.len()
    }

    pub fn nv(&self) -> usize {
        self.v.len()
    }
}

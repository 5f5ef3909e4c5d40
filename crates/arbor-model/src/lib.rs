//! Model and state types for the arbor dynamics engine.
//!
//! `Model` is the immutable kinematic tree (topology, inertias, joint kinds),
//! shared read-only by every simulated instance. `State` is the per-instance
//! generalized position and velocity.

pub mod description;
pub mod error;
pub mod joint;
pub mod link;
pub mod model;
pub mod state;

pub use description::{JointDescription, LinkDescription, ModelDescription};
pub use error::{Error, Result, check_dim};
pub use joint::{Joint, JointLimits, JointType};
pub use link::Link;
pub use model::{Model, ModelBuilder};
pub use state::State;

//! Error types shared by every crate above the math layer.

use arbor_math::MathError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The model description or builder input does not form a valid tree.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// A per-instance vector does not match the model dimensions.
    #[error("invalid state: {what} has length {actual}, expected {expected}")]
    InvalidState {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A caller-supplied batched array does not match the batch layout.
    #[error("shape mismatch: {what} has {actual} entries, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Simulation settings outside their valid range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Math(#[from] MathError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_model(msg: impl Into<String>) -> Self {
        Error::InvalidModel(msg.into())
    }
}

/// Ok when `actual == expected`, else [`Error::InvalidState`].
pub fn check_dim(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::InvalidState {
            what,
            expected,
            actual,
        })
    }
}

//! Contact law parameters.

use serde::{Deserialize, Serialize};

/// Parameters of the compliant contact law.
///
/// Normal force `f_n = max(0, k·d + c·ḋ)`; tangential force
/// `f_t = -μ f_n v_t / sqrt(|v_t|² + ε²)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactParams {
    /// Contact stiffness k (N/m).
    pub stiffness: f64,
    /// Contact damping c (N·s/m).
    pub damping: f64,
    /// Coefficient of friction μ (dimensionless).
    pub friction: f64,
    /// Friction regularization speed ε (m/s).
    pub regularization: f64,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            stiffness: 10_000.0,
            damping: 100.0,
            friction: 0.5,
            regularization: 1e-3,
        }
    }
}

impl ContactParams {
    pub fn new(stiffness: f64, damping: f64, friction: f64) -> Self {
        Self {
            stiffness,
            damping,
            friction,
            ..Self::default()
        }
    }

    /// Compliant ground (low stiffness, deeper penetration).
    pub fn soft() -> Self {
        Self {
            stiffness: 1_000.0,
            damping: 30.0,
            ..Self::default()
        }
    }

    /// Frictionless contact.
    pub fn frictionless() -> Self {
        Self {
            friction: 0.0,
            ..Self::default()
        }
    }

    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let p: ContactParams = serde_json::from_str(r#"{ "friction": 1.0 }"#).unwrap();
        assert_eq!(p.friction, 1.0);
        assert_eq!(p.stiffness, ContactParams::default().stiffness);
        assert_eq!(p.regularization, 1e-3);
    }
}

//! Energy computation for rigid body systems.

use crate::kinematics::{LinkKinematics, forward_kinematics};
use arbor_math::Vec3;
use arbor_model::{Model, Result, State};

/// Kinetic energy Σ ½ vᵢᵀ Iᵢ vᵢ over links.
pub fn kinetic_energy(model: &Model, kin: &LinkKinematics) -> f64 {
    model
        .links
        .iter()
        .zip(&kin.velocities)
        .map(|(link, v)| 0.5 * v.dot(&link.inertia.to_matrix().mul_vec(v)))
        .sum()
}

/// Gravitational potential energy, PE = -Σ mᵢ gᵀ c_i with c_i the world CoM
/// of link i.
pub fn potential_energy(model: &Model, kin: &LinkKinematics) -> f64 {
    model
        .links
        .iter()
        .enumerate()
        .map(|(i, link)| {
            let com = kin.point_to_world(i, &link.inertia.com);
            -link.inertia.mass * model.gravity.dot(&com)
        })
        .sum()
}

/// Whole-model center of mass in world coordinates.
pub fn center_of_mass(model: &Model, kin: &LinkKinematics) -> Vec3 {
    let total = model.total_mass();
    if total <= 0.0 {
        return Vec3::zeros();
    }
    let weighted: Vec3 = model
        .links
        .iter()
        .enumerate()
        .map(|(i, link)| kin.point_to_world(i, &link.inertia.com) * link.inertia.mass)
        .sum();
    weighted / total
}

/// Total mechanical energy (kinetic + potential).
pub fn total_energy(model: &Model, state: &State) -> Result<f64> {
    let kin = forward_kinematics(model, state)?;
    Ok(kinetic_energy(model, &kin) + potential_energy(model, &kin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crba::crba;
    use crate::fixtures::{double_pendulum, mixed_tree, sample_state};
    use arbor_math::GRAVITY;
    use approx::assert_relative_eq;

    #[test]
    fn test_kinetic_energy_matches_mass_matrix() {
        let model = mixed_tree();
        let state = sample_state(&model);
        let kin = forward_kinematics(&model, &state).unwrap();
        let m = crba(&model, &state).unwrap();
        let expected = 0.5 * state.v.dot(&(&m * &state.v));
        assert_relative_eq!(kinetic_energy(&model, &kin), expected, epsilon = 1e-10);
    }

    #[test]
    fn test_pendulum_potential_energy() {
        let model = double_pendulum();
        let state = model.default_state();
        let kin = forward_kinematics(&model, &state).unwrap();
        // Masses at z = -1 and z = -2.
        assert_relative_eq!(potential_energy(&model, &kin), -3.0 * GRAVITY, epsilon = 1e-12);
        assert_relative_eq!(
            center_of_mass(&model, &kin),
            Vec3::new(0.0, 0.0, -1.5),
            epsilon = 1e-12
        );
        assert_relative_eq!(total_energy(&model, &state).unwrap(), -3.0 * GRAVITY, epsilon = 1e-12);
    }
}

//! Integration tests for the arbor dynamics engine.

use approx::assert_relative_eq;
use arbor::{
    BatchSim, BatchSnapshot, ContactParams, DVec, Error, FlatTerrain, Integrator, Model,
    ModelBuilder, SimulationConfig, Simulator, State,
    arbor_math::{GRAVITY, Mat3, SpatialInertia, SpatialTransform, Vec3},
    arbor_model::{JointDescription, JointLimits, JointType, LinkDescription, ModelDescription},
    arbor_rigid::total_energy,
};
use std::sync::Arc;

fn floating_box() -> Arc<Model> {
    Arc::new(
        ModelBuilder::new()
            .name("box")
            .add_free_link(
                "box",
                None,
                SpatialTransform::identity(),
                SpatialInertia::cuboid(2.0, Vec3::new(0.2, 0.3, 0.4)),
            )
            .build()
            .unwrap(),
    )
}

/// 1 kg ball of radius 0.1 with a single collision point at its bottom.
fn ball() -> Arc<Model> {
    Arc::new(
        ModelBuilder::new()
            .name("ball")
            .add_free_link(
                "ball",
                None,
                SpatialTransform::identity(),
                SpatialInertia::sphere(1.0, 0.1),
            )
            .collision_points(vec![Vec3::new(0.0, 0.0, -0.1)])
            .build()
            .unwrap(),
    )
}

/// Uniform rod of length 1 m hanging along -z, swinging about y.
fn compound_pendulum() -> Arc<Model> {
    let (mass, length) = (1.0, 1.0);
    let i = mass * length * length / 12.0;
    Arc::new(
        ModelBuilder::new()
            .add_revolute_link(
                "rod",
                None,
                SpatialTransform::identity(),
                Vec3::y(),
                SpatialInertia::new(
                    mass,
                    Vec3::new(0.0, 0.0, -length / 2.0),
                    Mat3::from_diagonal(&Vec3::new(i, i, 0.0)),
                ),
            )
            .build()
            .unwrap(),
    )
}

fn double_pendulum() -> Arc<Model> {
    let tip = Vec3::new(0.0, 0.0, -1.0);
    Arc::new(
        ModelBuilder::new()
            .add_revolute_link(
                "upper",
                None,
                SpatialTransform::identity(),
                Vec3::y(),
                SpatialInertia::point_mass(1.0, tip),
            )
            .add_revolute_link(
                "lower",
                Some(0),
                SpatialTransform::from_translation(tip),
                Vec3::y(),
                SpatialInertia::point_mass(1.0, tip),
            )
            .build()
            .unwrap(),
    )
}

/// Free torso with a spherical hip, damped revolute knee, limited slider
/// and a fixed sensor.
fn humanoid_leg() -> Arc<Model> {
    Arc::new(
        ModelBuilder::new()
            .name("leg")
            .add_free_link(
                "torso",
                None,
                SpatialTransform::identity(),
                SpatialInertia::cuboid(5.0, Vec3::new(0.3, 0.2, 0.5)),
            )
            .add_spherical_link(
                "thigh",
                Some(0),
                SpatialTransform::from_translation(Vec3::new(0.1, 0.0, -0.25)),
                SpatialInertia::cuboid(2.0, Vec3::new(0.1, 0.1, 0.4)),
            )
            .add_revolute_link(
                "shin",
                Some(1),
                SpatialTransform::from_translation(Vec3::new(0.0, 0.0, -0.4)),
                Vec3::y(),
                SpatialInertia::cuboid(1.5, Vec3::new(0.08, 0.08, 0.4)),
            )
            .damping(0.05)
            .add_prismatic_link(
                "slider",
                Some(0),
                SpatialTransform::from_translation(Vec3::new(0.0, 0.1, 0.2)),
                Vec3::x(),
                SpatialInertia::sphere(0.5, 0.05),
            )
            .limits(JointLimits::new(-0.2, 0.2))
            .add_fixed_link(
                "sensor",
                Some(2),
                SpatialTransform::from_translation(Vec3::new(0.0, 0.0, -0.4)),
                SpatialInertia::sphere(0.1, 0.02),
            )
            .build()
            .unwrap(),
    )
}

fn sample_state(model: &Model) -> State {
    let q0 = model.default_state().q;
    let dir = DVec::from_fn(model.nv, |i, _| (0.7 * i as f64 + 0.3).sin());
    let q = model.integrate_configuration(&q0, &dir, 0.5).unwrap();
    let v = DVec::from_fn(model.nv, |i, _| 0.4 * (1.3 * i as f64).cos());
    State::from_parts(q, v)
}

#[test]
fn free_fall_accelerates_at_g_for_any_batch_size() {
    for batch in [1, 4, 16] {
        let mut sim = BatchSim::new(floating_box(), SimulationConfig::default(), batch).unwrap();
        for i in 0..batch {
            sim.state_mut(i).unwrap().q[2] = 1.0 + i as f64;
        }
        let tau = vec![DVec::zeros(6); batch];
        for out in sim.forward_dynamics(&tau).unwrap() {
            assert_relative_eq!(
                out.qdd,
                DVec::from_row_slice(&[0.0, 0.0, 0.0, 0.0, 0.0, -GRAVITY]),
                epsilon = 1e-12
            );
        }
        sim.step(&tau, &[]).unwrap();
        for s in sim.states() {
            assert_relative_eq!(s.v[5], -GRAVITY * 0.001, epsilon = 1e-12);
        }
    }
}

#[test]
fn inverse_then_forward_dynamics_roundtrip() {
    let model = humanoid_leg();
    let sim = Simulator::with_defaults(model.clone());
    let state = sample_state(&model);
    let qdd = DVec::from_fn(model.nv, |i, _| (0.9 * i as f64).sin() - 0.2);
    let tau = sim.inverse_dynamics(&state, &qdd).unwrap();
    let out = sim.forward_dynamics(&state, &tau).unwrap();
    assert!(out.degenerate_joints.is_empty());
    assert_relative_eq!(out.qdd, qdd, epsilon = 1e-8);
}

#[test]
fn batch_instances_do_not_interact() {
    let config = SimulationConfig::default().with_terrain(FlatTerrain::default());
    let model = ball();
    let mut x = model.default_state();
    x.q[2] = 0.3;
    x.v[3] = 1.0;
    let mut y = model.default_state();
    y.q[2] = 0.095;
    y.v[2] = 2.0;
    let tau_x = DVec::from_row_slice(&[0.0, 0.1, 0.0, 0.0, 0.0, 0.0]);
    let tau_y = DVec::from_row_slice(&[0.0, 0.0, 0.0, 0.5, 0.0, 3.0]);

    let run = |states: Vec<State>, tau: Vec<DVec>| {
        let mut sim = BatchSim::new(model.clone(), config.clone(), states.len()).unwrap();
        for (i, s) in states.into_iter().enumerate() {
            *sim.state_mut(i).unwrap() = s;
        }
        for _ in 0..200 {
            sim.step(&tau, &[]).unwrap();
        }
        sim.states().to_vec()
    };

    let both = run(vec![x.clone(), y.clone()], vec![tau_x.clone(), tau_y.clone()]);
    let only_x = run(vec![x], vec![tau_x]);
    let only_y = run(vec![y], vec![tau_y]);
    assert_eq!(both[0], only_x[0]);
    assert_eq!(both[1], only_y[0]);
}

#[test]
fn energy_does_not_grow_without_damping_or_contacts() {
    let model = double_pendulum();
    let mut state = model.default_state();
    state.q[0] = 0.8;
    state.q[1] = -0.5;
    let e0 = total_energy(&model, &state).unwrap();

    let rk4 = Simulator::new(
        model.clone(),
        SimulationConfig::default().with_integrator(Integrator::Rk4),
    )
    .unwrap();
    let mut s = state.clone();
    for _ in 0..2000 {
        let (next, diag) = rk4.step(&s, &DVec::zeros(2), &[]).unwrap();
        assert!(diag.total_energy() <= e0 + 1e-6, "energy grew to {}", diag.total_energy());
        s = next;
    }

    // The symplectic default drifts but stays bounded.
    let semi = Simulator::with_defaults(model);
    let mut s = state;
    for _ in 0..2000 {
        let (next, diag) = semi.step(&s, &DVec::zeros(2), &[]).unwrap();
        assert!((diag.total_energy() - e0).abs() < 0.01 * e0.abs());
        s = next;
    }
}

#[test]
fn compound_pendulum_period() {
    let model = compound_pendulum();
    let dt = 0.001;
    let sim = Simulator::new(
        model.clone(),
        SimulationConfig::default().with_dt(dt).with_integrator(Integrator::Rk4),
    )
    .unwrap();
    let mut state = model.default_state();
    state.q[0] = 0.1;

    // T = 2π sqrt(I_pivot / (m g d)) with I_pivot = mL²/3, d = L/2.
    let expected = 2.0 * std::f64::consts::PI * ((1.0 / 3.0) / (GRAVITY * 0.5)).sqrt();

    let mut crossings = Vec::new();
    let mut prev = state.q[0];
    for step in 0..6000 {
        state = sim.step(&state, &DVec::zeros(1), &[]).unwrap().0;
        if prev > 0.0 && state.q[0] <= 0.0 {
            let frac = prev / (prev - state.q[0]);
            crossings.push((step as f64 + frac) * dt);
        }
        prev = state.q[0];
    }
    assert!(crossings.len() >= 2, "need two crossings, got {}", crossings.len());
    let periods: Vec<f64> = crossings.windows(2).map(|w| w[1] - w[0]).collect();
    let avg = periods.iter().sum::<f64>() / periods.len() as f64;
    assert!(((avg - expected) / expected).abs() < 0.01, "period {avg}, expected {expected}");
}

#[test]
fn ball_on_plane_has_bounded_penetration() {
    let model = ball();
    let params = ContactParams::default();
    let sim = Simulator::new(
        model.clone(),
        SimulationConfig::default().with_terrain(FlatTerrain::default()).with_contact(params),
    )
    .unwrap();
    let mut state = model.default_state();
    state.q[2] = 0.5;

    let mut max_depth: f64 = 0.0;
    for _ in 0..3000 {
        state = sim.step(&state, &DVec::zeros(6), &[]).unwrap().0;
        max_depth = max_depth.max(0.1 - state.q[2]);
    }
    assert!(max_depth < 0.05, "penetrated {max_depth} m");
    // At rest the spring carries the weight: d = m g / k.
    let rest_depth = 0.1 - state.q[2];
    assert_relative_eq!(rest_depth, GRAVITY / params.stiffness, epsilon = 2e-4);
    assert!(state.v.norm() < 1e-3);
}

#[test]
fn fixed_only_model_is_a_no_op() {
    let model = Arc::new(
        ModelBuilder::new()
            .add_fixed_link(
                "base",
                None,
                SpatialTransform::identity(),
                SpatialInertia::sphere(1.0, 0.1),
            )
            .add_fixed_link(
                "arm",
                Some(0),
                SpatialTransform::from_translation(Vec3::x()),
                SpatialInertia::sphere(1.0, 0.1),
            )
            .build()
            .unwrap(),
    );
    assert_eq!(model.nv, 0);
    assert_eq!(model.nq, 0);

    let mut sim = BatchSim::new(model, SimulationConfig::default(), 3).unwrap();
    let tau = vec![DVec::zeros(0); 3];
    let diags = sim.step(&tau, &[]).unwrap();
    assert_eq!(diags.len(), 3);
    assert!(sim.forward_dynamics(&tau).unwrap().iter().all(|o| o.qdd.is_empty()));
    assert!(sim.inverse_dynamics(&tau).unwrap().iter().all(DVec::is_empty));
    assert_eq!(sim.positions().unwrap().shape(), (3, 0));

    let snap = sim.snapshot();
    assert_eq!(snap.batch, 3);
    assert!(snap.q.is_empty());
    let mut other = BatchSim::new(
        sim.simulator(0).model().clone(),
        SimulationConfig::default(),
        0,
    )
    .unwrap();
    other.restore(&snap).unwrap();
    assert_eq!(other.len(), 3);
}

#[test]
fn deserialized_state_continues_identically() {
    let model = ball();
    let sim = Simulator::new(
        model.clone(),
        SimulationConfig::default().with_terrain(FlatTerrain::default()),
    )
    .unwrap();
    let mut state = model.default_state();
    state.q[2] = 0.12;
    state.v[2] = 0.7; // spin about z
    state.v[3] = 0.4; // sliding along x
    let tau = DVec::from_row_slice(&[0.0, 0.0, 0.0, 0.2, 0.0, 0.0]);
    for _ in 0..50 {
        state = sim.step(&state, &tau, &[]).unwrap().0;
    }

    let json = serde_json::to_string(&state).unwrap();
    let mut restored: State = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, state);
    for _ in 0..50 {
        state = sim.step(&state, &tau, &[]).unwrap().0;
        restored = sim.step(&restored, &tau, &[]).unwrap().0;
        assert_eq!(restored, state);
    }
}

#[test]
fn batch_snapshot_roundtrip_through_json() {
    let model = humanoid_leg();
    let mut sim = BatchSim::new(model.clone(), SimulationConfig::default(), 2).unwrap();
    *sim.state_mut(1).unwrap() = sample_state(&model);
    let tau = vec![DVec::zeros(model.nv); 2];
    for _ in 0..10 {
        sim.step(&tau, &[]).unwrap();
    }

    let json = serde_json::to_string(&sim.snapshot()).unwrap();
    let snap: BatchSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(snap.q.len(), 2 * model.nq);
    assert_eq!(snap.v.len(), 2 * model.nv);

    let mut copy = BatchSim::new(model, SimulationConfig::default(), 2).unwrap();
    copy.restore(&snap).unwrap();
    for _ in 0..10 {
        sim.step(&tau, &[]).unwrap();
        copy.step(&tau, &[]).unwrap();
    }
    assert_eq!(copy.snapshot(), sim.snapshot());
}

#[test]
fn description_with_fixed_joints_lumps_and_simulates() {
    let desc = ModelDescription {
        name: "arm".into(),
        links: vec![
            LinkDescription {
                name: "base".into(),
                inertia: SpatialInertia::sphere(2.0, 0.1),
                collision_points: vec![],
            },
            LinkDescription {
                name: "upper".into(),
                inertia: SpatialInertia::point_mass(1.0, Vec3::new(0.0, 0.0, -1.0)),
                collision_points: vec![],
            },
            LinkDescription {
                name: "camera".into(),
                inertia: SpatialInertia::point_mass(0.5, Vec3::zeros()),
                collision_points: vec![],
            },
        ],
        joints: vec![
            JointDescription {
                name: "shoulder".into(),
                joint_type: JointType::Revolute,
                parent: "base".into(),
                child: "upper".into(),
                origin: SpatialTransform::identity(),
                axis: Vec3::y(),
                damping: 0.0,
                limits: None,
            },
            JointDescription {
                name: "mount".into(),
                joint_type: JointType::Fixed,
                parent: "upper".into(),
                child: "camera".into(),
                origin: SpatialTransform::from_translation(Vec3::new(0.0, 0.0, -1.0)),
                axis: Vec3::zeros(),
                damping: 0.0,
                limits: None,
            },
        ],
        base_link: "base".into(),
        floating_base: false,
        gravity: Vec3::new(0.0, 0.0, -GRAVITY),
    };
    let full = Arc::new(desc.build().unwrap());
    let lumped = Arc::new(desc.lump_fixed_joints().build().unwrap());
    assert_eq!(full.nlinks(), 3);
    assert_eq!(lumped.nlinks(), 2);
    assert_eq!(full.nv, lumped.nv);

    // Same physics: 1.5 kg effectively at the tip.
    let mut state = full.default_state();
    state.q[0] = 0.4;
    let a = Simulator::with_defaults(full).forward_dynamics(&state, &DVec::zeros(1)).unwrap();
    let b = Simulator::with_defaults(lumped).forward_dynamics(&state, &DVec::zeros(1)).unwrap();
    assert_relative_eq!(a.qdd, b.qdd, epsilon = 1e-12);
    assert_relative_eq!(a.qdd[0], -GRAVITY * 0.4_f64.sin(), epsilon = 1e-12);
}

#[test]
fn mismatched_batch_inputs_are_rejected() {
    let mut sim = BatchSim::new(floating_box(), SimulationConfig::default(), 2).unwrap();
    assert!(matches!(
        sim.step(&vec![DVec::zeros(6); 3], &[]),
        Err(Error::ShapeMismatch { what: "applied forces", .. })
    ));
    assert!(matches!(
        sim.step(&vec![DVec::zeros(6); 2], &[vec![]]),
        Err(Error::ShapeMismatch { what: "contact lists", .. })
    ));
    assert!(matches!(
        sim.inverse_dynamics(&[DVec::zeros(6)]),
        Err(Error::ShapeMismatch { what: "accelerations", .. })
    ));
}

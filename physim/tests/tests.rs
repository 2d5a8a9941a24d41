use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::DVector;

use physim::simulation::heat::HeatRod;
use physim::{
    chain_positions, AccelSet, Body, CollisionResolver, CollisionSet, DampedPendulum,
    DoublePendulum, DynamicsModel, ElasticPairs, Engine, Ensemble, ExplicitEuler, FnModel, Frame,
    GravityEngine, GravityScheme, Integrator, NVec2, NewtonianGravity, OdeEngine, Parameters,
    Particle, ParticleEngine, Rk4, Runner, Scenario, ScenarioConfig, SimError, SimulationDriver,
    StateVector, Stepper, System, WallBounce,
};

/// Build a simple 2-body System separated along x-axis
pub fn two_body_system(dist: f64, m1: f64, m2: f64) -> System {
    let b1 = Body::new(NVec2::new(-dist / 2.0, 0.0), NVec2::zeros(), m1);
    let b2 = Body::new(NVec2::new(dist / 2.0, 0.0), NVec2::zeros(), m2);
    System::new(vec![b1, b2])
}

/// Two unit masses on a circular orbit of separation 1 (G = 1)
pub fn circular_binary() -> System {
    let v = 0.5_f64.sqrt();
    System::new(vec![
        Body::new(NVec2::new(-0.5, 0.0), NVec2::new(0.0, -v), 1.0),
        Body::new(NVec2::new(0.5, 0.0), NVec2::new(0.0, v), 1.0),
    ])
}

/// Deterministic scattered system of size `n`
pub fn scattered_system(n: usize) -> System {
    let bodies = (0..n)
        .map(|i| {
            let i_f = i as f64;
            Body::new(
                NVec2::new((i_f * 0.37).sin() * 5.0, (i_f * 0.13).cos() * 5.0),
                NVec2::new((i_f * 0.71).cos(), (i_f * 0.29).sin()),
                1.0 + 0.1 * i_f,
            )
        })
        .collect();
    System::new(bodies)
}

/// Build a gravity term + AccelSet
pub fn gravity_set(softening: f64) -> AccelSet {
    AccelSet::new().with(NewtonianGravity::new(0.1, softening))
}

pub fn accels(forces: &AccelSet, sys: &System) -> Vec<NVec2> {
    let mut acc = vec![NVec2::zeros(); sys.bodies.len()];
    forces.accumulate_accels(sys.t, sys, &mut acc);
    acc
}

pub fn collect_frames<E: Engine>(driver: &SimulationDriver<E>) -> Vec<Frame> {
    driver
        .frames()
        .collect::<Result<Vec<_>, _>>()
        .expect("run failed")
}

pub fn scenario_from_yaml(text: &str) -> physim::Result<Scenario> {
    let cfg = ScenarioConfig::from_yaml(text)?;
    Scenario::build(&cfg)
}

/// `0.5 ω² + (g/l)(1 - cos θ)` per unit `m l²`
fn damped_energy(state: &StateVector, g: f64, l: f64) -> f64 {
    0.5 * state[1] * state[1] + g / l * (1.0 - state[0].cos())
}

// ==================================================================================
// Gravity tests
// ==================================================================================

#[test]
fn gravity_newton_third_law() {
    let sys = two_body_system(1.0, 2.0, 3.0);
    let acc = accels(&gravity_set(0.0), &sys);

    let net = acc[0] * sys.bodies[0].m + acc[1] * sys.bodies[1].m;

    assert!(net.norm() < 1e-12, "Net momentum not zero: {:?}", net);
}

#[test]
fn gravity_points_toward_other_body() {
    let sys = two_body_system(2.0, 1.0, 1.0);
    let acc = accels(&gravity_set(0.0), &sys);

    let dx = sys.bodies[1].x - sys.bodies[0].x;

    assert!(dx.norm() > 0.0);
    assert!(acc[0].dot(&dx) > 0.0, "Acceleration is not toward second body");
}

#[test]
fn gravity_inverse_square_law() {
    let forces = gravity_set(0.0);
    let acc_r = accels(&forces, &two_body_system(1.0, 1.0, 1.0));
    let acc_2r = accels(&forces, &two_body_system(2.0, 1.0, 1.0));

    let ratio = acc_r[0].norm() / acc_2r[0].norm();

    assert!((ratio - 4.0).abs() < 1e-3, "Expected ~4x, got {}", ratio);
}

#[test]
fn gravity_softening_prevents_blowup() {
    let sys = two_body_system(1e-9, 1.0, 1.0);
    let acc = accels(&gravity_set(0.1_f64.sqrt()), &sys);

    assert!(acc[0].norm() < 1e9, "Softening failed; acceleration too large");
}

#[test]
fn gravity_parallel_matches_serial() {
    let sys = scattered_system(40);
    let serial = accels(&AccelSet::new().with(NewtonianGravity::new(1.0, 0.05)), &sys);
    let parallel = accels(
        &AccelSet::new().with(NewtonianGravity::new(1.0, 0.05).parallel(true)),
        &sys,
    );

    for (s, p) in serial.iter().zip(&parallel) {
        assert_abs_diff_eq!(s.x, p.x, epsilon = 1e-10);
        assert_abs_diff_eq!(s.y, p.y, epsilon = 1e-10);
    }
}

#[test]
fn gravity_parallel_is_repeatable() {
    let sys = scattered_system(64);
    let forces = AccelSet::new().with(NewtonianGravity::new(1.0, 0.05).parallel(true));

    assert_eq!(accels(&forces, &sys), accels(&forces, &sys));
}

#[test]
fn potential_energy_counts_each_pair_once() {
    let sys = two_body_system(2.0, 3.0, 4.0);
    let pe = physim::potential_energy(&sys, 1.0);

    assert_relative_eq!(pe, -6.0, epsilon = 1e-12);
}

#[test]
fn potential_energy_ignores_force_softening() {
    let engine = GravityEngine::new(
        two_body_system(1.0, 1.0, 1.0),
        NewtonianGravity::new(1.0, 0.5),
        GravityScheme::Leapfrog,
    )
    .unwrap();

    assert_relative_eq!(engine.diagnostics().potential.unwrap(), -1.0, epsilon = 1e-12);
    assert_relative_eq!(physim::potential_energy(engine.system(), 1.0), -1.0, epsilon = 1e-12);
}

#[test]
fn zero_momentum_moves_to_center_of_mass_frame() {
    let mut sys = scattered_system(25);
    assert!(sys.total_momentum().norm() > 1e-3);

    sys.zero_momentum();

    assert!(sys.total_momentum().norm() < 1e-12);
}

// ==================================================================================
// Integrator tests
// ==================================================================================

#[test]
fn zero_step_leaves_state_unchanged() {
    let pendulum = DoublePendulum::new(3.0, 2.0, 2.0, 3.0, 9.81).unwrap();
    let state = DoublePendulum::initial_state(1.2, 0.3, -0.4, 2.0);
    let rod = HeatRod::new(0.0, 1.0, 5, 0.1, 2.0, 10.0, -3.0).unwrap();
    let profile = StateVector::from_slice(&[1.0, 4.0, 2.0, 8.0, 5.0, 7.0]);

    for integrator in [Integrator::Euler, Integrator::Rk4] {
        assert_eq!(integrator.step(&pendulum, 0.0, 0.0, &state).unwrap(), state);
        assert_eq!(integrator.step(&rod, 0.0, 0.0, &profile).unwrap(), profile);
    }
}

#[test]
fn rk4_tracks_exponential_decay() {
    let decay = FnModel::new(1, |_t: f64, s: &StateVector| -s.values().clone());
    let dt = 0.01;

    let mut euler = StateVector::from_slice(&[1.0]);
    let mut rk4 = StateVector::from_slice(&[1.0]);
    for n in 0..100 {
        let t = n as f64 * dt;
        euler = ExplicitEuler.step(&decay, t, dt, &euler).unwrap();
        rk4 = Rk4.step(&decay, t, dt, &rk4).unwrap();
    }

    let exact = (-1.0_f64).exp();
    assert_abs_diff_eq!(rk4[0], exact, epsilon = 1e-8);
    assert_abs_diff_eq!(euler[0], exact, epsilon = 1e-2);
    assert!((euler[0] - exact).abs() > (rk4[0] - exact).abs());
}

#[test]
fn mismatched_derivative_is_invalid_state_shape() {
    let bad = FnModel::new(2, |_t: f64, _s: &StateVector| DVector::zeros(3));
    let state = StateVector::zeros(2);

    for integrator in [Integrator::Euler, Integrator::Rk4] {
        let err = integrator.step(&bad, 0.0, 0.1, &state).unwrap_err();
        assert!(
            matches!(err, SimError::InvalidStateShape { expected: 2, found: 3 }),
            "unexpected error: {err}"
        );
    }
}

#[test]
fn stepping_a_state_of_wrong_length_is_invalid_state_shape() {
    let pendulum = DoublePendulum::new(3.0, 2.0, 2.0, 3.0, 9.81).unwrap();
    let short = StateVector::from_slice(&[0.1, 0.0]);

    for integrator in [Integrator::Euler, Integrator::Rk4] {
        let err = integrator.step(&pendulum, 0.0, 0.01, &short).unwrap_err();
        assert!(
            matches!(err, SimError::InvalidStateShape { expected: 4, found: 2 }),
            "unexpected error: {err}"
        );
    }
}

#[test]
fn initial_state_of_wrong_length_is_rejected() {
    let pendulum = DampedPendulum::new(0.3, 9.81, 1.0).unwrap();
    let err = OdeEngine::new(pendulum, Integrator::Euler, StateVector::zeros(3)).unwrap_err();

    assert!(matches!(err, SimError::InvalidStateShape { expected: 2, found: 3 }));
}

#[test]
fn negative_step_is_rejected() {
    let pendulum = DampedPendulum::new(0.3, 9.81, 1.0).unwrap();
    let state = DampedPendulum::initial_state(0.1, 0.0);

    assert!(Rk4.step(&pendulum, 0.0, -0.1, &state).is_err());
}

#[test]
fn leapfrog_two_body_energy_drift_is_bounded() {
    let engine = GravityEngine::new(
        circular_binary(),
        NewtonianGravity::new(1.0, 0.01),
        GravityScheme::Leapfrog,
    )
    .unwrap();
    let params = Parameters::new(10.0, 0.001).with_save_interval(0.1);
    let driver = SimulationDriver::new(engine, &params).unwrap();

    let frames = collect_frames(&driver);
    let e0 = frames[0].diagnostics.total_energy().unwrap();
    assert!(e0 < 0.0, "binary should be bound");

    for f in &frames {
        let e = f.diagnostics.total_energy().unwrap();
        let drift = ((e - e0) / e0).abs();
        assert!(drift < 0.05, "energy drift {drift} at t = {}", f.time);
    }
}

#[test]
fn symplectic_euler_conserves_total_momentum() {
    let engine = GravityEngine::new(
        circular_binary(),
        NewtonianGravity::new(1.0, 0.0),
        GravityScheme::SymplecticEuler,
    )
    .unwrap();
    let p0 = engine.system().total_momentum();

    let mut engine = engine;
    for _ in 0..1000 {
        engine.advance(0.001).unwrap();
    }
    let p1 = engine.system().total_momentum();

    assert_abs_diff_eq!(p0.x, p1.x, epsilon = 1e-10);
    assert_abs_diff_eq!(p0.y, p1.y, epsilon = 1e-10);
    assert_relative_eq!(engine.time(), 1.0, epsilon = 1e-9);
}

// ==================================================================================
// Model tests
// ==================================================================================

#[test]
fn double_pendulum_at_rest_stays_at_rest() {
    let model = DoublePendulum::new(3.0, 2.0, 2.0, 3.0, 9.81).unwrap();
    let engine = OdeEngine::new(model, Integrator::Rk4, StateVector::zeros(4)).unwrap();
    let driver = SimulationDriver::new(engine, &Parameters::new(10.0, 0.01)).unwrap();

    for f in collect_frames(&driver) {
        let state = f.state.as_vector().unwrap();
        assert!(state.as_slice().iter().all(|&v| v == 0.0), "moved at t = {}", f.time);
    }
}

#[test]
fn double_pendulum_rk4_conserves_energy() {
    let model = DoublePendulum::new(1.0, 1.0, 1.0, 1.0, 9.81).unwrap();
    let state = DoublePendulum::initial_state(0.6, 0.0, -0.3, 0.5);
    let engine = OdeEngine::new(model, Integrator::Rk4, state).unwrap();
    let driver = SimulationDriver::new(engine, &Parameters::new(5.0, 0.001).with_save_interval(0.5)).unwrap();

    let frames = collect_frames(&driver);
    let e0 = frames[0].diagnostics.total_energy().unwrap();
    for f in &frames {
        let e = f.diagnostics.total_energy().unwrap();
        assert_relative_eq!(e, e0, max_relative = 1e-6);
    }
}

#[test]
fn damped_pendulum_loses_energy() {
    let (g, l) = (9.81, 1.0);
    let model = DampedPendulum::new(0.3, g, l).unwrap();
    let state = DampedPendulum::initial_state(0.0, std::f64::consts::PI);
    let engine = OdeEngine::new(model, Integrator::Euler, state).unwrap();
    let driver = SimulationDriver::new(engine, &Parameters::new(20.0, 0.001)).unwrap();

    let frames = collect_frames(&driver);
    let first = damped_energy(frames[0].state.as_vector().unwrap(), g, l);
    let last = damped_energy(frames[frames.len() - 1].state.as_vector().unwrap(), g, l);

    assert!(last < 0.1 * first, "energy {first} -> {last}");
    assert_relative_eq!(
        frames[0].diagnostics.kinetic.unwrap(),
        0.5 * std::f64::consts::PI.powi(2),
        epsilon = 1e-12
    );
}

#[test]
fn chain_positions_follow_link_angles() {
    let joints = chain_positions(&[std::f64::consts::FRAC_PI_2, 0.0], &[2.0, 1.0]);

    assert_abs_diff_eq!(joints[0].x, 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(joints[0].y, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(joints[1].x, 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(joints[1].y, -1.0, epsilon = 1e-12);

    let pendulum = DoublePendulum::new(3.0, 2.0, 1.0, 1.0, 9.81).unwrap();
    let [p1, p2] = pendulum.cartesian(&StateVector::zeros(4));
    assert_eq!(p1, NVec2::new(0.0, -3.0));
    assert_eq!(p2, NVec2::new(0.0, -5.0));
}

#[test]
fn heat_uniform_profile_with_zero_flux_stays_constant() {
    let rod = HeatRod::new(0.0, 0.2, 20, 40.0 / (2700.0 * 900.0), 40.0, 0.0, 0.0).unwrap();
    let state = rod.uniform(20.0);
    let engine = OdeEngine::new(rod, Integrator::Euler, state).unwrap();
    let driver = SimulationDriver::new(engine, &Parameters::new(10.0, 0.05)).unwrap();

    let frames = collect_frames(&driver);
    assert_eq!(frames.len(), 201);
    for f in frames {
        let temps = f.state.as_vector().unwrap();
        assert!(temps.as_slice().iter().all(|&t| t == 20.0));
    }
}

#[test]
fn heat_euler_step_matches_explicit_stencil() {
    let (fa, fb, k) = (1.0e5, -5.0e4, 40.0);
    let rod = HeatRod::new(0.0, 0.2, 4, 1.0e-4, k, fa, fb).unwrap();
    let dt = 0.05;
    let m = rod.spacing();
    let lam = rod.lambda(dt);
    assert!(rod.is_stable(dt));

    let t = [20.0, 21.0, 22.5, 23.0, 24.0];
    let next = ExplicitEuler
        .step(&rod, 0.0, dt, &StateVector::from_slice(&t))
        .unwrap();

    let expected = [
        (1.0 - 2.0 * lam) * t[0] + 2.0 * lam * (t[1] + fa * m / k),
        (1.0 - 2.0 * lam) * t[1] + lam * (t[2] + t[0]),
        (1.0 - 2.0 * lam) * t[2] + lam * (t[3] + t[1]),
        (1.0 - 2.0 * lam) * t[3] + lam * (t[4] + t[2]),
        (1.0 - 2.0 * lam) * t[4] + 2.0 * lam * (t[3] + fb * m / k),
    ];
    for (got, want) in next.as_slice().iter().zip(expected) {
        assert_relative_eq!(*got, want, max_relative = 1e-12);
    }
    assert_eq!(rod.node_positions().len(), 5);
}

// ==================================================================================
// Collision tests
// ==================================================================================

#[test]
fn head_on_elastic_collision_swaps_velocities() {
    let mut ps = vec![
        Particle::new(NVec2::new(0.0, 0.0), NVec2::new(1.0, 0.0), 0.1),
        Particle::new(NVec2::new(0.15, 0.0), NVec2::new(-1.0, 0.0), 0.1),
    ];
    let p_before: NVec2 = ps.iter().map(|p| p.v).sum();
    let ke_before: f64 = ps.iter().map(|p| 0.5 * p.v.norm_squared()).sum();

    assert_eq!(ElasticPairs.resolve(&mut ps), 1);

    assert_abs_diff_eq!(ps[0].v.x, -1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(ps[0].v.y, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(ps[1].v.x, 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(ps[1].v.y, 0.0, epsilon = 1e-12);

    let p_after: NVec2 = ps.iter().map(|p| p.v).sum();
    let ke_after: f64 = ps.iter().map(|p| 0.5 * p.v.norm_squared()).sum();
    assert_abs_diff_eq!(p_after.x, p_before.x, epsilon = 1e-12);
    assert_relative_eq!(ke_after, ke_before, epsilon = 1e-12);

    // overlap removed, pushed apart symmetrically
    assert_relative_eq!((ps[1].x - ps[0].x).norm(), 0.2, epsilon = 1e-12);
    assert_relative_eq!(ps[0].x.x, -0.025, epsilon = 1e-12);
}

#[test]
fn left_wall_bounce_scales_speed_by_restitution() {
    let walls = WallBounce::boxed(10.0, 10.0, 0.6).unwrap();
    let mut ps = vec![Particle::new(NVec2::new(0.05, 5.0), NVec2::new(-2.0, 0.0), 0.1)];

    assert_eq!(walls.resolve(&mut ps), 1);

    assert_relative_eq!(ps[0].v.x, 1.2, epsilon = 1e-12);
    assert_eq!(ps[0].v.y, 0.0);
    assert_eq!(ps[0].x.x, 0.1);
    assert_eq!(ps[0].x.y, 5.0);
}

#[test]
fn ball_in_field_falls_then_drifts() {
    let ball = Particle::new(NVec2::new(5.0, 5.0), NVec2::zeros(), 0.1);
    let walls = CollisionSet::new().with(WallBounce::boxed(10.0, 10.0, 0.6).unwrap());
    let mut engine = ParticleEngine::new(Ensemble::new(vec![ball]), NVec2::new(0.0, -10.0), walls).unwrap();

    engine.advance(0.01).unwrap();

    let p = &engine.ensemble().particles[0];
    assert_relative_eq!(p.v.y, -0.1, epsilon = 1e-12);
    assert_relative_eq!(p.x.y, 5.0 - 0.001, epsilon = 1e-12);
    assert_eq!(engine.diagnostics().contacts, Some(0));
}

#[test]
fn particle_box_reports_entropy_and_contacts() {
    let ps = vec![
        Particle::new(NVec2::new(1.0, 1.0), NVec2::new(0.5, 0.0), 0.1),
        Particle::new(NVec2::new(1.15, 1.0), NVec2::new(-0.5, 0.0), 0.1),
        Particle::new(NVec2::new(8.0, 8.0), NVec2::zeros(), 0.1),
    ];
    let collisions = CollisionSet::new()
        .with(WallBounce::boxed(10.0, 10.0, 1.0).unwrap())
        .with(ElasticPairs);
    let mut engine = ParticleEngine::new(Ensemble::new(ps), NVec2::zeros(), collisions)
        .unwrap()
        .with_entropy(NVec2::zeros(), NVec2::new(10.0, 10.0), 2);

    engine.advance(0.01).unwrap();
    let d = engine.diagnostics();

    assert_eq!(d.contacts, Some(1));
    // two particles in one cell, one in another
    let expected = -(2.0 / 3.0 * (2.0_f64 / 3.0).ln() + 1.0 / 3.0 * (1.0_f64 / 3.0).ln());
    assert_relative_eq!(d.entropy.unwrap(), expected, epsilon = 1e-12);
    assert_relative_eq!(d.kinetic.unwrap(), 0.25, epsilon = 1e-12);
}

// ==================================================================================
// Driver tests
// ==================================================================================

#[test]
fn step_count_absorbs_rounding_noise() {
    assert_eq!(Parameters::new(0.07, 1e-4).n_steps(), 700);
    assert_eq!(Parameters::new(10.0, 0.05).n_steps(), 200);
    assert_eq!(Parameters::new(1.0, 0.3).n_steps(), 4);
    assert_eq!(Parameters::new(0.07, 1e-4).with_save_interval(0.001).save_stride(), 10);
    assert_eq!(Parameters::new(1.0, 0.01).save_stride(), 1);
}

#[test]
fn decimated_frames_land_on_the_save_grid() {
    let model = DampedPendulum::new(0.3, 9.81, 1.0).unwrap();
    let engine = OdeEngine::new(model, Integrator::Euler, DampedPendulum::initial_state(0.5, 0.0)).unwrap();
    let params = Parameters::new(1.0, 0.01).with_save_interval(0.05);
    let driver = SimulationDriver::new(engine, &params).unwrap();

    assert_eq!(driver.n_steps(), 100);
    assert_eq!(driver.stride(), 5);

    let frames = collect_frames(&driver);
    assert_eq!(frames.len(), 21);
    assert_eq!(frames.len(), driver.expected_frames());
    for (i, f) in frames.iter().enumerate() {
        assert_eq!(f.step, 5 * i);
        assert_relative_eq!(f.time, 0.05 * i as f64, epsilon = 1e-9);
    }
}

#[test]
fn frames_restart_from_the_initial_state() {
    let engine = GravityEngine::new(
        scattered_system(12),
        NewtonianGravity::new(1.0, 0.1),
        GravityScheme::Leapfrog,
    )
    .unwrap();
    let driver = SimulationDriver::new(engine, &Parameters::new(1.0, 0.01)).unwrap();

    let first = collect_frames(&driver);
    let second = collect_frames(&driver);

    assert_eq!(first, second);
    assert_eq!(first[0].step, 0);
    assert_eq!(first[0].time, 0.0);
}

#[test]
fn seeded_scenarios_are_deterministic() {
    let yaml = r#"
parameters:
  t_end: 2.0
  h0: 0.05
  seed: 7
model:
  kind: particle_diffusion
  count: 40
  box_size: 4.0
  radius: 0.1
  clustering: 0.5
"#;
    let run = || {
        let scenario = scenario_from_yaml(yaml).unwrap();
        let mut frames: Vec<Frame> = Vec::new();
        scenario.run(&mut frames).unwrap();
        frames
    };

    let a = run();
    let b = run();
    assert_eq!(a.len(), 41);
    assert_eq!(a, b);
}

#[test]
fn different_seeds_give_different_clusters() {
    let yaml = |seed: u64| {
        format!(
            "parameters: {{t_end: 0.1, h0: 0.01, seed: {seed}}}\n\
             model: {{kind: n_body, count: 8, total_mass: 8.0, G: 1.0, softening: 0.1}}\n"
        )
    };
    let initial = |seed: u64| match scenario_from_yaml(&yaml(seed)).unwrap().runner {
        Runner::Gravity(d) => d.initial().system().bodies.clone(),
        _ => panic!("expected a gravity scenario"),
    };

    assert_eq!(initial(3), initial(3));
    assert_ne!(initial(3), initial(4));
}

#[test]
fn stop_handle_ends_the_run_before_the_next_step() {
    let model = DampedPendulum::new(0.3, 9.81, 1.0).unwrap();
    let engine = OdeEngine::new(model, Integrator::Euler, DampedPendulum::initial_state(0.5, 0.0)).unwrap();
    let driver = SimulationDriver::new(engine, &Parameters::new(1.0, 0.01)).unwrap();
    let stop = driver.stop_handle();

    let mut frames = driver.frames();
    assert_eq!(frames.next().unwrap().unwrap().step, 0);
    assert_eq!(frames.next().unwrap().unwrap().step, 1);
    stop.stop();
    assert!(frames.next().is_none());
    assert!(frames.stopped_early());
    assert_eq!(frames.steps_taken(), 1);

    let mut sink: Vec<Frame> = Vec::new();
    let summary = driver.run(&mut sink).unwrap();
    assert!(summary.stopped_early);
    assert_eq!(summary.frames, 1);
    assert_eq!(summary.steps, 0);

    stop.reset();
    let mut sink: Vec<Frame> = Vec::new();
    let summary = driver.run(&mut sink).unwrap();
    assert!(!summary.stopped_early);
    assert_eq!(summary.steps, 100);
    assert_eq!(summary.frames, 101);
    assert_eq!(sink.len(), 101);
    assert_relative_eq!(summary.final_time, 1.0, epsilon = 1e-9);
}

#[test]
fn unstable_heat_rod_reports_numeric_divergence() {
    let yaml = |allow: bool| {
        format!(
            "engine: {{integrator: euler}}\n\
             parameters: {{t_end: 50.0, h0: 0.05}}\n\
             model: {{kind: heat_rod, a: 0.0, b: 1.0, nx: 10, T0: 20.0, k: 1.0, alpha: 1.0, fa: 100.0, fb: 0.0, allow_unstable: {allow}}}\n"
        )
    };

    let err = scenario_from_yaml(&yaml(false)).err().unwrap();
    assert!(matches!(err, SimError::InvalidConfig { ref field, .. } if field == "h0"));

    let scenario = scenario_from_yaml(&yaml(true)).unwrap();
    let mut frames: Vec<Frame> = Vec::new();
    let err = scenario.run(&mut frames).unwrap_err();

    match &err {
        SimError::StepFailed { step, state, .. } => {
            assert!(*step > 0);
            assert_eq!(state.len(), 11);
            assert!(state.iter().any(|v| !v.is_finite()));
        }
        other => panic!("expected StepFailed, got {other}"),
    }
    assert!(matches!(err.root(), SimError::NumericDivergence { .. }));
    assert!(!frames.is_empty());
}

#[test]
fn frames_stop_after_the_first_error() {
    let rod = HeatRod::new(0.0, 1.0, 10, 1.0, 1.0, 100.0, 0.0).unwrap();
    let state = rod.uniform(20.0);
    let engine = OdeEngine::new(rod, Integrator::Euler, state).unwrap();
    let driver = SimulationDriver::new(engine, &Parameters::new(50.0, 0.05)).unwrap();

    let mut frames = driver.frames();
    let errors = frames.by_ref().filter(|f| f.is_err()).count();

    assert_eq!(errors, 1);
    assert!(frames.next().is_none());
}

// ==================================================================================
// Configuration tests
// ==================================================================================

#[test]
fn non_positive_physical_parameters_are_invalid_config() {
    assert!(matches!(
        DoublePendulum::new(0.0, 2.0, 2.0, 3.0, 9.81),
        Err(SimError::InvalidConfig { ref field, .. }) if field == "l1"
    ));
    assert!(DoublePendulum::new(1.0, 2.0, -2.0, 3.0, 9.81).is_err());
    assert!(HeatRod::new(0.0, 0.2, 1, 1e-5, 40.0, 0.0, 0.0).is_err());
    assert!(Parameters::new(1.0, 0.0).validate().is_err());
    assert!(Parameters::new(1.0, 0.1).with_save_interval(0.01).validate().is_err());
    assert!(GravityEngine::new(
        two_body_system(1.0, 1.0, 0.0),
        NewtonianGravity::new(1.0, 0.0),
        GravityScheme::Leapfrog
    )
    .is_err());
}

#[test]
fn restitution_outside_unit_interval_is_invalid_config() {
    let yaml = "parameters: {t_end: 1.0, h0: 0.01}\n\
                model: {kind: ball_box, width: 10.0, height: 10.0, radius: 0.3, restitution: 1.5, \
                balls: [{x: [5.0, 5.0], v: [2.0, 3.0]}]}\n";

    let err = scenario_from_yaml(yaml).err().unwrap();
    assert!(matches!(err, SimError::InvalidConfig { .. }));
}

#[test]
fn random_balls_draw_velocity_components_up_to_max_speed() {
    let yaml = "parameters: {t_end: 1.0, h0: 0.01, seed: 7}\n\
                model: {kind: ball_box, width: 10.0, height: 10.0, radius: 0.1, restitution: 0.9, \
                count: 50, max_speed: 2.0}\n";
    let scenario = scenario_from_yaml(yaml).unwrap();

    let driver = match &scenario.runner {
        Runner::Particles(d) => d,
        _ => panic!("expected a particle scenario"),
    };
    let particles = &driver.initial().ensemble().particles;
    assert_eq!(particles.len(), 50);
    for p in particles {
        assert!((0.0..=2.0).contains(&p.v.x), "vx = {}", p.v.x);
        assert!((0.0..=2.0).contains(&p.v.y), "vy = {}", p.v.y);
    }
}

#[test]
fn body_with_velocity_and_momentum_is_rejected() {
    let yaml = "parameters: {t_end: 1.0, h0: 0.01}\n\
                model: {kind: solar_system, G: 1.0, bodies: [{x: [0.0, 0.0], v: [0.0, 1.0], p: [0.0, 1.0], m: 1.0}]}\n";

    assert!(matches!(scenario_from_yaml(yaml), Err(SimError::InvalidConfig { .. })));
}

#[test]
fn unknown_model_kind_is_a_yaml_error() {
    let yaml = "parameters: {t_end: 1.0, h0: 0.01}\nmodel: {kind: triple_pendulum}\n";

    assert!(matches!(ScenarioConfig::from_yaml(yaml), Err(SimError::Yaml(_))));
}

#[test]
fn every_bundled_scenario_builds() {
    let dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios");
    let mut count = 0;
    for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let cfg = ScenarioConfig::from_path(&path).unwrap();
        Scenario::build(&cfg).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        count += 1;
    }
    assert_eq!(count, 8);
}

#[test]
fn solar_system_scenario_keeps_momentum() {
    let dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios");
    let cfg = ScenarioConfig::from_path(dir.join("solar_system.yaml")).unwrap();
    let scenario = Scenario::build(&cfg).unwrap();

    let driver = match &scenario.runner {
        Runner::Gravity(d) => d,
        _ => panic!("expected a gravity scenario"),
    };
    assert_eq!(driver.n_steps(), 700);
    assert_eq!(driver.stride(), 10);

    let frames = collect_frames(driver);
    assert_eq!(frames.len(), 71);

    let momentum = |f: &Frame| -> NVec2 { f.state.as_bodies().unwrap().iter().map(|b| b.momentum()).sum() };
    let p0 = momentum(&frames[0]);
    let p1 = momentum(&frames[frames.len() - 1]);
    assert_abs_diff_eq!(p0.x, p1.x, epsilon = 1e-8);
    assert_abs_diff_eq!(p0.y, p1.y, epsilon = 1e-8);
}

#[test]
fn two_wall_scenario_loses_speed_at_each_bounce() {
    let dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios");
    let scenario = Scenario::build(&ScenarioConfig::from_path(dir.join("two_wall.yaml")).unwrap()).unwrap();

    let mut frames: Vec<Frame> = Vec::new();
    let summary = scenario.run(&mut frames).unwrap();
    assert_eq!(summary.steps, 2000);

    let speed = |f: &Frame| f.state.as_particles().unwrap()[0].v.norm();
    let first = speed(&frames[0]);
    let last = speed(&frames[frames.len() - 1]);
    assert!(last < first);
    for f in &frames {
        let p = &f.state.as_particles().unwrap()[0];
        assert!(p.x.x >= 0.3 - 1e-12 && p.x.x <= 9.7 + 1e-12);
        assert!(p.x.y >= 0.3 - 1e-12 && p.x.y <= 9.7 + 1e-12);
    }
}

#[test]
fn dynamics_model_default_diagnostics_are_empty() {
    let m = FnModel::new(1, |_t: f64, s: &StateVector| s.values().clone());
    let d = m.diagnostics(&StateVector::zeros(1));

    assert_eq!(d.total_energy(), None);
    assert_eq!(d.entropy, None);
}

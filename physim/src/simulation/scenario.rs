//! Build fully-initialized simulation scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing), validates it and produces a
//! runnable [`Scenario`]:
//! - numerical parameters (`Parameters`)
//! - the initial state, generated from `parameters.seed` where the model
//!   asks for random initial conditions
//! - an engine (ODE stepper, gravity scheme or particle box) wrapped in a
//!   [`SimulationDriver`]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{info, warn};

use crate::configuration::config::{
    BallBoxConfig, BodyConfig, DampedPendulumConfig, DoublePendulumConfig, EngineConfig,
    HeatRodConfig, ModelConfig, NBodyConfig, ParticleDiffusionConfig, ScenarioConfig,
    SolarSystemConfig,
};
use crate::error::{Result, SimError};
use crate::simulation::collision::{CollisionSet, ElasticPairs, WallBounce};
use crate::simulation::driver::{FrameSink, RunSummary, SimulationDriver, StopHandle};
use crate::simulation::engine::{GravityEngine, GravityScheme, OdeEngine, ParticleEngine};
use crate::simulation::forces::NewtonianGravity;
use crate::simulation::heat::{HeatRod, MAX_STABLE_LAMBDA};
use crate::simulation::params::{ensure_finite, ensure_non_negative, ensure_positive, Parameters};
use crate::simulation::pendulum::{DampedPendulum, DoublePendulum};
use crate::simulation::states::{Body, Ensemble, NVec2, Particle, System};

/// Driver of one concrete scenario
pub enum Runner {
    DoublePendulum(SimulationDriver<OdeEngine<DoublePendulum>>),
    DampedPendulum(SimulationDriver<OdeEngine<DampedPendulum>>),
    HeatRod(SimulationDriver<OdeEngine<HeatRod>>),
    Gravity(SimulationDriver<GravityEngine>),
    Particles(SimulationDriver<ParticleEngine>),
}

/// A validated scenario, ready to run
pub struct Scenario {
    pub kind: &'static str,
    pub parameters: Parameters,
    pub runner: Runner,
}

impl Scenario {
    pub fn build(cfg: &ScenarioConfig) -> Result<Self> {
        let parameters = cfg.parameters.to_parameters();
        parameters.validate()?;
        let kind = cfg.model.kind();

        info!(
            kind,
            t_end = parameters.t_end,
            h0 = parameters.h0,
            seed = parameters.seed,
            "building scenario"
        );

        let runner = match &cfg.model {
            ModelConfig::DoublePendulum(m) => build_double_pendulum(m, &cfg.engine, &parameters)?,
            ModelConfig::DampedPendulum(m) => build_damped_pendulum(m, &cfg.engine, &parameters)?,
            ModelConfig::HeatRod(m) => build_heat_rod(m, &cfg.engine, &parameters)?,
            ModelConfig::NBody(m) => build_n_body(m, &cfg.engine, &parameters)?,
            ModelConfig::SolarSystem(m) => build_solar_system(m, &cfg.engine, &parameters)?,
            ModelConfig::ParticleDiffusion(m) => build_particle_diffusion(m, &parameters)?,
            ModelConfig::BallBox(m) => build_ball_box(m, &parameters)?,
        };

        Ok(Self {
            kind,
            parameters,
            runner,
        })
    }

    pub fn run(&self, sink: &mut dyn FrameSink) -> Result<RunSummary> {
        match &self.runner {
            Runner::DoublePendulum(d) => d.run(sink),
            Runner::DampedPendulum(d) => d.run(sink),
            Runner::HeatRod(d) => d.run(sink),
            Runner::Gravity(d) => d.run(sink),
            Runner::Particles(d) => d.run(sink),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        match &self.runner {
            Runner::DoublePendulum(d) => d.stop_handle(),
            Runner::DampedPendulum(d) => d.stop_handle(),
            Runner::HeatRod(d) => d.stop_handle(),
            Runner::Gravity(d) => d.stop_handle(),
            Runner::Particles(d) => d.stop_handle(),
        }
    }
}

fn build_double_pendulum(
    cfg: &DoublePendulumConfig,
    engine: &EngineConfig,
    params: &Parameters,
) -> Result<Runner> {
    let model = DoublePendulum::new(cfg.l1, cfg.l2, cfg.m1, cfg.m2, cfg.g)?;
    let state = DoublePendulum::initial_state(
        cfg.theta1_deg.to_radians(),
        cfg.omega1_deg.to_radians(),
        cfg.theta2_deg.to_radians(),
        cfg.omega2_deg.to_radians(),
    );
    let engine = OdeEngine::new(model, engine.integrator, state)?;
    Ok(Runner::DoublePendulum(SimulationDriver::new(engine, params)?))
}

fn build_damped_pendulum(
    cfg: &DampedPendulumConfig,
    engine: &EngineConfig,
    params: &Parameters,
) -> Result<Runner> {
    let model = DampedPendulum::new(cfg.k, cfg.g, cfg.l)?;
    let state = DampedPendulum::initial_state(cfg.theta_deg.to_radians(), cfg.omega_deg.to_radians());
    let engine = OdeEngine::new(model, engine.integrator, state)?;
    Ok(Runner::DampedPendulum(SimulationDriver::new(engine, params)?))
}

fn build_heat_rod(cfg: &HeatRodConfig, engine: &EngineConfig, params: &Parameters) -> Result<Runner> {
    let alpha = match (cfg.alpha, cfg.density, cfg.cp) {
        (Some(alpha), _, _) => alpha,
        (None, Some(density), Some(cp)) => {
            ensure_positive("density", density)?;
            ensure_positive("cp", cp)?;
            cfg.k / (density * cp)
        }
        _ => {
            return Err(SimError::invalid_config(
                "alpha",
                "give either alpha or both density and cp",
            ))
        }
    };
    ensure_finite("T0", cfg.T0)?;

    let rod = HeatRod::new(cfg.a, cfg.b, cfg.nx, alpha, cfg.k, cfg.fa, cfg.fb)?;
    let lambda = rod.lambda(params.h0);
    if !rod.is_stable(params.h0) {
        if !cfg.allow_unstable {
            return Err(SimError::invalid_config(
                "h0",
                format!("lambda = {lambda} exceeds {MAX_STABLE_LAMBDA}, the explicit scheme diverges"),
            ));
        }
        warn!(lambda, "unstable heat rod configuration allowed");
    }

    let state = rod.uniform(cfg.T0);
    let engine = OdeEngine::new(rod, engine.integrator, state)?;
    Ok(Runner::HeatRod(SimulationDriver::new(engine, params)?))
}

fn build_n_body(cfg: &NBodyConfig, engine: &EngineConfig, params: &Parameters) -> Result<Runner> {
    if cfg.count == 0 {
        return Err(SimError::invalid_config("count", "need at least one body"));
    }
    ensure_positive("total_mass", cfg.total_mass)?;
    ensure_positive("G", cfg.G)?;
    ensure_non_negative("softening", cfg.softening)?;

    // positions first, then velocities, all from one seeded stream
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut normal2 = || NVec2::new(rng.sample(StandardNormal), rng.sample(StandardNormal));
    let xs: Vec<NVec2> = (0..cfg.count).map(|_| normal2()).collect();
    let vs: Vec<NVec2> = (0..cfg.count).map(|_| normal2()).collect();

    let m = cfg.total_mass / cfg.count as f64;
    let bodies = xs.into_iter().zip(vs).map(|(x, v)| Body::new(x, v, m)).collect();

    let mut system = System::new(bodies);
    if cfg.zero_momentum {
        system.zero_momentum();
    }

    let gravity = NewtonianGravity::new(cfg.G, cfg.softening).parallel(engine.parallel);
    let engine = GravityEngine::new(system, gravity, GravityScheme::Leapfrog)?;
    Ok(Runner::Gravity(SimulationDriver::new(engine, params)?))
}

fn body_from_config(i: usize, bc: &BodyConfig) -> Result<Body> {
    ensure_positive(&format!("bodies[{i}].m"), bc.m)?;
    let x = NVec2::new(bc.x[0], bc.x[1]);
    let v = match (bc.v, bc.p) {
        (Some(v), None) => NVec2::new(v[0], v[1]),
        (None, Some(p)) => NVec2::new(p[0], p[1]) / bc.m,
        (None, None) => NVec2::zeros(),
        (Some(_), Some(_)) => {
            return Err(SimError::invalid_config(
                format!("bodies[{i}]"),
                "give either v or p, not both",
            ))
        }
    };
    Ok(Body::new(x, v, bc.m))
}

fn build_solar_system(
    cfg: &SolarSystemConfig,
    engine: &EngineConfig,
    params: &Parameters,
) -> Result<Runner> {
    if cfg.bodies.is_empty() {
        return Err(SimError::invalid_config("bodies", "need at least one body"));
    }
    ensure_positive("G", cfg.G)?;
    ensure_non_negative("softening", cfg.softening)?;

    let bodies = cfg
        .bodies
        .iter()
        .enumerate()
        .map(|(i, bc)| body_from_config(i, bc))
        .collect::<Result<Vec<_>>>()?;

    let gravity = NewtonianGravity::new(cfg.G, cfg.softening).parallel(engine.parallel);
    let engine = GravityEngine::new(System::new(bodies), gravity, GravityScheme::SymplecticEuler)?;
    Ok(Runner::Gravity(SimulationDriver::new(engine, params)?))
}

fn build_particle_diffusion(cfg: &ParticleDiffusionConfig, params: &Parameters) -> Result<Runner> {
    if cfg.count == 0 {
        return Err(SimError::invalid_config("count", "need at least one particle"));
    }
    ensure_positive("box_size", cfg.box_size)?;
    ensure_positive("radius", cfg.radius)?;
    ensure_non_negative("max_speed", cfg.max_speed)?;
    if !(0.0..=1.0).contains(&cfg.clustering) {
        return Err(SimError::invalid_config(
            "clustering",
            format!("must be in [0, 1], got {}", cfg.clustering),
        ));
    }
    if cfg.grid_size == 0 {
        return Err(SimError::invalid_config("grid_size", "must be >= 1"));
    }
    let (l, r) = (cfg.box_size, cfg.radius);
    if l <= 2.0 * r {
        return Err(SimError::invalid_config("radius", "particles do not fit in the box"));
    }

    // clustering 0 spans [r, l - r], 1 collapses to the center
    let half = 0.5 * l;
    let low = r + cfg.clustering * (half - r);
    let high = half + (1.0 - cfg.clustering) * (half - r);

    let mut rng = StdRng::seed_from_u64(params.seed);
    let xs: Vec<NVec2> = (0..cfg.count)
        .map(|_| NVec2::new(rng.random_range(low..=high), rng.random_range(low..=high)))
        .collect();
    let vmax = cfg.max_speed;
    let particles = xs
        .into_iter()
        .map(|x| {
            let v = NVec2::new(rng.random_range(-vmax..=vmax), rng.random_range(-vmax..=vmax));
            Particle::new(x, v, r)
        })
        .collect();

    let collisions = CollisionSet::new()
        .with(WallBounce::boxed(l, l, 1.0)?)
        .with(ElasticPairs);
    let engine = ParticleEngine::new(Ensemble::new(particles), NVec2::zeros(), collisions)?
        .with_entropy(NVec2::zeros(), NVec2::new(l, l), cfg.grid_size);
    Ok(Runner::Particles(SimulationDriver::new(engine, params)?))
}

fn build_ball_box(cfg: &BallBoxConfig, params: &Parameters) -> Result<Runner> {
    let walls = WallBounce::boxed(cfg.width, cfg.height, cfg.restitution)?;
    ensure_positive("radius", cfg.radius)?;
    ensure_non_negative("max_speed", cfg.max_speed)?;
    let r = cfg.radius;
    if cfg.width <= 2.0 * r || cfg.height <= 2.0 * r {
        return Err(SimError::invalid_config("radius", "balls do not fit in the box"));
    }
    if cfg.balls.is_empty() && cfg.count == 0 {
        return Err(SimError::invalid_config("balls", "need at least one ball"));
    }

    let mut particles: Vec<Particle> = cfg
        .balls
        .iter()
        .map(|b| Particle::new(NVec2::new(b.x[0], b.x[1]), NVec2::new(b.v[0], b.v[1]), r))
        .collect();

    let mut rng = StdRng::seed_from_u64(params.seed);
    let vmax = cfg.max_speed;
    for _ in 0..cfg.count {
        let x = NVec2::new(
            rng.random_range(r..=cfg.width - r),
            rng.random_range(r..=cfg.height - r),
        );
        let v = NVec2::new(rng.random_range(0.0..=vmax), rng.random_range(0.0..=vmax));
        particles.push(Particle::new(x, v, r));
    }

    let mut collisions = CollisionSet::new().with(walls);
    if cfg.pairwise {
        collisions = collisions.with(ElasticPairs);
    }
    let field = NVec2::new(cfg.gravity[0], cfg.gravity[1]);
    let engine = ParticleEngine::new(Ensemble::new(particles), field, collisions)?;
    Ok(Runner::Particles(SimulationDriver::new(engine, params)?))
}

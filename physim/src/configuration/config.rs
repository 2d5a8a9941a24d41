//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! simulation scenario. A scenario consists of:
//!
//! - [`EngineConfig`]     – integrator choice and parallel force evaluation
//! - [`ParametersConfig`] – time grid, save interval and random seed
//! - [`ModelConfig`]      – the physical system, tagged by `kind`
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//! A double pendulum matching these types:
//!
//! ```yaml
//! engine:
//!   integrator: "rk4"       # or "euler"
//!
//! parameters:
//!   t_end: 20.0             # total simulation time
//!   h0: 0.01                # fixed step size
//!   dt_save: 0.05           # optional, save every 5th step
//!   seed: 0                 # deterministic seed
//!
//! model:
//!   kind: double_pendulum
//!   l1: 3.0
//!   l2: 2.0
//!   m1: 2.0
//!   m2: 3.0
//!   theta1_deg: 90.0
//!   omega1_deg: 45.0
//!   theta2_deg: -180.0
//!   omega2_deg: -20.0
//! ```
//!
//! Values are checked when the runtime [`Scenario`](crate::Scenario) is
//! built, not while parsing.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::simulation::integrator::Integrator;
use crate::simulation::params::Parameters;

/// Standard gravity, m/s²
pub const STANDARD_GRAVITY: f64 = 9.81;

fn default_g() -> f64 {
    STANDARD_GRAVITY
}

fn default_true() -> bool {
    true
}

fn default_grid_size() -> usize {
    20
}

fn default_max_speed() -> f64 {
    1.0
}

/// Engine-level options
#[derive(Deserialize, Debug, Clone, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub integrator: Integrator, // stepper for ODE models (pendulums, heat rod)
    #[serde(default)]
    pub parallel: bool, // per-body gravity sums on the rayon pool
}

/// Time grid and seed
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    pub t_end: f64, // time end
    pub h0: f64,    // integration step size
    #[serde(default)]
    pub dt_save: Option<f64>, // save interval, >= h0
    #[serde(default)]
    pub seed: u64, // deterministic seed to make runs reproducible
}

impl ParametersConfig {
    pub fn to_parameters(&self) -> Parameters {
        let params = Parameters::new(self.t_end, self.h0).with_seed(self.seed);
        match self.dt_save {
            Some(dt_save) => params.with_save_interval(dt_save),
            None => params,
        }
    }
}

/// Two-link pendulum, angles in degrees from the downward vertical
#[derive(Deserialize, Debug, Clone)]
pub struct DoublePendulumConfig {
    pub l1: f64,
    pub l2: f64,
    pub m1: f64,
    pub m2: f64,
    #[serde(default = "default_g")]
    pub g: f64,
    pub theta1_deg: f64,
    #[serde(default)]
    pub omega1_deg: f64,
    pub theta2_deg: f64,
    #[serde(default)]
    pub omega2_deg: f64,
}

/// Single pendulum with linear damping `k`
#[derive(Deserialize, Debug, Clone)]
pub struct DampedPendulumConfig {
    pub k: f64,
    pub l: f64,
    #[serde(default = "default_g")]
    pub g: f64,
    #[serde(default)]
    pub theta_deg: f64,
    #[serde(default)]
    pub omega_deg: f64,
}

/// Random cluster of softened gravitating bodies
#[allow(non_snake_case)]
#[derive(Deserialize, Debug, Clone)]
pub struct NBodyConfig {
    pub count: usize,
    pub total_mass: f64, // split evenly over the bodies
    pub G: f64,
    pub softening: f64,
    #[serde(default = "default_true")]
    pub zero_momentum: bool, // move to the center-of-mass frame at setup
}

/// Initial state of one body: velocity `v` or momentum `p`
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub x: [f64; 2],
    #[serde(default)]
    pub v: Option<[f64; 2]>,
    #[serde(default)]
    pub p: Option<[f64; 2]>,
    pub m: f64,
}

/// Explicit bodies under unsoftened gravity, symplectic Euler in momentum form
#[allow(non_snake_case)]
#[derive(Deserialize, Debug, Clone)]
pub struct SolarSystemConfig {
    pub G: f64,
    #[serde(default)]
    pub softening: f64,
    pub bodies: Vec<BodyConfig>,
}

/// Colliding discs seeded in a centered cluster of a square box
#[derive(Deserialize, Debug, Clone)]
pub struct ParticleDiffusionConfig {
    pub count: usize,
    pub box_size: f64,
    pub radius: f64,
    #[serde(default)]
    pub clustering: f64, // 0 spreads over the whole box, 1 packs at the center
    #[serde(default = "default_max_speed")]
    pub max_speed: f64, // velocity components drawn from [-max_speed, max_speed]
    #[serde(default = "default_grid_size")]
    pub grid_size: usize, // entropy histogram is grid_size x grid_size
}

/// One explicitly placed ball
#[derive(Deserialize, Debug, Clone)]
pub struct BallConfig {
    pub x: [f64; 2],
    pub v: [f64; 2],
}

/// Balls in a box with inelastic walls and an optional uniform field
#[derive(Deserialize, Debug, Clone)]
pub struct BallBoxConfig {
    pub width: f64,
    pub height: f64,
    pub radius: f64,
    pub restitution: f64,
    #[serde(default)]
    pub gravity: [f64; 2],
    #[serde(default)]
    pub balls: Vec<BallConfig>,
    #[serde(default)]
    pub count: usize, // extra balls placed at random
    #[serde(default = "default_max_speed")]
    pub max_speed: f64, // random velocity components drawn from [0, max_speed]
    #[serde(default)]
    pub pairwise: bool, // elastic ball-ball collisions as well
}

/// Rod with fixed flux at both ends
#[allow(non_snake_case)]
#[derive(Deserialize, Debug, Clone)]
pub struct HeatRodConfig {
    pub a: f64,
    pub b: f64,
    pub nx: usize,
    pub T0: f64, // uniform initial temperature
    pub k: f64,  // thermal conductivity
    #[serde(default)]
    pub alpha: Option<f64>, // diffusivity, else k / (density cp)
    #[serde(default)]
    pub density: Option<f64>,
    #[serde(default)]
    pub cp: Option<f64>,
    #[serde(default)]
    pub fa: f64,
    #[serde(default)]
    pub fb: f64,
    #[serde(default)]
    pub allow_unstable: bool, // accept lambda > 0.5
}

/// The physical system of a scenario
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    DoublePendulum(DoublePendulumConfig),
    DampedPendulum(DampedPendulumConfig),
    NBody(NBodyConfig),
    SolarSystem(SolarSystemConfig),
    ParticleDiffusion(ParticleDiffusionConfig),
    BallBox(BallBoxConfig),
    HeatRod(HeatRodConfig),
}

impl ModelConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelConfig::DoublePendulum(_) => "double_pendulum",
            ModelConfig::DampedPendulum(_) => "damped_pendulum",
            ModelConfig::NBody(_) => "n_body",
            ModelConfig::SolarSystem(_) => "solar_system",
            ModelConfig::ParticleDiffusion(_) => "particle_diffusion",
            ModelConfig::BallBox(_) => "ball_box",
            ModelConfig::HeatRod(_) => "heat_rod",
        }
    }
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub engine: EngineConfig, // integrator and parallelism
    pub parameters: ParametersConfig, // time grid and seed
    pub model: ModelConfig, // what is being simulated
}

impl ScenarioConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

pub mod error;
pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use error::{Result, SimError};

pub use simulation::states::{Body, Ensemble, NVec2, Particle, StateVector, System};
pub use simulation::params::Parameters;
pub use simulation::dynamics::{DynamicsModel, FnModel};
pub use simulation::diagnostics::{spatial_entropy, Diagnostics};
pub use simulation::integrator::{kick_drift, leapfrog, symplectic_euler, ExplicitEuler, Integrator, Rk4, Stepper};
pub use simulation::forces::{kinetic_energy, potential_energy, AccelSet, Acceleration, NewtonianGravity};
pub use simulation::pendulum::{chain_positions, DampedPendulum, DoublePendulum};
pub use simulation::heat::HeatRod;
pub use simulation::collision::{CollisionResolver, CollisionSet, ElasticPairs, WallBounce};
pub use simulation::engine::{Engine, GravityEngine, GravityScheme, OdeEngine, ParticleEngine};
pub use simulation::driver::{Frame, FrameSink, FrameState, Frames, LogSink, RunSummary, SimulationDriver, StopHandle};
pub use simulation::scenario::{Runner, Scenario};

pub use configuration::config::{EngineConfig, ModelConfig, ParametersConfig, ScenarioConfig};

pub use benchmark::benchmark::{bench_collisions, bench_gravity, bench_leapfrog};

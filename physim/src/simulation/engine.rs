//! Runtime engines: one owned simulation state plus the rule that advances it
//!
//! The driver only talks to the [`Engine`] trait:
//! - [`OdeEngine`]: flat state advanced by a [`Stepper`] over a [`DynamicsModel`]
//! - [`GravityEngine`]: gravitating bodies advanced by leapfrog or symplectic Euler
//! - [`ParticleEngine`]: discs in a box, kick-drift then collision resolution

use crate::error::{Result, SimError};
use crate::simulation::collision::CollisionSet;
use crate::simulation::diagnostics::{spatial_entropy, Diagnostics};
use crate::simulation::driver::FrameState;
use crate::simulation::dynamics::DynamicsModel;
use crate::simulation::forces::{kinetic_energy, potential_energy, AccelSet, NewtonianGravity};
use crate::simulation::integrator::{kick_drift, leapfrog, symplectic_euler, Integrator, Stepper};
use crate::simulation::params::ensure_positive;
use crate::simulation::states::{first_non_finite, Ensemble, NVec2, StateVector, System};

pub trait Engine: Clone {
    /// Current simulation time
    fn time(&self) -> f64;

    /// Advance the owned state by one step of size `dt`
    fn advance(&mut self, dt: f64) -> Result<()>;

    /// Copy of the current state for a frame
    fn snapshot(&self) -> FrameState;

    /// Derived quantities of the current state
    fn diagnostics(&self) -> Diagnostics;

    /// Every scalar of the state, in a stable order
    fn flatten(&self) -> Vec<f64>;

    /// First NaN/Inf scalar of [`Engine::flatten`], if any
    fn first_non_finite(&self) -> Option<(usize, f64)> {
        first_non_finite(self.flatten())
    }
}

// =========================================================================================
// ODE systems
// =========================================================================================

#[derive(Debug, Clone)]
pub struct OdeEngine<M> {
    pub model: M,
    pub integrator: Integrator,
    state: StateVector,
    t: f64,
}

impl<M: DynamicsModel + Clone> OdeEngine<M> {
    pub fn new(model: M, integrator: Integrator, state: StateVector) -> Result<Self> {
        if state.len() != model.dimension() {
            return Err(SimError::InvalidStateShape {
                expected: model.dimension(),
                found: state.len(),
            });
        }
        if let Some((index, value)) = state.first_non_finite() {
            return Err(SimError::invalid_config(
                "initial state",
                format!("state[{index}] = {value} is not finite"),
            ));
        }
        Ok(Self {
            model,
            integrator,
            state,
            t: 0.0,
        })
    }

    pub fn state(&self) -> &StateVector {
        &self.state
    }
}

impl<M: DynamicsModel + Clone> Engine for OdeEngine<M> {
    fn time(&self) -> f64 {
        self.t
    }

    fn advance(&mut self, dt: f64) -> Result<()> {
        let next = self.integrator.step(&self.model, self.t, dt, &self.state)?;
        if next.len() != self.state.len() {
            return Err(SimError::InvalidStateShape {
                expected: self.state.len(),
                found: next.len(),
            });
        }
        self.state = next;
        self.t += dt;
        Ok(())
    }

    fn snapshot(&self) -> FrameState {
        FrameState::Vector(self.state.clone())
    }

    fn diagnostics(&self) -> Diagnostics {
        self.model.diagnostics(&self.state)
    }

    fn flatten(&self) -> Vec<f64> {
        self.state.to_vec()
    }
}

// =========================================================================================
// gravitating bodies
// =========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GravityScheme {
    /// kick-drift-kick, velocities as state
    Leapfrog,
    /// `p += F dt; x += p/m dt`, momenta as state
    SymplecticEuler,
}

#[allow(non_snake_case)]
#[derive(Clone)]
pub struct GravityEngine {
    system: System,
    forces: AccelSet,
    scheme: GravityScheme,
    acc: Vec<NVec2>, // accelerations at the current positions (leapfrog)
    G: f64,
}

impl GravityEngine {
    pub fn new(system: System, gravity: NewtonianGravity, scheme: GravityScheme) -> Result<Self> {
        for (i, b) in system.bodies.iter().enumerate() {
            ensure_positive(&format!("bodies[{i}].m"), b.m)?;
        }
        if let Some((index, value)) = first_non_finite(system.flatten()) {
            return Err(SimError::invalid_config(
                "bodies",
                format!("initial value {index} = {value} is not finite"),
            ));
        }

        let g_const = gravity.G;
        let forces = AccelSet::new().with(gravity);
        let mut acc = vec![NVec2::zeros(); system.bodies.len()];
        if scheme == GravityScheme::Leapfrog {
            forces.accumulate_accels(system.t, &system, &mut acc);
        }

        Ok(Self {
            system,
            forces,
            scheme,
            acc,
            G: g_const,
        })
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn scheme(&self) -> GravityScheme {
        self.scheme
    }
}

impl Engine for GravityEngine {
    fn time(&self) -> f64 {
        self.system.t
    }

    fn advance(&mut self, dt: f64) -> Result<()> {
        match self.scheme {
            GravityScheme::Leapfrog => leapfrog(&mut self.system, &self.forces, &mut self.acc, dt),
            GravityScheme::SymplecticEuler => {
                symplectic_euler(&mut self.system, &self.forces, &mut self.acc, dt)
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> FrameState {
        FrameState::Bodies(self.system.bodies.clone())
    }

    fn diagnostics(&self) -> Diagnostics {
        Diagnostics::energy(
            kinetic_energy(&self.system),
            potential_energy(&self.system, self.G),
        )
    }

    fn flatten(&self) -> Vec<f64> {
        self.system.flatten()
    }
}

// =========================================================================================
// particles in a box
// =========================================================================================

#[derive(Clone)]
pub struct ParticleEngine {
    ensemble: Ensemble,
    field: NVec2,
    collisions: CollisionSet,
    entropy_grid: Option<(NVec2, NVec2, usize)>,
    last_contacts: usize,
}

impl ParticleEngine {
    pub fn new(ensemble: Ensemble, field: NVec2, collisions: CollisionSet) -> Result<Self> {
        for (i, p) in ensemble.particles.iter().enumerate() {
            ensure_positive(&format!("particles[{i}].radius"), p.radius)?;
        }
        if let Some((index, value)) = first_non_finite(ensemble.flatten()) {
            return Err(SimError::invalid_config(
                "particles",
                format!("initial value {index} = {value} is not finite"),
            ));
        }
        if !(field.x.is_finite() && field.y.is_finite()) {
            return Err(SimError::invalid_config("gravity", "must be finite"));
        }
        Ok(Self {
            ensemble,
            field,
            collisions,
            entropy_grid: None,
            last_contacts: 0,
        })
    }

    /// Report occupancy entropy over `grid_size²` cells of `[min, max]`
    pub fn with_entropy(mut self, min: NVec2, max: NVec2, grid_size: usize) -> Self {
        self.entropy_grid = Some((min, max, grid_size));
        self
    }

    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }
}

impl Engine for ParticleEngine {
    fn time(&self) -> f64 {
        self.ensemble.t
    }

    fn advance(&mut self, dt: f64) -> Result<()> {
        kick_drift(&mut self.ensemble, self.field, dt);
        self.last_contacts = self
            .collisions
            .resolve_all(&mut self.ensemble.particles)
            .iter()
            .sum();
        Ok(())
    }

    fn snapshot(&self) -> FrameState {
        FrameState::Particles(self.ensemble.particles.clone())
    }

    fn diagnostics(&self) -> Diagnostics {
        let kinetic: f64 = self
            .ensemble
            .particles
            .iter()
            .map(|p| 0.5 * p.v.norm_squared())
            .sum();
        let entropy = self
            .entropy_grid
            .map(|(min, max, grid)| spatial_entropy(&self.ensemble.particles, min, max, grid));
        Diagnostics {
            kinetic: Some(kinetic),
            potential: None,
            entropy,
            contacts: Some(self.last_contacts),
        }
    }

    fn flatten(&self) -> Vec<f64> {
        self.ensemble.flatten()
    }
}

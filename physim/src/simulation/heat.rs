//! One-dimensional heat conduction on a rod, explicit finite differences
//!
//! The rod `[a, b]` is split into `nx` cells, giving `nx + 1` nodes with
//! spacing `m = (b - a) / nx`. Written as an ODE in the node temperatures,
//! one explicit Euler step of size `p` with `λ = α p / m²` reproduces the
//! classic update:
//!
//! ```text
//! interior:  T'[x]  = (1 - 2λ) T[x]  + λ (T[x+1] + T[x-1])
//! left:      T'[0]  = (1 - 2λ) T[0]  + 2λ (T[1]    + fa m / k)
//! right:     T'[nx] = (1 - 2λ) T[nx] + 2λ (T[nx-1] + fb m / k)
//! ```
//!
//! The boundaries carry a fixed heat flux (Neumann condition) through a
//! ghost node. The scheme is stable only for `λ <= 0.5`.

use nalgebra::DVector;

use crate::error::{Result, SimError};
use crate::simulation::dynamics::DynamicsModel;
use crate::simulation::params::{ensure_finite, ensure_positive};
use crate::simulation::states::StateVector;

/// Largest stable `λ` of the explicit scheme
pub const MAX_STABLE_LAMBDA: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct HeatRod {
    pub a: f64,     // left end
    pub b: f64,     // right end
    pub nx: usize,  // number of cells
    pub alpha: f64, // thermal diffusivity
    pub k: f64,     // thermal conductivity
    pub fa: f64,    // heat flux at the left end
    pub fb: f64,    // heat flux at the right end
}

impl HeatRod {
    pub fn new(a: f64, b: f64, nx: usize, alpha: f64, k: f64, fa: f64, fb: f64) -> Result<Self> {
        ensure_finite("a", a)?;
        ensure_positive("b - a", b - a)?;
        if nx < 2 {
            return Err(SimError::invalid_config("nx", format!("need at least 2 cells, got {nx}")));
        }
        ensure_positive("alpha", alpha)?;
        ensure_positive("k", k)?;
        ensure_finite("fa", fa)?;
        ensure_finite("fb", fb)?;
        Ok(Self { a, b, nx, alpha, k, fa, fb })
    }

    /// Node spacing `m`
    pub fn spacing(&self) -> f64 {
        (self.b - self.a) / self.nx as f64
    }

    /// Stability number `λ = α p / m²` for time step `p`
    pub fn lambda(&self, dt: f64) -> f64 {
        let m = self.spacing();
        self.alpha * dt / (m * m)
    }

    pub fn is_stable(&self, dt: f64) -> bool {
        self.lambda(dt) <= MAX_STABLE_LAMBDA
    }

    /// Node coordinates `a + i m`, `i = 0..=nx`
    pub fn node_positions(&self) -> Vec<f64> {
        let m = self.spacing();
        (0..=self.nx).map(|i| self.a + i as f64 * m).collect()
    }

    /// Uniform initial profile
    pub fn uniform(&self, temperature: f64) -> StateVector {
        StateVector::filled(self.nx + 1, temperature)
    }
}

impl DynamicsModel for HeatRod {
    fn dimension(&self) -> usize {
        self.nx + 1
    }

    fn derivative(&self, _t: f64, state: &StateVector) -> DVector<f64> {
        let n = state.len();
        let mut rate = DVector::zeros(n);
        if n < 2 {
            return rate;
        }

        let m = self.spacing();
        let coef = self.alpha / (m * m);
        let last = n - 1;

        // ghost-node boundaries
        rate[0] = 2.0 * coef * (state[1] - state[0] + self.fa * m / self.k);
        rate[last] = 2.0 * coef * (state[last - 1] - state[last] + self.fb * m / self.k);

        for x in 1..last {
            rate[x] = coef * (state[x + 1] - 2.0 * state[x] + state[x - 1]);
        }
        rate
    }
}

//! Acceleration contributors and energy diagnostics for gravitating bodies
//!
//! Defines the acceleration trait, the set that sums its terms, and
//! Newtonian gravity with a softening length (serial pairwise or rayon
//! parallel per-body sums)

use std::sync::Arc;

use rayon::prelude::*;

use crate::simulation::states::{NVec2, System};

/// Collection of acceleration terms (gravity, drag, etc.)
/// Each term implements [`Acceleration`] and their contributions are summed
/// into a single acceleration vector per body
#[derive(Clone, Default)]
pub struct AccelSet {
    terms: Vec<Arc<dyn Acceleration + Send + Sync>>,
}

impl AccelSet {
    /// Create an empty acceleration set
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Add an acceleration term
    pub fn with<T>(mut self, term: T) -> Self
    where
        T: Acceleration + Send + Sync + 'static,
    {
        self.terms.push(Arc::new(term));
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Compute total accelerations at time `t` for all bodies in `sys`
    /// - `out[i]` will be set to the sum of contributions from all terms
    pub fn accumulate_accels(&self, t: f64, sys: &System, out: &mut [NVec2]) {
        // Zero buffer
        for a in out.iter_mut() {
            *a = NVec2::zeros();
        }
        // Iterate over all acceleration contributors
        for term in &self.terms {
            term.acceleration(t, sys, out);
        }
    }
}

/// Acceleration source operating on a [`System`]
/// Implementations add their contribution into `out[i]` for each body
pub trait Acceleration {
    fn acceleration(&self, t: f64, sys: &System, out: &mut [NVec2]);
}

/// Newtonian gravity with softening
///
/// `a_i = G Σ_{j≠i} m_j (x_j - x_i) / (|x_j - x_i|² + ε²)^1.5`
///
/// The self term is skipped by index, never by testing for zero distance.
/// With `eps2 == 0` two coincident bodies produce an infinite acceleration,
/// which the driver reports as a divergence.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct NewtonianGravity {
    pub G: f64,         // gravitational constant
    pub eps2: f64,      // softening length squared
    pub parallel: bool, // per-body sums on the rayon pool
}

impl NewtonianGravity {
    #[allow(non_snake_case)]
    pub fn new(G: f64, softening: f64) -> Self {
        Self {
            G,
            eps2: softening * softening,
            parallel: false,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Acceleration on body `i` from every other body
    fn pull_on(&self, i: usize, sys: &System) -> NVec2 {
        let xi = sys.bodies[i].x;
        let mut acc = NVec2::zeros();
        for (j, bj) in sys.bodies.iter().enumerate() {
            if j == i {
                continue;
            }
            let r = bj.x - xi;
            let d2 = r.dot(&r) + self.eps2;
            let inv_r = d2.sqrt().recip();
            let inv_r3 = inv_r * inv_r * inv_r;
            acc += self.G * bj.m * inv_r3 * r;
        }
        acc
    }
}

impl Acceleration for NewtonianGravity {
    fn acceleration(&self, _t: f64, sys: &System, out: &mut [NVec2]) {
        let n = sys.bodies.len();
        if n == 0 { // No bodies, return
            return;
        }

        if self.parallel {
            // every out[i] is independent; the buffer is complete before
            // the integrator reads it
            out.par_iter_mut()
                .enumerate()
                .for_each(|(i, a)| *a += self.pull_on(i, sys));
            return;
        }

        // Loop over each unordered pair (i, j) with i < j
        for i in 0..n {
            let xi = sys.bodies[i].x;
            let mi = sys.bodies[i].m;

            for j in (i + 1)..n {
                let xj = sys.bodies[j].x;
                let mj = sys.bodies[j].m;

                // r points from i to j: i is pulled along +r, j along -r
                let r = xj - xi;
                let d2 = r.dot(&r) + self.eps2;
                let inv_r = d2.sqrt().recip();
                let inv_r3 = inv_r * inv_r * inv_r;
                let coef = self.G * inv_r3;

                out[i] += coef * mj * r;
                out[j] -= coef * mi * r;
            }
        }
    }
}

// =========================================================================================
// energies
// =========================================================================================

/// `KE = 0.5 Σ m |v|²`
pub fn kinetic_energy(sys: &System) -> f64 {
    sys.bodies.iter().map(|b| b.kinetic_energy()).sum()
}

/// `PE = -G Σ_{i<j} m_i m_j / |x_i - x_j|`
///
/// Each unordered pair is counted once. The potential is unsoftened
/// whatever softening the force uses; pairs at zero separation are skipped.
#[allow(non_snake_case)]
pub fn potential_energy(sys: &System, G: f64) -> f64 {
    let n = sys.bodies.len();
    let mut pe = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let d = (sys.bodies[j].x - sys.bodies[i].x).norm();
            if d > 0.0 {
                pe -= G * sys.bodies[i].m * sys.bodies[j].m / d;
            }
        }
    }
    pe
}

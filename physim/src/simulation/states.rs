//! Core state types for the simulations.
//!
//! - `NVec2`: 2D vector used by every particle-like state
//! - `StateVector`: flat, fixed-length state of an ODE system
//!   (`[θ1, ω1, θ2, ω2]`, `[θ, ω]`, or a temperature profile)
//! - `Body` / `System`: gravitating bodies and the current time
//! - `Particle` / `Ensemble`: hard discs in a box and the current time

use std::ops::{Index, IndexMut};

use nalgebra::{DVector, Vector2};

pub type NVec2 = Vector2<f64>;

/// Ordered real-valued state of an ODE system.
///
/// The length is fixed when the state is created. Integrators produce a
/// new vector of the same length each step and never resize it.
#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    values: DVector<f64>,
}

impl StateVector {
    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            values: DVector::from_column_slice(values),
        }
    }

    pub fn zeros(len: usize) -> Self {
        Self {
            values: DVector::zeros(len),
        }
    }

    pub fn filled(len: usize, value: f64) -> Self {
        Self {
            values: DVector::from_element(len, value),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        self.values.as_slice()
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    /// `self + scale * rate`, the building block of every explicit stepper
    pub fn offset(&self, rate: &DVector<f64>, scale: f64) -> Self {
        let mut values = self.values.clone();
        values.axpy(scale, rate, 1.0);
        Self { values }
    }

    /// First NaN/Inf entry, if any
    pub fn first_non_finite(&self) -> Option<(usize, f64)> {
        first_non_finite(self.values.iter().copied())
    }
}

impl From<DVector<f64>> for StateVector {
    fn from(values: DVector<f64>) -> Self {
        Self { values }
    }
}

impl Index<usize> for StateVector {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.values[i]
    }
}

impl IndexMut<usize> for StateVector {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.values[i]
    }
}

/// A gravitating point mass. Mass is fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub x: NVec2, // position
    pub v: NVec2, // velocity
    pub m: f64,   // mass
}

impl Body {
    pub fn new(x: NVec2, v: NVec2, m: f64) -> Self {
        Self { x, v, m }
    }

    pub fn momentum(&self) -> NVec2 {
        self.v * self.m
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.m * self.v.norm_squared()
    }
}

#[derive(Debug, Clone)]
pub struct System {
    pub bodies: Vec<Body>, // collection of bodies
    pub t: f64,            // time
}

impl System {
    pub fn new(bodies: Vec<Body>) -> Self {
        Self { bodies, t: 0.0 }
    }

    pub fn total_mass(&self) -> f64 {
        self.bodies.iter().map(|b| b.m).sum()
    }

    pub fn total_momentum(&self) -> NVec2 {
        self.bodies
            .iter()
            .fold(NVec2::zeros(), |acc, b| acc + b.momentum())
    }

    /// Shift every velocity so the total momentum is zero.
    /// `v -= mean(m v) / mean(m)`, applied once at setup.
    pub fn zero_momentum(&mut self) {
        let m_total = self.total_mass();
        if self.bodies.is_empty() || m_total <= 0.0 {
            return;
        }
        let v_com = self.total_momentum() / m_total;
        for b in self.bodies.iter_mut() {
            b.v -= v_com;
        }
    }

    pub fn flatten(&self) -> Vec<f64> {
        self.bodies
            .iter()
            .flat_map(|b| [b.x.x, b.x.y, b.v.x, b.v.y])
            .collect()
    }
}

/// A hard disc of fixed radius. All particles share unit mass.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: NVec2,
    pub v: NVec2,
    pub radius: f64,
}

impl Particle {
    pub fn new(x: NVec2, v: NVec2, radius: f64) -> Self {
        Self { x, v, radius }
    }
}

#[derive(Debug, Clone)]
pub struct Ensemble {
    pub particles: Vec<Particle>,
    pub t: f64,
}

impl Ensemble {
    pub fn new(particles: Vec<Particle>) -> Self {
        Self { particles, t: 0.0 }
    }

    pub fn flatten(&self) -> Vec<f64> {
        self.particles
            .iter()
            .flat_map(|p| [p.x.x, p.x.y, p.v.x, p.v.y])
            .collect()
    }
}

pub(crate) fn first_non_finite(values: impl IntoIterator<Item = f64>) -> Option<(usize, f64)> {
    values.into_iter().enumerate().find(|(_, v)| !v.is_finite())
}

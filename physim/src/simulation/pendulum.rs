//! Pendulum models
//!
//! - [`DoublePendulum`]: two rigid massless rods with point masses, no
//!   driving torque. State `[θ1, ω1, θ2, ω2]`, angles from the downward
//!   vertical.
//! - [`DampedPendulum`]: single pendulum with linear damping,
//!   `θ'' = -k θ' - (g/L) sin θ`. State `[θ, ω]`.
//!
//! [`chain_positions`] projects link angles to Cartesian joint positions
//! for renderers; it is not part of the integrated state.

use nalgebra::DVector;

use crate::error::Result;
use crate::simulation::diagnostics::Diagnostics;
use crate::simulation::dynamics::DynamicsModel;
use crate::simulation::params::{ensure_finite, ensure_non_negative, ensure_positive};
use crate::simulation::states::{NVec2, StateVector};

#[derive(Debug, Clone, PartialEq)]
pub struct DoublePendulum {
    pub l1: f64, // upper rod length
    pub l2: f64, // lower rod length
    pub m1: f64, // upper mass
    pub m2: f64, // lower mass
    pub g: f64,  // gravitational acceleration
}

impl DoublePendulum {
    pub fn new(l1: f64, l2: f64, m1: f64, m2: f64, g: f64) -> Result<Self> {
        ensure_positive("l1", l1)?;
        ensure_positive("l2", l2)?;
        ensure_positive("m1", m1)?;
        ensure_positive("m2", m2)?;
        ensure_finite("g", g)?;
        Ok(Self { l1, l2, m1, m2, g })
    }

    pub fn initial_state(theta1: f64, omega1: f64, theta2: f64, omega2: f64) -> StateVector {
        StateVector::from_slice(&[theta1, omega1, theta2, omega2])
    }

    /// Positions of the two masses, pivot at the origin
    pub fn cartesian(&self, state: &StateVector) -> [NVec2; 2] {
        let joints = chain_positions(&[state[0], state[2]], &[self.l1, self.l2]);
        [joints[0], joints[1]]
    }

    /// Kinetic plus potential energy, zero height at the pivot
    pub fn mechanical_energy(&self, state: &StateVector) -> (f64, f64) {
        let (t1, w1, t2, w2) = (state[0], state[1], state[2], state[3]);
        let (l1, l2, m1, m2, g) = (self.l1, self.l2, self.m1, self.m2, self.g);

        let kinetic = 0.5 * m1 * l1 * l1 * w1 * w1
            + 0.5 * m2 * (l1 * l1 * w1 * w1 + l2 * l2 * w2 * w2 + 2.0 * l1 * l2 * w1 * w2 * (t1 - t2).cos());
        let potential = -(m1 + m2) * g * l1 * t1.cos() - m2 * g * l2 * t2.cos();
        (kinetic, potential)
    }
}

impl DynamicsModel for DoublePendulum {
    fn dimension(&self) -> usize {
        4
    }

    fn derivative(&self, _t: f64, state: &StateVector) -> DVector<f64> {
        let (t1, w1, t2, w2) = (state[0], state[1], state[2], state[3]);
        let (l1, l2, m1, m2, g) = (self.l1, self.l2, self.m1, self.m2, self.g);

        let (s, c) = (t1 - t2).sin_cos();
        // >= m1 > 0 for positive masses
        let den = m1 + m2 * s * s;

        let w1_dot = (m2 * g * t2.sin() * c
            - m2 * s * (l1 * w1 * w1 * c + l2 * w2 * w2)
            - (m1 + m2) * g * t1.sin())
            / (l1 * den);
        let w2_dot = ((m1 + m2) * (l1 * w1 * w1 * s - g * t2.sin() + g * t1.sin() * c)
            + m2 * l2 * w2 * w2 * s * c)
            / (l2 * den);

        DVector::from_column_slice(&[w1, w1_dot, w2, w2_dot])
    }

    fn diagnostics(&self, state: &StateVector) -> Diagnostics {
        let (kinetic, potential) = self.mechanical_energy(state);
        Diagnostics::energy(kinetic, potential)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DampedPendulum {
    pub k: f64, // damping coefficient
    pub g: f64, // gravitational acceleration
    pub l: f64, // rod length
}

impl DampedPendulum {
    pub fn new(k: f64, g: f64, l: f64) -> Result<Self> {
        ensure_non_negative("k", k)?;
        ensure_finite("g", g)?;
        ensure_positive("l", l)?;
        Ok(Self { k, g, l })
    }

    pub fn initial_state(theta: f64, omega: f64) -> StateVector {
        StateVector::from_slice(&[theta, omega])
    }

    /// Bob position on a rod of length `l`
    pub fn cartesian(&self, state: &StateVector) -> NVec2 {
        chain_positions(&[state[0]], &[self.l])[0]
    }
}

impl DynamicsModel for DampedPendulum {
    fn dimension(&self) -> usize {
        2
    }

    fn derivative(&self, _t: f64, state: &StateVector) -> DVector<f64> {
        let (theta, omega) = (state[0], state[1]);
        let omega_dot = -self.k * omega - self.g / self.l * theta.sin();
        DVector::from_column_slice(&[omega, omega_dot])
    }

    /// `0.5 θ'²`, tracked for plotting only
    fn diagnostics(&self, state: &StateVector) -> Diagnostics {
        Diagnostics {
            kinetic: Some(0.5 * state[1] * state[1]),
            ..Diagnostics::default()
        }
    }
}

/// Joint positions of a planar chain hanging from the origin.
///
/// Link `i` has angle `thetas[i]` from the downward vertical and length
/// `lengths[i]`; extra entries in the longer slice are ignored.
pub fn chain_positions(thetas: &[f64], lengths: &[f64]) -> Vec<NVec2> {
    let mut joint = NVec2::zeros();
    thetas
        .iter()
        .zip(lengths)
        .map(|(&theta, &len)| {
            joint += NVec2::new(len * theta.sin(), -len * theta.cos());
            joint
        })
        .collect()
}

//! Fixed-step time integrators
//!
//! Two families live here:
//! - [`Stepper`] strategies for flat ODE states (`ExplicitEuler`, `Rk4`),
//!   selected at runtime through [`Integrator`]
//! - in-place schemes for particle systems: kick-drift-kick leapfrog for
//!   softened N-body gravity, momentum-form symplectic Euler for the solar
//!   system, and a kick-then-drift update for particles in a box

use serde::Deserialize;

use super::dynamics::{checked_derivative, DynamicsModel};
use super::forces::AccelSet;
use super::states::{Ensemble, NVec2, StateVector, System};
use crate::error::{Result, SimError};

/// A single-step method for `dy/dt = f(t, y)`.
///
/// `step` returns the state at `t + dt` and leaves its input untouched.
/// With `dt == 0` the returned state equals the input.
pub trait Stepper {
    fn step<M: DynamicsModel + ?Sized>(
        &self,
        model: &M,
        t: f64,
        dt: f64,
        state: &StateVector,
    ) -> Result<StateVector>;
}

fn check_dt(dt: f64) -> Result<()> {
    if dt.is_finite() && dt >= 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid_config("dt", format!("must be finite and >= 0, got {dt}")))
    }
}

/// `y' = y + dt * f(t, y)`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplicitEuler;

impl Stepper for ExplicitEuler {
    fn step<M: DynamicsModel + ?Sized>(
        &self,
        model: &M,
        t: f64,
        dt: f64,
        state: &StateVector,
    ) -> Result<StateVector> {
        check_dt(dt)?;
        let rate = checked_derivative(model, t, state)?;
        Ok(state.offset(&rate, dt))
    }
}

/// Classical fourth-order Runge-Kutta with a fixed step
#[derive(Debug, Clone, Copy, Default)]
pub struct Rk4;

impl Stepper for Rk4 {
    fn step<M: DynamicsModel + ?Sized>(
        &self,
        model: &M,
        t: f64,
        dt: f64,
        state: &StateVector,
    ) -> Result<StateVector> {
        check_dt(dt)?;
        let half_dt = 0.5 * dt;

        let k1 = checked_derivative(model, t, state)?;
        let k2 = checked_derivative(model, t + half_dt, &state.offset(&k1, half_dt))?;
        let k3 = checked_derivative(model, t + half_dt, &state.offset(&k2, half_dt))?;
        let k4 = checked_derivative(model, t + dt, &state.offset(&k3, dt))?;

        // y + dt/6 (k1 + 2 k2 + 2 k3 + k4)
        let mut slope = k1;
        slope.axpy(2.0, &k2, 1.0);
        slope.axpy(2.0, &k3, 1.0);
        slope += k4;
        Ok(state.offset(&slope, dt / 6.0))
    }
}

/// Which stepper an ODE scenario uses
/// `integrator: "euler"` or `integrator: "rk4"`
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Integrator {
    #[serde(rename = "euler")] // first order, used by the damped pendulum and heat rod
    Euler,

    #[default]
    #[serde(rename = "rk4")] // fourth order, stands in for an adaptive solver on long horizons
    Rk4,
}

impl Stepper for Integrator {
    fn step<M: DynamicsModel + ?Sized>(
        &self,
        model: &M,
        t: f64,
        dt: f64,
        state: &StateVector,
    ) -> Result<StateVector> {
        match self {
            Integrator::Euler => ExplicitEuler.step(model, t, dt, state),
            Integrator::Rk4 => Rk4.step(model, t, dt, state),
        }
    }
}

// =========================================================================================
// particle systems below
// =========================================================================================

/// Advance the system by one kick-drift-kick leapfrog step.
///
/// `acc` must hold the accelerations at the current positions on entry and
/// holds the accelerations at the new positions on return, so each step
/// costs one force evaluation.
pub fn leapfrog(sys: &mut System, forces: &AccelSet, acc: &mut [NVec2], dt: f64) {
    let n = sys.bodies.len();
    if n == 0 { // no bodies, only time moves
        sys.t += dt;
        return;
    }

    let half_dt = 0.5 * dt;

    // Kick: v_n+1/2 = v_n + (dt/2) a_n
    for (b, a) in sys.bodies.iter_mut().zip(acc.iter()) {
        b.v += half_dt * *a;
    }

    // Drift: x_n+1 = x_n + dt v_n+1/2
    for b in sys.bodies.iter_mut() {
        b.x += dt * b.v;
    }

    sys.t += dt;

    // a_n+1 from x_n+1
    forces.accumulate_accels(sys.t, &*sys, acc);

    // Kick: v_n+1 = v_n+1/2 + (dt/2) a_n+1
    for (b, a) in sys.bodies.iter_mut().zip(acc.iter()) {
        b.v += half_dt * *a;
    }
}

/// Advance the system by one symplectic Euler step in momentum form:
/// `p += F dt`, then `x += p/m dt`, with every force taken from the
/// positions at the start of the step.
pub fn symplectic_euler(sys: &mut System, forces: &AccelSet, acc: &mut [NVec2], dt: f64) {
    forces.accumulate_accels(sys.t, &*sys, acc);

    for (b, a) in sys.bodies.iter_mut().zip(acc.iter()) {
        let force = b.m * *a;
        let p = b.momentum() + force * dt;
        b.v = p / b.m;
    }

    for b in sys.bodies.iter_mut() {
        b.x += dt * b.v;
    }

    sys.t += dt;
}

/// Kick every particle with a uniform field, then drift it.
/// With a zero field this is the plain `x += v dt` update.
pub fn kick_drift(ensemble: &mut Ensemble, field: NVec2, dt: f64) {
    for p in ensemble.particles.iter_mut() {
        p.v += dt * field;
        p.x += dt * p.v;
    }
    ensemble.t += dt;
}

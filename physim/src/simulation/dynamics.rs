//! Dynamics models: right-hand sides `dy/dt = f(t, y)` of ODE systems
//!
//! A model is pure: it reads the state and its own parameters and returns
//! a derivative of the same length. Integrators verify the length.

use nalgebra::DVector;

use crate::error::{Result, SimError};
use crate::simulation::diagnostics::Diagnostics;
use crate::simulation::states::StateVector;

pub trait DynamicsModel {
    /// Length of the state vector this model works on
    fn dimension(&self) -> usize;

    /// Time derivative of `state` at time `t`
    fn derivative(&self, t: f64, state: &StateVector) -> DVector<f64>;

    /// Derived, non-authoritative quantities for a frame
    fn diagnostics(&self, _state: &StateVector) -> Diagnostics {
        Diagnostics::default()
    }
}

/// Evaluate `model`, rejecting states and derivatives whose length differs
/// from the model dimension
pub fn checked_derivative<M: DynamicsModel + ?Sized>(
    model: &M,
    t: f64,
    state: &StateVector,
) -> Result<DVector<f64>> {
    if state.len() != model.dimension() {
        return Err(SimError::InvalidStateShape {
            expected: model.dimension(),
            found: state.len(),
        });
    }
    let rate = model.derivative(t, state);
    if rate.len() != state.len() {
        return Err(SimError::InvalidStateShape {
            expected: state.len(),
            found: rate.len(),
        });
    }
    Ok(rate)
}

/// Wraps a closure as a [`DynamicsModel`]
#[derive(Clone)]
pub struct FnModel<F> {
    dimension: usize,
    f: F,
}

impl<F> FnModel<F>
where
    F: Fn(f64, &StateVector) -> DVector<f64>,
{
    pub fn new(dimension: usize, f: F) -> Self {
        Self { dimension, f }
    }
}

impl<F> DynamicsModel for FnModel<F>
where
    F: Fn(f64, &StateVector) -> DVector<f64>,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn derivative(&self, t: f64, state: &StateVector) -> DVector<f64> {
        (self.f)(t, state)
    }
}

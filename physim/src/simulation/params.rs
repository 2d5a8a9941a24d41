//! Numerical parameters of a run and shared validation helpers
//!
//! `Parameters` holds the time grid:
//! - integration step size and end time,
//! - optional save interval for decimated output,
//! - random seed for generated initial conditions

use crate::error::{Result, SimError};

#[derive(Debug, Clone)]
pub struct Parameters {
    pub t_end: f64,           // time end
    pub h0: f64,              // step size
    pub dt_save: Option<f64>, // save interval, >= h0
    pub seed: u64,            // deterministic seed
}

impl Parameters {
    pub fn new(t_end: f64, h0: f64) -> Self {
        Self {
            t_end,
            h0,
            dt_save: None,
            seed: 0,
        }
    }

    pub fn with_save_interval(mut self, dt_save: f64) -> Self {
        self.dt_save = Some(dt_save);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("h0", self.h0)?;
        ensure_positive("t_end", self.t_end)?;
        if let Some(dt_save) = self.dt_save {
            ensure_positive("dt_save", dt_save)?;
            if dt_save < self.h0 {
                return Err(SimError::invalid_config(
                    "dt_save",
                    format!("save interval {dt_save} is shorter than the step {}", self.h0),
                ));
            }
        }
        Ok(())
    }

    /// Number of integration steps on the grid `[0, t_end]`
    pub fn n_steps(&self) -> usize {
        let raw = self.t_end / self.h0;
        let nearest = raw.round();
        // 0.07 / 0.0001 is 700.0000000000001, not a 701st step
        if (raw - nearest).abs() <= 1e-9 * nearest.max(1.0) {
            nearest as usize
        } else {
            raw.ceil() as usize
        }
    }

    /// Steps between saved frames
    pub fn save_stride(&self) -> usize {
        match self.dt_save {
            Some(dt_save) => {
                let raw = dt_save / self.h0;
                let nearest = raw.round();
                let stride = if (raw - nearest).abs() <= 1e-9 * nearest.max(1.0) {
                    nearest
                } else {
                    raw.ceil()
                };
                (stride as usize).max(1)
            }
            None => 1,
        }
    }
}

pub fn ensure_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid_config(field, format!("must be > 0, got {value}")))
    }
}

pub fn ensure_non_negative(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SimError::invalid_config(field, format!("must be >= 0, got {value}")))
    }
}

pub fn ensure_finite(field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SimError::invalid_config(field, format!("must be finite, got {value}")))
    }
}

/// Coefficient of restitution must lie in (0, 1]
pub fn ensure_restitution(field: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(SimError::invalid_config(field, format!("must be in (0, 1], got {value}")))
    }
}

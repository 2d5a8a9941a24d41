//! Per-frame derived quantities. Recomputed from the state every time a
//! frame is emitted and never fed back into the integration.

use crate::simulation::states::{NVec2, Particle};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Diagnostics {
    pub kinetic: Option<f64>,
    pub potential: Option<f64>,
    pub entropy: Option<f64>,
    pub contacts: Option<usize>, // contacts resolved in the last step
}

impl Diagnostics {
    pub fn energy(kinetic: f64, potential: f64) -> Self {
        Self {
            kinetic: Some(kinetic),
            potential: Some(potential),
            ..Self::default()
        }
    }

    /// Kinetic plus potential, when both are known
    pub fn total_energy(&self) -> Option<f64> {
        Some(self.kinetic? + self.potential?)
    }
}

/// Shannon entropy `-Σ p ln p` of particle occupancy over a
/// `grid_size x grid_size` partition of the box `[min, max]`.
///
/// Particles on the upper edge fall into the last cell; particles outside
/// the box are ignored. Empty cells contribute nothing.
pub fn spatial_entropy(particles: &[Particle], min: NVec2, max: NVec2, grid_size: usize) -> f64 {
    if grid_size == 0 || particles.is_empty() {
        return 0.0;
    }

    let extent = max - min;
    let mut counts = vec![0usize; grid_size * grid_size];
    let mut total = 0usize;

    for p in particles {
        let (Some(ix), Some(iy)) = (
            bin(p.x.x - min.x, extent.x, grid_size),
            bin(p.x.y - min.y, extent.y, grid_size),
        ) else {
            continue;
        };
        counts[iy * grid_size + ix] += 1;
        total += 1;
    }

    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum()
}

fn bin(offset: f64, extent: f64, grid_size: usize) -> Option<usize> {
    if !(offset >= 0.0 && offset <= extent) || extent <= 0.0 {
        return None;
    }
    let idx = (offset / extent * grid_size as f64) as usize;
    Some(idx.min(grid_size - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64) -> Particle {
        Particle::new(NVec2::new(x, y), NVec2::zeros(), 0.1)
    }

    #[test]
    fn single_cell_has_zero_entropy() {
        let ps = vec![at(0.1, 0.1), at(0.2, 0.2), at(0.3, 0.1)];
        let s = spatial_entropy(&ps, NVec2::zeros(), NVec2::new(10.0, 10.0), 4);
        assert_eq!(s, 0.0);
    }

    #[test]
    fn uniform_spread_is_ln_of_cells() {
        let ps = vec![at(1.0, 1.0), at(6.0, 1.0), at(1.0, 6.0), at(6.0, 6.0)];
        let s = spatial_entropy(&ps, NVec2::zeros(), NVec2::new(10.0, 10.0), 2);
        assert!((s - 4.0_f64.ln()).abs() < 1e-12, "got {s}");
    }

    #[test]
    fn upper_edge_lands_in_last_cell() {
        assert_eq!(bin(10.0, 10.0, 4), Some(3));
        assert_eq!(bin(-0.1, 10.0, 4), None);
    }
}

//! Collision handling for particles in a box
//!
//! Two resolvers share one contract, `resolve(particles)`, which mutates
//! the particles in place and reports how many contacts it handled:
//!
//! - [`WallBounce`]: axis-aligned walls with a coefficient of restitution
//! - [`ElasticPairs`]: equal-mass elastic impulses along the line of
//!   centers plus overlap correction, naive O(N²) over unordered pairs
//!
//! [`CollisionSet`] runs several resolvers in registration order.

use std::sync::Arc;

use crate::error::Result;
use crate::simulation::params::{ensure_positive, ensure_restitution};
use crate::simulation::states::{NVec2, Particle};

pub trait CollisionResolver {
    /// Resolve contacts in place, returning the number handled
    fn resolve(&self, particles: &mut [Particle]) -> usize;
}

/// Resolvers applied one after another each step
#[derive(Clone, Default)]
pub struct CollisionSet {
    resolvers: Vec<Arc<dyn CollisionResolver + Send + Sync>>,
}

impl CollisionSet {
    pub fn new() -> Self {
        Self { resolvers: Vec::new() }
    }

    /// Add a resolver
    pub fn with<T>(mut self, resolver: T) -> Self
    where
        T: CollisionResolver + Send + Sync + 'static,
    {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Run every resolver, returning per-resolver contact counts
    pub fn resolve_all(&self, particles: &mut [Particle]) -> Vec<usize> {
        self.resolvers.iter().map(|r| r.resolve(particles)).collect()
    }
}

/// Axis-aligned box `[min, max]` with restitution `c` in (0, 1].
///
/// A particle touching a wall (`x - r <= min` or `x + r >= max` on an
/// axis) is clamped to `min + r` / `max - r` and its velocity component is
/// set to point back into the box with magnitude `c |v|`.
#[derive(Debug, Clone, PartialEq)]
pub struct WallBounce {
    pub min: NVec2,
    pub max: NVec2,
    pub restitution: f64,
}

impl WallBounce {
    pub fn new(min: NVec2, max: NVec2, restitution: f64) -> Result<Self> {
        ensure_positive("box width", max.x - min.x)?;
        ensure_positive("box height", max.y - min.y)?;
        ensure_restitution("restitution", restitution)?;
        Ok(Self { min, max, restitution })
    }

    /// Box `[0, width] x [0, height]`
    pub fn boxed(width: f64, height: f64, restitution: f64) -> Result<Self> {
        Self::new(NVec2::zeros(), NVec2::new(width, height), restitution)
    }
}

impl CollisionResolver for WallBounce {
    fn resolve(&self, particles: &mut [Particle]) -> usize {
        let mut hits = 0;
        for p in particles.iter_mut() {
            for axis in 0..2 {
                if p.x[axis] - p.radius <= self.min[axis] {
                    p.x[axis] = self.min[axis] + p.radius;
                    p.v[axis] = self.restitution * p.v[axis].abs();
                    hits += 1;
                } else if p.x[axis] + p.radius >= self.max[axis] {
                    p.x[axis] = self.max[axis] - p.radius;
                    p.v[axis] = -self.restitution * p.v[axis].abs();
                    hits += 1;
                }
            }
        }
        hits
    }
}

/// Elastic collisions between equal-mass discs.
///
/// For every unordered pair closer than the sum of their radii:
///
/// ```text
/// v_i -= ((v_i - v_j)·(x_i - x_j) / |x_i - x_j|²) (x_i - x_j)
/// v_j += the same impulse
/// ```
///
/// then both centers are pushed apart by half the overlap along the
/// contact normal. Coincident centers have no normal; the pair is left
/// untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElasticPairs;

impl ElasticPairs {
    fn resolve_pair(a: &mut Particle, b: &mut Particle) -> bool {
        let rij = a.x - b.x;
        let dist_sq = rij.dot(&rij);
        let contact = a.radius + b.radius;
        if dist_sq >= contact * contact {
            return false;
        }
        if dist_sq == 0.0 {
            return false;
        }

        let vij = a.v - b.v;
        let factor = vij.dot(&rij) / dist_sq;
        a.v -= factor * rij;
        b.v += factor * rij;

        let dist = dist_sq.sqrt();
        let overlap = contact - dist;
        let normal = rij / dist;
        a.x += 0.5 * overlap * normal;
        b.x -= 0.5 * overlap * normal;
        true
    }
}

impl CollisionResolver for ElasticPairs {
    fn resolve(&self, particles: &mut [Particle]) -> usize {
        let n = particles.len();
        let mut contacts = 0;
        for i in 0..n {
            // split so we can hold &mut to both i and j > i
            let (head, tail) = particles.split_at_mut(i + 1);
            let pi = &mut head[i];
            for pj in tail.iter_mut() {
                if Self::resolve_pair(pi, pj) {
                    contacts += 1;
                }
            }
        }
        contacts
    }
}

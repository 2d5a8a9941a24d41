use std::time::Instant;

use crate::simulation::collision::{CollisionResolver, ElasticPairs};
use crate::simulation::forces::{AccelSet, Acceleration, NewtonianGravity};
use crate::simulation::integrator::leapfrog;
use crate::simulation::states::{Body, NVec2, Particle, System};

/// Helper to build a manual System of size `n`
fn make_system(n: usize) -> System {
    let bodies = (0..n)
        .map(|i| {
            let i_f = i as f64;
            // deterministic positions, no rand needed
            let x = NVec2::new((i_f * 0.37).sin() * 5.0, (i_f * 0.13).cos() * 5.0);
            Body::new(x, NVec2::zeros(), 1.0)
        })
        .collect();
    System::new(bodies)
}

/// `n` discs on a jittered grid, dense enough that neighbours touch
fn make_particles(n: usize) -> Vec<Particle> {
    let side = (n as f64).sqrt().ceil() as usize;
    (0..n)
        .map(|i| {
            let i_f = i as f64;
            let x = NVec2::new(
                (i % side) as f64 * 0.18 + (i_f * 0.37).sin() * 0.02,
                (i / side) as f64 * 0.18 + (i_f * 0.13).cos() * 0.02,
            );
            let v = NVec2::new((i_f * 0.7).sin(), (i_f * 0.3).cos());
            Particle::new(x, v, 0.1)
        })
        .collect()
}

/// Serial pairwise gravity against rayon per-body sums
pub fn bench_gravity() {
    let ns = [200, 400, 800, 1600, 3200, 6400];

    println!("{:>6} {:>12} {:>12} {:>8}", "N", "serial [s]", "rayon [s]", "speedup");
    for n in ns {
        let sys = make_system(n);
        let mut out = vec![NVec2::zeros(); n];

        let serial = NewtonianGravity::new(0.1, 0.01);
        let parallel = NewtonianGravity::new(0.1, 0.01).parallel(true);

        // Warm up
        serial.acceleration(0.0, &sys, &mut out);
        parallel.acceleration(0.0, &sys, &mut out);

        out.fill(NVec2::zeros());
        let t0 = Instant::now();
        serial.acceleration(0.0, &sys, &mut out);
        let dt_serial = t0.elapsed().as_secs_f64();

        out.fill(NVec2::zeros());
        let t1 = Instant::now();
        parallel.acceleration(0.0, &sys, &mut out);
        let dt_parallel = t1.elapsed().as_secs_f64();

        println!(
            "{n:6} {dt_serial:12.6} {dt_parallel:12.6} {:8.2}",
            dt_serial / dt_parallel.max(f64::EPSILON)
        );
    }
}

/// Leapfrog steps per second with the parallel force sum
pub fn bench_leapfrog() {
    let ns = [200, 400, 800, 1600, 3200];
    let steps = 5;

    println!("{:>6} {:>14}", "N", "step [ms]");
    for n in ns {
        let mut sys = make_system(n);
        let forces = AccelSet::new().with(NewtonianGravity::new(0.1, 0.01).parallel(true));
        let mut acc = vec![NVec2::zeros(); n];
        forces.accumulate_accels(sys.t, &sys, &mut acc);

        let t0 = Instant::now();
        for _ in 0..steps {
            leapfrog(&mut sys, &forces, &mut acc, 0.001);
        }
        let ms = t0.elapsed().as_secs_f64() * 1000.0 / steps as f64;

        println!("{n:6} {ms:14.4}");
    }
}

/// One O(N²) elastic collision pass for growing N
pub fn bench_collisions() {
    let ns = [100, 200, 400, 800, 1600];

    println!("{:>6} {:>12} {:>10}", "N", "pass [s]", "contacts");
    for n in ns {
        let template = make_particles(n);

        // Warm up
        let mut warm = template.clone();
        ElasticPairs.resolve(&mut warm);

        let mut particles = template.clone();
        let t0 = Instant::now();
        let contacts = ElasticPairs.resolve(&mut particles);
        let dt = t0.elapsed().as_secs_f64();

        println!("{n:6} {dt:12.6} {contacts:10}");
    }
}

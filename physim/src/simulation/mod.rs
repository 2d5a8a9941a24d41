pub mod states;
pub mod params;
pub mod dynamics;
pub mod diagnostics;
pub mod integrator;
pub mod forces;
pub mod pendulum;
pub mod heat;
pub mod collision;
pub mod engine;
pub mod driver;
pub mod scenario;

//! Headless simulation of the atom oven used in the Stern-Gerlach scenes: a
//! gas of discs bouncing inside a circular wall, advanced one animation frame
//! at a time, with optional release of a particle through the field region.

pub mod collision;
pub mod output;
pub mod particle;
pub mod placement;
pub mod simulation;
pub mod trajectory;

pub use collision::{advance, Boundary, CollisionReport, CollisionSettings};
pub use particle::{Motion, Particle, ParticleId, ParticleSet};
pub use simulation::OvenSimulation;
pub use trajectory::Spin;

use serde::{Deserialize, Serialize};
use crate::config::CollisionPolicy;
use crate::vecmath::Vec2;

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Boundary
    pub boundary_center: Vec2,
    pub boundary_radius: f32,

    // Particles
    pub particle_radius: f32,
    pub speed: f32, // Initial speed (units/s)

    // Time
    pub dt: f32, // Seconds per frame
    pub total_steps: u32,
    pub record_interval_steps: u32,

    // Collision response
    pub policy: CollisionPolicy,
    pub damping: f32,
    pub separation_iterations: u32,
    pub epsilon: f32,
}

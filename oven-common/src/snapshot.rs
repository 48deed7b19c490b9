use serde::{Serialize, Deserialize};

/// A snapshot of the oven state and metrics at a specific time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulation time in seconds.
    pub time: f32,
    /// Frame index at which the snapshot was taken.
    pub step: u32,
    /// Number of particles still bouncing around inside the oven.
    pub confined_count: u32,
    /// Sum of squared speeds over the confined particles.
    pub kinetic_energy: f32,
    /// Wall reflections since the previous snapshot.
    pub wall_hits: u32,
    /// Particle-particle contacts resolved since the previous snapshot.
    pub pair_contacts: u32,
    /// Landed particles deflected upwards.
    pub spin_up: u32,
    /// Landed particles deflected downwards.
    pub spin_down: u32,
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "positions": null
    pub positions: Option<Vec<(f32, f32)>>,
}

use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::SimParams;
use crate::vecmath::Vec2;
use std::path::Path;

// The circular oven wall
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BoundaryConfig {
    #[serde(default)]
    pub center_x: f32,
    #[serde(default)]
    pub center_y: f32,
    pub radius: f32,
}

// The gas held inside the oven, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ParticleConfig {
    pub count: u32,
    pub radius: f32,
    pub max_speed: f32,
    pub placement_seed: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Reflect about the contact normal, testing every pair against the
    /// positions captured before the pairwise pass.
    Snapshot,
    /// Reflect about the contact normal using live positions (order-sensitive).
    Sequential,
    /// Exchange headings and speeds of the touching pair.
    Swap,
}

impl std::str::FromStr for CollisionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "snapshot" => Ok(CollisionPolicy::Snapshot),
            "sequential" => Ok(CollisionPolicy::Sequential),
            "swap" => Ok(CollisionPolicy::Swap),
            other => anyhow::bail!("Unknown collision policy '{}'.", other),
        }
    }
}

// Pairwise collision response settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CollisionConfig {
    #[serde(default = "default_policy")]
    pub policy: CollisionPolicy,
    #[serde(default = "default_damping")]
    pub damping: f32,
    #[serde(default = "default_separation_iterations")]
    pub separation_iterations: u32,
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        CollisionConfig {
            policy: default_policy(),
            damping: default_damping(),
            separation_iterations: default_separation_iterations(),
            epsilon: default_epsilon(),
        }
    }
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub frame_rate: f32,
    pub total_time_s: f32,
    pub record_interval_s: f32,
}

/// Release of a single particle through the aperture on the right-hand side
/// of the oven, followed by its flight through the deflecting field.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EjectionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_eject_after")]
    pub eject_after_s: f32,
    #[serde(default)]
    pub particle_index: u32,
    #[serde(default = "default_field_length")]
    pub field_length: f32,
    #[serde(default = "default_deflection_onset")]
    pub deflection_onset: f32,
    #[serde(default = "default_deflection_coeff")]
    pub deflection_coeff: f32,
    #[serde(default = "default_path_resolution")]
    pub path_resolution: u32,
}

impl Default for EjectionConfig {
    fn default() -> Self {
        EjectionConfig {
            enabled: false,
            eject_after_s: default_eject_after(),
            particle_index: 0,
            field_length: default_field_length(),
            deflection_onset: default_deflection_onset(),
            deflection_coeff: default_deflection_coeff(),
            path_resolution: default_path_resolution(),
        }
    }
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_positions: bool,
    pub save_stats: bool,
    pub save_positions_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub boundary: BoundaryConfig,
    pub particles: ParticleConfig,
    #[serde(default)]
    pub collision: CollisionConfig,
    pub timing: TimingConfig,
    #[serde(default)]
    pub ejection: EjectionConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values the collision step relies on.
    pub fn validate(&self) -> Result<()> {
        if !(self.particles.radius > 0.0) {
            anyhow::bail!("particles.radius must be positive.");
        }
        if !(self.boundary.radius > self.particles.radius) {
            anyhow::bail!(
                "boundary.radius ({}) must exceed particles.radius ({}).",
                self.boundary.radius,
                self.particles.radius
            );
        }
        if self.particles.count == 0 {
            anyhow::bail!("particles.count must be greater than 0.");
        }
        if !(self.particles.max_speed >= 0.0) {
            anyhow::bail!("particles.max_speed must not be negative.");
        }
        if !(self.timing.frame_rate > 0.0) {
            anyhow::bail!("timing.frame_rate must be positive.");
        }
        if !(self.collision.damping > 0.0 && self.collision.damping <= 1.0) {
            anyhow::bail!("collision.damping must lie in (0, 1], got {}.", self.collision.damping);
        }
        if self.ejection.enabled {
            if self.ejection.particle_index >= self.particles.count {
                anyhow::bail!(
                    "ejection.particle_index {} is out of range for {} particles.",
                    self.ejection.particle_index,
                    self.particles.count
                );
            }
            if self.ejection.path_resolution < 2 {
                anyhow::bail!("ejection.path_resolution must be at least 2.");
            }
        }
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let dt = 1.0 / self.timing.frame_rate;
        let total_steps = (self.timing.total_time_s.max(0.0) * self.timing.frame_rate).round() as u32;
        let record_interval_steps = (self.timing.record_interval_s.max(0.0) / dt).round().max(1.0) as u32;

        SimParams {
            boundary_center: Vec2::new(self.boundary.center_x, self.boundary.center_y),
            boundary_radius: self.boundary.radius,
            particle_radius: self.particles.radius,
            speed: self.particles.max_speed,
            dt,
            total_steps,
            record_interval_steps,
            policy: self.collision.policy,
            damping: self.collision.damping,
            separation_iterations: self.collision.separation_iterations,
            epsilon: self.collision.epsilon,
        }
    }
}

fn default_policy() -> CollisionPolicy {
    CollisionPolicy::Snapshot
}

fn default_damping() -> f32 {
    0.8 // Post-bounce attenuation that stops a pair from re-colliding every frame
}

fn default_separation_iterations() -> u32 {
    16
}

fn default_epsilon() -> f32 {
    1e-4
}

fn default_eject_after() -> f32 {
    3.0
}

fn default_field_length() -> f32 {
    5.5
}

fn default_deflection_onset() -> f32 {
    2.0
}

fn default_deflection_coeff() -> f32 {
    0.2
}

fn default_path_resolution() -> u32 {
    150
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [boundary]
        radius = 2.0

        [particles]
        count = 10
        radius = 0.1
        max_speed = 2.0
        placement_seed = 42

        [timing]
        frame_rate = 60.0
        total_time_s = 10.0
        record_interval_s = 0.5

        [output]
        base_filename = "oven"
        save_positions = true
        save_stats = true
        save_positions_in_snapshot = false
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = SimulationConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.collision.policy, CollisionPolicy::Snapshot);
        assert!((config.collision.damping - 0.8).abs() < 1e-6);
        assert!(!config.ejection.enabled);
        assert_eq!(config.output.format, None);

        let params = config.get_sim_params();
        assert_eq!(params.total_steps, 600);
        assert_eq!(params.record_interval_steps, 30);
        assert!((params.boundary_radius - params.particle_radius - 1.9).abs() < 1e-6);
        assert_eq!(params.boundary_center, Vec2::zero());
    }

    #[test]
    fn policy_is_parsed_lowercase() {
        let text = format!("{}\n[collision]\npolicy = \"swap\"\n", MINIMAL);
        let config = SimulationConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.collision.policy, CollisionPolicy::Swap);
        assert_eq!("Sequential".parse::<CollisionPolicy>().unwrap(), CollisionPolicy::Sequential);
        assert!("bogus".parse::<CollisionPolicy>().is_err());
    }

    #[test]
    fn particle_larger_than_boundary_is_rejected() {
        let text = MINIMAL.replace("radius = 0.1", "radius = 3.0");
        let err = SimulationConfig::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("boundary.radius"));
    }

    #[test]
    fn out_of_range_damping_is_rejected() {
        let text = format!("{}\n[collision]\ndamping = 1.5\n", MINIMAL);
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn ejection_index_must_name_a_particle() {
        let text = format!("{}\n[ejection]\nenabled = true\nparticle_index = 10\n", MINIMAL);
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }
}

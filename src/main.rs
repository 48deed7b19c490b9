use anyhow::Result;
use clap::Parser;
use log::{debug, error, info, trace};
use std::path::PathBuf;
use std::time::Instant;

use oven_common::{CollisionPolicy, SimulationConfig};
use oven_sim::output::{self, OutputFormat};
use oven_sim::OvenSimulation;

/// Command-line arguments for the oven simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override particles.placement_seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override collision.policy (snapshot, sequential, swap)
    #[arg(long)]
    policy: Option<CollisionPolicy>,

    /// Override output.format (json, bincode, messagepack)
    #[arg(long)]
    format: Option<String>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting oven simulation...");

    // --- Load Configuration ---
    let mut config = SimulationConfig::load(&args.config)?;
    if let Some(seed) = args.seed {
        config.particles.placement_seed = seed;
    }
    if let Some(policy) = args.policy {
        config.collision.policy = policy;
    }
    if args.format.is_some() {
        config.output.format = args.format.clone();
    }

    // --- Initialize Simulation ---
    let mut sim = OvenSimulation::new(config)?;
    info!(
        "Placed {} particles (seed {}, policy {:?}).",
        sim.current_particle_count(),
        sim.config().particles.placement_seed,
        sim.params().policy
    );
    debug!("Simulation Parameters: {:#?}", sim.params());

    // --- Simulation Loop ---
    let total_steps = sim.params().total_steps;
    let record_interval_steps = sim.params().record_interval_steps;
    info!("Recording snapshot every {} frames ({:.3} s).", record_interval_steps, record_interval_steps as f32 * sim.params().dt);

    info!("Starting simulation loop for {} frames...", total_steps);
    let start_time = Instant::now();

    // --- Initial Snapshot (time = 0) ---
    sim.record_snapshot()?;

    for step in 0..total_steps {
        let report = match sim.step() {
            Ok(report) => report,
            Err(e) => {
                error!("Error during simulation frame {}: {}", step + 1, e);
                anyhow::bail!("Simulation step failed.");
            }
        };
        trace!("Frame [{}/{}]: {:?}", step + 1, total_steps, report);

        let is_record_step = (step + 1) % record_interval_steps == 0;
        let is_last_step = step + 1 == total_steps;
        if is_record_step || is_last_step {
            info!(
                "Frame [{}/{}] ({:.2} s) | Confined: {} | Energy: {:.3}",
                step + 1,
                total_steps,
                sim.time(),
                sim.confined_count(),
                sim.kinetic_energy()
            );
            sim.record_snapshot()?;
        }
    }

    let (spin_up, spin_down) = sim.spin_tally();
    info!(
        "Simulation finished in {:.3} seconds. Landed spins: {} up, {} down.",
        start_time.elapsed().as_secs_f64(),
        spin_up,
        spin_down
    );

    // --- Save Recorded Data ---
    let output_config = sim.config().output.clone();
    if output_config.save_stats {
        let format = OutputFormat::from_name(output_config.format.as_deref());
        output::write_snapshots(sim.get_recorded_snapshots(), &output_config.base_filename, format)?;
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if output_config.save_positions {
        let filename = format!("{}_final_positions.csv", output_config.base_filename);
        output::write_final_positions(sim.particles(), &filename)?;
    } else {
        info!("Skipping saving final positions as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

use crate::collision::{self, Boundary, CollisionReport, CollisionSettings};
use crate::particle::{Motion, Particle, ParticleId, ParticleSet};
use crate::placement::place_particles;
use crate::trajectory::{flight_path, PathFollower, Spin};
use anyhow::{anyhow, Result};
use log::{debug, info, trace};
use oven_common::{SimParams, SimulationConfig, Snapshot, Vec2};
use rand::prelude::*;

/// Owns the oven gas and drives it one frame at a time for the host loop.
pub struct OvenSimulation {
    /// The simulation configuration, including initial conditions and parameters.
    pub config: SimulationConfig,
    params: SimParams,
    boundary: Boundary,
    settings: CollisionSettings,
    particles: ParticleSet,
    /// Source of every random draw after construction (placement, spins).
    pub rng: StdRng,
    /// Number of frames advanced so far.
    pub current_time_step: u32,
    time: f32,
    ejection_done: bool,
    /// Collision counts accumulated since the last snapshot.
    pending_report: CollisionReport,
    recorded_snapshots: Vec<Snapshot>,
}

impl OvenSimulation {
    /// Creates a new `OvenSimulation`, seeding the RNG and placing the gas.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();
        let boundary = Boundary::from_params(&params);
        let settings = CollisionSettings::from(&params);

        let mut rng = StdRng::seed_from_u64(config.particles.placement_seed);
        let particles = place_particles(
            config.particles.count,
            params.particle_radius,
            params.speed,
            &boundary,
            &mut rng,
        )?;

        Ok(Self {
            config,
            params,
            boundary,
            settings,
            particles: ParticleSet::new(particles),
            rng,
            current_time_step: 0,
            time: 0.0,
            ejection_done: false,
            pending_report: CollisionReport::default(),
            recorded_snapshots: Vec::new(),
        })
    }

    /// Advances the whole scene by `dt`: the gas inside the oven, then every
    /// particle in flight.
    pub fn advance(&mut self, dt: f32) -> CollisionReport {
        let report = collision::advance(self.particles.as_mut_slice(), &self.boundary, dt, &self.settings);
        if dt > 0.0 && dt.is_finite() {
            self.fly(dt);
            self.time += dt;
            self.current_time_step += 1;
        }
        self.pending_report += report;
        trace!(
            "Frame {} (t={:.3}s): {} wall hits, {} contacts",
            self.current_time_step, self.time, report.wall_hits, report.pair_contacts
        );
        report
    }

    /// Advances by one configured frame and releases the configured particle
    /// once its ejection time has come.
    pub fn step(&mut self) -> Result<CollisionReport> {
        let report = self.advance(self.params.dt);

        let ejection = &self.config.ejection;
        if ejection.enabled && !self.ejection_done {
            let eject_step = (ejection.eject_after_s.max(0.0) / self.params.dt).round() as u32;
            if self.current_time_step >= eject_step {
                let id = ParticleId(ejection.particle_index as usize);
                self.eject(id)?;
                self.ejection_done = true;
            }
        }
        Ok(report)
    }

    /// Releases a confined particle through the aperture. Its spin is drawn
    /// from the simulation RNG and decides which way the field bends it. The
    /// flight runs at `max_speed` whatever damping the particle took inside.
    pub fn eject(&mut self, id: ParticleId) -> Result<Spin> {
        let start = match self.particles.get(id) {
            None => anyhow::bail!("No particle {} to eject (have {}).", id, self.particles.len()),
            Some(p) if !p.is_confined() => anyhow::bail!("Particle {} has already left the oven.", id),
            Some(p) => p.position,
        };

        let spin = Spin::random(&mut self.rng);
        let path = flight_path(start, self.boundary.aperture(), spin, &self.config.ejection)?;
        info!(
            "Ejecting particle {} from ({:.3}, {:.3}) with spin {:?}; flight length {:.3}.",
            id, start.x, start.y, spin, path.length()
        );

        let speed = self.params.speed;
        let particle = self
            .particles
            .get_mut(id)
            .ok_or_else(|| anyhow!("Particle {} vanished during ejection.", id))?;
        particle.motion = Motion::InFlight { path: PathFollower::new(path), spin, speed };
        Ok(spin)
    }

    /// Moves particles in flight along their paths at the configured speed
    /// they were released with.
    fn fly(&mut self, dt: f32) {
        for (idx, particle) in self.particles.as_mut_slice().iter_mut().enumerate() {
            let Motion::InFlight { path, spin, speed } = &mut particle.motion else { continue };
            particle.position = path.advance(*speed * dt);
            if path.is_finished() {
                let spin = *spin;
                info!(
                    "Particle #{} landed at ({:.3}, {:.3}) with spin {:?} after {:.3} units.",
                    idx, particle.position.x, particle.position.y, spin, path.path().length()
                );
                particle.motion = Motion::Landed { spin };
            }
        }
    }

    pub fn position(&self, id: ParticleId) -> Option<Vec2> {
        self.particles.get(id).map(|p| p.position)
    }

    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ParticleId> {
        self.particles.ids()
    }

    pub fn particles(&self) -> &[Particle] {
        self.particles.as_slice()
    }

    /// Retrieves the current positions of all particles, in id order.
    pub fn get_results(&self) -> Vec<(f32, f32)> {
        self.particles.as_slice().iter().map(|p| p.position.into()).collect()
    }

    pub fn current_particle_count(&self) -> u32 {
        self.particles.len() as u32
    }

    pub fn confined_count(&self) -> u32 {
        self.particles.as_slice().iter().filter(|p| p.is_confined()).count() as u32
    }

    /// Sum of squared speeds over the confined gas.
    pub fn kinetic_energy(&self) -> f32 {
        self.particles
            .as_slice()
            .iter()
            .filter(|p| p.is_confined())
            .map(|p| p.kinetic_energy())
            .sum()
    }

    /// Landed particles as (spin up, spin down).
    pub fn spin_tally(&self) -> (u32, u32) {
        self.particles.as_slice().iter().fold((0, 0), |(up, down), p| match p.motion {
            Motion::Landed { spin: Spin::Up } => (up + 1, down),
            Motion::Landed { spin: Spin::Down } => (up, down + 1),
            _ => (up, down),
        })
    }

    /// Simulated time in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Provides access to the simulation parameters.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Provides access to the loaded simulation configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Collects the current metrics into a Snapshot and resets the
    /// per-interval collision counters.
    pub fn record_snapshot(&mut self) -> Result<()> {
        debug!("Recording snapshot at {:.3} s (frame {})...", self.time, self.current_time_step);

        let (spin_up, spin_down) = self.spin_tally();
        let positions = if self.config.output.save_positions_in_snapshot {
            Some(self.get_results())
        } else {
            None
        };

        let snapshot = Snapshot {
            time: self.time,
            step: self.current_time_step,
            confined_count: self.confined_count(),
            kinetic_energy: self.kinetic_energy(),
            wall_hits: self.pending_report.wall_hits,
            pair_contacts: self.pending_report.pair_contacts,
            spin_up,
            spin_down,
            positions,
        };
        debug!(
            "Snapshot: confined={}, energy={:.4}, wall_hits={}, contacts={}",
            snapshot.confined_count, snapshot.kinetic_energy, snapshot.wall_hits, snapshot.pair_contacts
        );

        self.recorded_snapshots.push(snapshot);
        self.pending_report = CollisionReport::default();
        Ok(())
    }

    /// Provides access to the recorded snapshots.
    pub fn get_recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oven_common::CollisionPolicy;

    fn config() -> SimulationConfig {
        SimulationConfig::from_toml_str(
            r#"
            [boundary]
            center_x = -3.0
            radius = 2.0

            [particles]
            count = 5
            radius = 0.1
            max_speed = 3.5
            placement_seed = 42

            [timing]
            frame_rate = 60.0
            total_time_s = 3.0
            record_interval_s = 0.5

            [ejection]
            enabled = true
            eject_after_s = 1.0
            particle_index = 0

            [output]
            base_filename = "test"
            save_positions = false
            save_stats = false
            save_positions_in_snapshot = true
            "#,
        )
        .unwrap()
    }

    #[test]
    fn new_places_gas_inside_offset_boundary() {
        let sim = OvenSimulation::new(config()).unwrap();
        assert_eq!(sim.current_particle_count(), 5);
        assert_eq!(sim.confined_count(), 5);
        assert_eq!(sim.boundary().center, Vec2::new(-3.0, 0.0));
        for id in sim.ids() {
            let p = sim.particle(id).unwrap();
            assert!(sim.boundary().contains(p.position, p.radius));
        }
        assert!((sim.kinetic_energy() - 5.0 * 3.5 * 3.5).abs() < 1e-3);
    }

    #[test]
    fn same_seed_reproduces_trajectories() {
        let run = || {
            let mut sim = OvenSimulation::new(config()).unwrap();
            for _ in 0..120 {
                sim.step().unwrap();
            }
            sim.get_results()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn ejected_particle_flies_and_lands() {
        let mut sim = OvenSimulation::new(config()).unwrap();
        let id = ParticleId(0);
        // 1 s at 60 fps triggers the ejection on frame 60.
        for _ in 0..59 {
            sim.step().unwrap();
        }
        assert!(sim.particle(id).unwrap().is_confined());
        sim.step().unwrap();
        assert!(matches!(sim.particle(id).unwrap().motion, Motion::InFlight { .. }));
        assert_eq!(sim.confined_count(), 4);

        // Flight is at most ~12 units at 3.5 units/s.
        for _ in 0..(60 * 6) {
            sim.step().unwrap();
        }
        let particle = sim.particle(id).unwrap();
        let spin = match particle.motion {
            Motion::Landed { spin } => spin,
            ref other => panic!("expected a landed particle, got {:?}", other),
        };
        // Field exit: aperture (-1, 0) plus 5.5 along x and 0.2 * 3.5^2 across.
        let expected = Vec2::new(-1.0 + 5.5, spin.sign() * 0.2 * 3.5 * 3.5);
        assert!(particle.position.distance(expected) < 1e-3, "{:?}", particle.position);

        let (up, down) = sim.spin_tally();
        assert_eq!(up + down, 1);
        assert_eq!(up == 1, spin == Spin::Up);
    }

    #[test]
    fn ejected_particle_flies_at_max_speed_despite_damping() {
        let mut cfg = config();
        cfg.ejection.enabled = false;
        let mut sim = OvenSimulation::new(cfg).unwrap();
        let id = ParticleId(3);
        sim.particles.get_mut(id).unwrap().speed = 3.5 * 0.8 * 0.8;
        sim.eject(id).unwrap();

        let dt = sim.params().dt;
        sim.advance(dt);
        let particle = sim.particle(id).unwrap();
        let Motion::InFlight { path, speed, .. } = &particle.motion else {
            panic!("expected a particle in flight, got {:?}", particle.motion);
        };
        assert_eq!(*speed, 3.5);
        let expected = path.path().point_at(3.5 * dt);
        assert!(particle.position.distance(expected) < 1e-5, "{:?} vs {:?}", particle.position, expected);
    }

    #[test]
    fn ejecting_twice_or_unknown_id_fails() {
        let mut sim = OvenSimulation::new(config()).unwrap();
        sim.eject(ParticleId(2)).unwrap();
        assert!(sim.eject(ParticleId(2)).is_err());
        assert!(sim.eject(ParticleId(99)).is_err());
    }

    #[test]
    fn snapshots_reset_interval_counters() {
        let mut cfg = config();
        cfg.collision.policy = CollisionPolicy::Sequential;
        cfg.ejection.enabled = false;
        let mut sim = OvenSimulation::new(cfg).unwrap();
        sim.record_snapshot().unwrap();
        let mut total = CollisionReport::default();
        for _ in 0..sim.params().record_interval_steps {
            total += sim.step().unwrap();
        }
        sim.record_snapshot().unwrap();

        let snaps = sim.get_recorded_snapshots();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].step, 0);
        assert_eq!(snaps[0].wall_hits, 0);
        assert_eq!(snaps[1].step, 30);
        assert!((snaps[1].time - 0.5).abs() < 1e-4);
        assert_eq!(snaps[1].wall_hits, total.wall_hits);
        assert_eq!(snaps[1].pair_contacts, total.pair_contacts);
        assert_eq!(snaps[1].positions.as_ref().map(Vec::len), Some(5));
    }

    #[test]
    fn position_lookup_by_id() {
        let sim = OvenSimulation::new(config()).unwrap();
        let results = sim.get_results();
        for id in sim.ids() {
            let p = sim.position(id).unwrap();
            assert_eq!((p.x, p.y), results[id.0]);
        }
        assert_eq!(sim.position(ParticleId(5)), None);
    }
}

use crate::trajectory::{PathFollower, Spin};
use oven_common::Vec2;
use serde::Serialize;
use std::fmt;

/// Stable index of a particle in its [`ParticleSet`]. Valid for the lifetime
/// of the simulation; particles are never removed or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ParticleId(pub usize);

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a particle is in its life: bouncing in the oven, flying through the
/// field after ejection, or resting at the end of its flight.
#[derive(Debug, Clone)]
pub enum Motion {
    Confined,
    InFlight { path: PathFollower, spin: Spin, speed: f32 },
    Landed { spin: Spin },
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec2,
    /// Unit heading.
    pub direction: Vec2,
    /// Scalar speed; the velocity is `direction * speed`.
    pub speed: f32,
    pub radius: f32,
    pub motion: Motion,
}

impl Particle {
    pub fn new(position: Vec2, direction: Vec2, speed: f32, radius: f32) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
            speed,
            radius,
            motion: Motion::Confined,
        }
    }

    pub fn is_confined(&self) -> bool {
        matches!(self.motion, Motion::Confined)
    }

    pub fn velocity(&self) -> Vec2 {
        self.direction * self.speed
    }

    /// Squared velocity magnitude (unit mass, no 1/2 factor).
    pub fn kinetic_energy(&self) -> f32 {
        self.velocity().length_squared()
    }

    pub fn spin(&self) -> Option<Spin> {
        match &self.motion {
            Motion::Confined => None,
            Motion::InFlight { spin, .. } | Motion::Landed { spin } => Some(*spin),
        }
    }

    /// Short label used in CSV output.
    pub fn state_label(&self) -> &'static str {
        match &self.motion {
            Motion::Confined => "confined",
            Motion::InFlight { .. } => "in_flight",
            Motion::Landed { spin: Spin::Up } => "landed_up",
            Motion::Landed { spin: Spin::Down } => "landed_down",
        }
    }
}

/// Arena of particles addressed by [`ParticleId`].
#[derive(Debug, Clone, Default)]
pub struct ParticleSet {
    particles: Vec<Particle>,
}

impl ParticleSet {
    pub fn new(particles: Vec<Particle>) -> Self {
        Self { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.particles.get(id.0)
    }

    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.particles.get_mut(id.0)
    }

    pub fn ids(&self) -> impl Iterator<Item = ParticleId> {
        (0..self.particles.len()).map(ParticleId)
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    pub fn as_mut_slice(&mut self) -> &mut [Particle] {
        &mut self.particles
    }
}

/// Two distinct mutable borrows out of one slice. Requires `i < j`.
pub(crate) fn pair_mut(particles: &mut [Particle], i: usize, j: usize) -> (&mut Particle, &mut Particle) {
    debug_assert!(i < j);
    let (head, tail) = particles.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_is_confined_with_unit_heading() {
        let p = Particle::new(Vec2::zero(), Vec2::new(3.0, 4.0), 2.0, 0.1);
        assert!(p.is_confined());
        assert!((p.direction.length() - 1.0).abs() < 1e-6);
        assert!((p.kinetic_energy() - 4.0).abs() < 1e-5);
        assert_eq!(p.spin(), None);
        assert_eq!(p.state_label(), "confined");
    }

    #[test]
    fn ids_are_stable_indices() {
        let set = ParticleSet::new(vec![
            Particle::new(Vec2::new(1.0, 0.0), Vec2::new(1.0, 0.0), 1.0, 0.1),
            Particle::new(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0), 1.0, 0.1),
        ]);
        let ids: Vec<_> = set.ids().collect();
        assert_eq!(ids, vec![ParticleId(0), ParticleId(1)]);
        assert_eq!(set.get(ParticleId(1)).map(|p| p.position), Some(Vec2::new(0.0, 1.0)));
        assert!(set.get(ParticleId(2)).is_none());
        assert_eq!(ParticleId(3).to_string(), "#3");
    }

    #[test]
    fn pair_mut_borrows_both_ends() {
        let mut particles = vec![
            Particle::new(Vec2::zero(), Vec2::new(1.0, 0.0), 1.0, 0.1),
            Particle::new(Vec2::zero(), Vec2::new(1.0, 0.0), 1.0, 0.1),
            Particle::new(Vec2::zero(), Vec2::new(1.0, 0.0), 1.0, 0.1),
        ];
        let (a, b) = pair_mut(&mut particles, 0, 2);
        a.speed = 5.0;
        b.speed = 7.0;
        assert_eq!(particles[0].speed, 5.0);
        assert_eq!(particles[1].speed, 1.0);
        assert_eq!(particles[2].speed, 7.0);
    }
}

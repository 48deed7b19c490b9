//! One frame of the oven gas: integrate, bounce off the circular wall, then
//! resolve particle-particle contacts with positional correction.

use crate::particle::{pair_mut, Particle};
use log::{trace, warn};
use oven_common::{CollisionPolicy, SimParams, Vec2};
use std::ops::AddAssign;

/// The circular wall confining the gas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub center: Vec2,
    pub radius: f32,
}

impl Boundary {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn from_params(params: &SimParams) -> Self {
        Self::new(params.boundary_center, params.boundary_radius)
    }

    /// Point on the right-hand edge where particles leave the oven.
    pub fn aperture(&self) -> Vec2 {
        self.center + Vec2::new(self.radius, 0.0)
    }

    /// True when a disc of `radius` at `position` lies fully inside the wall.
    pub fn contains(&self, position: Vec2, radius: f32) -> bool {
        position.distance(self.center) + radius <= self.radius
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollisionSettings {
    pub policy: CollisionPolicy,
    /// Speed multiplier applied to both particles of a contact.
    pub damping: f32,
    /// Extra positional relaxation rounds after the contact pass.
    pub separation_iterations: u32,
    /// Residual overlap tolerated by the relaxation rounds.
    pub epsilon: f32,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            policy: CollisionPolicy::Snapshot,
            damping: 0.8,
            separation_iterations: 16,
            epsilon: 1e-4,
        }
    }
}

impl From<&SimParams> for CollisionSettings {
    fn from(params: &SimParams) -> Self {
        Self {
            policy: params.policy,
            damping: params.damping,
            separation_iterations: params.separation_iterations,
            epsilon: params.epsilon,
        }
    }
}

/// What happened during one or more frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionReport {
    pub wall_hits: u32,
    pub pair_contacts: u32,
    /// Contacts skipped because the two centres coincide.
    pub degenerate_contacts: u32,
}

impl AddAssign for CollisionReport {
    fn add_assign(&mut self, other: Self) {
        self.wall_hits += other.wall_hits;
        self.pair_contacts += other.pair_contacts;
        self.degenerate_contacts += other.degenerate_contacts;
    }
}

/// Advances every confined particle by `dt`. Particles that are not confined
/// are left untouched and never collide.
pub fn advance(
    particles: &mut [Particle],
    boundary: &Boundary,
    dt: f32,
    settings: &CollisionSettings,
) -> CollisionReport {
    let mut report = CollisionReport::default();
    if !(dt > 0.0 && dt.is_finite()) {
        warn!("Skipping collision step with invalid dt {}.", dt);
        return report;
    }

    integrate(particles, dt);
    report.wall_hits = reflect_off_boundary(particles, boundary);

    let (contacts, degenerate) = match settings.policy {
        CollisionPolicy::Snapshot => resolve_pairs_snapshot(particles, settings),
        CollisionPolicy::Sequential | CollisionPolicy::Swap => resolve_pairs_sequential(particles, settings),
    };
    report.pair_contacts = contacts;
    report.degenerate_contacts = degenerate;

    if contacts > 0 {
        for round in 0..settings.separation_iterations {
            let clamped = confine(particles, boundary);
            let separated = separate_overlaps(particles, settings.epsilon);
            if !clamped && !separated {
                trace!("Relaxation settled after {} rounds.", round);
                break;
            }
        }
    }
    confine(particles, boundary);

    report
}

fn integrate(particles: &mut [Particle], dt: f32) {
    for p in particles.iter_mut().filter(|p| p.is_confined()) {
        p.position += p.direction.normalize_or_zero() * (p.speed * dt);
    }
}

/// Elastic wall bounce with the particle clamped back onto the inner surface.
/// Returns the number of reflections.
pub fn reflect_off_boundary(particles: &mut [Particle], boundary: &Boundary) -> u32 {
    let mut hits = 0;
    for p in particles.iter_mut().filter(|p| p.is_confined()) {
        let offset = p.position - boundary.center;
        let max_distance = boundary.radius - p.radius;
        if offset.length() <= max_distance {
            continue;
        }
        // Distance exceeds R - r > 0, so the normal is well defined.
        let Some(normal) = offset.try_normalize() else { continue };
        p.direction = p.direction.reflect(normal).normalize_or_zero();
        p.position = boundary.center + normal * max_distance;
        hits += 1;
    }
    hits
}

/// Velocity response for one contact, applied immediately against live
/// headings. `normal` points from `b` to `a`.
fn bounce(a: &mut Particle, b: &mut Particle, normal: Vec2, settings: &CollisionSettings) {
    match settings.policy {
        CollisionPolicy::Swap => {
            std::mem::swap(&mut a.direction, &mut b.direction);
            std::mem::swap(&mut a.speed, &mut b.speed);
        }
        CollisionPolicy::Sequential | CollisionPolicy::Snapshot => {
            a.direction = a.direction.reflect(normal).normalize_or_zero();
            b.direction = b.direction.reflect(normal).normalize_or_zero();
        }
    }
    a.speed *= settings.damping;
    b.speed *= settings.damping;
}

/// Outcome of testing one pair for overlap.
enum Contact {
    Apart,
    /// `normal` points from the second particle to the first.
    Touching { normal: Vec2, overlap: f32 },
    /// Centres coincide, so no contact normal exists.
    Coincident,
}

fn contact(pos_a: Vec2, radius_a: f32, pos_b: Vec2, radius_b: f32) -> Contact {
    let offset = pos_a - pos_b;
    let distance = offset.length();
    let radius_sum = radius_a + radius_b;
    if distance >= radius_sum {
        return Contact::Apart;
    }
    match offset.try_normalize() {
        Some(normal) => Contact::Touching { normal, overlap: radius_sum - distance },
        None => Contact::Coincident,
    }
}

/// Every pair is tested against positions and headings captured before the
/// pass. Half-overlap pushes and contact normals are summed per particle, and
/// each touched particle reflects its captured heading once about the summed
/// normal, so the outcome does not depend on pair order.
fn resolve_pairs_snapshot(particles: &mut [Particle], settings: &CollisionSettings) -> (u32, u32) {
    let n = particles.len();
    let snapshot: Vec<Vec2> = particles.iter().map(|p| p.position).collect();
    let mut corrections = vec![Vec2::zero(); n];
    let mut normals = vec![Vec2::zero(); n];
    let mut touches = vec![0u32; n];
    let mut contacts = 0;
    let mut degenerate = 0;

    for i in 0..n {
        if !particles[i].is_confined() {
            continue;
        }
        for j in (i + 1)..n {
            if !particles[j].is_confined() {
                continue;
            }
            match contact(snapshot[i], particles[i].radius, snapshot[j], particles[j].radius) {
                Contact::Apart => {}
                Contact::Touching { normal, overlap } => {
                    corrections[i] += normal * (overlap / 2.0);
                    corrections[j] -= normal * (overlap / 2.0);
                    normals[i] += normal;
                    normals[j] -= normal;
                    touches[i] += 1;
                    touches[j] += 1;
                    contacts += 1;
                }
                Contact::Coincident => {
                    warn!("Particles {} and {} share a centre at {:?}; skipping contact.", i, j, snapshot[i]);
                    degenerate += 1;
                }
            }
        }
    }

    for (idx, p) in particles.iter_mut().enumerate() {
        if touches[idx] == 0 {
            continue;
        }
        p.position += corrections[idx];
        p.speed *= settings.damping.powi(touches[idx] as i32);
        match normals[idx].try_normalize() {
            Some(normal) => p.direction = p.direction.reflect(normal).normalize_or_zero(),
            None => {
                warn!("Contact normals on particle {} cancel out; heading kept.", idx);
                degenerate += 1;
            }
        }
    }
    (contacts, degenerate)
}

/// Pairs are resolved in index order against live positions, so a pair sees
/// the pushes applied by earlier pairs in the same frame.
fn resolve_pairs_sequential(particles: &mut [Particle], settings: &CollisionSettings) -> (u32, u32) {
    let n = particles.len();
    let mut contacts = 0;
    let mut degenerate = 0;

    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = pair_mut(particles, i, j);
            if !a.is_confined() || !b.is_confined() {
                continue;
            }
            match contact(a.position, a.radius, b.position, b.radius) {
                Contact::Apart => {}
                Contact::Touching { normal, overlap } => {
                    bounce(a, b, normal, settings);
                    a.position += normal * (overlap / 2.0);
                    b.position -= normal * (overlap / 2.0);
                    contacts += 1;
                }
                Contact::Coincident => {
                    warn!("Particles {} and {} share a centre at {:?}; skipping contact.", i, j, a.position);
                    degenerate += 1;
                }
            }
        }
    }
    (contacts, degenerate)
}

/// Position-only clamp back inside the wall. Returns true if anything moved.
fn confine(particles: &mut [Particle], boundary: &Boundary) -> bool {
    let mut moved = false;
    for p in particles.iter_mut().filter(|p| p.is_confined()) {
        let offset = p.position - boundary.center;
        let max_distance = boundary.radius - p.radius;
        if offset.length() > max_distance {
            if let Some(normal) = offset.try_normalize() {
                p.position = boundary.center + normal * max_distance;
                moved = true;
            }
        }
    }
    moved
}

/// One Jacobi round of half-overlap pushes for pairs still deeper than
/// `epsilon`. Directions and speeds are not touched. Returns true if any pair
/// was pushed.
fn separate_overlaps(particles: &mut [Particle], epsilon: f32) -> bool {
    let n = particles.len();
    let mut corrections = vec![Vec2::zero(); n];
    let mut any = false;
    for i in 0..n {
        if !particles[i].is_confined() {
            continue;
        }
        for j in (i + 1)..n {
            if !particles[j].is_confined() {
                continue;
            }
            let (a, b) = (&particles[i], &particles[j]);
            if let Contact::Touching { normal, overlap } = contact(a.position, a.radius, b.position, b.radius) {
                if overlap > epsilon {
                    corrections[i] += normal * (overlap / 2.0);
                    corrections[j] -= normal * (overlap / 2.0);
                    any = true;
                }
            }
        }
    }
    if any {
        for (p, correction) in particles.iter_mut().zip(corrections) {
            p.position += correction;
        }
    }
    any
}

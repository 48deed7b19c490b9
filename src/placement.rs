use crate::collision::Boundary;
use crate::particle::Particle;
use anyhow::Result;
use oven_common::{angle_to_vec, Vec2};
use rand::distr::Uniform;
use rand::Rng;

/// Uniform point strictly inside the circle of `max_radius` around `center`,
/// drawn by rejection from the bounding square.
pub fn random_point_in_circle(rng: &mut impl Rng, center: Vec2, max_radius: f32) -> Result<Vec2> {
    if !(max_radius > 0.0) {
        anyhow::bail!("Placement radius must be positive, got {}.", max_radius);
    }
    let coord = Uniform::new(-max_radius, max_radius)?;
    let max_radius_sq = max_radius * max_radius;
    loop {
        let x = rng.sample(coord);
        let y = rng.sample(coord);
        if x * x + y * y < max_radius_sq {
            return Ok(center + Vec2::new(x, y));
        }
    }
}

/// Unit heading with a uniformly distributed angle.
pub fn random_heading(rng: &mut impl Rng) -> Result<Vec2> {
    let angle_dist = Uniform::new(0.0f32, std::f32::consts::TAU)?;
    Ok(angle_to_vec(rng.sample(angle_dist)))
}

/// Places `count` particles inside `boundary`, each with a random heading and
/// the same initial `speed`. Overlaps between new particles are allowed; the
/// first collision pass pushes them apart.
pub fn place_particles(
    count: u32,
    radius: f32,
    speed: f32,
    boundary: &Boundary,
    rng: &mut impl Rng,
) -> Result<Vec<Particle>> {
    let max_radius = boundary.radius - radius;
    (0..count)
        .map(|_| {
            let position = random_point_in_circle(rng, boundary.center, max_radius)?;
            let direction = random_heading(rng)?;
            Ok::<_, anyhow::Error>(Particle::new(position, direction, speed, radius))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn points_land_inside_the_circle() {
        let mut rng = StdRng::seed_from_u64(1);
        let center = Vec2::new(-3.0, 0.5);
        for _ in 0..1000 {
            let p = random_point_in_circle(&mut rng, center, 1.9).unwrap();
            assert!(p.distance(center) < 1.9 + 1e-5);
        }
    }

    #[test]
    fn non_positive_radius_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(random_point_in_circle(&mut rng, Vec2::zero(), 0.0).is_err());
    }

    #[test]
    fn headings_are_unit_vectors() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            let h = random_heading(&mut rng).unwrap();
            assert!((h.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn placement_is_contained_and_seeded() {
        let boundary = Boundary::new(Vec2::new(1.0, 1.0), 2.0);
        let place = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            place_particles(50, 0.1, 3.5, &boundary, &mut rng).unwrap()
        };
        let first = place(42);
        assert_eq!(first.len(), 50);
        for p in &first {
            assert!(boundary.contains(p.position, p.radius));
            assert!(p.is_confined());
            assert_eq!(p.speed, 3.5);
        }
        let again: Vec<Vec2> = place(42).iter().map(|p| p.position).collect();
        let mine: Vec<Vec2> = first.iter().map(|p| p.position).collect();
        assert_eq!(mine, again);
        let other: Vec<Vec2> = place(43).iter().map(|p| p.position).collect();
        assert_ne!(mine, other);
    }
}

//! Flight paths for particles that leave the oven: a cubic Bézier run from
//! the particle's last position to the aperture, then a parabolic deflection
//! through the field region whose sign depends on the particle's spin.

use anyhow::Result;
use oven_common::{EjectionConfig, Vec2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Spin projection drawn for an ejected particle. Decides which way the
/// inhomogeneous field bends its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Spin {
    Up,
    Down,
}

impl Spin {
    /// Fair coin flip between up and down.
    pub fn random(rng: &mut impl Rng) -> Self {
        if rng.random_bool(0.5) { Spin::Up } else { Spin::Down }
    }

    pub fn sign(self) -> f32 {
        match self {
            Spin::Up => 1.0,
            Spin::Down => -1.0,
        }
    }
}

/// Piecewise-linear path with cumulative arc length for constant-speed travel.
#[derive(Debug, Clone)]
pub struct Polyline {
    points: Vec<Vec2>,
    cumulative: Vec<f32>,
}

impl Polyline {
    pub fn new(points: Vec<Vec2>) -> Result<Self> {
        if points.is_empty() {
            anyhow::bail!("A path needs at least one point.");
        }
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0f32;
        cumulative.push(0.0);
        for pair in points.windows(2) {
            total += pair[0].distance(pair[1]);
            cumulative.push(total);
        }
        Ok(Self { points, cumulative })
    }

    /// Total arc length.
    pub fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn start(&self) -> Vec2 {
        self.points[0]
    }

    pub fn end(&self) -> Vec2 {
        self.points[self.points.len() - 1]
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Point at arc length `distance`, clamped to the path ends.
    pub fn point_at(&self, distance: f32) -> Vec2 {
        if distance <= 0.0 {
            return self.start();
        }
        if distance >= self.length() {
            return self.end();
        }
        // First vertex whose cumulative length reaches `distance`; always >= 1 here.
        let idx = self.cumulative.partition_point(|&c| c < distance);
        let seg_start = self.cumulative[idx - 1];
        let seg_len = self.cumulative[idx] - seg_start;
        if seg_len <= 0.0 {
            return self.points[idx];
        }
        self.points[idx - 1].lerp(self.points[idx], (distance - seg_start) / seg_len)
    }

    /// Appends `other`, dropping its first point when it repeats our last one.
    pub fn join(mut self, other: Polyline) -> Result<Self> {
        let skip = usize::from(other.start().distance(self.end()) <= f32::EPSILON);
        self.points.extend(other.points.into_iter().skip(skip));
        Polyline::new(self.points)
    }
}

/// Moves along a [`Polyline`] by arc length.
#[derive(Debug, Clone)]
pub struct PathFollower {
    path: Polyline,
    travelled: f32,
}

impl PathFollower {
    pub fn new(path: Polyline) -> Self {
        Self { path, travelled: 0.0 }
    }

    /// Advances by `distance` along the path and returns the new position.
    pub fn advance(&mut self, distance: f32) -> Vec2 {
        self.travelled = (self.travelled + distance.max(0.0)).min(self.path.length());
        self.position()
    }

    pub fn position(&self) -> Vec2 {
        self.path.point_at(self.travelled)
    }

    pub fn is_finished(&self) -> bool {
        self.travelled >= self.path.length()
    }

    pub fn path(&self) -> &Polyline {
        &self.path
    }
}

pub fn cubic_bezier(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
}

/// Bézier from `start` to `aperture`: leaves vertically, arrives horizontally.
pub fn aperture_path(start: Vec2, aperture: Vec2, resolution: u32) -> Result<Polyline> {
    let start_handle = Vec2::new(start.x, start.y - (start.y - aperture.y) / 2.0);
    let end_handle = Vec2::new(start.x - (start.x - aperture.x) / 2.0, aperture.y);
    let segments = resolution.max(1);
    let points = (0..=segments)
        .map(|i| {
            let t = i as f32 / segments as f32;
            cubic_bezier(start, start_handle, end_handle, aperture, t)
        })
        .collect();
    Polyline::new(points)
}

/// Lateral offset inside the field: flat until `onset`, then quadratic.
pub fn deflection_offset(t: f32, onset: f32, coeff: f32) -> f32 {
    if t > onset { coeff * (t - onset) * (t - onset) } else { 0.0 }
}

/// Path through the field region starting at `aperture`, bent towards +y for
/// spin up and -y for spin down.
pub fn deflection_path(aperture: Vec2, spin: Spin, settings: &EjectionConfig) -> Result<Polyline> {
    let segments = settings.path_resolution.max(1);
    let points = (0..=segments)
        .map(|i| {
            let t = settings.field_length * i as f32 / segments as f32;
            let offset = deflection_offset(t, settings.deflection_onset, settings.deflection_coeff);
            Vec2::new(aperture.x + t, aperture.y + spin.sign() * offset)
        })
        .collect();
    Polyline::new(points)
}

/// Full flight from inside the oven, through the aperture and the field.
pub fn flight_path(start: Vec2, aperture: Vec2, spin: Spin, settings: &EjectionConfig) -> Result<Polyline> {
    aperture_path(start, aperture, settings.path_resolution)?.join(deflection_path(aperture, spin, settings)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const EPS: f32 = 1e-4;

    fn settings() -> EjectionConfig {
        EjectionConfig { enabled: true, ..EjectionConfig::default() }
    }

    #[test]
    fn point_at_walks_segments_by_arc_length() {
        let path = Polyline::new(vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 2.0)]).unwrap();
        assert!((path.length() - 3.0).abs() < EPS);
        assert_eq!(path.point_at(-1.0), Vec2::new(0.0, 0.0));
        assert!(path.point_at(0.5).distance(Vec2::new(0.5, 0.0)) < EPS);
        assert!(path.point_at(2.0).distance(Vec2::new(1.0, 1.0)) < EPS);
        assert_eq!(path.point_at(10.0), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(Polyline::new(Vec::new()).is_err());
    }

    #[test]
    fn aperture_path_hits_both_ends() {
        let start = Vec2::new(-0.5, 0.8);
        let aperture = Vec2::new(2.0, 0.0);
        let path = aperture_path(start, aperture, 64).unwrap();
        assert_eq!(path.points().len(), 65);
        assert!(path.start().distance(start) < EPS);
        assert!(path.end().distance(aperture) < EPS);
        assert!(path.length() >= start.distance(aperture));
    }

    #[test]
    fn deflection_sign_follows_spin() {
        let aperture = Vec2::new(2.0, 0.0);
        let up = deflection_path(aperture, Spin::Up, &settings()).unwrap();
        let down = deflection_path(aperture, Spin::Down, &settings()).unwrap();
        // 0.2 * (5.5 - 2.0)^2
        let expected = 0.2 * 3.5 * 3.5;
        assert!((up.end().y - expected).abs() < EPS);
        assert!((down.end().y + expected).abs() < EPS);
        assert!((up.end().x - 7.5).abs() < EPS);
        // Straight until the onset.
        assert_eq!(deflection_offset(1.5, 2.0, 0.2), 0.0);
    }

    #[test]
    fn joined_flight_path_has_no_duplicate_vertex() {
        let aperture = Vec2::new(2.0, 0.0);
        let cfg = settings();
        let path = flight_path(Vec2::new(0.3, -0.4), aperture, Spin::Up, &cfg).unwrap();
        let n = cfg.path_resolution as usize + 1;
        assert_eq!(path.points().len(), 2 * n - 1);
    }

    #[test]
    fn follower_finishes_at_path_end() {
        let path = Polyline::new(vec![Vec2::zero(), Vec2::new(1.0, 0.0)]).unwrap();
        let mut follower = PathFollower::new(path);
        let p = follower.advance(0.4);
        assert!(p.distance(Vec2::new(0.4, 0.0)) < EPS);
        assert!(!follower.is_finished());
        let p = follower.advance(5.0);
        assert_eq!(p, Vec2::new(1.0, 0.0));
        assert!(follower.is_finished());
    }

    #[test]
    fn spin_draw_is_reproducible_per_seed() {
        let draws = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..32).map(|_| Spin::random(&mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(draws(7), draws(7));
        assert!(draws(7).contains(&Spin::Up) && draws(7).contains(&Spin::Down));
    }
}

//! A single falling snowflake
//!
//! Flakes own their kinematic state and trail but only share their pattern
//! and wind field, both read-only, so a whole drift can be stepped and drawn
//! from rayon workers.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::Rng;

use crate::display::Plot;
use crate::math2d::{Point, Vector};
use crate::patterns::{Pattern, PatternLibrary, RotationTable};
use crate::wind::WindField;

/// Slowest a flake may fall, in pixels per tick
pub const MIN_FALL_SPEED: f32 = 0.2;

/// Share of the flake's speed fed into its spin each tick
const SPIN_FROM_SPEED: f32 = 0.6;
/// Weight of the previous spin when damping
const SPIN_DAMPING: f32 = 9.0;

/// Sign with zero mapped to zero, unlike `f32::signum`
#[inline]
fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[derive(Clone)]
pub struct SnowFlake {
    position: Vector,
    velocity: Vector,
    inertia: u16,
    size_class: usize,
    /// Degrees in [0, 90)
    rotation_angle: f32,
    rotation_speed: f32,
    pattern: Pattern,
    wind: Arc<WindField>,
    trail: VecDeque<Point>,
}

impl SnowFlake {
    /// Create a flake with a random pattern from `size_class`.
    /// The trail starts as `trail_length` copies of the spawn position.
    pub fn new<R: Rng + ?Sized>(
        position: Vector,
        velocity: Vector,
        inertia: u16,
        wind: Arc<WindField>,
        size_class: usize,
        library: &PatternLibrary,
        trail_length: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            position,
            velocity,
            inertia,
            size_class,
            rotation_angle: 0.0,
            rotation_speed: 0.0,
            pattern: library.random_pattern(size_class, rng),
            wind,
            trail: std::iter::repeat(Self::pixel(position)).take(trail_length).collect(),
        }
    }

    /// Restart at a new position with a fresh pattern from the same class
    pub fn reinit<R: Rng + ?Sized>(
        &mut self,
        position: Vector,
        velocity: Vector,
        inertia: u16,
        library: &PatternLibrary,
        rng: &mut R,
    ) {
        self.position = position;
        self.velocity = velocity;
        self.inertia = inertia;
        self.rotation_speed = 0.0;
        self.pattern = library.random_pattern(self.size_class, rng);

        let start = Self::pixel(position);
        self.trail.iter_mut().for_each(|p| *p = start);
    }

    #[inline]
    fn pixel(position: Vector) -> Point {
        Point::new(position.x as i32, position.y as i32)
    }

    // ========================================================================
    // Physics
    // ========================================================================

    /// Blend the wind at the current position into the velocity, weighted
    /// by inertia, and keep the flake falling
    pub fn accelerate(&mut self) {
        let mut acceleration = Vector::zero();
        self.wind.set_vector(self.position, &mut acceleration);

        let inertia = f32::from(self.inertia);
        self.velocity = (acceleration + self.velocity * inertia) * (1.0 / (inertia + 1.0));

        if self.velocity.y < MIN_FALL_SPEED {
            self.velocity.y = MIN_FALL_SPEED;
        }
    }

    /// Advance one tick: move, spin with the horizontal drift, record trail
    pub fn step(&mut self) {
        self.position += self.velocity;

        let drive = sign(self.velocity.x) * SPIN_FROM_SPEED * self.velocity.magnitude();
        self.rotation_speed = (drive + SPIN_DAMPING * self.rotation_speed) / (SPIN_DAMPING + 1.0);
        self.rotation_angle = (self.rotation_angle + self.rotation_speed).rem_euclid(90.0);

        if self.trail.pop_front().is_some() {
            self.trail.push_back(Self::pixel(self.position));
        }
    }

    /// True while the position lies in [0, width) x [0, height)
    #[inline]
    pub fn in_bounds(&self, width: u32, height: u32) -> bool {
        self.position.x >= 0.0
            && self.position.x < width as f32
            && self.position.y >= 0.0
            && self.position.y < height as f32
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    /// Plot the rotated silhouette and the trail.
    ///
    /// When the flake's whole reach fits inside the target the table walk
    /// skips per-pixel bounds checks.
    pub fn draw<P: Plot>(&self, target: &mut P, library: &PatternLibrary) {
        let rotation = library.rotation();
        let bucket = RotationTable::bucket(self.rotation_angle);
        let reach = library.max_pixel_distance();
        let center = Self::pixel(self.position);
        let (w, h) = (target.width() as i32, target.height() as i32);

        let contained = center.x.saturating_sub(reach) >= 0
            && center.y.saturating_sub(reach) >= 0
            && center.x.saturating_add(reach) < w
            && center.y.saturating_add(reach) < h;

        if contained {
            for &home in self.pattern.iter() {
                for offset in rotation.lookup(bucket, home) {
                    // Safety: table offsets never exceed `reach - 1` on
                    // either axis and the reach box is inside the target.
                    unsafe {
                        target.plot_unchecked(
                            (center.x + offset.x) as u32,
                            (center.y + offset.y) as u32,
                        );
                    }
                }
            }
        } else {
            for &home in self.pattern.iter() {
                for offset in rotation.lookup(bucket, home) {
                    target.plot(
                        center.x.saturating_add(offset.x),
                        center.y.saturating_add(offset.y),
                    );
                }
            }
        }

        for p in &self.trail {
            target.plot(p.x, p.y);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn position(&self) -> Vector {
        self.position
    }

    #[inline]
    pub fn velocity(&self) -> Vector {
        self.velocity
    }

    pub fn inertia(&self) -> u16 {
        self.inertia
    }

    pub fn size_class(&self) -> usize {
        self.size_class
    }

    pub fn rotation_angle(&self) -> f32 {
        self.rotation_angle
    }

    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn trail(&self) -> impl Iterator<Item = Point> + '_ {
        self.trail.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Color, PixelBuffer, PixelFormat};
    use crate::patterns::PatternConfig;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn library() -> Arc<PatternLibrary> {
        let config = PatternConfig {
            sizes: vec![6, 3],
            initial_patterns: 3,
            max_patterns: 3,
        };
        PatternLibrary::build(&config, 11)
    }

    fn steady_wind(direction: Vector) -> Arc<WindField> {
        let mut rng = SmallRng::seed_from_u64(0);
        Arc::new(WindField::new(200, 200, direction, Vector::zero(), (15, 15), &mut rng))
    }

    fn flake_at(library: &PatternLibrary, position: Vector, wind: Vector, trail: usize) -> SnowFlake {
        let mut rng = SmallRng::seed_from_u64(1);
        SnowFlake::new(position, Vector::zero(), 25, steady_wind(wind), 0, library, trail, &mut rng)
    }

    #[test]
    fn test_accelerate_blends_by_inertia() {
        let library = library();
        let mut flake = flake_at(&library, Vector::new(10.0, 10.0), Vector::new(26.0, 52.0), 0);
        flake.accelerate();
        assert!(flake.velocity().approx_eq(&Vector::new(1.0, 2.0), 1e-5));
        flake.accelerate();
        // (26 + 1 * 25) / 26, (52 + 2 * 25) / 26
        assert!(flake.velocity().approx_eq(&Vector::new(51.0 / 26.0, 102.0 / 26.0), 1e-5));
    }

    #[test]
    fn test_accelerate_keeps_flakes_falling() {
        let library = library();
        let mut flake = flake_at(&library, Vector::new(10.0, 10.0), Vector::new(0.0, -8.0), 0);
        flake.accelerate();
        assert_eq!(flake.velocity().y, MIN_FALL_SPEED);
    }

    #[test]
    fn test_step_moves_spins_and_trails() {
        let library = library();
        let mut flake = flake_at(&library, Vector::new(10.0, 10.0), Vector::new(26.0, 0.0), 3);
        flake.accelerate();
        flake.step();

        assert!(flake.position().approx_eq(&Vector::new(11.0, 10.2), 1e-5));
        assert!(flake.rotation_speed() > 0.0);
        assert!(flake.rotation_angle() >= 0.0 && flake.rotation_angle() < 90.0);
        let trail: Vec<Point> = flake.trail().collect();
        assert_eq!(trail, vec![Point::new(10, 10), Point::new(10, 10), Point::new(11, 10)]);
    }

    #[test]
    fn test_straight_fall_does_not_spin() {
        let library = library();
        let mut flake = flake_at(&library, Vector::new(10.0, 10.0), Vector::new(0.0, 3.0), 0);
        for _ in 0..10 {
            flake.accelerate();
            flake.step();
        }
        assert_eq!(flake.rotation_speed(), 0.0);
        assert_eq!(flake.rotation_angle(), 0.0);
    }

    #[test]
    fn test_leftward_drift_wraps_angle() {
        let library = library();
        let mut flake = flake_at(&library, Vector::new(100.0, 10.0), Vector::new(-40.0, 0.0), 0);
        for _ in 0..20 {
            flake.accelerate();
            flake.step();
            assert!(flake.rotation_angle() >= 0.0 && flake.rotation_angle() <= 90.0);
        }
        assert!(flake.rotation_speed() < 0.0);
    }

    #[test]
    fn test_in_bounds() {
        let library = library();
        let flake = flake_at(&library, Vector::new(5.0, 99.9), Vector::zero(), 0);
        assert!(flake.in_bounds(100, 100));
        let below = flake_at(&library, Vector::new(5.0, 100.0), Vector::zero(), 0);
        assert!(!below.in_bounds(100, 100));
        let left = flake_at(&library, Vector::new(-0.5, 5.0), Vector::zero(), 0);
        assert!(!left.in_bounds(100, 100));
    }

    #[test]
    fn test_reinit_resets_state() {
        let library = library();
        let mut rng = SmallRng::seed_from_u64(2);
        let mut flake = flake_at(&library, Vector::new(10.0, 10.0), Vector::new(26.0, 0.0), 2);
        flake.accelerate();
        flake.step();

        flake.reinit(Vector::new(50.0, 0.0), Vector::zero(), 33, &library, &mut rng);
        assert_eq!(flake.position(), Vector::new(50.0, 0.0));
        assert_eq!(flake.velocity(), Vector::zero());
        assert_eq!(flake.inertia(), 33);
        assert_eq!(flake.rotation_speed(), 0.0);
        assert!(flake.trail().all(|p| p == Point::new(50, 0)));
    }

    #[test]
    fn test_draw_is_point_symmetric() {
        let library = library();
        let flake = flake_at(&library, Vector::new(32.0, 32.0), Vector::zero(), 0);
        let mut buffer = PixelBuffer::new(64, 64, PixelFormat::Mono8);
        flake.draw(&mut buffer, &library);

        let mut lit = 0;
        for y in 0..64 {
            for x in 0..64 {
                if buffer.get_pixel(x, y).unwrap() == Color::WHITE {
                    lit += 1;
                    assert_eq!(buffer.get_pixel(64 - x, 64 - y).unwrap(), Color::WHITE);
                }
            }
        }
        assert!(lit > 0);
    }

    #[test]
    fn test_clipped_draw_matches_unclipped_inside() {
        let library = library();
        let flake = flake_at(&library, Vector::new(20.0, 20.0), Vector::zero(), 0);

        let mut full = PixelBuffer::new(40, 40, PixelFormat::Mono8);
        flake.draw(&mut full, &library);
        let mut cut = PixelBuffer::new(40, 22, PixelFormat::Mono8);
        flake.draw(&mut cut, &library);

        for y in 0..22 {
            for x in 0..40 {
                assert_eq!(full.get_pixel(x, y).unwrap(), cut.get_pixel(x, y).unwrap());
            }
        }
    }

    #[test]
    fn test_mask_writer_draw_matches_buffer_draw() {
        let library = library();
        let flake = flake_at(&library, Vector::new(3.0, 30.0), Vector::zero(), 4);

        let mut direct = PixelBuffer::new(48, 48, PixelFormat::Mono8);
        flake.draw(&mut direct, &library);
        let mut shared = PixelBuffer::new(48, 48, PixelFormat::Mono8);
        let mut writer = shared.mask_writer();
        flake.draw(&mut writer, &library);

        assert_eq!(direct.as_bytes(), shared.as_bytes());
    }

    #[test]
    fn test_draw_far_outside_is_harmless() {
        let library = library();
        let flake = flake_at(&library, Vector::new(-1e9, 5e9), Vector::zero(), 2);
        let mut buffer = PixelBuffer::new(16, 16, PixelFormat::Mono8);
        flake.draw(&mut buffer, &library);
        assert_eq!(buffer.distinct_colors(), vec![Color::BLACK]);
    }
}

//! 2D math for the snow simulation
//!
//! `Vector` carries continuous positions, velocities and wind accelerations.
//! `Point` is an integer pixel offset used by flake silhouettes and the
//! rotation table.

use std::ops::{Add, AddAssign, Mul};

/// 2D float vector
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
}

impl Vector {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    #[inline]
    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn magnitude(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Approximate equality check for floating point comparison
    #[inline]
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        (self.x - other.x).abs() < epsilon && (self.y - other.y).abs() < epsilon
    }
}

impl Add for Vector {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl AddAssign for Vector {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Mul<f32> for Vector {
    type Output = Self;
    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl Mul<Vector> for f32 {
    type Output = Vector;
    #[inline]
    fn mul(self, v: Vector) -> Vector {
        v * self
    }
}

/// Integer pixel offset relative to a flake center
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Reflection across the y = x diagonal
    #[inline]
    pub const fn mirrored(self) -> Self {
        Self {
            x: self.y,
            y: self.x,
        }
    }

    /// Quarter turn: (x, y) -> (y, -x)
    #[inline]
    pub const fn quarter_turn(self) -> Self {
        Self {
            x: self.y,
            y: -self.x,
        }
    }

    /// Rotate around the origin by `degrees`, rounding to the nearest pixel
    /// (ties to even)
    pub fn rotated(self, degrees: f64) -> Self {
        let x = f64::from(self.x);
        let y = f64::from(self.y);
        let radius = (x * x + y * y).sqrt();
        let angle = y.atan2(x) + degrees.to_radians();
        Self {
            x: (angle.cos() * radius).round_ties_even() as i32,
            y: (angle.sin() * radius).round_ties_even() as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_magnitude_and_dot() {
        let v = Vector::new(3.0, 4.0);
        assert_eq!(v.magnitude(), 5.0);
        assert_eq!(v.dot(&Vector::new(1.0, 0.0)), 3.0);
    }

    #[test]
    fn test_vector_add_in_place() {
        let mut v = Vector::new(1.0, 2.0);
        v += Vector::new(0.5, -1.0);
        assert!(v.approx_eq(&Vector::new(1.5, 1.0), 1e-6));
    }

    #[test]
    fn test_point_quarter_turn_cycles() {
        let p = Point::new(3, 1);
        let back = p.quarter_turn().quarter_turn().quarter_turn().quarter_turn();
        assert_eq!(back, p);
        assert_eq!(p.quarter_turn(), Point::new(1, -3));
    }

    #[test]
    fn test_point_rotation() {
        assert_eq!(Point::new(10, 0).rotated(90.0), Point::new(0, 10));
        assert_eq!(Point::new(10, 0).rotated(0.0), Point::new(10, 0));
        assert_eq!(Point::new(0, 0).rotated(45.0), Point::new(0, 0));
        assert_eq!(Point::new(4, 4).rotated(-45.0), Point::new(6, 0));
    }
}

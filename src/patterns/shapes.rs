//! Procedural snowflake silhouettes
//!
//! Patterns live in the first octant (0 <= y <= x) while they are carved and
//! are mirrored across y = x before they are stored, so a finished pattern
//! covers the first quadrant with 8-fold symmetry. The rotation table turns
//! those first-quadrant points into the full flake at draw time.

use std::collections::BTreeSet;

use rand::Rng;

use crate::math2d::Point;

/// Bite radius as a fraction of the flake radius
pub const SPOT_RADIUS: f32 = 0.25;

/// Bites taken at random points inside the octant
const INNER_BITES: usize = 4;
/// Bites taken along the outer rim
const RIM_BITES: usize = 3;
/// Most jagged lines a line-built flake can have
const MAX_JAGGED_LINES: u32 = 5;
/// Largest vertical step of a jagged line per column
const JAG_STEP: i32 = 3;

/// Filled primitive used for bodies and bites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Square,
    Circle,
    Diamond,
}

impl ShapeKind {
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        match rng.gen_range(0..3) {
            0 => Self::Square,
            1 => Self::Circle,
            _ => Self::Diamond,
        }
    }

    /// Half-height of the shape's column at horizontal offset `x`
    fn half_height(self, radius: i32, x: i32) -> i32 {
        match self {
            Self::Square => radius,
            Self::Circle => f64::from(radius * radius - x * x).max(0.0).sqrt() as i32,
            Self::Diamond => radius - x.abs(),
        }
    }

    /// Every point of the shape centred on the origin
    pub fn full(self, radius: i32) -> Vec<Point> {
        let mut points = Vec::new();
        for x in -radius..=radius {
            let h = self.half_height(radius, x);
            points.extend((-h..=h).map(|y| Point::new(x, y)));
        }
        points
    }

    /// The shape's points with x >= 0 and y >= 0
    pub fn quarter(self, radius: i32) -> Vec<Point> {
        let mut points = Vec::new();
        for x in 0..=radius {
            let h = self.half_height(radius, x);
            points.extend((0..=h).map(|y| Point::new(x, y)));
        }
        points
    }
}

/// Lattice walk from x = 0 to `radius - 1`, kept between y = 0 and y = x
pub fn jagged_line<R: Rng + ?Sized>(rng: &mut R, radius: i32) -> Vec<Point> {
    let mut y = 0;
    (0..radius)
        .map(|x| {
            y = (y + rng.gen_range(-JAG_STEP..=JAG_STEP)).clamp(0, x);
            Point::new(x, y)
        })
        .collect()
}

fn add_mirrored(points: &[Point], flake: &mut BTreeSet<Point>) {
    for &p in points {
        flake.insert(p);
        flake.insert(p.mirrored());
    }
}

fn remove_mirrored(points: &[Point], flake: &mut BTreeSet<Point>) {
    for &p in points {
        flake.remove(&p);
        flake.remove(&p.mirrored());
    }
}

/// Bite out a random shape centred at `center`, mirrored across y = x
fn bite<R: Rng + ?Sized>(rng: &mut R, radius: i32, center: Point, flake: &mut BTreeSet<Point>) {
    let spot = (radius as f32 * SPOT_RADIUS) as i32;
    let shape: Vec<Point> = ShapeKind::random(rng)
        .full(spot)
        .into_iter()
        .map(|p| p.offset(center.x, center.y))
        .collect();
    remove_mirrored(&shape, flake);
}

/// Rotate every point by 45 degrees toward the diagonal on its side and
/// union the results back in
fn add_diagonal_copy<'a>(points: impl Iterator<Item = &'a Point>, limit: i32) -> Vec<Point> {
    points
        .map(|&p| if p.x > p.y { p.rotated(45.0) } else { p.rotated(-45.0) })
        .filter(|p| p.x <= limit && p.y <= limit)
        .collect()
}

/// Filled quarter shape with bites carved out and a jagged seam.
/// Half the time a 45 degree copy is layered on for an 8-spoke look.
pub fn eight_angle_flake<R: Rng + ?Sized>(
    rng: &mut R,
    radius: i32,
    max_radius: i32,
) -> BTreeSet<Point> {
    let mut flake: BTreeSet<Point> = ShapeKind::random(rng).quarter(radius).into_iter().collect();

    for _ in 0..INNER_BITES {
        let x = rng.gen_range(0..=radius);
        let y = rng.gen_range(0..=x);
        bite(rng, radius, Point::new(x, y), &mut flake);
    }
    for _ in 0..RIM_BITES {
        let y = rng.gen_range(0..=radius);
        bite(rng, radius, Point::new(radius, y), &mut flake);
    }

    add_mirrored(&jagged_line(rng, radius), &mut flake);
    remove_mirrored(&jagged_line(rng, radius), &mut flake);

    if rng.gen_bool(0.5) {
        let rotated = add_diagonal_copy(flake.iter(), max_radius);
        flake.extend(rotated);
    }
    flake
}

/// One to five jagged lines, optionally with a 45 degree copy of the
/// points near the centre.
pub fn jagged_flake<R: Rng + ?Sized>(rng: &mut R, radius: i32, max_radius: i32) -> BTreeSet<Point> {
    let mut flake = BTreeSet::new();
    for _ in 0..rng.gen_range(1..=MAX_JAGGED_LINES) {
        add_mirrored(&jagged_line(rng, radius), &mut flake);
    }

    if rng.gen_bool(0.5) {
        let core = max_radius * 3 / 4;
        let near_centre = flake.iter().filter(|p| p.x.abs() < core && p.y.abs() < core);
        let rotated = add_diagonal_copy(near_centre, i32::MAX);
        flake.extend(rotated);
    }
    flake
}

/// Mirror across y = x, clip to the first quadrant inside `max_radius` and
/// sort. Never returns an empty pattern.
pub fn finish(flake: BTreeSet<Point>, max_radius: i32) -> Vec<Point> {
    let inside = |p: &Point| (0..=max_radius).contains(&p.x) && (0..=max_radius).contains(&p.y);

    let mut symmetric: BTreeSet<Point> = BTreeSet::new();
    for p in flake.into_iter().filter(inside) {
        symmetric.insert(p);
        symmetric.insert(p.mirrored());
    }
    if symmetric.is_empty() {
        symmetric.insert(Point::new(0, 0));
    }
    symmetric.into_iter().collect()
}

/// Generate one finished pattern of the given radius, picking a generator
/// at random
pub fn generate<R: Rng + ?Sized>(rng: &mut R, radius: i32, max_radius: i32) -> Vec<Point> {
    let flake = if rng.gen_bool(0.5) {
        eight_angle_flake(rng, radius, max_radius)
    } else {
        jagged_flake(rng, radius, max_radius)
    };
    finish(flake, max_radius)
}

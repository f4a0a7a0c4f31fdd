//! Precomputed flake rotation lookup
//!
//! For each whole-degree angle in [0, 90) and each first-quadrant offset
//! within the maximum flake radius, the table stores every pixel offset
//! that offset lands on once the flake is turned by that angle, in all four
//! quadrants. Four-fold symmetry makes 90 buckets cover the full turn, and
//! drawing becomes a pure table walk with no trigonometry.

use rayon::prelude::*;

use crate::math2d::Point;

/// Angle buckets covering one quarter turn, one per degree
pub const ANGLE_BUCKETS: usize = 90;

/// Per-angle grids of rotated offsets
#[derive(Debug)]
pub struct RotationTable {
    radius: i32,
    side: usize,
    /// `buckets[angle][y * side + x]`
    buckets: Vec<Vec<Vec<Point>>>,
}

impl RotationTable {
    /// Build the table for offsets up to `radius`, one rayon task per angle
    pub fn build(radius: i32) -> Self {
        let radius = radius.max(0);
        let side = radius as usize + 1;
        let buckets = (0..ANGLE_BUCKETS)
            .into_par_iter()
            .map(|angle| build_bucket(angle, radius, side))
            .collect();
        Self {
            radius,
            side,
            buckets,
        }
    }

    #[inline]
    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Bucket for a rotation angle in degrees. Angles are expected in
    /// [0, 90); anything else is clamped to the nearest bucket.
    #[inline]
    pub fn bucket(angle: f32) -> usize {
        (angle as usize).min(ANGLE_BUCKETS - 1)
    }

    /// Rotated offsets for `point` at `bucket`.
    /// Empty when the point lies outside the first-quadrant grid.
    #[inline]
    pub fn lookup(&self, bucket: usize, point: Point) -> &[Point] {
        if point.x < 0 || point.y < 0 || point.x > self.radius || point.y > self.radius {
            return &[];
        }
        let idx = point.y as usize * self.side + point.x as usize;
        self.buckets.get(bucket).map_or(&[], |cells| cells[idx].as_slice())
    }
}

fn build_bucket(angle: usize, radius: i32, side: usize) -> Vec<Vec<Point>> {
    let mut cells: Vec<Vec<Point>> = vec![Vec::new(); side * side];
    let reach = radius * 2;
    let home_range = 0..=radius;

    // Each candidate pixel is claimed by the first-quadrant offset it
    // rotates back onto
    for x in -reach..=reach {
        for y in -reach..=reach {
            let candidate = Point::new(x, y);
            let home = candidate.rotated(-(angle as f64));
            if home_range.contains(&home.x) && home_range.contains(&home.y) {
                cells[home.y as usize * side + home.x as usize].push(candidate);
            }
        }
    }

    fill_gaps(&mut cells, side);

    for cell in &mut cells {
        for i in (0..cell.len()).rev() {
            let mut turned = cell[i];
            for _ in 0..3 {
                turned = turned.quarter_turn();
                if !cell.contains(&turned) {
                    cell.push(turned);
                }
            }
        }
    }
    cells
}

/// Fill cells the discrete rotation never reached with the mean of their
/// populated 3x3 neighbours (ties to even), repeating until none are left
fn fill_gaps(cells: &mut [Vec<Point>], side: usize) {
    loop {
        let mut fills = Vec::new();
        for idx in (0..cells.len()).filter(|&i| cells[i].is_empty()) {
            if let Some(mean) = neighbour_mean(cells, side, idx % side, idx / side) {
                fills.push((idx, mean));
            }
        }
        if fills.is_empty() {
            return;
        }
        for (idx, mean) in fills {
            cells[idx].push(mean);
        }
    }
}

fn neighbour_mean(cells: &[Vec<Point>], side: usize, col: usize, row: usize) -> Option<Point> {
    let (mut sum_x, mut sum_y, mut count) = (0i64, 0i64, 0i64);
    for r in row.saturating_sub(1)..=(row + 1).min(side - 1) {
        for c in col.saturating_sub(1)..=(col + 1).min(side - 1) {
            if r == row && c == col {
                continue;
            }
            for p in &cells[r * side + c] {
                sum_x += i64::from(p.x);
                sum_y += i64::from(p.y);
                count += 1;
            }
        }
    }
    (count > 0).then(|| {
        let n = count as f64;
        Point::new(
            (sum_x as f64 / n).round_ties_even() as i32,
            (sum_y as f64 / n).round_ties_even() as i32,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_angle_maps_to_four_quadrants() {
        let table = RotationTable::build(4);
        let mut points = table.lookup(0, Point::new(3, 1)).to_vec();
        points.sort();
        assert_eq!(
            points,
            vec![Point::new(-3, -1), Point::new(-1, 3), Point::new(1, -3), Point::new(3, 1)]
        );
        assert_eq!(table.lookup(0, Point::new(0, 0)), &[Point::new(0, 0)]);
    }

    #[test]
    fn test_lookup_is_total() {
        let table = RotationTable::build(20);
        for bucket in 0..ANGLE_BUCKETS {
            for x in 0..=20 {
                for y in 0..=20 {
                    assert!(
                        !table.lookup(bucket, Point::new(x, y)).is_empty(),
                        "empty cell ({x}, {y}) at {bucket} degrees"
                    );
                }
            }
        }
    }

    #[test]
    fn test_lookup_outside_grid_is_empty() {
        let table = RotationTable::build(3);
        assert!(table.lookup(0, Point::new(4, 0)).is_empty());
        assert!(table.lookup(0, Point::new(-1, 0)).is_empty());
        assert!(table.lookup(ANGLE_BUCKETS, Point::new(1, 1)).is_empty());
    }

    #[test]
    fn test_entries_are_closed_under_quarter_turns() {
        let table = RotationTable::build(6);
        for bucket in [0, 17, 45, 89] {
            let points = table.lookup(bucket, Point::new(5, 2));
            for p in points {
                assert!(points.contains(&p.quarter_turn()));
            }
        }
    }

    #[test]
    fn test_neighbour_mean_ties_to_even() {
        let mut cells = vec![Vec::new(); 9];
        cells[0].push(Point::new(2, 0));
        cells[1].push(Point::new(3, 0));
        assert_eq!(neighbour_mean(&cells, 3, 0, 1), Some(Point::new(2, 0)));

        cells[1][0] = Point::new(5, 1);
        // (3.5, 0.5) -> (4, 0)
        assert_eq!(neighbour_mean(&cells, 3, 0, 1), Some(Point::new(4, 0)));
    }

    #[test]
    fn test_neighbour_mean_skips_centre_and_empty_grid() {
        let mut cells = vec![Vec::new(); 9];
        assert_eq!(neighbour_mean(&cells, 3, 1, 1), None);
        cells[4].push(Point::new(9, 9));
        assert_eq!(neighbour_mean(&cells, 3, 1, 1), None);
    }

    #[test]
    fn test_bucket_clamps() {
        assert_eq!(RotationTable::bucket(0.0), 0);
        assert_eq!(RotationTable::bucket(44.9), 44);
        assert_eq!(RotationTable::bucket(89.99), 89);
        assert_eq!(RotationTable::bucket(90.0), 89);
        assert_eq!(RotationTable::bucket(-3.0), 0);
    }
}

//! Spatially varying wind
//!
//! A `WindField` tiles the simulated field with fixed-size cells, each
//! holding one acceleration vector. Cells are rolled once at construction
//! around a general direction and never change afterwards, so a flake can
//! query its cell every tick without allocating or locking.

use rand::Rng;

use crate::math2d::Vector;

/// Grid of per-cell wind accelerations
#[derive(Debug, Clone)]
pub struct WindField {
    cells: Vec<Vector>,
    columns: usize,
    rows: usize,
    cell_width: f32,
    cell_height: f32,
}

impl WindField {
    /// Build a field covering `width` x `height` pixels.
    ///
    /// Each cell is `general` plus a uniform offset spanning `variance` on
    /// each axis (so `variance = (12, 4)` gives offsets in [-6, 6) x [-2, 2)).
    /// `cell_size` is the cell extent in pixels; a zero extent is treated
    /// as one pixel.
    pub fn new<R: Rng + ?Sized>(
        width: u32,
        height: u32,
        general: Vector,
        variance: Vector,
        cell_size: (u32, u32),
        rng: &mut R,
    ) -> Self {
        let cell_w = cell_size.0.max(1);
        let cell_h = cell_size.1.max(1);
        let columns = width.div_ceil(cell_w).max(1) as usize;
        let rows = height.div_ceil(cell_h).max(1) as usize;

        let cells = (0..columns * rows)
            .map(|_| {
                let jitter = Vector::new(
                    (rng.gen::<f32>() - 0.5) * variance.x,
                    (rng.gen::<f32>() - 0.5) * variance.y,
                );
                general + jitter
            })
            .collect();

        Self {
            cells,
            columns,
            rows,
            cell_width: cell_w as f32,
            cell_height: cell_h as f32,
        }
    }

    /// Copy the acceleration at `position` into `out`.
    /// Positions off the grid read the nearest edge cell.
    #[inline]
    pub fn set_vector(&self, position: Vector, out: &mut Vector) {
        *out = self.cells[self.cell_index(position)];
    }

    /// Acceleration at `position`
    #[inline]
    pub fn acceleration_at(&self, position: Vector) -> Vector {
        self.cells[self.cell_index(position)]
    }

    #[inline]
    fn cell_index(&self, position: Vector) -> usize {
        // NaN and negatives saturate to 0 in float-to-int casts
        let column = ((position.x / self.cell_width) as usize).min(self.columns - 1);
        let row = ((position.y / self.cell_height) as usize).min(self.rows - 1);
        row * self.columns + column
    }

    /// Grid dimensions as (columns, rows)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.columns, self.rows)
    }
}

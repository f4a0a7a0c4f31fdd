//! The snow drift: every flake on screen, its winds and its render buffers
//!
//! The simulated field is the screen enlarged by the largest flake radius
//! on every side, so flakes leave the visible area fully before they leave
//! the field. Flakes are drawn as an on/off mask into a 1-byte back buffer
//! which is swapped to the front and stamped onto the screen in one color.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::display::{Color, PixelBuffer, PixelFormat};
use crate::flake::SnowFlake;
use crate::math2d::Vector;
use crate::patterns::PatternLibrary;
use crate::util::TimingScope;
use crate::wind::WindField;

/// Lightest flake inertia
pub const MIN_INERTIA: u16 = 25;
/// Heaviest flake inertia
pub const MAX_INERTIA: u16 = 40;

/// Drift tunables
#[derive(Debug, Clone)]
pub struct DriftConfig {
    /// Wind fields shared round-robin between flakes
    pub wind_variations: usize,
    /// Wind cell extent in pixels
    pub wind_cell_size: (u32, u32),
    /// Spread of cell winds around the general direction
    pub wind_variance: Vector,
    /// Fixed general wind; rolled per drift when `None`
    pub general_direction: Option<Vector>,
    /// Trail pixels per flake
    pub trail_length: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            wind_variations: 100,
            wind_cell_size: (15, 15),
            wind_variance: Vector::new(12.0, 4.0),
            general_direction: None,
            trail_length: 5,
        }
    }
}

pub struct SnowDrift {
    library: Arc<PatternLibrary>,
    config: DriftConfig,
    winds: Vec<Arc<WindField>>,
    general_direction: Vector,
    flakes: HashMap<u64, SnowFlake>,
    next_id: u64,
    target: usize,
    /// Padded field size
    width: u32,
    height: u32,
    margin: i32,
    back: PixelBuffer,
    front: RwLock<PixelBuffer>,
    rng: SmallRng,
}

impl SnowDrift {
    /// Create an empty drift for a `screen_width` x `screen_height` screen
    pub fn new(
        screen_width: u32,
        screen_height: u32,
        library: Arc<PatternLibrary>,
        config: DriftConfig,
        seed: u64,
    ) -> Self {
        let margin = library.max_radius().max(0);
        let width = (screen_width + 2 * margin as u32).max(1);
        let height = (screen_height + 2 * margin as u32).max(1);

        let mut drift = Self {
            library,
            config,
            winds: Vec::new(),
            general_direction: Vector::zero(),
            flakes: HashMap::new(),
            next_id: 0,
            target: 0,
            width,
            height,
            margin,
            back: PixelBuffer::new(width, height, PixelFormat::Mono8),
            front: RwLock::new(PixelBuffer::new(width, height, PixelFormat::Mono8)),
            rng: SmallRng::seed_from_u64(seed),
        };
        drift.roll_winds();
        drift
    }

    /// Roll a new general direction and rebuild every wind variation
    fn roll_winds(&mut self) {
        let rng = &mut self.rng;
        self.general_direction = self.config.general_direction.unwrap_or_else(|| {
            Vector::new(rng.gen_range(-5..=5) as f32, rng.gen_range(1..=4) as f32)
        });

        let base_seed: u64 = self.rng.gen();
        let (width, height) = (self.width, self.height);
        let (general, variance) = (self.general_direction, self.config.wind_variance);
        let cell_size = self.config.wind_cell_size;

        self.winds = (0..self.config.wind_variations.max(1) as u64)
            .into_par_iter()
            .map(|i| {
                let mut rng = SmallRng::seed_from_u64(base_seed.wrapping_add(i));
                Arc::new(WindField::new(width, height, general, variance, cell_size, &mut rng))
            })
            .collect();

        debug!(
            x = self.general_direction.x,
            y = self.general_direction.y,
            variations = self.winds.len(),
            "wind rolled"
        );
    }

    /// Random spawn point on the field's edge.
    ///
    /// The top edge and the upwind side share one range of `width + height`
    /// positions, so each edge is picked in proportion to its length.
    fn edge_position(&mut self) -> Vector {
        let (w, h) = (self.width as i32, self.height as i32);
        let along = self.rng.gen_range(0..w + h);
        let y = along - w;

        if y > 0 {
            let x = if self.general_direction.x > 0.0 { 0 } else { w - 1 };
            Vector::new(x as f32, y as f32)
        } else {
            Vector::new(along.min(w - 1) as f32, 0.0)
        }
    }

    fn random_inertia(&mut self) -> u16 {
        self.rng.gen_range(MIN_INERTIA..=MAX_INERTIA)
    }

    fn spawn_flake(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        let wind = Arc::clone(&self.winds[(id % self.winds.len() as u64) as usize]);
        let class = self.library.random_size_class(&mut self.rng);
        let position = self.edge_position();
        let inertia = self.random_inertia();

        let flake = SnowFlake::new(
            position,
            Vector::zero(),
            inertia,
            wind,
            class,
            &self.library,
            self.config.trail_length,
            &mut self.rng,
        );
        self.flakes.insert(id, flake);
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    /// Advance one tick.
    ///
    /// Tops the population up to the target, steps every flake in parallel,
    /// then handles the flakes that left the field: dropped while the drift
    /// is over target, restarted at an edge otherwise.
    pub fn update(&mut self) {
        let _timing = TimingScope::new("drift update");

        let missing = self.target.saturating_sub(self.flakes.len());
        for _ in 0..missing {
            self.spawn_flake();
        }

        let (width, height) = (self.width, self.height);
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.flakes
            .par_iter_mut()
            .for_each_with(sender, |sender, (&id, flake)| {
                flake.accelerate();
                flake.step();
                if !flake.in_bounds(width, height) {
                    let _ = sender.send(id);
                }
            });

        for id in receiver.try_iter() {
            if self.flakes.len() > self.target {
                self.flakes.remove(&id);
                continue;
            }
            let position = self.edge_position();
            let inertia = self.random_inertia();
            if let Some(flake) = self.flakes.get_mut(&id) {
                flake.reinit(position, Vector::zero(), inertia, &self.library, &mut self.rng);
            }
        }
    }

    /// Draw every flake into the back buffer in parallel, then swap it to
    /// the front
    pub fn render_display(&mut self) {
        let _timing = TimingScope::new("drift render");

        self.back.clear(Color::BLACK);
        let writer = self.back.mask_writer();
        let library = &*self.library;
        self.flakes
            .par_iter()
            .for_each_with(writer, |writer, (_, flake)| flake.draw(writer, library));

        std::mem::swap(&mut self.back, &mut *self.front.write());
    }

    /// Stamp the last rendered frame onto `target` in `color`, whose alpha
    /// acts as opacity. Safe before the first render: the front starts
    /// empty.
    pub fn draw(&self, target: &mut PixelBuffer, color: Color) {
        target.stamp_mask(&self.front.read(), -self.margin, -self.margin, color);
    }

    /// Drop every flake and roll fresh winds
    pub fn reset(&mut self) {
        self.flakes.clear();
        self.back.clear(Color::BLACK);
        self.front.write().clear(Color::BLACK);
        self.roll_winds();
        info!(target_flakes = self.target, "snow drift reset");
    }

    // ========================================================================
    // Population
    // ========================================================================

    pub fn snow_flake_count(&self) -> usize {
        self.flakes.len()
    }

    pub fn target_flakes(&self) -> usize {
        self.target
    }

    /// Set the population the drift converges to on later ticks
    pub fn set_target_flakes(&mut self, target: usize) {
        self.target = target;
    }

    /// Population relative to the target
    pub fn fullness(&self) -> f32 {
        self.flakes.len() as f32 / self.target.max(1) as f32
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn flakes(&self) -> impl Iterator<Item = &SnowFlake> {
        self.flakes.values()
    }

    pub fn general_direction(&self) -> Vector {
        self.general_direction
    }

    /// Padded field size
    pub fn field_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Padding on each side of the screen
    pub fn margin(&self) -> i32 {
        self.margin
    }

    /// Last presented mask
    pub fn front(&self) -> RwLockReadGuard<'_, PixelBuffer> {
        self.front.read()
    }

    pub fn library(&self) -> &Arc<PatternLibrary> {
        &self.library
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternConfig;

    fn library() -> Arc<PatternLibrary> {
        let config = PatternConfig {
            sizes: vec![6, 3],
            initial_patterns: 2,
            max_patterns: 2,
        };
        PatternLibrary::build(&config, 21)
    }

    fn calm() -> DriftConfig {
        DriftConfig {
            wind_variations: 4,
            wind_variance: Vector::zero(),
            general_direction: Some(Vector::new(0.0, 2.0)),
            ..DriftConfig::default()
        }
    }

    #[test]
    fn test_field_is_padded() {
        let drift = SnowDrift::new(100, 50, library(), calm(), 1);
        assert_eq!(drift.field_size(), (112, 62));
        assert_eq!(drift.margin(), 6);
        assert_eq!(drift.snow_flake_count(), 0);
    }

    #[test]
    fn test_rolled_direction_in_range() {
        for seed in 0..20 {
            let config = DriftConfig {
                wind_variations: 1,
                ..DriftConfig::default()
            };
            let drift = SnowDrift::new(40, 40, library(), config, seed);
            let d = drift.general_direction();
            assert!((-5.0..=5.0).contains(&d.x));
            assert!((1.0..=4.0).contains(&d.y));
            assert_eq!(d.x.fract(), 0.0);
        }
    }

    #[test]
    fn test_edge_positions() {
        let mut drift = SnowDrift::new(100, 50, library(), calm(), 2);
        let (w, h) = drift.field_size();
        for _ in 0..500 {
            let p = drift.edge_position();
            let on_top = p.y == 0.0 && p.x >= 0.0 && p.x < w as f32;
            // general x is 0, so the side edge is the right-hand one
            let on_side = p.x == (w - 1) as f32 && p.y > 0.0 && p.y < h as f32;
            assert!(on_top || on_side, "{p:?}");
        }
    }

    #[test]
    fn test_update_grows_to_target() {
        let mut drift = SnowDrift::new(200, 200, library(), calm(), 3);
        drift.set_target_flakes(50);
        drift.update();
        assert_eq!(drift.snow_flake_count(), 50);
        assert!(drift.flakes().all(|f| f.in_bounds(212, 212)));
    }

    #[test]
    fn test_update_sheds_surplus_as_flakes_leave() {
        let mut drift = SnowDrift::new(20, 20, library(), calm(), 4);
        drift.set_target_flakes(30);
        drift.update();
        drift.set_target_flakes(0);

        for _ in 0..500 {
            drift.update();
            assert!(drift.snow_flake_count() <= 30);
        }
        assert_eq!(drift.snow_flake_count(), 0);
    }

    #[test]
    fn test_flakes_recycle_at_target() {
        let mut drift = SnowDrift::new(20, 20, library(), calm(), 5);
        drift.set_target_flakes(10);
        for _ in 0..300 {
            drift.update();
            assert_eq!(drift.snow_flake_count(), 10);
        }
    }

    #[test]
    fn test_fullness() {
        let mut drift = SnowDrift::new(50, 50, library(), calm(), 6);
        assert_eq!(drift.fullness(), 0.0);
        drift.set_target_flakes(8);
        drift.update();
        assert_eq!(drift.fullness(), 1.0);
        drift.set_target_flakes(16);
        assert_eq!(drift.fullness(), 0.5);
    }

    #[test]
    fn test_render_swaps_and_draw_stamps() {
        let mut drift = SnowDrift::new(64, 64, library(), calm(), 7);
        let mut screen = PixelBuffer::with_size(64, 64);
        screen.clear(Color::BLACK);

        // nothing rendered yet
        drift.draw(&mut screen, Color::WHITE);
        assert_eq!(screen.distinct_colors(), vec![Color::BLACK]);

        drift.set_target_flakes(40);
        for _ in 0..20 {
            drift.update();
        }
        drift.render_display();
        assert!(drift.front().distinct_colors().contains(&Color::WHITE));

        drift.draw(&mut screen, Color::WHITE);
        assert!(screen.distinct_colors().contains(&Color::WHITE));
    }

    #[test]
    fn test_reset_empties() {
        let mut drift = SnowDrift::new(64, 64, library(), calm(), 8);
        drift.set_target_flakes(20);
        drift.update();
        drift.render_display();
        drift.reset();
        assert_eq!(drift.snow_flake_count(), 0);
        assert_eq!(drift.target_flakes(), 20);
        assert_eq!(drift.front().distinct_colors(), vec![Color::BLACK]);
    }
}

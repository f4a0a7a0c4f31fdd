//! Shared snowflake pattern library
//!
//! Holds the silhouettes for every flake size class together with the
//! rotation table used to draw them. A library is built once, shared behind
//! an `Arc`, and can keep growing its pattern lists on a background thread
//! while flakes are already falling.

mod rotation;
mod shapes;

pub use rotation::{RotationTable, ANGLE_BUCKETS};
pub use shapes::{ShapeKind, SPOT_RADIUS};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Instant;

use parking_lot::RwLock;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::math2d::Point;

/// Flake radii, largest first
pub const FLAKE_SIZES: [i32; 4] = [20, 15, 7, 3];

/// Patterns kept per size class once growth has finished
pub const MAX_PATTERNS_PER_SIZE: usize = 500;

/// One flake silhouette: first-quadrant offsets, symmetric across y = x
pub type Pattern = Arc<[Point]>;

/// Library shape and growth limits
#[derive(Debug, Clone)]
pub struct PatternConfig {
    /// Radius of each size class
    pub sizes: Vec<i32>,
    /// Patterns generated per class before `build` returns
    pub initial_patterns: usize,
    /// Cap per class for background growth
    pub max_patterns: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            sizes: FLAKE_SIZES.to_vec(),
            initial_patterns: 1,
            max_patterns: MAX_PATTERNS_PER_SIZE,
        }
    }
}

impl PatternConfig {
    /// Largest radius across the size classes
    pub fn max_radius(&self) -> i32 {
        self.sizes.iter().copied().max().unwrap_or(0)
    }
}

/// Furthest a drawn pixel can sit from the flake centre on either axis
pub fn max_pixel_distance(max_radius: i32) -> i32 {
    (std::f64::consts::SQRT_2 * f64::from(max_radius) + 1.0).ceil() as i32
}

// ============================================================================
// PatternLibrary
// ============================================================================

pub struct PatternLibrary {
    sizes: Vec<i32>,
    max_radius: i32,
    max_patterns: usize,
    sets: Vec<RwLock<Vec<Pattern>>>,
    rotation: RotationTable,
}

static GLOBAL: OnceLock<Arc<PatternLibrary>> = OnceLock::new();

impl PatternLibrary {
    /// Build the rotation table and the initial patterns for every class.
    ///
    /// Blocks until each class holds at least one pattern. An empty size
    /// list falls back to [`FLAKE_SIZES`].
    pub fn build(config: &PatternConfig, seed: u64) -> Arc<Self> {
        let started = Instant::now();
        let sizes = if config.sizes.is_empty() {
            FLAKE_SIZES.to_vec()
        } else {
            config.sizes.iter().map(|&s| s.max(0)).collect()
        };
        let max_radius = sizes.iter().copied().max().unwrap_or(0);
        let initial = config.initial_patterns.max(1);

        let rotation = RotationTable::build(max_radius);

        let mut rng = SmallRng::seed_from_u64(seed);
        let sets = sizes
            .iter()
            .map(|&radius| {
                let set = (0..initial)
                    .map(|_| Pattern::from(shapes::generate(&mut rng, radius, max_radius)))
                    .collect();
                RwLock::new(set)
            })
            .collect();

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            max_radius, "pattern library built"
        );

        Arc::new(Self {
            sizes,
            max_radius,
            max_patterns: config.max_patterns.max(initial),
            sets,
            rotation,
        })
    }

    /// Process-wide library with default sizes, growing in the background.
    ///
    /// The first caller builds it; concurrent first callers wait for that
    /// single build instead of starting their own.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| {
            let seed: u64 = rand::random();
            let library = Self::build(&PatternConfig::default(), seed);
            library.spawn_growth(seed.wrapping_add(1)).detach();
            library
        }))
    }

    /// Start filling every class up to the cap on a background thread
    pub fn spawn_growth(self: &Arc<Self>, seed: u64) -> GrowthHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let library = Arc::clone(self);
        let flag = Arc::clone(&cancel);

        let thread = thread::Builder::new()
            .name("pattern-growth".into())
            .spawn(move || library.grow(seed, &flag));

        match thread {
            Ok(handle) => GrowthHandle {
                cancel,
                thread: Some(handle),
            },
            Err(e) => {
                warn!(error = %e, "could not start pattern growth; keeping initial patterns");
                GrowthHandle {
                    cancel,
                    thread: None,
                }
            },
        }
    }

    fn grow(&self, seed: u64, cancel: &AtomicBool) {
        let started = Instant::now();
        let mut rng = SmallRng::seed_from_u64(seed);

        while !cancel.load(Ordering::Relaxed) && !self.is_full() {
            for (class, &radius) in self.sizes.iter().enumerate() {
                if cancel.load(Ordering::Relaxed) {
                    return;
                }
                // Generate outside the lock so readers never wait on it
                let pattern = Pattern::from(shapes::generate(&mut rng, radius, self.max_radius));
                let mut set = self.sets[class].write();
                if set.len() < self.max_patterns {
                    set.push(pattern);
                }
            }
        }

        info!(
            patterns = self.total_patterns(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pattern growth finished"
        );
    }

    /// True once every class has reached the cap
    pub fn is_full(&self) -> bool {
        self.sets.iter().all(|set| set.read().len() >= self.max_patterns)
    }

    /// Random pattern from a size class.
    ///
    /// # Panics
    /// Panics if `class` is not below [`Self::size_classes`].
    pub fn random_pattern<R: Rng + ?Sized>(&self, class: usize, rng: &mut R) -> Pattern {
        let set = self.sets[class].read();
        Arc::clone(&set[rng.gen_range(0..set.len())])
    }

    /// Uniformly chosen size class
    pub fn random_size_class<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.sizes.len())
    }

    /// Number of size classes
    pub fn size_classes(&self) -> usize {
        self.sizes.len()
    }

    /// Radius of a size class
    pub fn radius(&self, class: usize) -> i32 {
        self.sizes[class]
    }

    pub fn max_radius(&self) -> i32 {
        self.max_radius
    }

    pub fn max_pixel_distance(&self) -> i32 {
        max_pixel_distance(self.max_radius)
    }

    pub fn pattern_count(&self, class: usize) -> usize {
        self.sets[class].read().len()
    }

    pub fn total_patterns(&self) -> usize {
        self.sets.iter().map(|set| set.read().len()).sum()
    }

    pub fn max_patterns(&self) -> usize {
        self.max_patterns
    }

    #[inline]
    pub fn rotation(&self) -> &RotationTable {
        &self.rotation
    }
}

// ============================================================================
// Background Growth Handle
// ============================================================================

/// Handle to a running pattern grower.
///
/// Dropping the handle cancels the grower and waits for it; call
/// [`GrowthHandle::detach`] to let it run to completion on its own.
pub struct GrowthHandle {
    cancel: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl GrowthHandle {
    /// Ask the grower to stop after the pattern it is working on
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Wait for the grower to finish (or honour a cancel)
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("pattern growth thread panicked");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, thread::JoinHandle::is_finished)
    }

    /// Let the grower run on without this handle
    pub fn detach(mut self) {
        self.thread.take();
    }
}

impl Drop for GrowthHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.cancel();
            let _ = thread.join();
        }
    }
}

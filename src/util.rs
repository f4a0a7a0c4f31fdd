//! Shared utilities

use std::time::{Duration, Instant};

use tracing::debug;

// ============================================================================
// FPS Counter
// ============================================================================

/// FPS counter with a rolling average over the last N frames.
///
/// Frame times live in a fixed ring with a running sum, so recording a frame
/// and reading the average are both O(1).
pub struct FpsCounter {
    frame_times: Vec<f32>,
    next: usize,
    filled: usize,
    sum: f64,
    last_frame: Instant,
}

impl FpsCounter {
    /// Create a new FPS counter with specified sample window
    pub fn new(sample_count: usize) -> Self {
        Self {
            frame_times: vec![0.0; sample_count.max(1)],
            next: 0,
            filled: 0,
            sum: 0.0,
            last_frame: Instant::now(),
        }
    }

    /// Call once per frame. Returns (delta_time, current_fps, average_fps)
    pub fn tick(&mut self) -> (f32, f32, f32) {
        let now = Instant::now();
        let dt = now - self.last_frame;
        self.last_frame = now;
        self.record(dt);

        let dt = dt.as_secs_f32();
        let current_fps = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        (dt, current_fps, self.average_fps())
    }

    /// Push one frame duration into the window, evicting the oldest
    pub fn record(&mut self, frame_time: Duration) {
        let dt = frame_time.as_secs_f32();
        self.sum += f64::from(dt) - f64::from(self.frame_times[self.next]);
        self.frame_times[self.next] = dt;
        self.next = (self.next + 1) % self.frame_times.len();
        self.filled = (self.filled + 1).min(self.frame_times.len());
    }

    /// Average frame time in seconds; 0 before the first frame
    pub fn average_frame_time(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        (self.sum / self.filled as f64).max(0.0) as f32
    }

    /// Get the average frame time in milliseconds
    pub fn avg_frame_time_ms(&self) -> f32 {
        self.average_frame_time() * 1000.0
    }

    /// Frames per second over the window; 0 with no usable samples
    pub fn average_fps(&self) -> f32 {
        let avg = self.average_frame_time();
        if avg > 0.0 {
            1.0 / avg
        } else {
            0.0
        }
    }

    /// Frames currently in the window
    pub fn frame_count(&self) -> usize {
        self.filled
    }
}

// ============================================================================
// Timing Scope
// ============================================================================

/// Logs how long a named scope took, at debug level, when dropped
pub struct TimingScope {
    name: &'static str,
    started: Instant,
}

impl TimingScope {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimingScope {
    fn drop(&mut self) {
        debug!(
            scope = self.name,
            elapsed_us = self.started.elapsed().as_micros() as u64,
            "scope timing"
        );
    }
}

//! Snowstorm effect: a drift whose population rises and falls over time
//!
//! A storm ramps its flake count up along `x²`, eases it back down along
//! `(1 - x)²`, lets the last flakes fall out, pauses, then starts over with
//! fresh winds. On top of that curve a ceiling tracks the frame rate so a
//! slow machine sheds flakes instead of stuttering.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::Effect;
use crate::display::{Color, PixelBuffer};
use crate::drift::{DriftConfig, SnowDrift};
use crate::patterns::PatternLibrary;
use crate::settings::Settings;
use crate::util::FpsCounter;

/// Slow frames in a row before the ceiling starts dropping
const UNDER_SPEED_FRAMES: u32 = 10;
/// Flakes the ceiling can recover per fast frame
const CEILING_RECOVERY: usize = 20;

/// Storm cycle lengths (in ticks) and throttling limits
#[derive(Debug, Clone)]
pub struct StormTiming {
    pub ramp_up_frames: u32,
    pub ramp_down_frames: u32,
    /// Ticks to wait after the drift empties before the next storm
    pub restart_delay_frames: u32,
    /// Share of the maximum still falling at the end of the ramp down
    pub ramp_down_floor: f32,
    /// Frame rate below which the population is throttled
    pub min_fps: f32,
    /// Frames in the rolling FPS window
    pub fps_window: usize,
}

impl Default for StormTiming {
    fn default() -> Self {
        Self {
            ramp_up_frames: 5400,
            ramp_down_frames: 1800,
            restart_delay_frames: 600,
            ramp_down_floor: 0.02,
            min_fps: 22.0,
            fps_window: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RampUp,
    RampDown,
    Empty,
}

pub struct SnowStorm {
    drift: SnowDrift,
    settings: Settings,
    timing: StormTiming,
    phase: Phase,
    /// Ticks spent in the current phase
    frame: u32,
    /// Ticks the drift has been empty during `Phase::Empty`
    empty_frames: u32,
    ceiling: usize,
    under_speed: u32,
    fps: FpsCounter,
    last_update: Instant,
}

impl SnowStorm {
    /// Storm filling a `width` x `height` screen, drawing from the shared
    /// pattern library
    pub fn instantiate(width: u32, height: u32, settings: Settings) -> Self {
        Self::new(
            width,
            height,
            settings,
            PatternLibrary::global(),
            DriftConfig::default(),
            StormTiming::default(),
            rand::random(),
        )
    }

    pub fn new(
        width: u32,
        height: u32,
        settings: Settings,
        library: Arc<PatternLibrary>,
        drift_config: DriftConfig,
        timing: StormTiming,
        seed: u64,
    ) -> Self {
        let settings = settings.validated();
        let drift_config = DriftConfig {
            trail_length: settings.trail_length,
            ..drift_config
        };
        let drift = SnowDrift::new(width, height, library, drift_config, seed);

        info!(
            width,
            height,
            max_flakes = settings.maximum_number_of_flakes,
            "snowstorm instantiated"
        );

        Self {
            drift,
            settings,
            fps: FpsCounter::new(timing.fps_window),
            timing,
            phase: Phase::RampUp,
            frame: 0,
            empty_frames: 0,
            ceiling: settings.maximum_number_of_flakes,
            under_speed: 0,
            last_update: Instant::now(),
        }
    }

    /// Advance one tick, charging `frame_time` to the FPS estimate
    pub fn update_with_frame_time(&mut self, frame_time: Duration) {
        self.fps.record(frame_time);
        self.throttle();

        let target = self.phase_target().min(self.ceiling);
        self.drift.set_target_flakes(target);
        self.drift.update();
        self.drift.render_display();

        self.advance_phase();
    }

    /// Lower the ceiling while frames are slow, recover it while fast
    fn throttle(&mut self) {
        let max = self.settings.maximum_number_of_flakes;
        if self.fps.average_fps() < self.timing.min_fps {
            self.under_speed += 1;
            if self.under_speed > UNDER_SPEED_FRAMES {
                self.ceiling = self.drift.snow_flake_count().saturating_sub(1);
            }
        } else {
            self.under_speed = 0;
            self.ceiling = (self.ceiling + CEILING_RECOVERY).min(max);
        }
    }

    /// Population the storm curve asks for this tick
    fn phase_target(&self) -> usize {
        let max = self.settings.maximum_number_of_flakes as f32;
        let progress = |frame: u32, total: u32| (frame as f32 / total.max(1) as f32).min(1.0);

        match self.phase {
            Phase::RampUp => {
                let x = progress(self.frame, self.timing.ramp_up_frames);
                (max * x * x) as usize
            },
            Phase::RampDown => {
                let x = progress(self.frame, self.timing.ramp_down_frames);
                let remaining = (1.0 - x) * (1.0 - x) + self.timing.ramp_down_floor;
                (max * remaining.min(1.0)) as usize
            },
            Phase::Empty => 0,
        }
    }

    fn advance_phase(&mut self) {
        self.frame += 1;
        match self.phase {
            Phase::RampUp if self.frame >= self.timing.ramp_up_frames => {
                self.enter(Phase::RampDown);
            },
            Phase::RampDown if self.frame >= self.timing.ramp_down_frames => {
                self.enter(Phase::Empty);
            },
            Phase::Empty if self.drift.snow_flake_count() == 0 => {
                self.empty_frames += 1;
                if self.empty_frames >= self.timing.restart_delay_frames {
                    self.drift.reset();
                    self.enter(Phase::RampUp);
                }
            },
            _ => {},
        }
    }

    fn enter(&mut self, phase: Phase) {
        info!(from = ?self.phase, to = ?phase, flakes = self.drift.snow_flake_count(), "storm phase");
        self.phase = phase;
        self.frame = 0;
        self.empty_frames = 0;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn drift(&self) -> &SnowDrift {
        &self.drift
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current throttling ceiling
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn average_fps(&self) -> f32 {
        self.fps.average_fps()
    }
}

impl Effect for SnowStorm {
    fn update(&mut self) {
        let now = Instant::now();
        let frame_time = now - self.last_update;
        self.last_update = now;
        self.update_with_frame_time(frame_time);

        debug!(
            flakes = self.drift.snow_flake_count(),
            target = self.drift.target_flakes(),
            fps = self.fps.average_fps(),
            "storm tick"
        );
    }

    fn render(&self, buffer: &mut PixelBuffer) {
        buffer.clear(Color::BLACK);
        self.drift
            .draw(buffer, Color::WHITE.with_alpha(self.settings.alpha()));
    }

    fn name(&self) -> &str {
        "Snowstorm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math2d::Vector;
    use crate::patterns::PatternConfig;

    const FAST: Duration = Duration::from_millis(16);
    const SLOW: Duration = Duration::from_millis(100);

    fn storm(max_flakes: usize, timing: StormTiming) -> SnowStorm {
        let library = PatternLibrary::build(
            &PatternConfig {
                sizes: vec![6, 3],
                initial_patterns: 2,
                max_patterns: 2,
            },
            31,
        );
        let drift = DriftConfig {
            wind_variations: 2,
            wind_variance: Vector::zero(),
            general_direction: Some(Vector::new(0.0, 3.0)),
            ..DriftConfig::default()
        };
        let settings = Settings {
            maximum_number_of_flakes: max_flakes,
            ..Settings::default()
        };
        SnowStorm::new(40, 40, settings, library, drift, timing, 32)
    }

    fn short_timing() -> StormTiming {
        StormTiming {
            ramp_up_frames: 100,
            ramp_down_frames: 50,
            restart_delay_frames: 5,
            ramp_down_floor: 0.0,
            ..StormTiming::default()
        }
    }

    #[test]
    fn test_ramp_up_is_quadratic() {
        let mut storm = storm(400, short_timing());
        for _ in 0..51 {
            storm.update_with_frame_time(FAST);
        }
        // the 51st tick used frame 50 of 100
        assert_eq!(storm.drift().target_flakes(), 100);
        assert_eq!(storm.phase(), Phase::RampUp);
    }

    #[test]
    fn test_full_cycle_restarts() {
        let mut storm = storm(50, short_timing());
        for _ in 0..100 {
            storm.update_with_frame_time(FAST);
        }
        assert_eq!(storm.phase(), Phase::RampDown);

        for _ in 0..50 {
            storm.update_with_frame_time(FAST);
        }
        assert_eq!(storm.phase(), Phase::Empty);

        let mut ticks = 0;
        while storm.phase() == Phase::Empty {
            storm.update_with_frame_time(FAST);
            assert_eq!(storm.drift().target_flakes(), 0);
            ticks += 1;
            assert!(ticks < 2000, "storm never restarted");
        }
        assert_eq!(storm.phase(), Phase::RampUp);
        assert_eq!(storm.drift().snow_flake_count(), 0);
    }

    #[test]
    fn test_slow_frames_throttle_population() {
        let timing = StormTiming {
            ramp_up_frames: 1,
            ramp_down_frames: 100_000,
            ..short_timing()
        };
        let mut storm = storm(200, timing);
        for _ in 0..3 {
            storm.update_with_frame_time(FAST);
        }
        assert_eq!(storm.ceiling(), 200);

        for _ in 0..100 {
            storm.update_with_frame_time(SLOW);
        }
        assert!(storm.ceiling() < 200);
        assert!(storm.drift().snow_flake_count() < 200);
        assert!(storm.drift().target_flakes() <= storm.ceiling());

        // 60-frame window: the average recovers after ~40 fast frames, then
        // the ceiling climbs 20 per frame
        for _ in 0..60 {
            storm.update_with_frame_time(FAST);
        }
        assert_eq!(storm.ceiling(), 200);
    }

    #[test]
    fn test_instantiate_with_shared_library() {
        let mut storm = SnowStorm::instantiate(64, 48, Settings::default());
        storm.update();
        let mut buffer = PixelBuffer::with_size(64, 48);
        storm.render(&mut buffer);
        assert_eq!(storm.phase(), Phase::RampUp);
        assert_eq!(storm.settings().maximum_number_of_flakes, 3000);
        assert!(Arc::ptr_eq(storm.drift().library(), &PatternLibrary::global()));
    }

    #[test]
    fn test_render_before_update_is_blank() {
        let storm = storm(100, short_timing());
        let mut buffer = PixelBuffer::with_size(40, 40);
        storm.render(&mut buffer);
        assert_eq!(buffer.distinct_colors(), vec![Color::BLACK]);
        assert_eq!(storm.name(), "Snowstorm");
    }

    #[test]
    fn test_render_uses_opacity() {
        let mut storm = storm(100, short_timing());
        for _ in 0..100 {
            storm.update_with_frame_time(FAST);
        }
        let mut buffer = PixelBuffer::with_size(40, 40);
        storm.render(&mut buffer);
        // 0.8 opacity over opaque black
        assert!(buffer.distinct_colors().contains(&Color::gray(204)));
    }
}

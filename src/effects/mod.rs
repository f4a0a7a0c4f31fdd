mod snowstorm;

pub use snowstorm::{Phase, SnowStorm, StormTiming};

use crate::display::PixelBuffer;

/// Trait for full-screen animations driven by the host loop.
///
/// The simulation is tick based: each `update` advances exactly one tick
/// no matter how long the frame took. `render` may be called any number of
/// times between updates, including before the first one.
pub trait Effect {
    /// Advance the animation by one tick
    fn update(&mut self);

    /// Render the current state to the pixel buffer
    fn render(&self, buffer: &mut PixelBuffer);

    /// Effect name for UI/debugging
    fn name(&self) -> &str;
}

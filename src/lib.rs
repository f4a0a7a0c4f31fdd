//! Software-rendered snowfall.
//!
//! A [`SnowStorm`] owns a [`SnowDrift`] of [`SnowFlake`]s blown across a
//! screen by cell-based [`WindField`]s. Flakes draw procedurally generated
//! silhouettes from a shared [`PatternLibrary`], rotated through a
//! precomputed [`patterns::RotationTable`], into a one-byte mask that is
//! stamped onto a 32-bit [`PixelBuffer`] for the host to present.

pub mod display;
pub mod drift;
pub mod effects;
pub mod error;
pub mod flake;
pub mod math2d;
pub mod patterns;
pub mod settings;
pub mod util;
pub mod wind;

pub use display::{Color, PixelBuffer, PixelFormat};
pub use drift::{DriftConfig, SnowDrift};
pub use effects::{Effect, SnowStorm, StormTiming};
pub use error::{PixelError, SettingsError};
pub use flake::SnowFlake;
pub use math2d::{Point, Vector};
pub use patterns::{PatternConfig, PatternLibrary};
pub use settings::{Settings, SettingsStore};
pub use wind::WindField;

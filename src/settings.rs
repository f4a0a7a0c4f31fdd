//! User settings
//!
//! Three knobs shape the animation: flake opacity, trail length and the
//! population ceiling. They persist as JSON, either as a single table or
//! as a store keyed by user name. Loading never fails: a missing or corrupt
//! file falls back to defaults so the snow always runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SettingsError;

/// Highest accepted trail length
pub const MAX_TRAIL_LENGTH: usize = 64;
/// Highest accepted population ceiling
pub const MAX_FLAKES_LIMIT: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Settings {
    /// Flake opacity in [0, 1]
    pub opacity: f32,
    /// Trail pixels per flake
    pub trail_length: usize,
    /// Population the storm ramps up to
    pub maximum_number_of_flakes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            opacity: 0.8,
            trail_length: 5,
            maximum_number_of_flakes: 3000,
        }
    }
}

impl Settings {
    /// Copy with every field clamped to its accepted range.
    /// A NaN opacity falls back to the default.
    pub fn validated(self) -> Self {
        let opacity = if self.opacity.is_nan() {
            Self::default().opacity
        } else {
            self.opacity.clamp(0.0, 1.0)
        };
        Self {
            opacity,
            trail_length: self.trail_length.min(MAX_TRAIL_LENGTH),
            maximum_number_of_flakes: self.maximum_number_of_flakes.min(MAX_FLAKES_LIMIT),
        }
    }

    /// Opacity as an 8-bit alpha
    pub fn alpha(&self) -> u8 {
        (self.validated().opacity * 255.0).round() as u8
    }

    /// Load validated settings, or defaults if the file is missing or bad
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match read_json::<Self>(path) {
            Ok(settings) => settings.validated(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default settings");
                Self::default()
            },
        }
    }

    /// Save settings to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        write_json(path.as_ref(), self)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SettingsError> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SettingsError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

// ============================================================================
// Per-user Store
// ============================================================================

/// Settings for every user of a shared install
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsStore {
    users: BTreeMap<String, Settings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store, starting empty if the file is missing or corrupt
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::new();
        }
        read_json(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "settings store unreadable, starting empty");
            Self::new()
        })
    }

    /// Save store to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        write_json(path.as_ref(), self)
    }

    /// The user's validated settings, or defaults for unknown users
    pub fn settings_for(&self, user: &str) -> Settings {
        self.users
            .get(user)
            .map_or_else(Settings::default, |s| s.validated())
    }

    /// Add or replace a user's settings
    pub fn insert(&mut self, user: impl Into<String>, settings: Settings) {
        self.users.insert(user.into(), settings);
    }

    /// Add settings only for a user with none yet. Returns true if added.
    pub fn add_if_missing(&mut self, user: impl Into<String>, settings: Settings) -> bool {
        let mut added = false;
        self.users.entry(user.into()).or_insert_with(|| {
            added = true;
            settings
        });
        added
    }

    pub fn contains(&self, user: &str) -> bool {
        self.users.contains_key(user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

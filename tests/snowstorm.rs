//! End-to-end behaviour through the public API

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use snowstorm::display::{PixelFormat, Plot};
use snowstorm::effects::Phase;
use snowstorm::{
    Color, DriftConfig, Effect, PatternConfig, PatternLibrary, PixelBuffer, Settings,
    SettingsStore, SnowDrift, SnowFlake, SnowStorm, StormTiming, Vector, WindField,
};
use tempfile::tempdir;

fn small_library() -> Arc<PatternLibrary> {
    PatternLibrary::build(
        &PatternConfig {
            sizes: vec![7, 3],
            initial_patterns: 3,
            max_patterns: 3,
        },
        99,
    )
}

fn steady_wind() -> DriftConfig {
    DriftConfig {
        wind_variations: 3,
        wind_variance: Vector::zero(),
        general_direction: Some(Vector::new(1.0, 2.0)),
        ..DriftConfig::default()
    }
}

#[test]
fn test_drift_grows_by_exactly_the_shortfall() {
    let mut drift = SnowDrift::new(320, 240, small_library(), steady_wind(), 1);
    drift.set_target_flakes(50);
    drift.update();
    assert_eq!(drift.snow_flake_count(), 50);

    drift.set_target_flakes(100);
    drift.update();
    assert_eq!(drift.snow_flake_count(), 100);
}

#[test]
fn test_flake_one_pixel_below_field_is_out() {
    let library = small_library();
    let mut rng = SmallRng::seed_from_u64(2);
    let wind = Arc::new(WindField::new(
        50,
        50,
        Vector::new(0.0, 1.0),
        Vector::zero(),
        (15, 15),
        &mut rng,
    ));

    let mut flake = SnowFlake::new(
        Vector::new(20.0, 49.5),
        Vector::new(0.0, 1.0),
        30,
        wind,
        0,
        &library,
        4,
        &mut rng,
    );
    assert!(flake.in_bounds(50, 50));
    assert!(!flake.in_bounds(50, 49));

    flake.accelerate();
    flake.step();
    assert!(flake.position().y >= 50.0);
    assert!(!flake.in_bounds(50, 50));
}

#[test]
fn test_draw_before_first_update() {
    let storm = SnowStorm::new(
        64,
        48,
        Settings::default(),
        small_library(),
        steady_wind(),
        StormTiming::default(),
        3,
    );
    let mut screen = PixelBuffer::with_size(64, 48);
    screen.clear(Color::rgb(10, 20, 30));
    storm.render(&mut screen);
    assert_eq!(screen.distinct_colors(), vec![Color::BLACK]);
    assert_eq!(storm.phase(), Phase::RampUp);
}

#[test]
fn test_storm_snows_within_screen() {
    let timing = StormTiming {
        ramp_up_frames: 30,
        ..StormTiming::default()
    };
    let settings = Settings {
        opacity: 1.0,
        maximum_number_of_flakes: 200,
        ..Settings::default()
    };
    let mut storm = SnowStorm::new(80, 60, settings, small_library(), steady_wind(), timing, 4);
    for _ in 0..40 {
        storm.update_with_frame_time(std::time::Duration::from_millis(16));
    }
    assert!(storm.drift().snow_flake_count() > 0);

    let mut screen = PixelBuffer::with_size(80, 60);
    storm.render(&mut screen);
    let colors = screen.distinct_colors();
    assert!(colors.contains(&Color::WHITE));
    assert!(colors.iter().all(|c| *c == Color::WHITE || *c == Color::BLACK));
}

#[test]
fn test_clear_resets_every_pixel() {
    for format in [PixelFormat::Mono8, PixelFormat::Rgb24, PixelFormat::Argb32] {
        let mut buffer = PixelBuffer::new(7, 5, format);
        for (x, y) in [(0, 0), (6, 4), (3, 2)] {
            buffer.set_pixel(x, y, Color::WHITE).unwrap();
        }
        buffer.plot(1, 1);

        buffer.clear(Color::BLACK);
        for y in 0..5 {
            for x in 0..7 {
                assert!(buffer.get_pixel(x, y).unwrap().is_black(), "{format:?} ({x}, {y})");
            }
        }
    }
}

#[test]
fn test_settings_survive_a_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snowstorm.json");

    let chosen = Settings {
        opacity: 0.5,
        trail_length: 10,
        maximum_number_of_flakes: 300,
    };
    let mut store = SettingsStore::load(&path);
    assert!(store.is_empty());
    store.insert("ada", chosen);
    store.save(&path).unwrap();

    let reloaded = SettingsStore::load(&path);
    assert_eq!(reloaded.settings_for("ada"), chosen);

    let storm = SnowStorm::new(
        32,
        32,
        reloaded.settings_for("ada"),
        small_library(),
        steady_wind(),
        StormTiming::default(),
        5,
    );
    assert_eq!(storm.settings().alpha(), 128);
}

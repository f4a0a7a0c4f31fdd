use std::path::PathBuf;

use snowstorm::display::{Display, PixelBuffer, RenderTarget, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use snowstorm::util::FpsCounter;
use snowstorm::{Effect, Settings, SettingsStore, SnowStorm};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_SETTINGS_PATH: &str = "snowstorm.json";

struct Args {
    width: u32,
    height: u32,
    vsync: bool,
    settings_path: PathBuf,
    user: String,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        width: DEFAULT_WIDTH,
        height: DEFAULT_HEIGHT,
        vsync: true,
        settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
        user: std::env::var("USER").unwrap_or_else(|_| "default".to_string()),
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--no-vsync", _) => parsed.vsync = false,
            ("--width" | "-w", Some(v)) => {
                if let Ok(w) = v.parse() {
                    parsed.width = w;
                }
                i += 1;
            },
            ("--height" | "-h", Some(v)) => {
                if let Ok(h) = v.parse() {
                    parsed.height = h;
                }
                i += 1;
            },
            ("--resolution" | "-r", Some(v)) => {
                // WxH, e.g. 1920x1080
                if let Some((w, h)) = v.split_once('x') {
                    if let (Ok(w), Ok(h)) = (w.parse(), h.parse()) {
                        parsed.width = w;
                        parsed.height = h;
                    }
                }
                i += 1;
            },
            ("--settings" | "-s", Some(v)) => {
                parsed.settings_path = PathBuf::from(v);
                i += 1;
            },
            ("--user" | "-u", Some(v)) => {
                parsed.user.clone_from(v);
                i += 1;
            },
            ("--help", _) => {
                println!("Usage: snowstorm [OPTIONS]");
                println!();
                println!("Options:");
                println!("  --width W, -w W           Window width (default: {})", DEFAULT_WIDTH);
                println!("  --height H, -h H          Window height (default: {})", DEFAULT_HEIGHT);
                println!("  --resolution WxH, -r WxH  Set resolution (e.g., 1920x1080)");
                println!("  --settings PATH, -s PATH  Per-user settings file (default: {})", DEFAULT_SETTINGS_PATH);
                println!("  --user NAME, -u NAME      Settings entry to use (default: $USER)");
                println!("  --no-vsync                Disable VSync for uncapped framerate");
                println!("  --help                    Show this help message");
                println!();
                println!("Any key or mouse button quits. RUST_LOG=snowstorm=debug for frame timings.");
                std::process::exit(0);
            },
            _ => {},
        }
        i += 1;
    }

    parsed
}

/// Settings for `user`, recording defaults for first-time users
fn load_settings(args: &Args) -> Settings {
    let mut store = SettingsStore::load(&args.settings_path);
    if store.add_if_missing(args.user.as_str(), Settings::default()) {
        if let Err(e) = store.save(&args.settings_path) {
            warn!(path = %args.settings_path.display(), error = %e, "could not save settings");
        }
    }
    store.settings_for(&args.user)
}

fn main() -> Result<(), String> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snowstorm=info")))
        .init();

    let args = parse_args();
    let settings = load_settings(&args);
    info!(
        user = %args.user,
        opacity = settings.opacity,
        trail_length = settings.trail_length,
        max_flakes = settings.maximum_number_of_flakes,
        "settings loaded"
    );

    let (mut display, texture_creator) =
        Display::with_options("snowstorm", args.width, args.height, args.vsync)?;
    let mut target = RenderTarget::with_size(&texture_creator, args.width, args.height)?;
    let mut buffer = PixelBuffer::with_size(args.width, args.height);

    let mut storm = SnowStorm::instantiate(args.width, args.height, settings);
    let mut fps_counter = FpsCounter::new(60);

    info!(
        width = args.width,
        height = args.height,
        vsync = args.vsync,
        effect = storm.name(),
        "running"
    );

    loop {
        let (_dt, _current_fps, avg_fps) = fps_counter.tick();

        if let Some(event) = display.poll_events().first() {
            info!(?event, avg_fps, "input received, quitting");
            break;
        }

        storm.update();
        storm.render(&mut buffer);
        display.present(&mut target, &buffer)?;
    }

    Ok(())
}

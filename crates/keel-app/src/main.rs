use std::cell::Cell;
use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};

use keel_config::{FrameConfig, KeelConfig};
use keel_core::{logging, Engine};

mod demo;

/// Resolve the config file path.
///
/// Precedence: `KEEL_CONFIG` env var > `keel.toml` in the working directory
/// (when present) > built-in defaults.
fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os("KEEL_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from("keel.toml");
    local.is_file().then_some(local)
}

/// Drive `engine` at the configured frame rate until `quit` is set or the
/// frame limit is reached. Returns the number of ticks run.
fn run(engine: &mut Engine, frame: &FrameConfig, quit: &Cell<bool>) -> u64 {
    let budget = frame.frame_budget();
    loop {
        let frame_start = Instant::now();
        engine.tick();

        if quit.get() {
            tracing::info!(frame = engine.frame_count(), "quit flag set, leaving loop");
            break;
        }
        if frame.max_frames.is_some_and(|max| engine.frame_count() >= max) {
            tracing::info!(frame = engine.frame_count(), "frame limit reached");
            break;
        }

        if let Some(rest) = budget.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }
    engine.frame_count()
}

fn main() -> Result<()> {
    let path = config_path();
    let config = KeelConfig::load(path.as_deref()).context("failed to load configuration")?;
    logging::init(&config.logging)?;
    tracing::info!(config = ?path, fps = config.frame.target_fps, "KEEL starting up");

    let mut engine = Engine::new();
    let quit = demo::install(&mut engine, demo::DemoOptions::default());
    engine.start();

    let frames = run(&mut engine, &config.frame, &quit);
    tracing::info!(
        frames,
        seconds = engine.timestamp(),
        tick_rate = engine.tick_rate(),
        "KEEL shutting down"
    );
    engine.clean();
    Ok(())
}

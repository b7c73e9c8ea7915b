mod window;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use winit::event_loop::{ControlFlow, EventLoop};

use windflow::{ConfigError, EngineConfig};

const CONTROLS: &str = "Controls:
  drag    pan
  wheel   zoom
  R       double the particle count
  L       toggle latitude correction
  F       reload the field
  Esc     quit";

/// Surface clear color when the config leaves it unset. The viewer draws no
/// basemap, so the composite pass needs a cleared target to load.
const DEMO_BACKGROUND: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

#[derive(Parser, Debug)]
#[command(name = "windflow")]
#[command(about = "Animated wind particle trails over a field raster", long_about = None)]
#[command(version)]
#[command(after_help = CONTROLS)]
struct Cli {
    /// Field raster (PNG, RGBA8: u in R, v in G, no-data mask in A)
    image: PathBuf,

    /// Field metadata JSON (size and velocity bounds)
    meta: PathBuf,

    /// Engine configuration JSON
    config: Option<PathBuf>,
}

impl Cli {
    fn into_demo_args(self) -> Result<window::DemoArgs, ConfigError> {
        let config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        };
        Ok(window::DemoArgs {
            image: self.image,
            meta: self.meta,
            config: demo_config(config),
        })
    }
}

fn demo_config(mut config: EngineConfig) -> EngineConfig {
    config.background.get_or_insert(DEMO_BACKGROUND);
    config
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Cli::parse().into_demo_args() {
        Ok(args) => args,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            return ExitCode::FAILURE;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = window::App::new(args);
    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

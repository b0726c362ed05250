//! Activity recognition over recorded joint sequences.

use activity_recognition::app::{AppConfig, ReplayApp};
use activity_recognition::config::Config;
use activity_recognition::decision_engine::DecisionEngine;
use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Joint sequence to replay (YAML list of joint maps)
    #[arg(short, long, required_unless_present = "print_config")]
    joints: Option<PathBuf>,

    /// Video the joints were extracted from, enables motion validation
    #[arg(short, long)]
    video: Option<PathBuf>,

    /// Show the annotated video
    #[arg(long)]
    display: bool,

    /// Disable motion validation even when a video is given
    #[arg(long)]
    no_motion_validation: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{}", activity_recognition::config::EXAMPLE_CONFIG);
        return Ok(());
    }

    let Some(joints_path) = args.joints else {
        anyhow::bail!("--joints is required unless --print-config is given");
    };

    info!("Activity Recognition");

    let mut config = match &args.config {
        Some(config_path) => {
            info!("Loading configuration from: {}", config_path.display());
            match Config::from_file(config_path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!("Failed to load config file: {e}. Using defaults.");
                    Config::default()
                }
            }
        }
        None => Config::default(),
    };

    if args.no_motion_validation {
        config.engine.enable_motion_validation = false;
    }
    config.validate()?;

    let engine = DecisionEngine::from_config(&config);
    let app_config = AppConfig {
        joints_path,
        video_path: args.video,
        display: args.display,
    };

    let mut app = ReplayApp::new(app_config, engine)?;
    let summary = app.run()?;

    info!("Replayed {} frames", summary.frames());
    println!("{}", summary.stats);

    Ok(())
}

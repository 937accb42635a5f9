//! Headless initiative tracker.
//!
//! Reads tracker commands from stdin, one per line, and prints the roster
//! after every change:
//!
//! ```bash
//! cargo run -p initiative -- --dir saves --name "Goblin Ambush"
//! ```

mod commands;
mod headless;
mod render;

use headless::{parse_config_from_args, run_headless, DriverConfig};
use tracing_subscriber::filter::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("initiative=info,initiative_core=info"));

    // stdout carries the line protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn print_help() {
    println!("initiative - headless combat initiative tracker");
    println!();
    println!("USAGE:");
    println!("    initiative [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --dir <path>         Save directory (env: INITIATIVE_SAVE_DIR)");
    println!("    --name <name>        Encounter name (env: INITIATIVE_ENCOUNTER)");
    println!("    --load <path>        Load a save on startup");
    println!("    --autosave-ms <ms>   Autosave idle gap, 0 disables (env: INITIATIVE_AUTOSAVE_MS)");
    println!("    --no-autosave        Disable autosave");
    println!("    -h, --help           Show this help");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = parse_config_from_args(&args, DriverConfig::from_env());
    tracing::info!(
        encounter = %config.encounter,
        dir = %config.save_dir.display(),
        "starting headless session"
    );
    run_headless(config).await.map_err(|e| e.into())
}

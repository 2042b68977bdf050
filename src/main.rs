mod board;
mod channels;
mod classify;
mod commands;
mod config;
mod core;
mod detector;
mod monitor;
mod notifications;
mod pins;
mod reports;
mod scheduler;
mod state;
mod tracker;
mod traits;
mod types;
pub mod utils;

#[cfg(test)]
mod testing;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

fn print_help() {
    println!("boardpulse {}", env!("CARGO_PKG_VERSION"));
    println!("{}\n", env!("CARGO_PKG_DESCRIPTION"));
    println!("Usage: boardpulse [CONFIG]\n");
    println!("Arguments:");
    println!("  [CONFIG]         Path to the config file (default: config.toml)");
    println!("\nEnvironment:");
    println!("  TELEGRAM_API_TOKEN, PEER_ID, REPORT_CHAT_ID, TRELLO_API_KEY, TRELLO_TOKEN");
    println!("  override the matching config values; a .env file is loaded if present.");
    println!("\nOptions:");
    println!("  -h, --help       Print help");
    println!("  -V, --version    Print version");
}

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,teloxide=warn,sqlx=warn")),
        )
        .init();

    let mut config_path = PathBuf::from("config.toml");

    // Handle CLI arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-V" => {
                println!("boardpulse {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            flag if flag.starts_with('-') => {
                eprintln!("Unknown option '{}'. Run with --help for usage.", flag);
                std::process::exit(2);
            }
            path => config_path = PathBuf::from(path),
        }
    }

    let config = config::AppConfig::load(&config_path)?;

    // Run async
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(crate::core::run(config))
}

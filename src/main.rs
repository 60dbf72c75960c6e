use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

use keygrind_lib::{assistant, console, Config, SessionCoordinator};

#[derive(Parser)]
#[command(name = "keygrind")]
#[command(about = "Vanity Solana keypair search sessions over a line console", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the solana-keygen binary, overriding config and environment
    #[arg(long)]
    keygen_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries notifications only.
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let mut config = match cli.config.or_else(Config::default_path) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env()?;
    if let Some(path) = cli.keygen_path {
        config.keygen.path = path;
    }

    let mut coordinator = SessionCoordinator::new(&config);
    match assistant::from_config(&config.assistant) {
        Ok(Some(service)) => coordinator = coordinator.with_assistant(service),
        Ok(None) => info!("No assistant configured; suggestions and questions are disabled"),
        Err(e) => warn!("Assistant disabled: {}", e),
    }

    info!("Using search tool {}", config.keygen.path.display());
    console::run(coordinator, tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}

mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::{Result, anyhow};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    // Load .env file if present, before configuration is read
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::loader::load_config(cli.config.as_deref())
        .map_err(|e| anyhow!("Configuration error: {e}"))?;

    observability::init_tracing(&cfg.logging);
    if let Some(level) = &cli.log_level {
        observability::apply_logging_level(level);
    }
    tracing::debug!(
        config = cli.config.as_deref().unwrap_or(config::loader::DEFAULT_CONFIG_PATH),
        redis = cfg.redis.enabled,
        secondary = ?cfg.stores.secondary_backend,
        "Configuration loaded"
    );

    match &cli.command {
        Commands::Key(args) => commands::key::run(&cfg, args)?,
        Commands::Flush(args) => commands::flush::run(&cfg, args).await?,
        Commands::Check => commands::check::run(&cfg).await?,
        Commands::Demo(args) => commands::demo::run(&cfg, args).await?,
    }

    Ok(())
}

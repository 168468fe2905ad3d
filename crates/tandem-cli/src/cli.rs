use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Tandem: inspect and exercise the cache-aside and dual-store layer")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./tandem.toml when present)
    #[arg(short, long, global = true, env = "TANDEM_CONFIG")]
    pub config: Option<String>,

    /// Log filter, overriding logging.level (e.g. `debug` or `info,tandem_cache=trace`)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the cache key of a call
    Key(KeyArgs),
    /// Delete every cache key matching a pattern
    Flush(FlushArgs),
    /// Probe the cache backend and the secondary store
    Check,
    /// Run the users flow against the configured backends
    Demo(DemoArgs),
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// Scope as `store:namespace:entity` (e.g. typeorm:users:user)
    #[arg(short, long)]
    pub scope: String,
    /// Operation name (e.g. findById)
    #[arg(short, long)]
    pub operation: String,
    /// Call arguments; each is parsed as JSON, falling back to a plain string
    pub args: Vec<String>,
    /// Also print the patterns a write with these arguments would apply
    #[arg(long)]
    pub invalidation: bool,
}

#[derive(clap::Args)]
pub struct FlushArgs {
    /// Anchored glob, e.g. `typeorm:users:user:*`
    pub pattern: String,
    /// List matching keys without deleting them
    #[arg(long)]
    pub dry_run: bool,
    /// Keys per SCAN/DEL batch (defaults to cache.scan_batch_size)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

#[derive(clap::Args)]
pub struct DemoArgs {
    /// Email of the demo user (a unique one is generated by default)
    #[arg(long)]
    pub email: Option<String>,
    /// Keep the demo user instead of removing it at the end
    #[arg(long)]
    pub keep: bool,
    /// Print the cache statistics as JSON
    #[arg(long)]
    pub json: bool,
}

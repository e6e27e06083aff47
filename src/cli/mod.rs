use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "spore",
    version,
    about = "Resolve app secrets and inject them into the environment"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve one environment (or one key) and print it
    Get(GetOpts),
    /// Print shell export lines for an environment
    Load(LoadOpts),
    /// Run a command with the resolved environment applied
    Run(RunOpts),
    /// Scaffold a manifest in the project directory
    Init(InitOpts),
    /// Inspect or update the local configuration
    Config(ConfigOpts),
}

#[derive(clap::Args)]
pub struct GetOpts {
    /// Environment name
    pub env: String,
    /// Single key to resolve; omit for the whole environment
    pub key: Option<String>,
    /// Project directory (defaults to the current directory)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct LoadOpts {
    /// Environment name (defaults to the configured default)
    pub env: Option<String>,
    /// Overwrite variables already present in the environment
    #[arg(long)]
    pub overwrite: bool,
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct RunOpts {
    /// Environment name (defaults to the configured default)
    #[arg(short, long)]
    pub env: Option<String>,
    /// Overwrite variables already present in the environment
    #[arg(long)]
    pub overwrite: bool,
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
    /// Command to run, after `--`
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

#[derive(clap::Args)]
pub struct InitOpts {
    /// App name (defaults to the directory name)
    pub name: Option<String>,
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Set one key in the local config file
    Set { key: String, value: String },
}

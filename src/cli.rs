use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "shepherd")]
#[command(version = "0.1.0")]
#[command(about = "Supervision and session agent for the recording rig", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml plus optional env-specific file)
    #[arg(short, long, default_value = "config", env = "SHEPHERD_CONFIG_DIR")]
    pub config_dir: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the session daemon (acquisition polling, recording control, API)
    Daemon,
    /// One watchdog pass: check the relay, restart it if unhealthy, exit
    Watchdog,
    /// Read-only health report across both hosts
    Report,
}

use clap::Parser;

use shepherd::checks::{Reporter, SystemEnv, Watchdog};
use shepherd::cli::{Cli, Commands};
use shepherd::config::AppConfig;
use shepherd::daemon::SessionDaemon;
use shepherd::error::Result;
use shepherd::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("shepherd: {e}");
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = AppConfig::load_from(&cli.config_dir)?;
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("config: {error}");
        }
        return Ok(2);
    }

    match cli.command {
        Commands::Daemon => {
            logging::init_logging(config.logging.dir.as_deref());
            SessionDaemon::new(config)?.run().await?;
            Ok(0)
        }
        Commands::Watchdog => {
            logging::init_logging(config.logging.dir.as_deref());
            let env = SystemEnv::new(config.fleet.ssh_connect_timeout_secs)?;
            // A corrective action is still a successful run; only OS-level
            // failures exit non-zero, via the error path.
            Watchdog::new(&config.watchdog, &env).run().await?;
            Ok(0)
        }
        Commands::Report => {
            logging::init_logging_simple();
            let env = SystemEnv::new(config.fleet.ssh_connect_timeout_secs)?;
            let report = Reporter::new(&config, &env).run().await;
            print!("{}", report.render());
            Ok(report.exit_code())
        }
    }
}

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

mod cli;
mod logging;
mod run_cmd;
mod suite_cmds;

use cli::{Cli, Commands};
use run_cmd::RunArgs;

/// Exit code for unusable configuration or a failed suite setup.
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Held until exit so the run log flushes.
    let _log_guard = match logging::init(cli.command.log_dir()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<u8> {
    let format = cli.format;
    match cli.command {
        Commands::Run {
            config,
            scenarios,
            skip_cleanup,
            timeout_secs,
            log_dir: _,
        } => {
            let args = RunArgs {
                config: &config,
                scenarios: &scenarios,
                skip_cleanup,
                timeout: timeout_secs.map(Duration::from_secs),
            };
            run_cmd::handle_run(args, format).await
        }
        Commands::Validate { config } => {
            suite_cmds::handle_validate(&config, format)?;
            Ok(0)
        }
        Commands::List { config } => {
            suite_cmds::handle_list(&config, format)?;
            Ok(0)
        }
    }
}

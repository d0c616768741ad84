use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "gv")]
#[command(about = "Gateway verification harness: drive a live gateway through suite scenarios")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for CLI responses
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up the suite, run its scenarios in order, tear it down
    Run {
        /// Suite file (suite.toml)
        #[arg(short, long)]
        config: PathBuf,

        /// Only run these scenarios (repeatable); all when omitted
        #[arg(short, long = "scenario")]
        scenarios: Vec<String>,

        /// Leave fixtures in place (also GV_SKIP_CLEANUP=1)
        #[arg(long)]
        skip_cleanup: bool,

        /// Cancel the run after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Also write logs to <DIR>/run-<timestamp>.log
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Check a suite file without touching the cluster
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// List the scenarios of a suite
    List {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Commands {
    pub fn log_dir(&self) -> Option<&std::path::Path> {
        match self {
            Self::Run { log_dir, .. } => log_dir.as_deref(),
            Self::Validate { .. } | Self::List { .. } => None,
        }
    }
}

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use gv_cluster::Kubectl;
use gv_config::{CleanupPolicy, validate_config};
use gv_probe::HttpProbe;
use gv_suite::{RunReport, SuiteRunner};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::OutputFormat;

pub(crate) struct RunArgs<'a> {
    pub config: &'a Path,
    pub scenarios: &'a [String],
    pub skip_cleanup: bool,
    pub timeout: Option<Duration>,
}

/// Returns the process exit code; errors are configuration problems.
pub(crate) async fn handle_run(args: RunArgs<'_>, format: OutputFormat) -> Result<u8> {
    let config = validate_config(args.config)?;
    let kubectl = Kubectl::locate(config.kubectl.binary.as_deref())?
        .with_context(config.kubectl.context.clone())
        .with_kubeconfig(config.kubectl.kubeconfig.clone());
    let probe = HttpProbe::new(config.timing.request_timeout())?;
    info!(suite = %config.name, kubectl = %kubectl.binary().display(), "Loaded suite");

    let cancel = CancellationToken::new();
    spawn_interrupt_watch(cancel.clone());
    if let Some(timeout) = args.timeout {
        spawn_deadline(cancel.clone(), timeout);
    }

    let report = SuiteRunner::new(&config, &kubectl, &probe)
        .with_cleanup(CleanupPolicy::from_flags(args.skip_cleanup))
        .with_cancellation(cancel)
        .run(args.scenarios)
        .await?;
    print_report(&report, format)?;
    Ok(u8::try_from(report.exit_code()).unwrap_or(1))
}

fn spawn_interrupt_watch(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling run");
            cancel.cancel();
        }
    });
}

fn spawn_deadline(cancel: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                warn!(?timeout, "Run timeout reached; cancelling run");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => print!("{}", report.render_text()),
    }
    Ok(())
}

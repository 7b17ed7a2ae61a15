mod commands;
mod terminal;

use std::sync::Arc;

use anyhow::Context;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

use commands::CommandLine;
use scaleout_common::config::Config;
use scaleout_common::stop::{StopHandle, StopSignal};
use scaleout_core::host::NetlinkHost;
use scaleout_core::neighbor::LldpListener;
use scaleout_core::orchestrator::{Orchestrator, RunReport};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbosity);

    let cfg: Config = commands.to_config();

    print::header("scale-out discovery");

    if !is_root::is_root() {
        warn!("not running as root, link changes will most likely be refused");
    }

    let (handle, mut stop) = StopSignal::new();
    tokio::spawn(stop_on_signal(handle));

    let host = NetlinkHost::new().context("opening netlink socket")?;
    let orchestrator = Orchestrator::new(Arc::new(host), Arc::new(LldpListener::new()));

    let report: RunReport = orchestrator.run(&cfg, &stop).await?;
    print::log_results(&report);

    if cfg.keep_running && !stop.is_stopped() {
        info!("done, staying alive until stopped");
        stop.stopped().await;
    }

    Ok(())
}

async fn stop_on_signal(handle: StopHandle) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, only Ctrl-C stops");
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.stop();
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = sigterm.recv() => info!("terminated"),
    }
    handle.stop();
}

//! # Run orchestration
//!
//! Drives one daemon run in the configured [`Mode`]:
//!
//! * **L2**: enumerate, resolve links, set MTU, bring links up.
//! * **L3**: enumerate, resolve links, bring links up for LLDP, collect LLDP,
//!   derive addresses, then either configure the links (remove stale
//!   addresses, add derived ones, add routes, set MTU, bring up, write the
//!   address map) or restore the links that were down.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{self, Instant};
use tracing::{info, warn};

use scaleout_common::config::{Config, Mode};
use scaleout_common::host::HostNetworking;
use scaleout_common::network::ConfigStore;
use scaleout_common::stop::StopSignal;

use crate::gaudinet::GaudiNet;
use crate::neighbor::NeighborDiscovery;
use crate::{discovery, monitor, nm, reconcile, sysfs};

/// Outcome of a run, used for result reporting.
#[derive(Debug)]
pub struct RunReport {
    pub mode: Mode,
    pub store: ConfigStore,
    /// Interfaces left with their derived address, L3 only.
    pub configured: usize,
    /// Where the address map was written, if it was.
    pub address_map: Option<PathBuf>,
}

impl RunReport {
    fn new(mode: Mode, store: ConfigStore) -> Self {
        Self {
            mode,
            store,
            configured: 0,
            address_map: None,
        }
    }
}

pub struct Orchestrator {
    host: Arc<dyn HostNetworking>,
    neighbors: Arc<dyn NeighborDiscovery>,
}

impl Orchestrator {
    pub fn new(host: Arc<dyn HostNetworking>, neighbors: Arc<dyn NeighborDiscovery>) -> Self {
        Self { host, neighbors }
    }

    pub async fn run(&self, cfg: &Config, stop: &StopSignal) -> Result<RunReport> {
        let names: Vec<String> = interface_names(cfg);
        if names.is_empty() {
            warn!(root = %cfg.sysfs_root.display(), "no scale-out interfaces found");
            return Ok(RunReport::new(cfg.mode, ConfigStore::new()));
        }
        info!(interfaces = ?names, mode = %cfg.mode, "starting run");

        let store: ConfigStore = discovery::build_configs(self.host.as_ref(), &names).await;

        if cfg.disable_network_manager {
            nm::exclude_interfaces(&cfg.nm_conf_dir, &store.names()).await;
        }

        match cfg.mode {
            Mode::L2 => self.run_l2(cfg, store, stop).await,
            Mode::L3 => self.run_l3(cfg, store, stop).await,
        }
    }

    async fn run_l2(&self, cfg: &Config, mut store: ConfigStore, stop: &StopSignal) -> Result<RunReport> {
        let host: &dyn HostNetworking = self.host.as_ref();

        if cfg.mtu > 0 {
            reconcile::interfaces_set_mtu(host, &store, cfg.mtu).await;
        }
        monitor::interfaces_up(host, &mut store, cfg.wait, stop)
            .await
            .context("bringing interfaces up")?;

        Ok(RunReport::new(Mode::L2, store))
    }

    async fn run_l3(&self, cfg: &Config, mut store: ConfigStore, stop: &StopSignal) -> Result<RunReport> {
        let host: &dyn HostNetworking = self.host.as_ref();

        // LLDP frames only arrive on administratively up links
        monitor::interfaces_up(host, &mut store, cfg.wait, stop)
            .await
            .context("bringing interfaces up for LLDP")?;

        let progressed: bool = self.discover(cfg, &mut store, stop).await;

        if cfg.configure && !progressed {
            warn!("no point-to-point address derived, leaving interface addresses untouched");
        }
        if !cfg.configure || !progressed {
            monitor::interfaces_restore_down(host, &mut store, cfg.wait, stop)
                .await
                .context("restoring interface state")?;
            return Ok(RunReport::new(Mode::L3, store));
        }

        reconcile::remove_existing_ips(host, &store)
            .await
            .context("removing existing addresses")?;

        let configured = reconcile::configure_interfaces(host, &store)
            .await
            .context("configuring addresses")?;

        for config in store.values().filter(|config| config.local_addr.is_some()) {
            if let Err(e) = reconcile::add_route(host, config, reconcile::ROUTE_MASK_POINT_TO_POINT).await {
                warn!(iface = %config.name(), error = %e, "cannot add route");
            }
        }

        if cfg.mtu > 0 {
            reconcile::interfaces_set_mtu(host, &store, cfg.mtu).await;
        }

        monitor::interfaces_up(host, &mut store, cfg.wait, stop)
            .await
            .context("bringing interfaces up")?;

        let mut report = RunReport::new(Mode::L3, store);
        report.configured = configured.configured;

        if let Some(path) = &cfg.gaudinet {
            GaudiNet::from_store(&report.store)
                .save(path)
                .context("writing address map")?;
            report.address_map = Some(path.clone());
        }

        Ok(report)
    }

    /// Collects LLDP until every link answered when keep-running, otherwise
    /// for a single bounded pass. Returns whether any link got a local address.
    ///
    /// Each keep-running pass lasts at least `wait`, even when the neighbor
    /// source gives up early.
    async fn discover(&self, cfg: &Config, store: &mut ConfigStore, stop: &StopSignal) -> bool {
        let mut stop: StopSignal = stop.clone();

        loop {
            let deadline: Instant = Instant::now() + cfg.wait;
            let waiting: Vec<String> = store
                .values()
                .filter(|config| config.expect_response)
                .map(|config| config.name().to_string())
                .collect();

            let neighbors = self.neighbors.collect(&waiting, cfg.wait, &stop).await;
            discovery::apply_neighbors(store, neighbors);

            let progressed: bool = discovery::lldp_results(store);
            if !progressed {
                warn!("no point-to-point address derived yet");
            }
            info!(addressed = store.with_local_addr(), total = store.len(), "LLDP pass done");

            if !cfg.keep_running || discovery::all_links_responded(store) || stop.is_stopped() {
                return progressed;
            }
            info!(
                waiting = store.values().filter(|c| c.expect_response).count(),
                "links still silent, listening again"
            );

            tokio::select! {
                _ = time::sleep_until(deadline) => {}
                _ = stop.stopped() => return progressed,
            }
        }
    }
}

/// Interfaces named on the command line, or the ones found in sysfs.
pub fn interface_names(cfg: &Config) -> Vec<String> {
    if !cfg.interfaces.is_empty() {
        return cfg.interfaces.clone();
    }
    sysfs::discover_interfaces(&cfg.sysfs_root).into_iter().collect()
}

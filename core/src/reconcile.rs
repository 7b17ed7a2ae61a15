//! # Configuration reconciler
//!
//! Converges kernel address, route and MTU state towards the addressing
//! derived during discovery. Every step tolerates state that is already
//! correct, so running it twice is a no-op the second time.

use pnet::ipnetwork::Ipv4Network;
use thiserror::Error;
use tracing::{debug, info, warn};

use scaleout_common::host::{HostError, HostNetworking, Route};
use scaleout_common::network::{ConfigStore, NetworkConfiguration};
use scaleout_protocols::p2p::{self, POINT_TO_POINT_PREFIX};

/// Prefix length of the per-link route.
pub const ROUTE_MASK_POINT_TO_POINT: u8 = POINT_TO_POINT_PREFIX;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("listing addresses of {iface}: {source}")]
    AddrList {
        iface: String,
        #[source]
        source: HostError,
    },

    #[error("adding {addr} to {iface}: {source}")]
    AddrAdd {
        iface: String,
        addr: Ipv4Network,
        #[source]
        source: HostError,
    },

    #[error("removing {addr} from {iface}: {source}")]
    AddrDel {
        iface: String,
        addr: Ipv4Network,
        #[source]
        source: HostError,
    },

    #[error("appending route {route} for {iface}: {source}")]
    Route {
        iface: String,
        route: Route,
        #[source]
        source: HostError,
    },

    #[error("{iface} has no local address to route from")]
    MissingLocalAddress { iface: String },

    #[error("invalid route prefix length /{0}")]
    InvalidPrefix(u8),
}

impl ReconcileError {
    pub fn is_list_failure(&self) -> bool {
        matches!(self, Self::AddrList { .. })
    }
}

/// Outcome of [`configure_interfaces`].
#[derive(Debug, Default)]
pub struct ConfigureReport {
    /// Interfaces carrying their derived address afterwards.
    pub configured: usize,
    /// Per-interface failures, list and add failures alike.
    pub failures: Vec<ReconcileError>,
}

/// Deletes every IPv4 address from every interface in the store.
///
/// Stops at the first failure: adding addresses on top of an unknown set is
/// not safe.
pub async fn remove_existing_ips(host: &dyn HostNetworking, store: &ConfigStore) -> Result<(), ReconcileError> {
    for (name, config) in store {
        let addrs: Vec<Ipv4Network> = host
            .addr_list(&config.link)
            .await
            .map_err(|source| ReconcileError::AddrList { iface: name.clone(), source })?;

        for addr in addrs {
            host.addr_del(&config.link, addr)
                .await
                .map_err(|source| ReconcileError::AddrDel {
                    iface: name.clone(),
                    addr,
                    source,
                })?;
            debug!(iface = %name, addr = %addr, "removed address");
        }
    }

    Ok(())
}

/// Assigns the derived local address to every interface that has one.
///
/// Interfaces already carrying the address are counted without changes.
/// Fails as a whole only when nothing ended up configured and at least one
/// address listing failed.
pub async fn configure_interfaces(
    host: &dyn HostNetworking,
    store: &ConfigStore,
) -> Result<ConfigureReport, ReconcileError> {
    let mut report = ConfigureReport::default();

    for (name, config) in store {
        let Some(local) = config.local_addr else {
            continue;
        };
        let addr: Ipv4Network = p2p::with_p2p_prefix(local);

        let existing: Vec<Ipv4Network> = match host.addr_list(&config.link).await {
            Ok(existing) => existing,
            Err(source) => {
                warn!(iface = %name, error = %source, "cannot list addresses");
                report.failures.push(ReconcileError::AddrList { iface: name.clone(), source });
                continue;
            }
        };

        if existing.contains(&addr) {
            debug!(iface = %name, addr = %addr, "address already configured");
            report.configured += 1;
            continue;
        }

        match host.addr_add(&config.link, addr).await {
            Ok(()) | Err(HostError::AlreadyExists) => {
                info!(iface = %name, addr = %addr, "address configured");
                report.configured += 1;
            }
            Err(source) => {
                warn!(iface = %name, addr = %addr, error = %source, "cannot add address");
                report.failures.push(ReconcileError::AddrAdd {
                    iface: name.clone(),
                    addr,
                    source,
                });
            }
        }
    }

    if report.configured == 0 {
        if let Some(pos) = report.failures.iter().position(ReconcileError::is_list_failure) {
            return Err(report.failures.swap_remove(pos));
        }
    }

    Ok(report)
}

/// Installs the link route towards the peer's `/mask` network.
///
/// A route that already exists counts as success.
pub async fn add_route(
    host: &dyn HostNetworking,
    config: &NetworkConfiguration,
    mask: u8,
) -> Result<(), ReconcileError> {
    let local = config
        .local_addr
        .ok_or_else(|| ReconcileError::MissingLocalAddress { iface: config.name().to_string() })?;

    let destination: Ipv4Network = Ipv4Network::new(local, mask)
        .and_then(|net| Ipv4Network::new(net.network(), mask))
        .map_err(|_| ReconcileError::InvalidPrefix(mask))?;

    let route = Route {
        link_index: config.link.index,
        destination,
        source: local,
    };

    match host.route_append(&route).await {
        Ok(()) => {
            info!(iface = %config.name(), route = %route, "route added");
            Ok(())
        }
        Err(HostError::AlreadyExists) => {
            debug!(iface = %config.name(), route = %route, "route already present");
            Ok(())
        }
        Err(source) => Err(ReconcileError::Route {
            iface: config.name().to_string(),
            route,
            source,
        }),
    }
}

/// Sets `mtu` on every interface. Failures are only warned about.
pub async fn interfaces_set_mtu(host: &dyn HostNetworking, store: &ConfigStore, mtu: u32) {
    for (name, config) in store {
        match host.set_mtu(&config.link, mtu).await {
            Ok(()) => debug!(iface = %name, mtu, "MTU set"),
            Err(e) => warn!(iface = %name, mtu, error = %e, "cannot set MTU"),
        }
    }
}

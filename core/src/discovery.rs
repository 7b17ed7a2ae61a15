//! # Discovery pass
//!
//! Turns interface names into [`NetworkConfiguration`] records and fills in the
//! point-to-point addressing advertised by each link's LLDP neighbor.
//!
//! The pass never fails as a whole: every interface is judged on its own and
//! the outcome is recorded on its configuration.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use tracing::{debug, info, warn};

use scaleout_common::host::HostNetworking;
use scaleout_common::network::{ConfigStore, NetworkConfiguration};
use scaleout_protocols::lldp::Neighbor;
use scaleout_protocols::p2p::{self, DeriveError, PointToPoint};

/// Resolves a link handle for every name. Names the kernel does not know are
/// logged and left out.
pub async fn build_configs<I, S>(host: &dyn HostNetworking, names: I) -> ConfigStore
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut store = ConfigStore::new();

    for name in names {
        let name: &str = name.as_ref();
        match host.link_by_name(name).await {
            Ok(link) => {
                debug!(iface = %name, index = link.index, up = link.was_up(), "resolved link");
                store.insert(NetworkConfiguration::new(link));
            }
            Err(e) => warn!(iface = %name, error = %e, "cannot resolve link, skipping"),
        }
    }

    store
}

/// Copies received LLDP data into the matching configurations.
pub fn apply_neighbors(store: &mut ConfigStore, neighbors: HashMap<String, Neighbor>) {
    for (name, neighbor) in neighbors {
        let Some(config) = store.get_mut(&name) else {
            debug!(iface = %name, "LLDP data for unknown interface ignored");
            continue;
        };

        config.peer_hw_addr = Some(neighbor.source);
        match neighbor.lldpdu.port_description {
            Some(description) => config.port_description = Some(description),
            None => {
                warn!(iface = %name, peer = %neighbor.source, "LLDP frame without port description");
                config.port_description = Some(String::new());
            }
        }
    }
}

/// Derives peer and local addresses from the configuration's discovery text.
///
/// On [`DeriveError::UnsupportedPrefix`] the peer address is still available
/// through [`DeriveError::peer`].
pub fn derive_address(config: &NetworkConfiguration) -> Result<PointToPoint, DeriveError> {
    let text: &str = config.port_description.as_deref().unwrap_or_default();
    p2p::derive(text)
}

/// Runs address derivation for every configuration that received LLDP data.
///
/// Returns `true` when at least one interface ended up with a local address.
pub fn lldp_results(store: &mut ConfigStore) -> bool {
    let mut found_peer: bool = false;

    for (name, config) in store.iter_mut() {
        if config.port_description.is_none() {
            config.expect_response = true;
            debug!(iface = %name, "no LLDP data yet");
            continue;
        }

        config.expect_response = false;
        match derive_address(config) {
            Ok(pair) => {
                info!(iface = %name, peer = %pair.peer, local = %pair.local_network(), "derived point-to-point addresses");
                config.peer_addr = Some(pair.peer);
                config.local_addr = Some(pair.local);
                found_peer = true;
            }
            Err(e) => {
                let peer: Option<Ipv4Addr> = e.peer();
                warn!(
                    iface = %name,
                    description = config.port_description.as_deref().unwrap_or_default(),
                    error = %e,
                    "cannot derive address from LLDP port description"
                );
                config.peer_addr = peer;
                config.local_addr = None;
            }
        }
    }

    found_peer
}

/// `true` once no configuration is still waiting for an LLDP frame.
pub fn all_links_responded(store: &ConfigStore) -> bool {
    store.values().all(|config| !config.expect_response)
}

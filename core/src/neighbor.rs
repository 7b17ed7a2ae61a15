//! Collecting LLDP advertisements from directly attached switch ports.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pnet::datalink::{self, Channel, Config, NetworkInterface};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use scaleout_common::stop::StopSignal;
use scaleout_protocols::lldp::Neighbor;

use crate::network::channel::{self, ChannelOpener};

/// Source of LLDP neighbor data for a set of interfaces.
#[async_trait]
pub trait NeighborDiscovery: Send + Sync {
    /// Listens on `names` for at most `wait`, returning the first advertisement
    /// seen per interface. Returns early once every interface has answered or
    /// `stop` fires.
    async fn collect(&self, names: &[String], wait: Duration, stop: &StopSignal) -> HashMap<String, Neighbor>;
}

/// Raw-socket LLDP listener.
pub struct LldpListener {
    interfaces: Vec<NetworkInterface>,
    opener: Arc<ChannelOpener>,
}

impl LldpListener {
    pub fn new() -> Self {
        Self {
            interfaces: datalink::interfaces(),
            opener: Arc::new(|intf: &NetworkInterface, cfg: Config| -> io::Result<Channel> {
                datalink::channel(intf, cfg)
            }),
        }
    }

    /// Listener over a fixed interface list and channel backend.
    pub fn with_backend(interfaces: Vec<NetworkInterface>, opener: Arc<ChannelOpener>) -> Self {
        Self { interfaces, opener }
    }

    fn interface(&self, name: &str) -> Option<&NetworkInterface> {
        self.interfaces.iter().find(|intf| intf.name == name)
    }
}

impl Default for LldpListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NeighborDiscovery for LldpListener {
    async fn collect(&self, names: &[String], wait: Duration, stop: &StopSignal) -> HashMap<String, Neighbor> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, Neighbor)>();
        let mut listening: usize = 0;

        for name in names {
            let Some(intf) = self.interface(name) else {
                warn!(iface = %name, "interface not visible to datalink layer, not listening");
                continue;
            };
            match channel::start_lldp_capture(intf, self.opener.as_ref(), tx.clone()) {
                Ok(_) => listening += 1,
                Err(e) => warn!(iface = %name, error = %format!("{e:#}"), "cannot capture LLDP"),
            }
        }
        drop(tx);

        let mut neighbors: HashMap<String, Neighbor> = HashMap::new();
        if listening == 0 {
            return neighbors;
        }

        info!(interfaces = listening, wait = ?wait, "listening for LLDP");
        let deadline: Instant = Instant::now() + wait;
        let mut stop: StopSignal = stop.clone();

        while neighbors.len() < listening {
            tokio::select! {
                received = rx.recv() => match received {
                    Some((name, neighbor)) => {
                        if !neighbors.contains_key(&name) {
                            debug!(iface = %name, peer = %neighbor.source, "LLDP frame received");
                            neighbors.insert(name, neighbor);
                        }
                    }
                    None => break,
                },
                _ = time::sleep_until(deadline) => {
                    debug!(received = neighbors.len(), "LLDP wait elapsed");
                    break;
                }
                _ = stop.stopped() => {
                    debug!("LLDP listening interrupted");
                    break;
                }
            }
        }

        neighbors
    }
}

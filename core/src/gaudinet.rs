//! Address map consumed by the accelerator runtime.
//!
//! ```json
//! {"NIC_NET_CONFIG":[{"NIC_MAC":"..","NIC_IP":"..","SUBNET_MASK":"255.255.255.252","GATEWAY_MAC":".."}]}
//! ```

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use scaleout_common::network::ConfigStore;
use scaleout_protocols::p2p;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicNetConfig {
    #[serde(rename = "NIC_MAC")]
    pub nic_mac: String,
    #[serde(rename = "NIC_IP")]
    pub nic_ip: Ipv4Addr,
    #[serde(rename = "SUBNET_MASK")]
    pub subnet_mask: Ipv4Addr,
    #[serde(rename = "GATEWAY_MAC")]
    pub gateway_mac: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaudiNet {
    #[serde(rename = "NIC_NET_CONFIG")]
    pub nic_net_config: Vec<NicNetConfig>,
}

impl GaudiNet {
    /// One entry per interface with a local address and both MACs known,
    /// in interface name order.
    pub fn from_store(store: &ConfigStore) -> Self {
        let mut nic_net_config: Vec<NicNetConfig> = Vec::new();

        for (name, config) in store {
            let Some(local) = config.local_addr else {
                continue;
            };
            let (Some(nic_mac), Some(gateway_mac)) = (config.link.mac, config.peer_hw_addr) else {
                warn!(iface = %name, "hardware address unknown, left out of address map");
                continue;
            };
            nic_net_config.push(NicNetConfig {
                nic_mac: nic_mac.to_string(),
                nic_ip: local,
                subnet_mask: p2p::point_to_point_mask(),
                gateway_mac: gateway_mac.to_string(),
            });
        }

        Self { nic_net_config }
    }

    fn len(&self) -> usize {
        self.nic_net_config.len()
    }

    /// Writes the map next to `path` and renames it into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path: PathBuf = path.with_extension("json.tmp");
        let content: String = serde_json::to_string_pretty(self).context("Failed to serialize address map")?;

        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write temp file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to rename {} -> {}", tmp_path.display(), path.display()))?;

        info!(path = %path.display(), entries = self.len(), "address map written");
        Ok(())
    }
}

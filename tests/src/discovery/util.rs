use std::collections::HashMap;
use std::fs;
use std::net::Ipv4Addr;
use std::os::unix::fs::symlink;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pnet::ipnetwork::Ipv4Network;
use pnet::util::MacAddr;
use scaleout_common::network::Link;
use scaleout_common::stop::StopSignal;
use scaleout_core::host::fake::FakeHost;
use scaleout_core::neighbor::NeighborDiscovery;
use scaleout_core::sysfs;
use scaleout_protocols::lldp::{Identifier, Lldpdu, Neighbor};

pub const SWITCH_MAC: MacAddr = MacAddr(0x01, 0x01, 0x02, 0x02, 0x03, 0x03);

pub fn v4(a: u8, b: u8, c: u8, d: u8, p: u8) -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(a, b, c, d), p).unwrap()
}

/// `<root>/bus/pci/drivers/habanalabs/<pci> -> <root>/bus/pci/devices/<pci>`
pub fn write_sysfs(root: &Path, devices: &[(&str, &str)]) {
    let driver_dir = sysfs::driver_path(root);
    fs::create_dir_all(&driver_dir).unwrap();

    let pci_dir = root.join("bus/pci/devices");
    for (pci, iface) in devices {
        fs::create_dir_all(pci_dir.join(pci).join("net").join(iface)).unwrap();
        symlink(pci_dir.join(pci), driver_dir.join(pci)).unwrap();
    }
}

pub fn three_devices(root: &Path) {
    write_sysfs(
        root,
        &[
            ("0000:aa:00.0", "eth_a"),
            ("0000:bb:00.0", "eth_b"),
            ("0000:cc:00.0", "eth_c"),
        ],
    );
}

/// eth_a carries a stale address, eth_b nothing, eth_c its final one.
pub fn three_links() -> FakeHost {
    FakeHost::new()
        .with_link(
            Link::new("eth_a", 2).with_mac(MacAddr::new(0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f)),
            &[v4(192, 192, 192, 1, 24)],
        )
        .with_link(
            Link::new("eth_b", 3).with_mac(MacAddr::new(0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x0a)),
            &[],
        )
        .with_link(
            Link::new("eth_c", 4).with_mac(MacAddr::new(0x0c, 0x0d, 0x0e, 0x0f, 0x0a, 0x0b)),
            &[v4(10, 210, 8, 125, 30)],
        )
}

/// Neighbor source answering from a fixed script, one map per pass.
///
/// Passes beyond the script repeat the last one.
pub struct ScriptedNeighbors {
    passes: Vec<HashMap<String, String>>,
    calls: AtomicUsize,
    asked: Mutex<Vec<Vec<String>>>,
}

impl ScriptedNeighbors {
    pub fn new(passes: Vec<Vec<(&str, &str)>>) -> Self {
        Self {
            passes: passes
                .into_iter()
                .map(|pass| pass.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
                .collect(),
            calls: AtomicUsize::new(0),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn standard() -> Self {
        Self::new(vec![vec![
            ("eth_a", "no-alert 10.210.8.122/30"),
            ("eth_b", "unexpected port description"),
            ("eth_c", "no-alert 10.210.8.126/30"),
        ]])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Interface names requested on each pass.
    pub fn asked(&self) -> Vec<Vec<String>> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl NeighborDiscovery for ScriptedNeighbors {
    async fn collect(&self, names: &[String], _: Duration, _: &StopSignal) -> HashMap<String, Neighbor> {
        let pass = self.calls.fetch_add(1, Ordering::SeqCst);
        self.asked.lock().unwrap().push(names.to_vec());

        let Some(script) = self.passes.get(pass).or(self.passes.last()) else {
            return HashMap::new();
        };

        names
            .iter()
            .filter_map(|name| {
                let description = script.get(name)?;
                Some((name.clone(), neighbor(description)))
            })
            .collect()
    }
}

fn neighbor(description: &str) -> Neighbor {
    Neighbor {
        source: SWITCH_MAC,
        lldpdu: Lldpdu {
            chassis_id: Identifier {
                subtype: 4,
                value: vec![0x01, 0x01, 0x02, 0x02, 0x03, 0x00],
            },
            port_id: Identifier {
                subtype: 5,
                value: b"Ethernet1".to_vec(),
            },
            ttl: 120,
            port_description: Some(description.to_string()),
            system_name: Some("leaf-1".into()),
        },
    }
}

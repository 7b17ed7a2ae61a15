//! Device enumeration through the sysfs topology.
//!
//! `<root>/bus/pci/drivers/<driver>/` holds one symlink per bound PCI device,
//! each device lists its network interfaces under `net/`. A missing driver
//! directory simply means the driver is not loaded.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Kernel driver of the scale-out NICs.
pub const DRIVER_NAME: &str = "habanalabs";

const DRIVERS_DIR: &str = "bus/pci/drivers";
const NET_DIR: &str = "net";

/// A PCI device bound to the driver and the interfaces found beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub pci_id: String,
    pub interfaces: Vec<String>,
}

pub fn driver_path(root: &Path) -> PathBuf {
    root.join(DRIVERS_DIR).join(DRIVER_NAME)
}

/// Lists every PCI device bound to the driver.
///
/// Unreadable entries are logged and skipped so one broken device never
/// hides the others.
pub fn enumerate_devices(root: &Path) -> Vec<DeviceEntry> {
    let driver_dir: PathBuf = driver_path(root);

    let entries = match fs::read_dir(&driver_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %driver_dir.display(), error = %e, "driver directory not readable, no devices");
            return Vec::new();
        }
    };

    let mut devices: Vec<DeviceEntry> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %driver_dir.display(), error = %e, "cannot read driver directory entry");
                continue;
            }
        };

        let net_dir: PathBuf = entry.path().join(NET_DIR);
        let interfaces: Vec<String> = match fs::read_dir(&net_dir) {
            Ok(netdevs) => netdevs
                .filter_map(|netdev| match netdev {
                    Ok(netdev) => netdev.file_name().into_string().ok(),
                    Err(e) => {
                        warn!(path = %net_dir.display(), error = %e, "cannot read network device entry");
                        None
                    }
                })
                .collect(),
            // bind, unbind, module and friends have no net/ directory
            Err(_) => continue,
        };

        let pci_id: String = entry.file_name().to_string_lossy().into_owned();
        debug!(pci = %pci_id, interfaces = ?interfaces, "found device");
        devices.push(DeviceEntry { pci_id, interfaces });
    }

    devices.sort_by(|a, b| a.pci_id.cmp(&b.pci_id));
    devices
}

/// Names of every network interface attached to a device of the driver.
pub fn discover_interfaces(root: &Path) -> BTreeSet<String> {
    enumerate_devices(root)
        .into_iter()
        .flat_map(|device| device.interfaces)
        .collect()
}

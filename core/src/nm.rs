//! Keeps NetworkManager away from the scale-out interfaces.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const UNMANAGED_CONF: &str = "99-scaleout-unmanaged.conf";

/// Keyfile drop-in marking `names` unmanaged.
pub fn render_keyfile<S: AsRef<str>>(names: &[S]) -> String {
    let devices: Vec<String> = names
        .iter()
        .map(|name| format!("interface-name:{}", name.as_ref()))
        .collect();
    format!("[keyfile]\nunmanaged-devices={}\n", devices.join(";"))
}

pub fn write_keyfile<S: AsRef<str>>(conf_dir: &Path, names: &[S]) -> Result<PathBuf> {
    fs::create_dir_all(conf_dir).with_context(|| format!("Failed to create {}", conf_dir.display()))?;
    let path: PathBuf = conf_dir.join(UNMANAGED_CONF);
    fs::write(&path, render_keyfile(names)).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Writes the drop-in and tells the running daemon about each device.
///
/// Nothing here is fatal: without NetworkManager there is nothing to exclude.
pub async fn exclude_interfaces<S: AsRef<str>>(conf_dir: &Path, names: &[S]) {
    if names.is_empty() {
        return;
    }

    match write_keyfile(conf_dir, names) {
        Ok(path) => info!(path = %path.display(), "NetworkManager keyfile written"),
        Err(e) => warn!(error = %format!("{e:#}"), "cannot write NetworkManager keyfile"),
    }

    for name in names {
        let name: &str = name.as_ref();
        let output = Command::new("nmcli")
            .args(["device", "set", name, "managed", "no"])
            .output()
            .await;
        match output {
            Ok(output) if output.status.success() => debug!(iface = %name, "marked unmanaged"),
            Ok(output) => warn!(
                iface = %name,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "nmcli refused to unmanage device"
            ),
            Err(e) => {
                warn!(error = %e, "cannot run nmcli");
                return;
            }
        }
    }
}

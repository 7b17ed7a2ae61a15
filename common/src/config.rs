use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default bound for LLDP collection and link state confirmation.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(30);

/// Default mount point of the device topology filesystem.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

/// NetworkManager drop-in directory.
pub const DEFAULT_NM_CONF_DIR: &str = "/etc/NetworkManager/conf.d";

/// Which layer of the fabric the daemon configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Links are only brought up, no addressing.
    L2,
    /// Links get point-to-point addresses and routes derived from LLDP.
    #[default]
    L3,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L2" => Ok(Mode::L2),
            "L3" => Ok(Mode::L3),
            other => Err(format!("unknown mode '{other}', expected L2 or L3")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::L2 => write!(f, "L2"),
            Mode::L3 => write!(f, "L3"),
        }
    }
}

/// Run settings shared by every component of the daemon.
#[derive(Debug, Clone)]
pub struct Config {
    /// Apply the configuration sequence. When false only discovery runs.
    pub configure: bool,
    /// Keep polling LLDP until every link answered, then stay alive until stopped.
    pub keep_running: bool,
    pub mode: Mode,
    /// Interface MTU, `0` leaves it untouched.
    pub mtu: u32,
    /// Mark the fabric interfaces unmanaged in NetworkManager first.
    pub disable_network_manager: bool,
    pub wait: Duration,
    /// Output path of the address map, L3 only.
    pub gaudinet: Option<PathBuf>,
    /// Explicit interface names replacing sysfs enumeration.
    pub interfaces: Vec<String>,
    pub sysfs_root: PathBuf,
    pub nm_conf_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            configure: false,
            keep_running: false,
            mode: Mode::default(),
            mtu: 0,
            disable_network_manager: false,
            wait: DEFAULT_WAIT,
            gaudinet: None,
            interfaces: Vec::new(),
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            nm_conf_dir: PathBuf::from(DEFAULT_NM_CONF_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitive() {
        assert_eq!("L2".parse::<Mode>(), Ok(Mode::L2));
        assert_eq!("l3".parse::<Mode>(), Ok(Mode::L3));
        assert!("L4".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_display_matches_flag_value() {
        assert_eq!(Mode::L2.to_string(), "L2");
        assert_eq!(Mode::L3.to_string(), "L3");
    }
}

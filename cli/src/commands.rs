use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use scaleout_common::config::{Config, DEFAULT_NM_CONF_DIR, DEFAULT_SYSFS_ROOT, Mode};

#[derive(Parser, Debug)]
#[command(name = "scaleout-discover")]
#[command(about = "Point-to-point addressing for scale-out NICs from LLDP.")]
pub struct CommandLine {
    /// Configure the interfaces, otherwise only discover
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_value_t = false, default_missing_value = "true")]
    pub configure: bool,

    /// Keep listening until every link answered, then stay alive
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_value_t = false, default_missing_value = "true")]
    pub keep_running: bool,

    /// L2 only raises the links, L3 also addresses them
    #[arg(long, default_value_t = Mode::L3)]
    pub mode: Mode,

    /// Interface MTU, 0 leaves it alone
    #[arg(long, default_value_t = 0)]
    pub mtu: u32,

    /// Mark the interfaces unmanaged in NetworkManager
    #[arg(
        long = "disable-networkmanager",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    pub disable_network_manager: bool,

    /// How long to wait for LLDP and link state, e.g. 90s
    #[arg(long, value_parser = humantime::parse_duration, default_value = "30s")]
    pub wait: Duration,

    /// Where to write the address map (L3 only)
    #[arg(long)]
    pub gaudinet: Option<PathBuf>,

    /// Log verbosity
    #[arg(long = "v", default_value_t = 0)]
    pub verbosity: u8,

    /// Use these interfaces instead of the ones found in sysfs
    #[arg(long, value_delimiter = ',')]
    pub interfaces: Vec<String>,

    #[arg(long, env = "SYSFS_ROOT", default_value = DEFAULT_SYSFS_ROOT)]
    pub sysfs_root: PathBuf,

    #[arg(long, default_value = DEFAULT_NM_CONF_DIR, hide = true)]
    pub nm_conf_dir: PathBuf,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn to_config(&self) -> Config {
        Config {
            configure: self.configure,
            keep_running: self.keep_running,
            mode: self.mode,
            mtu: self.mtu,
            disable_network_manager: self.disable_network_manager,
            wait: self.wait,
            gaudinet: self.gaudinet.clone(),
            interfaces: self.interfaces.iter().filter(|name| !name.is_empty()).cloned().collect(),
            sysfs_root: self.sysfs_root.clone(),
            nm_conf_dir: self.nm_conf_dir.clone(),
        }
    }
}

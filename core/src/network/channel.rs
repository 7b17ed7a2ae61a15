use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, bail};
use pnet::datalink::{Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use scaleout_protocols::lldp::{self, Neighbor};

const READ_TIMEOUT_MS: u64 = 100;

/// Opens a raw datalink channel, e.g. [`pnet::datalink::channel`].
pub type ChannelOpener = dyn Fn(&NetworkInterface, Config) -> io::Result<Channel> + Send + Sync;

pub fn open_eth_channel<F>(
    intf: &NetworkInterface,
    cfg: &Config,
    channel_opener: F,
) -> anyhow::Result<(Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>)>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<Channel>,
{
    let ch: Channel = channel_opener(intf, *cfg).with_context(|| format!("opening on {}", intf.name))?;
    match ch {
        Channel::Ethernet(tx, rx) => {
            debug!(iface = %intf.name, "datalink channel established");
            Ok((tx, rx))
        }
        _ => bail!("non-ethernet channel for {}", intf.name),
    }
}

/// Spawns a thread forwarding every LLDP frame seen on `intf` as `(name, neighbor)`.
///
/// The thread exits once `queue` is closed.
pub fn start_lldp_capture(
    intf: &NetworkInterface,
    channel_opener: &ChannelOpener,
    queue: mpsc::UnboundedSender<(String, Neighbor)>,
) -> anyhow::Result<JoinHandle<()>> {
    let (_, mut rx) = open_eth_channel(intf, &capture_config(), channel_opener)?;
    let name: String = intf.name.clone();

    let handle = thread::Builder::new()
        .name(format!("lldp-{name}"))
        .spawn(move || {
            while !queue.is_closed() {
                let frame: &[u8] = match rx.next() {
                    Ok(frame) => frame,
                    // read timeouts land here, giving the loop a chance to notice closure
                    Err(_) => continue,
                };
                if !lldp::is_lldp_frame(frame) {
                    continue;
                }
                match lldp::parse_frame(frame) {
                    Ok(neighbor) => {
                        if queue.send((name.clone(), neighbor)).is_err() {
                            break;
                        }
                    }
                    Err(e) => trace!(iface = %name, error = %e, "dropping malformed LLDP frame"),
                }
            }
            debug!(iface = %name, "LLDP capture finished");
        })
        .with_context(|| format!("spawning capture thread for {}", intf.name))?;

    Ok(handle)
}

fn capture_config() -> Config {
    Config {
        read_timeout: Some(Duration::from_millis(READ_TIMEOUT_MS)),
        promiscuous: true,
        ..Default::default()
    }
}



// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

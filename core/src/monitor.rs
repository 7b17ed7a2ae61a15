//! Administrative up/down with best-effort confirmation through link events.

use std::collections::BTreeSet;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

use scaleout_common::host::{HostError, HostNetworking, LinkSubscription};
use scaleout_common::network::{AdminState, ConfigStore};
use scaleout_common::stop::StopSignal;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("subscribing to link events: {0}")]
    Subscribe(#[source] HostError),
}

/// Sets every interface administratively up and waits for confirmation.
pub async fn interfaces_up(
    host: &dyn HostNetworking,
    store: &mut ConfigStore,
    wait: Duration,
    stop: &StopSignal,
) -> Result<(), MonitorError> {
    let targets: Vec<String> = store.names();
    set_admin_state(host, store, targets, AdminState::Up, wait, stop).await
}

/// Sets down the interfaces that were down before this process touched them.
pub async fn interfaces_restore_down(
    host: &dyn HostNetworking,
    store: &mut ConfigStore,
    wait: Duration,
    stop: &StopSignal,
) -> Result<(), MonitorError> {
    let targets: Vec<String> = store
        .values()
        .filter(|config| !config.link.was_up())
        .map(|config| config.name().to_string())
        .collect();
    set_admin_state(host, store, targets, AdminState::Down, wait, stop).await
}

async fn set_admin_state(
    host: &dyn HostNetworking,
    store: &mut ConfigStore,
    targets: Vec<String>,
    desired: AdminState,
    wait: Duration,
    stop: &StopSignal,
) -> Result<(), MonitorError> {
    // subscribe first so no confirmation can slip past
    let mut subscription: LinkSubscription = host.subscribe_links().await.map_err(MonitorError::Subscribe)?;

    let mut pending: BTreeSet<String> = BTreeSet::new();
    for name in targets {
        let Some(config) = store.get(&name) else {
            continue;
        };
        let result = match desired {
            AdminState::Up => host.set_up(&config.link).await,
            AdminState::Down => host.set_down(&config.link).await,
        };
        // the kernel stays silent when the state does not change
        let already: bool = match config.admin_state {
            Some(state) => state == desired,
            None => desired == AdminState::Up && config.link.was_up(),
        };
        match result {
            Ok(()) if already => {
                debug!(iface = %name, state = %desired, "administrative state already in place");
                if let Some(config) = store.get_mut(&name) {
                    config.admin_state = Some(desired);
                }
            }
            Ok(()) => {
                debug!(iface = %name, state = %desired, "administrative state requested");
                pending.insert(name);
            }
            Err(e) => warn!(iface = %name, state = %desired, error = %e, "cannot set administrative state"),
        }
    }

    let deadline: Instant = Instant::now() + wait;
    let mut stop: StopSignal = stop.clone();

    while !pending.is_empty() {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else {
                    warn!("link event stream closed");
                    break;
                };
                trace!(iface = %event.name, state = %event.state, "link event");
                if event.state != desired || !pending.remove(&event.name) {
                    continue;
                }
                if let Some(config) = store.get_mut(&event.name) {
                    config.admin_state = Some(event.state);
                }
                info!(iface = %event.name, state = %event.state, "link state confirmed");
            }
            _ = time::sleep_until(deadline) => {
                warn!(interfaces = ?pending, state = %desired, "timed out waiting for link state");
                break;
            }
            _ = stop.stopped() => {
                debug!(interfaces = ?pending, "stopped waiting for link state");
                break;
            }
        }
    }

    Ok(())
}

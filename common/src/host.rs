//! The kernel networking control surface the engine depends on.
//!
//! Everything that changes host link state goes through [`HostNetworking`].
//! The production implementation talks rtnetlink, tests plug in a fake with
//! per-operation failure injection.

use std::fmt;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use pnet::ipnetwork::Ipv4Network;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::network::{Link, LinkEvent};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("link '{0}' not found")]
    NotFound(String),

    #[error("object already exists")]
    AlreadyExists,

    #[error("netlink: {0}")]
    Netlink(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Failure requested by a test backend.
    #[error("injected failure: {0}")]
    Injected(String),
}

/// A point-to-point route bound to one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub link_index: u32,
    pub destination: Ipv4Network,
    pub source: Ipv4Addr,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dev #{} src {}",
            self.destination, self.link_index, self.source
        )
    }
}

/// Live stream of link change notifications.
///
/// Dropping the subscription tears down the background task feeding it.
pub struct LinkSubscription {
    events: mpsc::UnboundedReceiver<LinkEvent>,
    task: Option<JoinHandle<()>>,
}

impl LinkSubscription {
    pub fn new(events: mpsc::UnboundedReceiver<LinkEvent>) -> Self {
        Self { events, task: None }
    }

    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Next event, `None` once the feeding side is gone.
    pub async fn next(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }
}

impl Drop for LinkSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
pub trait HostNetworking: Send + Sync {
    async fn link_by_name(&self, name: &str) -> Result<Link, HostError>;

    /// IPv4 addresses currently assigned to `link`.
    async fn addr_list(&self, link: &Link) -> Result<Vec<Ipv4Network>, HostError>;

    async fn addr_add(&self, link: &Link, addr: Ipv4Network) -> Result<(), HostError>;

    async fn addr_del(&self, link: &Link, addr: Ipv4Network) -> Result<(), HostError>;

    /// Installs `route`. An identical existing route yields [`HostError::AlreadyExists`].
    async fn route_append(&self, route: &Route) -> Result<(), HostError>;

    async fn set_mtu(&self, link: &Link, mtu: u32) -> Result<(), HostError>;

    async fn set_up(&self, link: &Link) -> Result<(), HostError>;

    async fn set_down(&self, link: &Link) -> Result<(), HostError>;

    async fn subscribe_links(&self) -> Result<LinkSubscription, HostError>;
}

//! In-memory [`HostNetworking`] with per-operation failure injection.
//!
//! Every mutation is recorded so tests can assert on exactly what the engine
//! asked the kernel to do.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use pnet::ipnetwork::Ipv4Network;
use tokio::sync::mpsc;

use scaleout_common::host::{HostError, HostNetworking, LinkSubscription, Route};
use scaleout_common::network::{AdminState, Link, LinkEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    LinkByName,
    AddrList,
    AddrAdd,
    AddrDel,
    RouteAppend,
    SetMtu,
    SetUp,
    SetDown,
    Subscribe,
}

#[derive(Default)]
struct FakeState {
    links: BTreeMap<String, Link>,
    addrs: HashMap<String, Vec<Ipv4Network>>,
    routes: Vec<Route>,
    mtus: HashMap<String, u32>,
    admin: HashMap<String, AdminState>,
    added: Vec<(String, Ipv4Network)>,
    deleted: Vec<(String, Ipv4Network)>,
    calls: Vec<(FakeOp, String)>,
    failures: HashSet<FakeOp>,
    quiet: bool,
    subscribers: Vec<mpsc::UnboundedSender<LinkEvent>>,
}

impl FakeState {
    fn call(&mut self, op: FakeOp, target: &str) -> Result<(), HostError> {
        self.calls.push((op, target.to_string()));
        if self.failures.contains(&op) {
            return Err(HostError::Injected(format!("{op:?} on {target}")));
        }
        Ok(())
    }

    /// Like the kernel, only an actual change is announced.
    fn set_admin(&mut self, link: &Link, state: AdminState) {
        let previous: Option<AdminState> = self.admin.insert(link.name.clone(), state);
        if self.quiet || previous == Some(state) {
            return;
        }
        let event = LinkEvent {
            name: link.name.clone(),
            index: link.index,
            state,
        };
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[derive(Default)]
pub struct FakeHost {
    state: Mutex<FakeState>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a link with its currently assigned addresses.
    pub fn with_link(self, link: Link, addrs: &[Ipv4Network]) -> Self {
        {
            let mut state = self.lock();
            state
                .admin
                .insert(link.name.clone(), AdminState::from_flags(link.flags));
            state.addrs.insert(link.name.clone(), addrs.to_vec());
            state.links.insert(link.name.clone(), link);
        }
        self
    }

    pub fn fail(&self, op: FakeOp) {
        self.lock().failures.insert(op);
    }

    pub fn recover(&self, op: FakeOp) {
        self.lock().failures.remove(&op);
    }

    /// Stops emitting link events, as if the kernel never confirmed.
    pub fn quiet(&self, quiet: bool) {
        self.lock().quiet = quiet;
    }

    pub fn added(&self) -> Vec<(String, Ipv4Network)> {
        self.lock().added.clone()
    }

    pub fn deleted(&self) -> Vec<(String, Ipv4Network)> {
        self.lock().deleted.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.added.clear();
        state.deleted.clear();
        state.calls.clear();
    }

    pub fn addrs(&self, name: &str) -> Vec<Ipv4Network> {
        self.lock().addrs.get(name).cloned().unwrap_or_default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.lock().routes.clone()
    }

    pub fn mtu(&self, name: &str) -> Option<u32> {
        self.lock().mtus.get(name).copied()
    }

    pub fn admin_state(&self, name: &str) -> Option<AdminState> {
        self.lock().admin.get(name).copied()
    }

    /// Targets of every call of `op`, in call order.
    pub fn calls(&self, op: FakeOp) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|(called, _)| *called == op)
            .map(|(_, target)| target.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HostNetworking for FakeHost {
    async fn link_by_name(&self, name: &str) -> Result<Link, HostError> {
        let mut state = self.lock();
        state.call(FakeOp::LinkByName, name)?;
        state
            .links
            .get(name)
            .cloned()
            .ok_or_else(|| HostError::NotFound(name.to_string()))
    }

    async fn addr_list(&self, link: &Link) -> Result<Vec<Ipv4Network>, HostError> {
        let mut state = self.lock();
        state.call(FakeOp::AddrList, &link.name)?;
        state
            .addrs
            .get(&link.name)
            .cloned()
            .ok_or_else(|| HostError::NotFound(link.name.clone()))
    }

    async fn addr_add(&self, link: &Link, addr: Ipv4Network) -> Result<(), HostError> {
        let mut state = self.lock();
        state.call(FakeOp::AddrAdd, &link.name)?;
        let addrs = state
            .addrs
            .get_mut(&link.name)
            .ok_or_else(|| HostError::NotFound(link.name.clone()))?;
        if addrs.contains(&addr) {
            return Err(HostError::AlreadyExists);
        }
        addrs.push(addr);
        state.added.push((link.name.clone(), addr));
        Ok(())
    }

    async fn addr_del(&self, link: &Link, addr: Ipv4Network) -> Result<(), HostError> {
        let mut state = self.lock();
        state.call(FakeOp::AddrDel, &link.name)?;
        let addrs = state
            .addrs
            .get_mut(&link.name)
            .ok_or_else(|| HostError::NotFound(link.name.clone()))?;
        let before = addrs.len();
        addrs.retain(|a| *a != addr);
        if addrs.len() == before {
            return Err(HostError::NotFound(format!("{addr} on {}", link.name)));
        }
        state.deleted.push((link.name.clone(), addr));
        Ok(())
    }

    async fn route_append(&self, route: &Route) -> Result<(), HostError> {
        let mut state = self.lock();
        state.call(FakeOp::RouteAppend, &route.destination.to_string())?;
        if state.routes.contains(route) {
            return Err(HostError::AlreadyExists);
        }
        state.routes.push(*route);
        Ok(())
    }

    async fn set_mtu(&self, link: &Link, mtu: u32) -> Result<(), HostError> {
        let mut state = self.lock();
        state.call(FakeOp::SetMtu, &link.name)?;
        state.mtus.insert(link.name.clone(), mtu);
        Ok(())
    }

    async fn set_up(&self, link: &Link) -> Result<(), HostError> {
        let mut state = self.lock();
        state.call(FakeOp::SetUp, &link.name)?;
        state.set_admin(link, AdminState::Up);
        Ok(())
    }

    async fn set_down(&self, link: &Link) -> Result<(), HostError> {
        let mut state = self.lock();
        state.call(FakeOp::SetDown, &link.name)?;
        state.set_admin(link, AdminState::Down);
        Ok(())
    }

    async fn subscribe_links(&self) -> Result<LinkSubscription, HostError> {
        let mut state = self.lock();
        state.call(FakeOp::Subscribe, "")?;
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push(tx);
        Ok(LinkSubscription::new(rx))
    }
}

use std::collections::BTreeMap;
use std::collections::btree_map::{Iter, IterMut, Values, ValuesMut};
use std::net::Ipv4Addr;

use pnet::util::MacAddr;

use super::interface::{AdminState, Link};

/// Per-interface discovery and configuration record.
///
/// `local_addr` is only ever set together with a `/30` derived `peer_addr`.
/// `peer_addr` alone may be present when the neighbor advertised an address
/// with an unusable prefix length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfiguration {
    pub link: Link,
    /// LLDP Port Description advertised by the neighbor.
    pub port_description: Option<String>,
    pub peer_hw_addr: Option<MacAddr>,
    pub peer_addr: Option<Ipv4Addr>,
    pub local_addr: Option<Ipv4Addr>,
    /// Still waiting for an LLDP frame on this link.
    pub expect_response: bool,
    /// Last administrative state observed by the link monitor.
    pub admin_state: Option<AdminState>,
}

impl NetworkConfiguration {
    pub fn new(link: Link) -> Self {
        Self {
            link,
            port_description: None,
            peer_hw_addr: None,
            peer_addr: None,
            local_addr: None,
            expect_response: true,
            admin_state: None,
        }
    }

    pub fn with_port_description(mut self, description: impl Into<String>) -> Self {
        self.port_description = Some(description.into());
        self
    }

    pub fn with_peer_hw_addr(mut self, mac: MacAddr) -> Self {
        self.peer_hw_addr = Some(mac);
        self
    }

    pub fn name(&self) -> &str {
        &self.link.name
    }
}

/// Configurations keyed by interface name.
///
/// Components borrow the store and mutate only the fields they own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    configs: BTreeMap<String, NetworkConfiguration>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, config: NetworkConfiguration) -> Option<NetworkConfiguration> {
        self.configs.insert(config.link.name.clone(), config)
    }

    pub fn get(&self, name: &str) -> Option<&NetworkConfiguration> {
        self.configs.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut NetworkConfiguration> {
        self.configs.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.configs.keys().cloned().collect()
    }

    pub fn iter(&self) -> Iter<'_, String, NetworkConfiguration> {
        self.configs.iter()
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, String, NetworkConfiguration> {
        self.configs.iter_mut()
    }

    pub fn values(&self) -> Values<'_, String, NetworkConfiguration> {
        self.configs.values()
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, String, NetworkConfiguration> {
        self.configs.values_mut()
    }

    /// Number of configurations holding a derived local address.
    pub fn with_local_addr(&self) -> usize {
        self.values().filter(|c| c.local_addr.is_some()).count()
    }
}

impl FromIterator<NetworkConfiguration> for ConfigStore {
    fn from_iter<T: IntoIterator<Item = NetworkConfiguration>>(iter: T) -> Self {
        let mut store = ConfigStore::new();
        for config in iter {
            store.insert(config);
        }
        store
    }
}

impl<'a> IntoIterator for &'a ConfigStore {
    type Item = (&'a String, &'a NetworkConfiguration);
    type IntoIter = Iter<'a, String, NetworkConfiguration>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.iter()
    }
}

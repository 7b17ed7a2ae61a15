use std::fmt;

use pnet::util::MacAddr;

/// `IFF_UP` from `<net/if.h>`.
pub const IFF_UP: u32 = 1;

/// Kernel view of a network interface at the time it was resolved.
///
/// `flags` is a snapshot taken when the link handle was created and is never
/// updated afterwards, so it always reflects the state before this daemon
/// touched the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub index: u32,
    pub mac: Option<MacAddr>,
    pub flags: u32,
    pub mtu: Option<u32>,
}

impl Link {
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
            mac: None,
            flags: 0,
            mtu: None,
        }
    }

    pub fn with_mac(mut self, mac: MacAddr) -> Self {
        self.mac = Some(mac);
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn was_up(&self) -> bool {
        self.flags & IFF_UP != 0
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (index {})", self.name, self.index)
    }
}

/// Administrative state the monitor waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminState {
    Up,
    Down,
}

impl AdminState {
    pub fn from_flags(flags: u32) -> Self {
        if flags & IFF_UP != 0 {
            AdminState::Up
        } else {
            AdminState::Down
        }
    }
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminState::Up => write!(f, "up"),
            AdminState::Down => write!(f, "down"),
        }
    }
}

/// A link state change notification delivered by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub name: String,
    pub index: u32,
    pub state: AdminState,
}

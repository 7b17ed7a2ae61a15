//! [`HostNetworking`](scaleout_common::host::HostNetworking) backends.

pub mod netlink;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use netlink::NetlinkHost;

//! # Scale-out network discovery engine
//!
//! * [`sysfs`]: finds the interfaces bound to the NIC driver.
//! * [`neighbor`]: listens for LLDP on those interfaces.
//! * [`discovery`]: derives point-to-point addressing from what was heard.
//! * [`reconcile`]: converges addresses, routes and MTU.
//! * [`monitor`]: administrative up/down confirmed through link events.
//! * [`orchestrator`]: one run in L2 or L3 mode.

pub mod discovery;
pub mod gaudinet;
pub mod host;
pub mod monitor;
pub mod neighbor;
pub mod network;
pub mod nm;
pub mod orchestrator;
pub mod reconcile;
pub mod sysfs;

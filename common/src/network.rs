pub mod configuration;
pub mod interface;
pub mod mac;

pub use configuration::{ConfigStore, NetworkConfiguration};
pub use interface::{AdminState, IFF_UP, Link, LinkEvent};

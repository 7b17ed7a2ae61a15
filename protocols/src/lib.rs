pub mod lldp;
pub mod p2p;

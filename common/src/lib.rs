pub mod config;
pub mod host;
pub mod network;
pub mod stop;

pub mod config;
pub mod contract;
pub mod key;
pub mod network;

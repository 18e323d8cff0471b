//! Staged LAN reconnaissance on top of masscan and nmap.

pub mod catalog;
pub mod orchestrator;
pub mod parser;
pub mod ports;
pub mod scanner;
pub mod store;
pub mod vendors;
pub mod workspace;

#[cfg(test)]
mod testing;

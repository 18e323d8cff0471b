use gummy_common::config::Config;
use gummy_core::ports::{PortPrioritizer, Weights};

use crate::terminal::print;

/// Prints ranks `start..=end` of the port ranking as a compact list.
pub fn ports(config: &Config, start: usize, end: usize, protocol: &str) -> anyhow::Result<()> {
    let prioritizer = PortPrioritizer::load(&config.main.data_dir, Weights::from(&config.ratings));
    let selection = prioritizer.select_named(start, end, protocol)?;
    print::print(&selection);
    Ok(())
}

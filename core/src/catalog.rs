//! Port descriptions read from `PortDescription.csv` (`Port,Description`).
//! A `Port` cell is either a single number or an inclusive `a-b` range.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

pub const DESCRIPTION_CATALOG: &str = "PortDescription.csv";

#[derive(Debug, Clone, Default)]
pub struct PortCatalog {
    single: HashMap<u16, Vec<String>>,
    ranges: Vec<(u16, u16, String)>,
}

impl PortCatalog {
    /// Loads the catalog from `data_dir`; an unreadable file yields an empty
    /// catalog.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(DESCRIPTION_CATALOG);
        match Self::read(&path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Failed to read port descriptions from {}: {e}", path.display());
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self, csv::Error> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut catalog = Self::default();

        for record in reader.records() {
            let record = record?;
            let (Some(port), Some(description)) = (record.get(0), record.get(1)) else {
                continue;
            };
            if !catalog.insert(port, description) {
                debug!("Skipping description row for port {port:?}");
            }
        }
        Ok(catalog)
    }

    /// Adds a description for a port or `a-b` range. Returns `false` if the
    /// port cell is not understood.
    pub fn insert(&mut self, port: &str, description: &str) -> bool {
        let description = description.trim();
        if description.is_empty() {
            return false;
        }

        match port.trim().split_once('-') {
            Some((start, end)) => match (start.parse::<u16>(), end.parse::<u16>()) {
                (Ok(start), Ok(end)) if start <= end => {
                    self.ranges.push((start, end, description.to_string()));
                    true
                }
                _ => false,
            },
            None => match port.trim().parse::<u16>() {
                Ok(port) => {
                    self.single.entry(port).or_default().push(description.to_string());
                    true
                }
                Err(_) => false,
            },
        }
    }

    /// Every description that applies to `port`, exact entries first.
    pub fn describe(&self, port: u16) -> Vec<&str> {
        let exact = self.single.get(&port).into_iter().flatten().map(String::as_str);
        let ranged = self
            .ranges
            .iter()
            .filter(|(start, end, _)| (*start..=*end).contains(&port))
            .map(|(_, _, description)| description.as_str());
        exact.chain(ranged).collect()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

use std::collections::HashMap;
use std::sync::OnceLock;

use mac_oui::Oui;
use tracing::warn;

/// Resolves the manufacturer of a network card from its MAC address.
pub trait VendorRepository: Send + Sync {
    fn get_vendor(&self, mac: &str) -> Option<String>;
}

static OUI_DB: OnceLock<Option<Oui>> = OnceLock::new();

fn get_oui_db() -> Option<&'static Oui> {
    OUI_DB
        .get_or_init(|| match Oui::default() {
            Ok(db) => Some(db),
            Err(e) => {
                warn!("Failed to load OUI database: {e:?}");
                None
            }
        })
        .as_ref()
}

/// Lookups against the OUI database bundled with `mac_oui`.
pub struct MacOuiRepo;

impl VendorRepository for MacOuiRepo {
    fn get_vendor(&self, mac: &str) -> Option<String> {
        let db = get_oui_db()?;
        match db.lookup_by_mac(mac) {
            Ok(Some(entry)) => Some(entry.company_name.clone()),
            _ => None,
        }
    }
}

/// Fixed prefix table, keyed by the first three octets (`AA:BB:CC`).
#[derive(Debug, Clone, Default)]
pub struct StaticVendors {
    prefixes: HashMap<String, String>,
}

impl StaticVendors {
    pub fn with(mut self, prefix: &str, vendor: &str) -> Self {
        self.prefixes.insert(normalize_prefix(prefix), vendor.to_string());
        self
    }
}

impl VendorRepository for StaticVendors {
    fn get_vendor(&self, mac: &str) -> Option<String> {
        self.prefixes.get(&normalize_prefix(mac)).cloned()
    }
}

fn normalize_prefix(mac: &str) -> String {
    mac.chars()
        .filter(char::is_ascii_hexdigit)
        .take(6)
        .collect::<String>()
        .to_ascii_uppercase()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_vendors_ignore_separators_and_case() {
        let vendors = StaticVendors::default().with("00:1b:21", "Intel");
        assert_eq!(vendors.get_vendor("00-1B-21-AA-BB-CC").as_deref(), Some("Intel"));
        assert_eq!(vendors.get_vendor("00:1b:21:aa:bb:cc").as_deref(), Some("Intel"));
        assert_eq!(vendors.get_vendor("00:1b:22:aa:bb:cc"), None);
    }
}

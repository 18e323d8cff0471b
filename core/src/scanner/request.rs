use std::path::{Path, PathBuf};

use gummy_common::model::InspectionMode;

/// Parameters of a single scanner invocation.
///
/// Empty port lists are treated as absent, so a host with no open UDP ports
/// does not produce an empty `--udp-ports` argument.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRequest {
    pub seq: usize,
    pub label: String,
    pub target: Option<String>,
    pub include_file: Option<PathBuf>,
    pub exclude: Option<String>,
    pub exclude_file: Option<PathBuf>,
    pub tcp_ports: Option<String>,
    pub udp_ports: Option<String>,
    pub top_ports: Option<u32>,
    pub rate: Option<u32>,
    pub mode: InspectionMode,
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    (!value.trim().is_empty()).then_some(value)
}

impl ScanRequest {
    pub fn new(seq: usize, label: impl Into<String>) -> Self {
        Self {
            seq,
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = non_empty(target);
        self
    }

    pub fn with_include_file(mut self, path: &Path) -> Self {
        self.include_file = Some(path.to_path_buf());
        self
    }

    pub fn with_exclude(mut self, exclude: Option<String>) -> Self {
        self.exclude = exclude.and_then(non_empty);
        self
    }

    pub fn with_exclude_file(mut self, path: &Path) -> Self {
        self.exclude_file = Some(path.to_path_buf());
        self
    }

    pub fn with_tcp_ports(mut self, ports: impl Into<String>) -> Self {
        self.tcp_ports = non_empty(ports);
        self
    }

    pub fn with_udp_ports(mut self, ports: impl Into<String>) -> Self {
        self.udp_ports = non_empty(ports);
        self
    }

    pub fn with_top_ports(mut self, top_ports: Option<u32>) -> Self {
        self.top_ports = top_ports.filter(|n| *n > 0);
        self
    }

    pub fn with_rate(mut self, rate: Option<u32>) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_mode(mut self, mode: InspectionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn has_ports(&self) -> bool {
        self.tcp_ports.is_some() || self.udp_ports.is_some()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_dropped() {
        let request = ScanRequest::new(4, "basic")
            .with_target(" ")
            .with_tcp_ports("22,80")
            .with_udp_ports("")
            .with_exclude(Some(String::new()))
            .with_top_ports(Some(0));

        assert_eq!(request.target, None);
        assert_eq!(request.tcp_ports.as_deref(), Some("22,80"));
        assert_eq!(request.udp_ports, None);
        assert_eq!(request.exclude, None);
        assert_eq!(request.top_ports, None);
        assert!(request.has_ports());
    }
}

use std::net::IpAddr;

use gummy_common::model::Host;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("not a valid host collection: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("host #{index} has an invalid address {addr:?}")]
    InvalidAddress { index: usize, addr: String },
    #[error("host {addr} has an invalid port id {portid:?}")]
    InvalidPortId { addr: String, portid: String },
}

/// A host collection that passed schema validation.
///
/// The only way into the store is through a `Batch`, so every stored record
/// has a literal IP address and numeric port ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    hosts: Vec<Host>,
}

impl Batch {
    pub fn new(hosts: Vec<Host>) -> Result<Self, SchemaError> {
        for (index, host) in hosts.iter().enumerate() {
            validate_host(index, host)?;
        }
        Ok(Self { hosts })
    }

    /// Wraps hosts that were combined from already validated batches.
    pub(crate) fn from_validated(hosts: Vec<Host>) -> Self {
        debug_assert!(
            hosts.iter().enumerate().all(|(index, host)| validate_host(index, host).is_ok()),
            "merged hosts must stay valid"
        );
        Self { hosts }
    }

    /// Deserializes an exchange value; fields outside the model are rejected.
    pub fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let hosts: Vec<Host> = serde_json::from_str(raw)?;
        Self::new(hosts)
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string(&self.hosts)?)
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn into_hosts(self) -> Vec<Host> {
        self.hosts
    }

    pub fn addresses(&self) -> Vec<&str> {
        self.hosts.iter().map(|host| host.addr.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

fn validate_host(index: usize, host: &Host) -> Result<(), SchemaError> {
    if host.addr.parse::<IpAddr>().is_err() {
        return Err(SchemaError::InvalidAddress {
            index,
            addr: host.addr.clone(),
        });
    }

    if let Some(port) = host.ports.iter().find(|port| !is_port_id(&port.portid)) {
        return Err(SchemaError::InvalidPortId {
            addr: host.addr.clone(),
            portid: port.portid.clone(),
        });
    }
    Ok(())
}

fn is_port_id(portid: &str) -> bool {
    !portid.is_empty() && portid.bytes().all(|b| b.is_ascii_digit()) && portid.parse::<u16>().is_ok()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

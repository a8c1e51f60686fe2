use crate::errors::{Error, Result};
use std::fmt::Write as _;

/// Source of the stable device identity written to the twin as `nodeId`.
pub trait IdentityProvider: Send + Sync {
    fn node_id(&self) -> Result<String>;
}

/// Identity derived from the host's first hardware address
#[derive(Debug, Default, Clone, Copy)]
pub struct MacAddressIdentity;

impl IdentityProvider for MacAddressIdentity {
    fn node_id(&self) -> Result<String> {
        let mac = mac_address::get_mac_address()
            .map_err(|e| Error::Identity(format!("Failed to read hardware address: {}", e)))?
            .ok_or_else(|| Error::Identity("Host has no hardware address".to_string()))?;

        Ok(format_node_id(&mac.bytes()))
    }
}

/// Identity supplied by configuration
#[derive(Debug, Clone)]
pub struct FixedIdentity(String);

impl FixedIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl IdentityProvider for FixedIdentity {
    fn node_id(&self) -> Result<String> {
        let id = self.0.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Identity(format!(
                "Node id {:?} is not a hexadecimal string",
                self.0
            )));
        }
        Ok(id.to_ascii_uppercase())
    }
}

/// Uppercase hex, two digits per byte, no separators.
pub fn format_node_id(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02X}", b);
        out
    })
}

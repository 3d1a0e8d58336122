//! Startup configuration: loading and validating [`Document`]s
// (c) 2026 OpenNetty contributors
//!
//! Layered file + environment loading via `figment`, mirroring the
//! teacher's `config::Manager` approach of merging a file source with
//! environment overrides into one resolved structure.

mod structure;

pub use structure::{Document, EndpointConfig, EndpointConfigRaw, GatewayConfig, TransportConfig};

use std::collections::{HashMap, HashSet};

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use tracing::debug;

use crate::error::ConfigError;

/// Loads and validates an OpenNetty [`Document`] from a TOML file, with
/// `OPENNETTY_`-prefixed environment variables overriding file values.
#[derive(Debug)]
pub struct Manager {
    document: RawDocument,
}

/// Mirrors [`Document`] but with endpoints still in their raw,
/// not-yet-resolved shape — what `figment` actually deserializes.
#[derive(Debug, Clone, serde::Deserialize)]
struct RawDocument {
    #[serde(default)]
    gateways: Vec<GatewayConfig>,
    #[serde(default)]
    endpoints: Vec<EndpointConfigRaw>,
}

impl Manager {
    /// Loads configuration from `path`, merged with any `OPENNETTY_*`
    /// environment overrides.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let document: RawDocument = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("OPENNETTY_"))
            .extract()?;
        debug!(gateways = document.gateways.len(), endpoints = document.endpoints.len(), "configuration loaded");
        Ok(Self { document })
    }

    /// Validates the loaded document, resolving each endpoint's gateway
    /// reference and address, and returns the validated [`Document`].
    pub fn validate(self) -> Result<Document, ConfigError> {
        let mut seen_gateways = HashSet::new();
        for gw in &self.document.gateways {
            if !seen_gateways.insert(gw.name.clone()) {
                return Err(ConfigError::DuplicateName { kind: "gateway", name: gw.name.clone() });
            }
        }
        let gateway_protocols: HashMap<&str, crate::protocol::Protocol> =
            self.document.gateways.iter().map(|g| (g.name.as_str(), g.protocol)).collect();

        let mut seen_endpoints = HashSet::new();
        let mut endpoints = Vec::with_capacity(self.document.endpoints.len());
        for raw in self.document.endpoints {
            if !seen_endpoints.insert(raw.name.clone()) {
                return Err(ConfigError::DuplicateName { kind: "endpoint", name: raw.name.clone() });
            }
            let protocol = *gateway_protocols.get(raw.gateway.as_str()).ok_or_else(|| {
                ConfigError::UnknownGateway { endpoint: raw.name.clone(), gateway: raw.gateway.clone() }
            })?;

            let catalog_entry = match (&raw.brand, &raw.model) {
                (Some(brand), Some(model)) => crate::catalog::lookup(brand, model),
                _ => None,
            };

            // The address is always site wiring, not a device-model property,
            // so it must always come from the document even when brand/model
            // resolve a catalog entry for capabilities.
            let Some(address_text) = raw.address.as_deref() else {
                return Err(ConfigError::UnderspecifiedEndpoint(raw.name.clone()));
            };
            let address = decode_address(protocol, address_text)
                .ok_or_else(|| ConfigError::UnderspecifiedEndpoint(raw.name.clone()))?;

            // spec.md §3: an endpoint's capability set is the union of its
            // explicitly declared capabilities and those inherited from its
            // device/unit catalog binding, not an either/or fallback.
            let mut capabilities: HashSet<_> = raw.capabilities.clone().unwrap_or_default();
            if let Some(entry) = catalog_entry {
                capabilities.extend(entry.capabilities.iter().copied());
            }

            endpoints.push(EndpointConfig { name: raw.name, gateway: raw.gateway, address, capabilities });
        }

        Ok(Document { gateways: self.document.gateways, endpoints })
    }
}

fn decode_address(protocol: crate::protocol::Protocol, text: &str) -> Option<crate::protocol::Address> {
    use crate::protocol::address::{NitooAddress, ScsAddress, ZigbeeAddress};
    use crate::protocol::Address;
    match protocol {
        crate::protocol::Protocol::Scs => ScsAddress::decode(text).ok().map(Address::Scs),
        crate::protocol::Protocol::Nitoo => NitooAddress::decode(text).ok().map(Address::Nitoo),
        crate::protocol::Protocol::Zigbee => ZigbeeAddress::decode(text).ok().map(Address::Zigbee),
    }
}

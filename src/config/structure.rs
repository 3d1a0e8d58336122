//! The configuration document's serde-deserializable shape
// (c) 2026 OpenNetty contributors

use std::collections::HashSet;

use serde::Deserialize;

use crate::protocol::message::Capability;
use crate::protocol::Address;
use crate::transport::{SerialSettings, TransportDescriptor};

/// Top-level configuration document: every declared gateway and validated
/// endpoint. Produced by [`super::Manager::validate`]; never deserialized
/// directly (its endpoints have already been resolved from the raw
/// document's [`EndpointConfigRaw`] entries).
#[derive(Debug, Clone)]
pub struct Document {
    /// declared gateways
    pub gateways: Vec<GatewayConfig>,
    /// validated endpoints
    pub endpoints: Vec<EndpointConfig>,
}

/// One configured gateway: how to reach it and what it's allowed to carry.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// unique name, referenced by [`RawEndpointConfig::gateway`]
    pub name: String,
    /// dialect this gateway speaks
    pub protocol: crate::protocol::Protocol,
    /// connection descriptor
    pub transport: TransportConfig,
    /// pre-shared secret for open-password authentication, if required
    #[serde(default)]
    pub password: Option<u32>,
}

/// Serde-friendly mirror of [`TransportDescriptor`] (the latter isn't
/// `Deserialize` directly since `tokio_serial`'s line-setting enums aren't).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Plain TCP.
    Tcp {
        /// hostname or IP
        host: String,
        /// TCP port
        port: u16,
    },
    /// A local serial port, with optional non-default line settings.
    Serial {
        /// device path
        path: String,
        /// baud rate, defaults to 19200
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
}

fn default_baud_rate() -> u32 {
    19_200
}

impl TransportConfig {
    /// Converts to the runtime [`TransportDescriptor`].
    #[must_use]
    pub fn into_descriptor(self) -> TransportDescriptor {
        match self {
            Self::Tcp { host, port } => TransportDescriptor::Tcp { host, port },
            Self::Serial { path, baud_rate } => TransportDescriptor::Serial {
                path,
                settings: SerialSettings { baud_rate, ..SerialSettings::default() },
            },
        }
    }
}

/// As deserialized directly from the document: an endpoint's raw fields
/// before validation resolves its gateway reference and address.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfigRaw {
    /// unique name
    pub name: String,
    /// name of the [`GatewayConfig`] this endpoint is reached through
    pub gateway: String,
    /// brand, for device-catalog lookup
    #[serde(default)]
    pub brand: Option<String>,
    /// model, for device-catalog lookup
    #[serde(default)]
    pub model: Option<String>,
    /// explicit address text, required if `brand`/`model` don't resolve via
    /// the catalog
    #[serde(default)]
    pub address: Option<String>,
    /// explicitly declared capabilities, unioned with any the catalog entry
    /// (if `brand`/`model` resolve one) contributes
    #[serde(default)]
    pub capabilities: Option<HashSet<Capability>>,
}

/// A validated endpoint, ready for [`crate::controller::Controller`] use.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// unique name
    pub name: String,
    /// name of the gateway this endpoint is reached through
    pub gateway: String,
    /// resolved, dialect-tagged address
    pub address: Address,
    /// capability set gating which `Controller` operations apply
    pub capabilities: HashSet<Capability>,
}

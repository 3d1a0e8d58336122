//! Protocol dialects, addresses, and the high-level message model
// (c) 2026 OpenNetty contributors

pub mod address;
pub mod auth;
pub mod message;

pub use address::Address;
pub use message::Message;

use serde::Deserialize;
use strum::{Display, EnumString};

/// The three OpenWebNet dialects a gateway may speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// SCS ("MyHome"), the original wired bus dialect.
    Scs,
    /// Nitoo ("In One by Legrand"), powerline + radio.
    Nitoo,
    /// Zigbee ("MyHome Play"), Zigbee mesh.
    Zigbee,
}

/// Transport-level medium hint carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Medium {
    /// Wired SCS bus.
    Bus,
    /// Powerline (Nitoo).
    Powerline,
    /// Radio (Nitoo or Zigbee).
    Radio,
}

/// Transport-level addressing mode hint carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Mode {
    /// Addressed to exactly one device.
    Unicast,
    /// Addressed to a group of devices.
    Multicast,
    /// Addressed to every device on the medium.
    Broadcast,
}

// (c) 2026 OpenNetty contributors
//! OpenNetty is a gateway runtime for the OpenWebNet home-automation
//! protocol family: SCS ("MyHome", the original wired bus), Nitoo ("In One
//! by Legrand", powerline and radio), and Zigbee ("MyHome Play").
//!
//! ## Overview
//!
//! - A bit-exact [`frame`] codec and a typed [`protocol::message`] layer over
//!   it, covering all three dialects through one shared model.
//! - A per-gateway [`session`] state machine handling session-type
//!   negotiation and both OpenWebNet authentication schemes.
//! - A [`worker`] that owns a gateway's sessions, serializes outgoing
//!   requests, applies a gateway-typed retry policy, and republishes inbound
//!   notifications.
//! - A [`service`] façade routing requests to the right worker, a
//!   [`controller`] offering typed per-endpoint operations, and a
//!   [`coordinator`] that classifies inbound traffic into semantic
//!   per-endpoint events.
//!
//! ## What this crate is not
//!
//! It does not interpret vendor-specific commissioning flows, persist state
//! across restarts, discover devices, or speak MQTT — an external bridge
//! consumes this crate's [`service`] and [`coordinator`] surfaces to do that.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod service;
pub mod session;
pub mod transport;
pub mod util;
pub mod worker;

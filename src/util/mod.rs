//! Small cross-cutting helpers
// (c) 2026 OpenNetty contributors

mod tracing_setup;

pub use tracing_setup::{is_initialized, setup};

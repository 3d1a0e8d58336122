//! Compiled-in device/unit-definition table
// (c) 2026 OpenNetty contributors
//!
//! A small, representative sample of BTicino/Legrand device models, enough
//! to exercise capability derivation from a `(brand, model)` pair. The full
//! catalog is explicitly out of scope (spec.md §9's design note): this is a
//! static table, not a dynamic/reflective registry.

use crate::protocol::message::Capability;

/// One catalog entry: the capability set a device model exposes.
#[derive(Debug, Clone, Copy)]
pub struct DeviceCatalogEntry {
    /// manufacturer, e.g. `"BTicino"`
    pub brand: &'static str,
    /// model code, e.g. `"F411/2"`
    pub model: &'static str,
    /// capabilities this model exposes
    pub capabilities: &'static [Capability],
}

static CATALOG: &[DeviceCatalogEntry] = &[
    DeviceCatalogEntry {
        brand: "BTicino",
        model: "F411/2",
        capabilities: &[Capability::OnOffSwitching],
    },
    DeviceCatalogEntry {
        brand: "BTicino",
        model: "F413",
        capabilities: &[Capability::OnOffSwitching, Capability::Dimming],
    },
    DeviceCatalogEntry {
        brand: "BTicino",
        model: "F580",
        capabilities: &[Capability::PilotWire],
    },
    DeviceCatalogEntry {
        brand: "BTicino",
        model: "3523",
        capabilities: &[Capability::SmartMeter],
    },
    DeviceCatalogEntry {
        brand: "BTicino",
        model: "F520",
        capabilities: &[Capability::WaterHeater],
    },
    DeviceCatalogEntry {
        brand: "Legrand",
        model: "088328",
        capabilities: &[Capability::OnOffSwitching, Capability::Scenario],
    },
    DeviceCatalogEntry {
        brand: "Legrand",
        model: "067685",
        capabilities: &[Capability::BurglarAlarm, Capability::Battery],
    },
];

/// Looks up a device's capability set by brand and model. Matching is
/// case-insensitive.
#[must_use]
pub fn lookup(brand: &str, model: &str) -> Option<&'static DeviceCatalogEntry> {
    CATALOG
        .iter()
        .find(|e| e.brand.eq_ignore_ascii_case(brand) && e.model.eq_ignore_ascii_case(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_device_case_insensitively() {
        let entry = lookup("bticino", "f413").unwrap();
        assert!(entry.capabilities.contains(&Capability::Dimming));
    }

    #[test]
    fn unknown_device_is_none() {
        assert!(lookup("Acme", "Widget9000").is_none());
    }
}

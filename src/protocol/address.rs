//! Per-dialect address encoding and decoding
// (c) 2026 OpenNetty contributors

use crate::error::AddressError;
use crate::frame::Field;

/// A point-to-point or group SCS light-point address.
///
/// `area` ranges 1..=9 (0 and 10 are reserved group/general addresses and are
/// represented separately as [`ScsAddress::General`] / group forms are not
/// modelled beyond plain area/point — the device catalog supplies group
/// semantics where needed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScsAddress {
    /// Point-to-point `AREA|POINT`.
    PointToPoint {
        /// 1..=9
        area: u8,
        /// 1..=15
        point: u8,
    },
    /// The general (broadcast) address, WHERE `0`.
    General,
}

impl ScsAddress {
    /// Builds a point-to-point address, validating the area/point ranges.
    pub fn point_to_point(area: u8, point: u8) -> Result<Self, AddressError> {
        if !(1..=9).contains(&area) {
            return Err(AddressError::OutOfRange {
                component: "area",
                value: i64::from(area),
                min: 1,
                max: 9,
            });
        }
        if !(1..=15).contains(&point) {
            return Err(AddressError::OutOfRange {
                component: "point",
                value: i64::from(point),
                min: 1,
                max: 15,
            });
        }
        Ok(Self::PointToPoint { area, point })
    }

    /// Encodes as the OpenWebNet WHERE field text: `AREA` followed by
    /// `POINT`, per spec.md's "point-to-point `AREA|POINT`" notation.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::General => "0".to_owned(),
            Self::PointToPoint { area, point } => format!("{area}{point}"),
        }
    }

    /// Decodes a WHERE field's text: leading digit is the area (1..=9),
    /// remaining digits are the point.
    pub fn decode(text: &str) -> Result<Self, AddressError> {
        if text == "0" || text.is_empty() {
            return Ok(Self::General);
        }
        let digits: Vec<char> = text.chars().collect();
        if digits.len() < 2 {
            return Err(AddressError::Malformed {
                dialect: "SCS",
                text: text.to_owned(),
            });
        }
        let area_char = digits[0];
        let area: u8 = area_char.to_digit(10).ok_or_else(|| AddressError::Malformed {
            dialect: "SCS",
            text: text.to_owned(),
        })? as u8;
        let point_text: String = digits[1..].iter().collect();
        let point: u8 = point_text.parse().map_err(|_| AddressError::Malformed {
            dialect: "SCS",
            text: text.to_owned(),
        })?;
        Self::point_to_point(area, point)
    }
}

/// A Nitoo device address: a 24-bit device identifier plus a unit id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NitooAddress {
    /// 24-bit device identifier.
    pub device_id: u32,
    /// 1..=15
    pub unit: u8,
}

impl NitooAddress {
    /// Builds a Nitoo address, validating the unit range and the 24-bit
    /// device identifier range.
    pub fn new(device_id: u32, unit: u8) -> Result<Self, AddressError> {
        if device_id > 0x00FF_FFFF {
            return Err(AddressError::OutOfRange {
                component: "device_id",
                value: i64::from(device_id),
                min: 0,
                max: 0x00FF_FFFF,
            });
        }
        if !(1..=15).contains(&unit) {
            return Err(AddressError::OutOfRange {
                component: "unit",
                value: i64::from(unit),
                min: 1,
                max: 15,
            });
        }
        Ok(Self { device_id, unit })
    }

    /// Encodes as the 7-digit decimal expansion used on the wire: the
    /// 24-bit device id shifted left by 4 bits and OR'd with the unit
    /// nibble, printed as 7 decimal digits (matching the scenario in spec.md
    /// §8: device 487932, unit 2 -> `7806914`).
    #[must_use]
    pub fn encode(&self) -> String {
        let combined = (u64::from(self.device_id) << 4) | u64::from(self.unit & 0x0F);
        format!("{combined:07}")
    }

    /// Decodes the 7-digit decimal expansion.
    pub fn decode(text: &str) -> Result<Self, AddressError> {
        let combined: u64 = text.parse().map_err(|_| AddressError::Malformed {
            dialect: "Nitoo",
            text: text.to_owned(),
        })?;
        let unit = (combined & 0x0F) as u8;
        let device_id = (combined >> 4) as u32;
        Self::new(device_id, unit)
    }
}

/// A Zigbee device address: a 32-bit identifier (hex on the wire) plus a
/// unit id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZigbeeAddress {
    /// 32-bit device identifier.
    pub device_id: u32,
    /// unit id
    pub unit: u8,
}

impl ZigbeeAddress {
    /// Builds a Zigbee address.
    #[must_use]
    pub fn new(device_id: u32, unit: u8) -> Self {
        Self { device_id, unit }
    }

    /// Encodes as `<8 hex digits><unit>` the way Zigbee WHERE fields appear
    /// on the wire.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{:08X}{}", self.device_id, self.unit)
    }

    /// Decodes a Zigbee WHERE field's text.
    pub fn decode(text: &str) -> Result<Self, AddressError> {
        if text.len() < 9 {
            return Err(AddressError::Malformed {
                dialect: "Zigbee",
                text: text.to_owned(),
            });
        }
        let (hex, unit_text) = text.split_at(8);
        let device_id = u32::from_str_radix(hex, 16).map_err(|_| AddressError::Malformed {
            dialect: "Zigbee",
            text: text.to_owned(),
        })?;
        let unit: u8 = unit_text.parse().map_err(|_| AddressError::Malformed {
            dialect: "Zigbee",
            text: text.to_owned(),
        })?;
        Ok(Self { device_id, unit })
    }
}

/// A dialect-tagged address. Ser/de is bidirectional and total for legal
/// inputs, per spec.md §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    /// SCS light-point address.
    Scs(ScsAddress),
    /// Nitoo device+unit address.
    Nitoo(NitooAddress),
    /// Zigbee device+unit address.
    Zigbee(ZigbeeAddress),
}

impl Address {
    /// Encodes this address as a WHERE field.
    #[must_use]
    pub fn encode_field(&self) -> Field {
        match self {
            Self::Scs(a) => Field::new(a.encode()),
            Self::Nitoo(a) => Field::new(a.encode()),
            Self::Zigbee(a) => Field::new(a.encode()),
        }
    }

    /// The dialect this address belongs to.
    #[must_use]
    pub fn protocol(&self) -> super::Protocol {
        match self {
            Self::Scs(_) => super::Protocol::Scs,
            Self::Nitoo(_) => super::Protocol::Nitoo,
            Self::Zigbee(_) => super::Protocol::Zigbee,
        }
    }
}

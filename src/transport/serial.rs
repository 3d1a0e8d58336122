//! Serial port line settings
// (c) 2026 OpenNetty contributors

use crate::error::TransportError;
use tokio_serial::SerialPortBuilderExt as _;

/// Line settings for a serial connection. Defaults match the Zigbee USB
/// adapter convention noted in spec.md §4.3 / §6: 19 200 baud, 8 data bits,
/// no parity, 1 stop bit. Nitoo gateways source these from the gateway's
/// configured settings instead of the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    /// baud rate, e.g. 19200
    pub baud_rate: u32,
    /// data bits, almost always 8
    pub data_bits: tokio_serial::DataBits,
    /// parity, almost always none
    pub parity: tokio_serial::Parity,
    /// stop bits, almost always one
    pub stop_bits: tokio_serial::StopBits,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 19_200,
            data_bits: tokio_serial::DataBits::Eight,
            parity: tokio_serial::Parity::None,
            stop_bits: tokio_serial::StopBits::One,
        }
    }
}

pub(super) fn open(
    path: &str,
    settings: SerialSettings,
) -> Result<tokio_serial::SerialStream, TransportError> {
    let port = tokio_serial::new(path, settings.baud_rate)
        .data_bits(settings.data_bits)
        .parity(settings.parity)
        .stop_bits(settings.stop_bits)
        .open_native_async()
        .map_err(|e| TransportError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    Ok(port)
}

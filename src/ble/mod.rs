//! Bluetooth Low Energy transport.
//!
//! Drives the Nordic SoftDevice S140 in **Central** role:
//!
//! 1. **Scanner** - discovers the controller by its manufacturer-specific
//!    advertisement prefix.
//! 2. **HID Client** - performs GATT discovery on the connected
//!    controller, subscribes to input-report notifications, and writes
//!    subcommand output reports.
//!
//! Notifications are handed off in a single hop into the raw-report
//! channel owned by the driver task; no protocol state lives on the
//! SoftDevice side of that hop.

pub mod hid_client;
pub mod scanner;

use defmt::Format;
use heapless::String;
use nrf_softdevice::ble::Address;

/// Fixed notification/write value size for the report characteristic.
pub const REPORT_VALUE_LEN: usize = 63;

/// One raw report as delivered by the link, zero padded.
pub type RawReport = [u8; REPORT_VALUE_LEN];

/// Information about a discovered controller.
#[derive(Clone, Format)]
pub struct DiscoveredDevice {
    /// BLE address.
    pub address: Address,
    /// Advertised name (truncated to 32 bytes for `heapless::String`).
    pub name: String<32>,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: i8,
}

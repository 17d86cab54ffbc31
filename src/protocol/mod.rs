//! Wire protocol for the controller and its ring accessory.
//!
//! Everything in this module is byte-exact against the reverse-engineered
//! report formats; any layout change breaks interop with real hardware.
//!
//! 1. **Output reports** - 49-byte subcommand frames written to the
//!    controller, carrying a rolling sequence number and a neutral
//!    actuator pattern.
//! 2. **Input reports** - 49-byte notification frames: standard (0x30)
//!    with buttons, sticks, battery, and three IMU sample frames;
//!    extended (0x31) adding the ring flex and presence bytes;
//!    subcommand replies (0x21).
//! 3. **MCU command payloads** - 38-byte CRC-8-sealed blobs nested inside
//!    a subcommand, configuring the accessory-side microcontroller.

pub mod crc;
pub mod init;
pub mod input;
pub mod output;

// Report identifiers

/// Output report carrying a subcommand.
pub const OUTPUT_REPORT_ID: u8 = 0x01;

/// Standard input report: buttons, sticks, battery, IMU frames.
pub const INPUT_REPORT_STANDARD: u8 = 0x30;

/// Extended input report: standard prefix plus ring flex and presence.
pub const INPUT_REPORT_EXTENDED: u8 = 0x31;

/// Subcommand acknowledgement report.
pub const INPUT_REPORT_REPLY: u8 = 0x21;

// Subcommand identifiers

pub const SUBCMD_SET_REPORT_MODE: u8 = 0x03;
pub const SUBCMD_SPI_READ: u8 = 0x10;
pub const SUBCMD_SET_MCU_CONFIG: u8 = 0x21;
pub const SUBCMD_SET_MCU_STATE: u8 = 0x22;
pub const SUBCMD_ENABLE_IMU: u8 = 0x40;
pub const SUBCMD_IMU_SENSITIVITY: u8 = 0x41;
pub const SUBCMD_ACCESSORY_MOTION: u8 = 0x58;
pub const SUBCMD_QUERY_ACCESSORY: u8 = 0x59;
pub const SUBCMD_POLLING_START: u8 = 0x5A;
pub const SUBCMD_ACCESSORY_CONFIG: u8 = 0x5C;
pub const SUBCMD_POLLING_CONFIG: u8 = 0x5D;

// Extended-report layout
//
// Extended reports carry the full 49-byte standard prefix followed by the
// accessory block the MCU appends while external polling is active.

/// Offset of the single-byte flex reading in an extended report.
pub const FLEX_OFFSET: usize = 50;

/// Offset of the accessory presence byte in an extended report.
pub const PRESENCE_OFFSET: usize = 52;

/// Minimum extended report length covering the accessory block.
pub const EXTENDED_MIN_LEN: usize = 53;

/// Presence byte value reported while the ring is physically attached.
/// Matches the accessory device id returned by the presence probe.
pub const RING_DEVICE_ID: u8 = 0x20;

// Calibration memory

/// SPI address of the factory IMU calibration block.
pub const SPI_IMU_FACTORY_CAL: u32 = 0x6020;

/// SPI address of the user IMU calibration magic.
pub const SPI_IMU_USER_MAGIC: u32 = 0x8026;

/// SPI address of the user IMU calibration block.
pub const SPI_IMU_USER_CAL: u32 = 0x8028;

/// Magic bytes marking a programmed user IMU calibration.
pub const IMU_USER_MAGIC: [u8; 2] = [0xB2, 0xA1];

/// Length of an IMU calibration block (4 × 3 × i16).
pub const IMU_CAL_LEN: u8 = 24;

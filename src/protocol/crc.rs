//! CRC-8 checksum sealing MCU command payloads.
//!
//! The accessory MCU validates configuration blobs with CRC-8 polynomial
//! 0x07 (CRC-8/SMBUS), computed over a contiguous byte range of the
//! payload rather than the whole frame. Uses a 256-entry lookup table via
//! the `crc` crate.

use crc::{Crc, CRC_8_SMBUS};

/// CRC-8/SMBUS calculator (polynomial 0x07, init 0x00).
const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Checksum of a byte slice.
#[inline]
#[must_use]
pub fn crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

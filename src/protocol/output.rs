//! Output report construction.
//!
//! Layout (49 bytes):
//! ```text
//! Byte 0:     Report id (0x01)
//! Byte 1:     Rolling sequence number, low nibble only (0x0..0xF)
//! Bytes 2-9:  Actuator pattern - fixed neutral bytes, no haptic output
//! Byte 10:    Subcommand id
//! Bytes 11-48: Subcommand argument (zero padded, max 38 bytes)
//! ```
//!
//! MCU command payloads are framed separately ([`mcu_command`]) and sent
//! as the argument of [`SUBCMD_SET_MCU_CONFIG`](super::SUBCMD_SET_MCU_CONFIG):
//! `[command][subcommand][args, zero padded][CRC-8 at byte 37]`, with the
//! checksum covering bytes 1..37.

use super::crc::crc8;
use super::OUTPUT_REPORT_ID;

/// Output report size in bytes.
pub const OUTPUT_REPORT_LEN: usize = 49;

/// Maximum subcommand argument length.
pub const SUBCMD_ARGS_MAX: usize = 38;

/// Nested MCU command payload size in bytes.
pub const MCU_PAYLOAD_LEN: usize = 38;

/// Maximum MCU command argument length.
pub const MCU_ARGS_MAX: usize = 35;

/// Neutral actuator pattern - keeps the haptic driver quiet while a
/// subcommand rides along.
pub const ACTUATOR_NEUTRAL: [u8; 8] = [0x00, 0x01, 0x40, 0x40, 0x00, 0x01, 0x40, 0x40];

/// Builds subcommand output reports, tracking the rolling sequence number
/// the controller uses to discard duplicate frames.
#[derive(Debug)]
pub struct OutputReportBuilder {
    seq: u8,
}

impl OutputReportBuilder {
    pub const fn new() -> Self {
        Self { seq: 0 }
    }

    /// Frame a subcommand into a full output report.
    ///
    /// Returns `None` if `args` exceeds the argument region.
    pub fn subcommand(&mut self, subcommand: u8, args: &[u8]) -> Option<[u8; OUTPUT_REPORT_LEN]> {
        if args.len() > SUBCMD_ARGS_MAX {
            return None;
        }

        let mut frame = [0u8; OUTPUT_REPORT_LEN];
        frame[0] = OUTPUT_REPORT_ID;
        frame[1] = self.seq;
        self.seq = (self.seq + 1) & 0x0F;
        frame[2..10].copy_from_slice(&ACTUATOR_NEUTRAL);
        frame[10] = subcommand;
        frame[11..11 + args.len()].copy_from_slice(args);
        Some(frame)
    }
}

impl Default for OutputReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame an MCU command payload, sealing it with CRC-8 over bytes 1..37.
///
/// Returns `None` if `args` exceeds the argument region.
pub fn mcu_command(command: u8, subcommand: u8, args: &[u8]) -> Option<[u8; MCU_PAYLOAD_LEN]> {
    if args.len() > MCU_ARGS_MAX {
        return None;
    }

    let mut payload = [0u8; MCU_PAYLOAD_LEN];
    payload[0] = command;
    payload[1] = subcommand;
    payload[2..2 + args.len()].copy_from_slice(args);
    payload[37] = crc8(&payload[1..37]);
    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommand_frame_layout() {
        let mut builder = OutputReportBuilder::new();
        let frame = builder.subcommand(0x40, &[0x01]).unwrap();

        assert_eq!(frame.len(), OUTPUT_REPORT_LEN);
        assert_eq!(frame[0], OUTPUT_REPORT_ID);
        assert_eq!(frame[1], 0);
        assert_eq!(&frame[2..10], &ACTUATOR_NEUTRAL);
        assert_eq!(frame[10], 0x40);
        assert_eq!(frame[11], 0x01);
        assert!(frame[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn sequence_rolls_over_at_sixteen() {
        let mut builder = OutputReportBuilder::new();
        for expected in 0..16u8 {
            let frame = builder.subcommand(0x03, &[0x30]).unwrap();
            assert_eq!(frame[1], expected);
        }
        let frame = builder.subcommand(0x03, &[0x30]).unwrap();
        assert_eq!(frame[1], 0);
    }

    #[test]
    fn oversized_args_rejected() {
        let mut builder = OutputReportBuilder::new();
        let args = [0u8; SUBCMD_ARGS_MAX + 1];
        assert!(builder.subcommand(0x5C, &args).is_none());
        // The sequence number must not advance on a rejected frame.
        let frame = builder.subcommand(0x03, &[0x30]).unwrap();
        assert_eq!(frame[1], 0);
    }

    #[test]
    fn mcu_payload_layout_and_checksum() {
        let payload = mcu_command(0x21, 0x00, &[0x03]).unwrap();

        assert_eq!(payload.len(), MCU_PAYLOAD_LEN);
        assert_eq!(payload[0], 0x21);
        assert_eq!(payload[1], 0x00);
        assert_eq!(payload[2], 0x03);
        assert!(payload[3..37].iter().all(|&b| b == 0));
        assert_eq!(payload[37], crc8(&payload[1..37]));
    }

    #[test]
    fn mcu_checksum_excludes_command_byte() {
        let a = mcu_command(0x21, 0x00, &[0x03]).unwrap();
        let b = mcu_command(0x20, 0x00, &[0x03]).unwrap();
        // Same covered range, same checksum, different leading byte.
        assert_eq!(a[37], b[37]);
        assert_ne!(a[0], b[0]);
    }

    #[test]
    fn mcu_oversized_args_rejected() {
        let args = [0u8; MCU_ARGS_MAX + 1];
        assert!(mcu_command(0x21, 0x00, &args).is_none());
    }
}

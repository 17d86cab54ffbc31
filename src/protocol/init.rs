//! Accessory bring-up sequence, as pure protocol data.
//!
//! The MCU handshake walks these tables in order; keeping them here (and
//! not in the async sequencer) lets the exact ordered byte sequences be
//! asserted in host tests.

use super::{
    SUBCMD_ACCESSORY_CONFIG, SUBCMD_ACCESSORY_MOTION, SUBCMD_ENABLE_IMU, SUBCMD_IMU_SENSITIVITY,
    SUBCMD_POLLING_CONFIG, SUBCMD_POLLING_START, SUBCMD_SET_MCU_STATE, SUBCMD_SET_REPORT_MODE,
};

/// Identifies which handshake step failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitStep {
    EnableMotion,
    MotionSensitivity,
    ReportMode,
    McuPower,
    McuResume,
    ReportModeExt,
    McuModePoll,
    McuModeReady,
    Probe,
    AccessoryMotion,
    AccessoryConfig,
    PollingStart,
    PollingConfig,
}

/// What a table entry writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitAction {
    /// Plain subcommand with a fixed argument.
    Subcommand { id: u8, args: &'static [u8] },
    /// CRC-sealed MCU command nested in `SUBCMD_SET_MCU_CONFIG`.
    McuCommand {
        command: u8,
        subcommand: u8,
        args: &'static [u8],
    },
}

/// One ordered handshake step.
#[derive(Clone, Copy, Debug)]
pub struct InitCommand {
    pub step: InitStep,
    pub action: InitAction,
}

/// MCU command id selecting the operating mode.
pub const MCU_CMD_SET_MODE: u8 = 0x21;

/// MCU mode: poll the accessory rail.
pub const MCU_MODE_ACCESSORY_POLL: u8 = 0x03;

/// MCU mode: external device ready.
pub const MCU_MODE_EXTERNAL_READY: u8 = 0x04;

/// Fixed accessory configuration blob, captured from the vendor driver.
pub const ACCESSORY_CONFIG: [u8; 25] = [
    0x06, 0x03, 0x25, 0x06, 0x00, 0x00, 0x00, 0x00, 0x1C, 0x16, 0xED, 0x34, 0x36, 0x00, 0x00,
    0x00, 0x0A, 0x64, 0x0B, 0xE6, 0xA9, 0x22, 0x00, 0x00, 0x04,
];

/// External polling start argument.
pub const POLLING_START_ARGS: [u8; 4] = [0x04, 0x01, 0x01, 0x02];

/// External polling configuration argument.
pub const POLLING_CONFIG_ARGS: [u8; 4] = [0x02, 0x00, 0x01, 0x01];

/// Steps before the accessory presence probe: motion sensing, report
/// stream, and MCU bring-up.
pub const PRELUDE: &[InitCommand] = &[
    InitCommand {
        step: InitStep::EnableMotion,
        action: InitAction::Subcommand {
            id: SUBCMD_ENABLE_IMU,
            args: &[0x01],
        },
    },
    InitCommand {
        step: InitStep::MotionSensitivity,
        action: InitAction::Subcommand {
            id: SUBCMD_IMU_SENSITIVITY,
            args: &[0x03, 0x00, 0x00, 0x01],
        },
    },
    InitCommand {
        step: InitStep::ReportMode,
        action: InitAction::Subcommand {
            id: SUBCMD_SET_REPORT_MODE,
            args: &[0x30],
        },
    },
    InitCommand {
        step: InitStep::McuPower,
        action: InitAction::Subcommand {
            id: SUBCMD_SET_MCU_STATE,
            args: &[0x01],
        },
    },
    InitCommand {
        step: InitStep::McuResume,
        action: InitAction::Subcommand {
            id: SUBCMD_SET_MCU_STATE,
            args: &[0x02],
        },
    },
    InitCommand {
        step: InitStep::ReportModeExt,
        action: InitAction::Subcommand {
            id: SUBCMD_SET_REPORT_MODE,
            args: &[0x31],
        },
    },
    InitCommand {
        step: InitStep::McuModePoll,
        action: InitAction::McuCommand {
            command: MCU_CMD_SET_MODE,
            subcommand: 0x00,
            args: &[MCU_MODE_ACCESSORY_POLL],
        },
    },
    InitCommand {
        step: InitStep::McuModeReady,
        action: InitAction::McuCommand {
            command: MCU_CMD_SET_MODE,
            subcommand: 0x00,
            args: &[MCU_MODE_EXTERNAL_READY],
        },
    },
];

/// Steps after the probe: accessory motion mode, configuration blob, and
/// external polling.
pub const FINALE: &[InitCommand] = &[
    InitCommand {
        step: InitStep::AccessoryMotion,
        action: InitAction::Subcommand {
            id: SUBCMD_ACCESSORY_MOTION,
            args: &[0x01],
        },
    },
    InitCommand {
        step: InitStep::AccessoryConfig,
        action: InitAction::Subcommand {
            id: SUBCMD_ACCESSORY_CONFIG,
            args: &ACCESSORY_CONFIG,
        },
    },
    InitCommand {
        step: InitStep::PollingStart,
        action: InitAction::Subcommand {
            id: SUBCMD_POLLING_START,
            args: &POLLING_START_ARGS,
        },
    },
    InitCommand {
        step: InitStep::PollingConfig,
        action: InitAction::Subcommand {
            id: SUBCMD_POLLING_CONFIG,
            args: &POLLING_CONFIG_ARGS,
        },
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_order_matches_bringup_contract() {
        let steps: [InitStep; 8] = [
            InitStep::EnableMotion,
            InitStep::MotionSensitivity,
            InitStep::ReportMode,
            InitStep::McuPower,
            InitStep::McuResume,
            InitStep::ReportModeExt,
            InitStep::McuModePoll,
            InitStep::McuModeReady,
        ];
        assert_eq!(PRELUDE.len(), steps.len());
        for (cmd, expected) in PRELUDE.iter().zip(steps) {
            assert_eq!(cmd.step, expected);
        }
    }

    #[test]
    fn finale_order_matches_bringup_contract() {
        let steps: [InitStep; 4] = [
            InitStep::AccessoryMotion,
            InitStep::AccessoryConfig,
            InitStep::PollingStart,
            InitStep::PollingConfig,
        ];
        assert_eq!(FINALE.len(), steps.len());
        for (cmd, expected) in FINALE.iter().zip(steps) {
            assert_eq!(cmd.step, expected);
        }
    }

    #[test]
    fn report_mode_switches_to_extended_after_mcu_resume() {
        let modes: heapless::Vec<&[u8], 4> = PRELUDE
            .iter()
            .filter_map(|cmd| match cmd.action {
                InitAction::Subcommand {
                    id: super::SUBCMD_SET_REPORT_MODE,
                    args,
                } => Some(args),
                _ => None,
            })
            .collect();
        assert_eq!(modes.as_slice(), &[&[0x30][..], &[0x31][..]]);
    }

    #[test]
    fn mcu_steps_carry_set_mode_command() {
        for cmd in PRELUDE {
            if let InitAction::McuCommand { command, .. } = cmd.action {
                assert_eq!(command, MCU_CMD_SET_MODE);
            }
        }
    }
}

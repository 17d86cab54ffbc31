//! BLE GATT HID client - the controller's report pipe.
//!
//! After the GAP connection is established, this module:
//! 1. Discovers the HID service (UUID 0x1812).
//! 2. Enables CCCD notifications on the report characteristic.
//! 3. Forwards each notification into the driver's raw-report channel.
//!
//! Output reports (49-byte subcommand frames) go out through the same
//! characteristic via [`ReportWriter`]; write failures surface
//! synchronously as `Error::WriteFailed` and are never retried here.

use defmt::{info, warn};
use nrf_softdevice::ble::{gatt_client, Connection};

use crate::ble::{RawReport, REPORT_VALUE_LEN};
use crate::driver::REPORTS;
use crate::error::Error;
use crate::protocol::output::{mcu_command, OutputReportBuilder};
use crate::protocol::SUBCMD_SET_MCU_CONFIG;

/// nrf-softdevice GATT client struct for the HID-over-GATT service.
///
/// The `#[nrf_softdevice::gatt_client]` macro generates discovery and
/// read/write/notify helpers for the listed characteristics.
#[nrf_softdevice::gatt_client(uuid = "1812")]
pub struct ControllerClient {
    /// HID Report - notifications carry the 0x30/0x31/0x21 input stream;
    /// writes carry subcommand output reports. Length matches
    /// `REPORT_VALUE_LEN`.
    #[characteristic(uuid = "2a4d", read, write, notify)]
    pub report: [u8; 63],
}

/// Discover the HID service and subscribe to report notifications.
pub async fn discover_and_subscribe(conn: &Connection) -> Result<ControllerClient, Error> {
    info!("Discovering HID service...");

    let client: ControllerClient = gatt_client::discover(conn)
        .await
        .map_err(|_| Error::OpenFailed)?;

    client
        .report_cccd_write(true)
        .await
        .map_err(|_| Error::OpenFailed)?;

    info!("Subscribed to report notifications");
    Ok(client)
}

/// Run the notification listener loop.
///
/// Blocks until the connection drops. Each received report is handed
/// off unparsed into the driver task's channel.
pub async fn run_notification_loop(conn: &Connection, client: &ControllerClient) {
    info!("Report notification loop started");

    let _result = gatt_client::run(conn, client, |event| match event {
        ControllerClientEvent::ReportNotification(data) => {
            // try_send keeps this callback non-blocking; if the driver
            // task is behind, the frame is dropped.
            if REPORTS.try_send(data).is_err() {
                warn!("Report channel full - dropping frame");
            }
        }
    })
    .await;

    info!("Report notification loop ended (connection closed)");
}

/// Frames and writes output reports, owning the rolling sequence number.
pub struct ReportWriter<'a> {
    client: &'a ControllerClient,
    builder: OutputReportBuilder,
}

impl<'a> ReportWriter<'a> {
    pub fn new(client: &'a ControllerClient) -> Self {
        Self {
            client,
            builder: OutputReportBuilder::new(),
        }
    }

    /// Write a plain subcommand output report.
    pub async fn subcommand(&mut self, subcommand: u8, args: &[u8]) -> Result<(), Error> {
        let frame = self
            .builder
            .subcommand(subcommand, args)
            .ok_or(Error::WriteFailed)?;

        let mut value: RawReport = [0; REPORT_VALUE_LEN];
        value[..frame.len()].copy_from_slice(&frame);
        self.client
            .report_write(&value)
            .await
            .map_err(|_| Error::WriteFailed)
    }

    /// Seal an MCU command payload and send it nested in
    /// `SUBCMD_SET_MCU_CONFIG`.
    pub async fn mcu_config(
        &mut self,
        command: u8,
        subcommand: u8,
        args: &[u8],
    ) -> Result<(), Error> {
        let payload = mcu_command(command, subcommand, args).ok_or(Error::WriteFailed)?;
        self.subcommand(SUBCMD_SET_MCU_CONFIG, &payload).await
    }
}

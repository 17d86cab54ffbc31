//! Accessory MCU handshake sequencer.
//!
//! Walks the ordered bring-up tables from `protocol::init`, pausing a
//! fixed settle delay after each write so the MCU can apply the previous
//! command. The whole sequence suspends cooperatively; the driver task
//! races it against the command channel, so a `Disconnect` cancels it by
//! dropping the future.
//!
//! The presence probe between the two tables is best-effort: exhausting
//! the retry budget is non-fatal because live extended reports confirm
//! attachment continuously afterwards.

use defmt::{debug, info, warn};
use embassy_time::Timer;

use crate::ble::hid_client::ReportWriter;
use crate::config::{INIT_SETTLE_MS, PROBE_ATTEMPTS, PROBE_RETRY_MS};
use crate::error::Error;
use crate::motion::ImuCalibration;
use crate::protocol::init::{InitAction, InitCommand, InitStep, FINALE, PRELUDE};
use crate::protocol::{
    IMU_CAL_LEN, IMU_USER_MAGIC, RING_DEVICE_ID, SPI_IMU_FACTORY_CAL, SPI_IMU_USER_CAL,
    SPI_IMU_USER_MAGIC, SUBCMD_QUERY_ACCESSORY, SUBCMD_SPI_READ,
};
use crate::request::{Exchange, ReportChannel};

/// Bring the accessory MCU into external polling mode.
///
/// Returns whether the probe positively identified the ring. A write
/// failure aborts with `Error::Init(step)` and leaves the connection
/// state to the caller.
pub async fn initialize(
    writer: &mut ReportWriter<'_>,
    reports: &ReportChannel,
    exchange: &Exchange,
) -> Result<bool, Error> {
    info!("MCU handshake starting");

    for command in PRELUDE {
        send(writer, command).await?;
    }

    let detected = probe(writer, reports, exchange).await?;
    if !detected {
        // Keep going: attachment is confirmed from live reports, not
        // from this one-shot probe.
        warn!("Accessory probe exhausted - proceeding optimistically");
    }

    for command in FINALE {
        send(writer, command).await?;
    }

    info!("MCU handshake complete (ring detected: {})", detected);
    Ok(detected)
}

async fn send(writer: &mut ReportWriter<'_>, command: &InitCommand) -> Result<(), Error> {
    debug!("Handshake step {}", command.step);

    let written = match command.action {
        InitAction::Subcommand { id, args } => writer.subcommand(id, args).await,
        InitAction::McuCommand {
            command: mcu_cmd,
            subcommand,
            args,
        } => writer.mcu_config(mcu_cmd, subcommand, args).await,
    };
    written.map_err(|_| Error::Init(command.step))?;

    Timer::after_millis(INIT_SETTLE_MS).await;
    Ok(())
}

/// Query the accessory rail until the ring device id comes back or the
/// retry budget runs out.
async fn probe(
    writer: &mut ReportWriter<'_>,
    reports: &ReportChannel,
    exchange: &Exchange,
) -> Result<bool, Error> {
    for attempt in 1..=PROBE_ATTEMPTS {
        match exchange
            .run(writer, reports, SUBCMD_QUERY_ACCESSORY, &[])
            .await
        {
            Ok(reply) if reply.data[0] == RING_DEVICE_ID => {
                info!("Accessory detected on probe attempt {}", attempt);
                return Ok(true);
            }
            Ok(_) => debug!("Probe attempt {}: no accessory yet", attempt),
            Err(Error::WriteFailed) => return Err(Error::Init(InitStep::Probe)),
            // Timeouts and garbled replies are normal while the ring
            // seats; keep retrying.
            Err(_) => debug!("Probe attempt {}: no reply", attempt),
        }
        Timer::after_millis(PROBE_RETRY_MS).await;
    }
    Ok(false)
}

/// Read the per-device IMU offset/scale calibration, preferring a
/// programmed user block over the factory block. Any failure falls back
/// to the factory-default scale so fusion always has usable constants.
pub async fn read_imu_calibration(
    writer: &mut ReportWriter<'_>,
    reports: &ReportChannel,
    exchange: &Exchange,
) -> ImuCalibration {
    let use_user = matches!(
        spi_read(writer, reports, exchange, SPI_IMU_USER_MAGIC, 2).await,
        Ok(magic) if magic[..2] == IMU_USER_MAGIC
    );

    let addr = if use_user {
        SPI_IMU_USER_CAL
    } else {
        SPI_IMU_FACTORY_CAL
    };

    match spi_read(writer, reports, exchange, addr, IMU_CAL_LEN).await {
        Ok(data) => match ImuCalibration::parse(&data) {
            Some(cal) => {
                info!("IMU calibration loaded (user block: {})", use_user);
                cal
            }
            None => ImuCalibration::default(),
        },
        Err(e) => {
            warn!("IMU calibration read failed ({}), using defaults", e);
            ImuCalibration::default()
        }
    }
}

async fn spi_read(
    writer: &mut ReportWriter<'_>,
    reports: &ReportChannel,
    exchange: &Exchange,
    addr: u32,
    len: u8,
) -> Result<heapless::Vec<u8, 24>, Error> {
    let mut args = [0u8; 5];
    args[..4].copy_from_slice(&addr.to_le_bytes());
    args[4] = len;

    let reply = exchange.run(writer, reports, SUBCMD_SPI_READ, &args).await?;
    let payload = reply.spi_payload(addr, len).ok_or(Error::InvalidResponse)?;
    heapless::Vec::from_slice(payload).map_err(|_| Error::InvalidResponse)
}

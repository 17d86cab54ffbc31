//! BLE GAP scanner - discovers the controller.
//!
//! Uses the SoftDevice Central-role scanning API. Advertisements are
//! filtered by the vendor's manufacturer-data prefix (parsed by the pure
//! `adv` module); the first match wins. The scan window is bounded, and
//! an empty window surfaces as `Error::DeviceNotFound`.

use defmt::info;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};
use nrf_softdevice::ble::{central, Address};
use nrf_softdevice::Softdevice;

use crate::adv::{extract_device_name, matches_controller};
use crate::ble::DiscoveredDevice;
use crate::config::BLE_SCAN_DURATION_SECS;
use crate::error::Error;

/// Run a BLE scan for `BLE_SCAN_DURATION_SECS` seconds, returning the
/// first advertisement matching the controller family.
pub async fn scan(sd: &Softdevice) -> Result<DiscoveredDevice, Error> {
    info!("BLE scan starting ({} s window)", BLE_SCAN_DURATION_SECS);

    let config = central::ScanConfig {
        // Active scan to retrieve scan-response data (device names).
        active: true,
        ..Default::default()
    };

    let scan = central::scan(sd, &config, |params| {
        let data =
            unsafe { core::slice::from_raw_parts(params.data.p_data, params.data.len as usize) };

        if matches_controller(data) {
            // Returning Some stops the scan and yields the device.
            Some(DiscoveredDevice {
                address: Address::from_raw(params.peer_addr),
                name: extract_device_name(data),
                rssi: params.rssi,
            })
        } else {
            None
        }
    });

    let window = Timer::after(Duration::from_secs(BLE_SCAN_DURATION_SECS));

    match select(scan, window).await {
        Either::First(Ok(device)) => {
            info!("Found: {} (RSSI {})", device.name.as_str(), device.rssi);
            Ok(device)
        }
        Either::First(Err(_)) => {
            defmt::warn!("BLE scan ended with error");
            Err(Error::DeviceNotFound)
        }
        Either::Second(()) => {
            info!("BLE scan window closed - no controller found");
            Err(Error::DeviceNotFound)
        }
    }
}

//! Embedded entry point (nRF52840 + SoftDevice S140).
//!
//! Wires the executor together: the SoftDevice runner, the driver task,
//! and a small supervisor that kicks off scanning and logs driver
//! events. Everything interesting lives in the library crate.

#![no_std]
#![no_main]

use core::mem;

use defmt::{info, unwrap};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::interrupt::Priority;
use embassy_time::{Duration, Timer};
use nrf_softdevice::{raw, Softdevice};
use panic_probe as _;

use ringlink::driver::{self, Command, DriverEvent};

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn driver_task(sd: &'static Softdevice) -> ! {
    driver::driver_task(sd).await
}

/// Boot-time supervisor: starts scanning, logs events, and retries the
/// scan when the controller goes away.
#[embassy_executor::task]
async fn supervisor_task() -> ! {
    driver::COMMANDS.send(Command::StartScan).await;

    loop {
        match driver::EVENTS.receive().await {
            DriverEvent::DeviceFound(name) => info!("Controller found: {}", name.as_str()),
            DriverEvent::Connected => info!("Controller ready"),
            DriverEvent::RingAttached => info!("Ring attached"),
            DriverEvent::RingDetached => info!("Ring detached"),
            DriverEvent::Disconnected => {
                info!("Driver idle - rescanning shortly");
                Timer::after(Duration::from_secs(2)).await;
                driver::COMMANDS.send(Command::StartScan).await;
            }
            DriverEvent::Error(e) => info!("Driver error: {}", e),
            _ => {}
        }
    }
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 128 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: b"ringlink" as *const u8 as _,
            current_len: 8,
            max_len: 8,
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ringlink starting");

    // The SoftDevice reserves the highest interrupt priorities.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let _p = embassy_nrf::init(config);

    let sd = Softdevice::enable(&softdevice_config());

    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(driver_task(sd)));
    unwrap!(spawner.spawn(supervisor_task()));
}

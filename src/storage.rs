//! Persistent storage for the flex calibration record.
//!
//! Uses the nRF52840's internal flash via the `sequential-storage` crate.
//! The record is the driver's only durable state: it survives power
//! cycles so a calibrated ring works immediately on reconnect.
//!
//! Storage layout:
//!   - One key-value entry holding the serialized `FlexCalibration`.
//!   - Writes are appended sequentially; the flash pages are managed by
//!     `sequential-storage` which handles wear levelling and GC.

use defmt::{debug, error, info};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;

use crate::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use crate::flex::{FlexCalibration, FLEX_DEFAULT, FLEX_RECORD_LEN};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Key for the flex calibration record in the map storage.
const KEY_FLEX_CAL: u8 = 0x01;

/// Working buffer size for map operations.
const BUF_SIZE: usize = 32;

/// In-memory copy of the calibration record, synced with flash.
pub struct CalStore {
    record: FlexCalibration,
    /// True if the cache differs from flash.
    dirty: bool,
}

impl CalStore {
    pub const fn new() -> Self {
        Self {
            record: FLEX_DEFAULT,
            dirty: false,
        }
    }

    /// The current record; falls back to the factory-typical range until
    /// a calibration run completes.
    pub fn get(&self) -> FlexCalibration {
        self.record
    }

    /// Replace the record. Only a completed calibration run calls this.
    pub fn set(&mut self, record: FlexCalibration) {
        self.record = record;
        self.dirty = true;
    }

    /// Async load from flash using sequential-storage.
    pub async fn load_from_flash(
        &mut self,
        flash: &mut impl embedded_storage_async::nor_flash::NorFlash,
    ) {
        let flash_range = STORAGE_START..STORAGE_END;
        let mut buf = [0u8; BUF_SIZE];

        match sequential_storage::map::fetch_item::<u8, &[u8], _>(
            flash,
            flash_range,
            &mut sequential_storage::cache::NoCache::new(),
            &mut buf,
            &KEY_FLEX_CAL,
        )
        .await
        {
            Ok(Some(data)) => match FlexCalibration::from_bytes(data) {
                Some(record) => {
                    info!(
                        "Loaded flex calibration (neutral {} range {}..{})",
                        record.neutral, record.min, record.max
                    );
                    self.record = record;
                }
                None => {
                    error!("Stored flex calibration truncated - using defaults");
                    self.record = FLEX_DEFAULT;
                }
            },
            Ok(None) => {
                info!("No flex calibration in flash");
                self.record = FLEX_DEFAULT;
            }
            Err(e) => {
                error!("Flash read error: {:?}", defmt::Debug2Format(&e));
                self.record = FLEX_DEFAULT;
            }
        }
        self.dirty = false;
    }

    /// Persist the record to flash.
    pub async fn save_to_flash(
        &mut self,
        flash: &mut impl embedded_storage_async::nor_flash::NorFlash,
    ) {
        if !self.dirty {
            debug!("CalStore: no changes to save");
            return;
        }

        let flash_range = STORAGE_START..STORAGE_END;
        let mut buf = [0u8; BUF_SIZE];
        let bytes: [u8; FLEX_RECORD_LEN] = self.record.to_bytes();
        let item: &[u8] = &bytes;

        match sequential_storage::map::store_item::<u8, &[u8], _>(
            flash,
            flash_range,
            &mut sequential_storage::cache::NoCache::new(),
            &mut buf,
            &KEY_FLEX_CAL,
            &item,
        )
        .await
        {
            Ok(_) => {
                info!("Saved flex calibration to flash");
                self.dirty = false;
            }
            Err(e) => {
                error!("Flash write error: {:?}", defmt::Debug2Format(&e));
            }
        }
    }
}

/// Global calibration store (protected by mutex for async access).
pub static CAL_STORE: Mutex<CriticalSectionRawMutex, CalStore> = Mutex::new(CalStore::new());

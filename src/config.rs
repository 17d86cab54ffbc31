//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, protocol thresholds, and filter coefficients
//! live here so they can be tuned in one place.

// BLE

/// Duration of a BLE scan window (seconds).
pub const BLE_SCAN_DURATION_SECS: u64 = 8;

/// Company identifier expected in the controller's manufacturer-specific
/// advertisement data.
pub const ADV_COMPANY_ID: u16 = 0x0553;

/// Product-type prefix following the company id in the manufacturer data.
pub const ADV_PRODUCT_PREFIX: [u8; 3] = [0x01, 0x00, 0x03];

/// BLE connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms (lowest latency for the 60 Hz report stream).
pub const BLE_CONN_INTERVAL_MIN: u16 = 6;
pub const BLE_CONN_INTERVAL_MAX: u16 = 12;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

// Handshake

/// Settle delay after each handshake subcommand write (ms).
pub const INIT_SETTLE_MS: u64 = 60;

/// Attempts for the accessory presence probe before giving up
/// and proceeding optimistically.
pub const PROBE_ATTEMPTS: u32 = 8;

/// Delay between presence probe attempts (ms).
pub const PROBE_RETRY_MS: u64 = 100;

/// Deadline for a request/response subcommand exchange (ms).
pub const REQUEST_TIMEOUT_MS: u64 = 500;

// Attachment detection

/// Consecutive presence reports required before the ring counts as attached.
pub const RING_PRESENT_THRESHOLD: u8 = 3;

/// Consecutive absence reports required before the ring counts as detached.
pub const RING_MISSED_THRESHOLD: u8 = 12;

/// Interval between recovery handshake attempts after a confirmed detach (ms).
pub const RECOVERY_INTERVAL_MS: u64 = 2_000;

// Calibration

/// Duration of each guided calibration phase (ms).
pub const CALIB_PHASE_MS: u64 = 5_000;

/// Minimum raw span `neutral - min` / `max - neutral` for a usable
/// calibration.
pub const FLEX_MIN_RANGE: u8 = 0x10;

// Sensor fusion

/// Low-pass coefficient for the filtered acceleration vector.
pub const ACCEL_LP_ALPHA: f32 = 0.25;

/// Low-pass coefficient for the filtered angular-rate vector.
pub const GYRO_LP_ALPHA: f32 = 0.35;

/// Angular rates below this magnitude (deg/s) are treated as zero when
/// integrating yaw.
pub const GYRO_DEADBAND_DPS: f32 = 1.5;

/// Samples averaged for the initial gyro bias estimate.
pub const GYRO_BIAS_STARTUP_SAMPLES: u32 = 64;

/// Sample-to-sample delta (deg/s) under which the gyro is considered stable.
pub const GYRO_STABLE_DELTA_DPS: f32 = 0.5;

/// Consecutive stable samples required before the slow bias correction runs.
pub const GYRO_STABLE_WINDOW: u32 = 30;

/// Coefficient of the slow exponential bias correction.
pub const GYRO_BIAS_SLOW_ALPHA: f32 = 0.002;

/// Angular-rate magnitude (deg/s) below which the controller may be at rest.
pub const REST_GYRO_TOL_DPS: f32 = 2.0;

/// Tolerance around 1 g for the at-rest acceleration magnitude check.
pub const REST_ACCEL_TOL_G: f32 = 0.05;

/// Consecutive in-tolerance samples required before yaw snaps to zero.
pub const REST_SAMPLE_COUNT: u32 = 120;

/// Upper bound on the integration step (seconds); guards against a stalled
/// report stream producing a huge yaw jump.
pub const FUSION_MAX_DT_S: f32 = 0.1;

// Calibration-record storage

/// Flash page index where the record storage starts (4 KB per page on
/// nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for record storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;

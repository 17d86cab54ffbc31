//! Unified error type for ringlink.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use crate::calib::CalibrationFailure;
use crate::protocol::init::InitStep;

/// Top-level error type used across the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // Transport
    /// Scan window closed without finding a matching controller.
    DeviceNotFound,

    /// The controller was found but the link could not be established.
    OpenFailed,

    /// An output report write was rejected by the link.
    WriteFailed,

    // Request/response
    /// A request/response exchange hit its deadline without a reply.
    Timeout,

    /// A reply arrived but did not carry the expected acknowledgement.
    InvalidResponse,

    /// A second exchange was attempted while one was still pending.
    RequestInFlight,

    // Accessory bring-up
    /// The handshake failed at the given step; the link stays open.
    Init(InitStep),

    // Calibration
    /// A guided calibration run ended without a usable range.
    Calibration(CalibrationFailure),
}

impl From<CalibrationFailure> for Error {
    fn from(reason: CalibrationFailure) -> Self {
        Error::Calibration(reason)
    }
}

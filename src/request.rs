//! Request/response correlation over the asynchronous report stream.
//!
//! Subcommand replies (0x21 reports) arrive interleaved with the input
//! stream. An [`Exchange`] writes the request, then drains the raw-report
//! channel until the reply with the matching subcommand id shows up,
//! or the deadline passes. Only one exchange may be pending system-wide;
//! a second attempt is rejected, not queued.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_timeout, Duration};

use crate::ble::hid_client::ReportWriter;
use crate::ble::RawReport;
use crate::config::REQUEST_TIMEOUT_MS;
use crate::error::Error;
use crate::protocol::input::SubcommandReply;

/// Raw-report channel type shared with the driver task.
pub type ReportChannel = Channel<CriticalSectionRawMutex, RawReport, 16>;

/// Single-slot request/response gate.
pub struct Exchange {
    pending: Cell<bool>,
}

/// Clears the pending flag even when the exchange future is dropped
/// mid-wait (handshake cancellation).
struct PendingGuard<'a>(&'a Cell<bool>);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Exchange {
    pub const fn new() -> Self {
        Self {
            pending: Cell::new(false),
        }
    }

    /// Issue `subcommand` and await its acknowledged reply.
    ///
    /// Non-matching reports received during the wait are discarded; the
    /// hysteresis detector tolerates the gap. Fails with
    /// [`Error::RequestInFlight`] if an exchange is already pending,
    /// [`Error::Timeout`] at the deadline, and
    /// [`Error::InvalidResponse`] when the reply is not acknowledged.
    pub async fn run(
        &self,
        writer: &mut ReportWriter<'_>,
        reports: &ReportChannel,
        subcommand: u8,
        args: &[u8],
    ) -> Result<SubcommandReply, Error> {
        if self.pending.replace(true) {
            return Err(Error::RequestInFlight);
        }
        let _guard = PendingGuard(&self.pending);

        writer.subcommand(subcommand, args).await?;

        let wait = async {
            loop {
                let raw = reports.receive().await;
                if let Some(reply) = SubcommandReply::parse(&raw) {
                    if reply.subcommand == subcommand {
                        return reply;
                    }
                }
            }
        };

        let reply = with_timeout(Duration::from_millis(REQUEST_TIMEOUT_MS), wait)
            .await
            .map_err(|_| Error::Timeout)?;

        if !reply.acked() {
            return Err(Error::InvalidResponse);
        }
        Ok(reply)
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Self::new()
    }
}

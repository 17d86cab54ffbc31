//! Connection & attachment state machine - the driver task.
//!
//! All mutable driver state is owned by this single task. Raw reports
//! arrive through [`REPORTS`] (one hop from the SoftDevice context),
//! commands through [`COMMANDS`], and consumers read the published
//! [`STATE`] snapshot or drain [`EVENTS`].
//!
//! Lifecycle: `Disconnected -> Scanning -> Connecting -> Connected`;
//! device removal or a `Disconnect` command returns any state to
//! `Disconnected`, clearing attachment, calibration, and fusion filters.
//!
//! While connected, every input report feeds the hysteresis detector.
//! A confirmed detach arms a periodic recovery deadline that re-runs the
//! MCU handshake until the ring is reconfirmed; a confirmed attach
//! cancels it and clears the last error. Recovery and calibration are
//! deadlines inside the select loop, never spawned tasks, so two
//! handshakes can never interleave.

use defmt::{info, warn, Format};
use embassy_futures::select::{select, select3, Either, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Timer};
use heapless::String;
use nrf_softdevice::ble::central;
use nrf_softdevice::{raw, Flash, Softdevice};

use crate::ble::hid_client::{self, ReportWriter};
use crate::ble::{scanner, DiscoveredDevice, RawReport};
use crate::calib::{CalibPhase, CalibrationFailure, CalibrationRun, PhaseOutcome};
use crate::config::{
    BLE_CONN_INTERVAL_MAX, BLE_CONN_INTERVAL_MIN, BLE_SLAVE_LATENCY, BLE_SUP_TIMEOUT,
    CALIB_PHASE_MS, FLEX_MIN_RANGE, RECOVERY_INTERVAL_MS, RING_MISSED_THRESHOLD,
    RING_PRESENT_THRESHOLD,
};
use crate::detect::{AttachEdge, RingDetector};
use crate::error::Error;
use crate::flex::FlexCalibration;
use crate::mcu;
use crate::motion::{ImuCalibration, MotionFusion, Orientation};
use crate::protocol::input::{Battery, RingSample, StandardInput};
use crate::request::{Exchange, ReportChannel};
use crate::storage::CAL_STORE;

/// Commands the UI/game-logic collaborator sends to the driver task.
#[derive(Clone, Copy, Debug, Format)]
pub enum Command {
    StartScan,
    Disconnect,
    StartCalibration,
    CancelCalibration,
    Reinitialize,
}

/// Events the driver task publishes for the UI to drain.
#[derive(Clone, Format)]
pub enum DriverEvent {
    ScanStarted,
    DeviceFound(String<32>),
    Connected,
    Disconnected,
    RingAttached,
    RingDetached,
    CalibrationDone,
    CalibrationFailed(CalibrationFailure),
    Error(Error),
}

/// Top-level connection lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Format)]
pub enum ConnectionState {
    Disconnected,
    Scanning,
    Connecting,
    Connected,
}

/// Read-only snapshot published for consumers.
#[derive(Clone, Copy, Debug)]
pub struct DriverState {
    pub connection: ConnectionState,
    pub attached: bool,
    pub battery: Option<Battery>,
    /// Normalized flex value, 0.5 at the calibrated neutral.
    pub flex: f32,
    pub orientation: Orientation,
    /// Active calibration phase and remaining milliseconds.
    pub calibration: Option<(CalibPhase, u32)>,
    pub last_error: Option<Error>,
}

impl DriverState {
    pub const fn new() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            attached: false,
            battery: None,
            flex: 0.5,
            orientation: Orientation::ZERO,
            calibration: None,
            last_error: None,
        }
    }
}

/// Commands into the driver task.
pub static COMMANDS: Channel<CriticalSectionRawMutex, Command, 4> = Channel::new();

/// Raw reports, one hop from the SoftDevice notification context.
pub static REPORTS: ReportChannel = Channel::new();

/// Driver events for the UI task.
pub static EVENTS: Channel<CriticalSectionRawMutex, DriverEvent, 8> = Channel::new();

/// Published driver state.
pub static STATE: Mutex<CriticalSectionRawMutex, DriverState> = Mutex::new(DriverState::new());

/// Copy out the current published state.
pub async fn snapshot() -> DriverState {
    *STATE.lock().await
}

/// Per-connection state owned by the session loop.
struct Session {
    detector: RingDetector,
    fusion: MotionFusion,
    flex_cal: FlexCalibration,
    run: Option<CalibrationRun>,
    phase_deadline: Option<Instant>,
    recovery_at: Option<Instant>,
    last_report: Option<Instant>,
    /// True once the MCU handshake has completed on this link.
    ready: bool,
}

/// The driver task. Owns the SoftDevice flash handle and all mutable
/// driver state for the lifetime of the firmware.
pub async fn driver_task(sd: &'static Softdevice) -> ! {
    let mut flash = Flash::take(sd);
    {
        let mut store = CAL_STORE.lock().await;
        store.load_from_flash(&mut flash).await;
    }

    loop {
        match COMMANDS.receive().await {
            Command::StartScan => connect_cycle(sd, &mut flash).await,
            other => warn!("Command {} ignored while disconnected", other),
        }
    }
}

/// One scan, connect, and session pass, ending back in `Disconnected`.
async fn connect_cycle(sd: &'static Softdevice, flash: &mut Flash) {
    set_connection(ConnectionState::Scanning).await;
    EVENTS.send(DriverEvent::ScanStarted).await;

    match scanner::scan(sd).await {
        Ok(device) => {
            EVENTS
                .send(DriverEvent::DeviceFound(device.name.clone()))
                .await;
            set_connection(ConnectionState::Connecting).await;

            match run_session(sd, &device, flash).await {
                Ok(()) => info!("Session closed"),
                Err(e) => record_error(e).await,
            }
        }
        Err(e) => record_error(e).await,
    }

    clear_session_state().await;
    EVENTS.send(DriverEvent::Disconnected).await;
}

async fn run_session(
    sd: &'static Softdevice,
    device: &DiscoveredDevice,
    flash: &mut Flash,
) -> Result<(), Error> {
    info!("Connecting to {}", device.name.as_str());

    let whitelist = [&device.address];
    let conn_config = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: BLE_CONN_INTERVAL_MIN,
            max_conn_interval: BLE_CONN_INTERVAL_MAX,
            slave_latency: BLE_SLAVE_LATENCY,
            conn_sup_timeout: BLE_SUP_TIMEOUT,
        },
        ..Default::default()
    };

    let conn = central::connect(sd, &conn_config)
        .await
        .map_err(|_| Error::OpenFailed)?;

    let client = hid_client::discover_and_subscribe(&conn).await?;

    // Drop stale frames from a previous link before the handshake reads
    // replies off the channel.
    while REPORTS.try_receive().is_ok() {}

    let mut writer = ReportWriter::new(&client);
    let pump = hid_client::run_notification_loop(&conn, &client);
    let logic = session_loop(&mut writer, flash);

    match select(pump, logic).await {
        // Physical removal surfaces here as the notification loop
        // ending; it is a lifecycle transition, not an error.
        Either::First(()) => Ok(()),
        Either::Second(result) => result,
    }
}

async fn session_loop(
    writer: &mut ReportWriter<'_>,
    flash: &mut Flash,
) -> Result<(), Error> {
    let exchange = Exchange::new();
    let flex_cal = CAL_STORE.lock().await.get();
    let mut session = Session {
        detector: RingDetector::new(RING_PRESENT_THRESHOLD, RING_MISSED_THRESHOLD),
        fusion: MotionFusion::new(ImuCalibration::default()),
        flex_cal,
        run: None,
        phase_deadline: None,
        recovery_at: None,
        last_report: None,
        ready: false,
    };

    // Initial bring-up. On failure the connection state stays
    // `Connecting` with the error published; `Reinitialize` retries,
    // `Disconnect` gives up.
    if bring_up_guarded(&mut session, writer, &exchange).await.is_err() {
        return Ok(());
    }

    loop {
        match select3(
            REPORTS.receive(),
            COMMANDS.receive(),
            Timer::at(next_deadline(&session)),
        )
        .await
        {
            Either3::First(frame) => handle_report(&mut session, &frame).await,
            Either3::Second(command) => match command {
                Command::Disconnect => {
                    info!("Disconnect requested");
                    return Ok(());
                }
                Command::StartScan => warn!("Already connected - scan ignored"),
                Command::Reinitialize => {
                    if bring_up_guarded(&mut session, writer, &exchange).await.is_err() {
                        return Ok(());
                    }
                }
                Command::StartCalibration => start_calibration(&mut session).await,
                Command::CancelCalibration => cancel_calibration(&mut session).await,
            },
            Either3::Third(()) => {
                if handle_deadlines(&mut session, writer, &exchange, flash)
                    .await
                    .is_err()
                {
                    return Ok(());
                }
            }
        }
    }
}

/// Run the MCU handshake while watching for a `Disconnect` command; the
/// command wins the race and cancels the sequence by dropping it.
/// Returns `Err(())` when disconnect was requested.
async fn bring_up_guarded(
    session: &mut Session,
    writer: &mut ReportWriter<'_>,
    exchange: &Exchange,
) -> Result<(), ()> {
    match select(bring_up(session, writer, exchange), wait_for_disconnect()).await {
        Either::First(()) => Ok(()),
        Either::Second(()) => {
            info!("Disconnect requested during handshake");
            Err(())
        }
    }
}

async fn bring_up(session: &mut Session, writer: &mut ReportWriter<'_>, exchange: &Exchange) {
    let first = !session.ready;

    match mcu::initialize(writer, &REPORTS, exchange).await {
        Ok(_detected) => {
            if first {
                let cal = mcu::read_imu_calibration(writer, &REPORTS, exchange).await;
                session.fusion = MotionFusion::new(cal);
            }
            session.ready = true;
            set_connection(ConnectionState::Connected).await;
            if first {
                EVENTS.send(DriverEvent::Connected).await;
            }
        }
        Err(e) => {
            // The link stays open; the accessory is just not ready.
            warn!("Handshake failed: {}", e);
            record_error(e).await;
        }
    }
}

/// Drain commands while a handshake is in flight. Only `Disconnect`
/// resolves; everything else is dropped with a note.
async fn wait_for_disconnect() {
    loop {
        match COMMANDS.receive().await {
            Command::Disconnect => return,
            other => warn!("Command {} ignored during handshake", other),
        }
    }
}

async fn handle_report(session: &mut Session, frame: &RawReport) {
    let now = Instant::now();

    let Some(input) = StandardInput::parse(frame) else {
        // Stray replies and unknown report ids.
        return;
    };
    let ring = RingSample::parse(frame);

    match session.detector.observe(ring.map(|s| s.present).unwrap_or(false)) {
        Some(AttachEdge::Attached) => {
            info!("Ring attached");
            session.recovery_at = None;
            with_state(|s| {
                s.attached = true;
                s.last_error = None;
            })
            .await;
            EVENTS.send(DriverEvent::RingAttached).await;
        }
        Some(AttachEdge::Detached) => {
            warn!("Ring detached - arming recovery");
            session.recovery_at = Some(now + Duration::from_millis(RECOVERY_INTERVAL_MS));
            with_state(|s| s.attached = false).await;
            EVENTS.send(DriverEvent::RingDetached).await;
        }
        None => {}
    }

    let mut orientation = None;
    if session.ready {
        let dt = session
            .last_report
            .map(|t| (now - t).as_micros() as f32 / 1_000_000.0)
            .unwrap_or(0.0);
        orientation = Some(session.fusion.update(&input.frames, dt));
    }
    session.last_report = Some(now);

    let mut flex = None;
    if let Some(sample) = ring {
        if let Some(run) = session.run.as_mut() {
            run.observe(sample.flex);
        }
        flex = Some(session.flex_cal.normalize(sample.flex));
    }

    let calibration = calib_snapshot(session, now);
    with_state(|s| {
        s.battery = Some(input.battery);
        if let Some(o) = orientation {
            s.orientation = o;
        }
        if let Some(f) = flex {
            s.flex = f;
        }
        s.calibration = calibration;
    })
    .await;
}

/// Earliest armed deadline, or a one-second housekeeping tick.
fn next_deadline(session: &Session) -> Instant {
    let mut deadline = Instant::now() + Duration::from_secs(1);
    if let Some(t) = session.phase_deadline {
        deadline = deadline.min(t);
    }
    if let Some(t) = session.recovery_at {
        deadline = deadline.min(t);
    }
    deadline
}

/// Fire whichever deadlines have elapsed. `Err(())` propagates a
/// disconnect requested during a recovery handshake.
async fn handle_deadlines(
    session: &mut Session,
    writer: &mut ReportWriter<'_>,
    exchange: &Exchange,
    flash: &mut Flash,
) -> Result<(), ()> {
    let now = Instant::now();

    if session.phase_deadline.map(|t| now >= t).unwrap_or(false) {
        advance_calibration(session, flash).await;
    }

    if session.recovery_at.map(|t| now >= t).unwrap_or(false) {
        info!("Recovery: re-running MCU handshake");
        bring_up_guarded(session, writer, exchange).await?;
        // Re-arm unless live reports already confirmed the ring back.
        session.recovery_at = if session.detector.attached() {
            None
        } else {
            Some(Instant::now() + Duration::from_millis(RECOVERY_INTERVAL_MS))
        };
    }

    let calibration = calib_snapshot(session, Instant::now());
    with_state(|s| s.calibration = calibration).await;
    Ok(())
}

async fn start_calibration(session: &mut Session) {
    if session.run.is_some() {
        warn!("Calibration already running - start ignored");
        return;
    }
    info!("Calibration started");
    session.run = Some(CalibrationRun::start(session.flex_cal));
    session.phase_deadline = Some(Instant::now() + Duration::from_millis(CALIB_PHASE_MS));
    with_state(|s| s.calibration = Some((CalibPhase::Neutral, CALIB_PHASE_MS as u32))).await;
}

async fn cancel_calibration(session: &mut Session) {
    let Some(run) = session.run.take() else {
        return;
    };
    info!("Calibration cancelled - restoring previous record");
    session.flex_cal = run.backup();
    session.phase_deadline = None;
    with_state(|s| s.calibration = None).await;
}

async fn advance_calibration(session: &mut Session, flash: &mut Flash) {
    let Some(run) = session.run.as_mut() else {
        session.phase_deadline = None;
        return;
    };
    let outcome = run.advance(FLEX_MIN_RANGE);
    let backup = run.backup();

    match outcome {
        PhaseOutcome::Continue(phase) => {
            info!("Calibration phase {}", phase);
            session.phase_deadline = Some(Instant::now() + Duration::from_millis(CALIB_PHASE_MS));
        }
        PhaseOutcome::Failed(reason) => {
            warn!("Calibration failed: {}", reason);
            session.flex_cal = backup;
            session.run = None;
            session.phase_deadline = None;
            record_error(Error::Calibration(reason)).await;
            EVENTS.send(DriverEvent::CalibrationFailed(reason)).await;
            with_state(|s| s.calibration = None).await;
        }
        PhaseOutcome::Complete(record) => {
            info!(
                "Calibration complete (neutral {} range {}..{})",
                record.neutral, record.min, record.max
            );
            session.flex_cal = record;
            session.run = None;
            session.phase_deadline = None;
            {
                let mut store = CAL_STORE.lock().await;
                store.set(record);
                store.save_to_flash(flash).await;
            }
            EVENTS.send(DriverEvent::CalibrationDone).await;
            with_state(|s| s.calibration = None).await;
        }
    }
}

fn calib_snapshot(session: &Session, now: Instant) -> Option<(CalibPhase, u32)> {
    let run = session.run.as_ref()?;
    let deadline = session.phase_deadline?;
    let remaining = if deadline > now {
        (deadline - now).as_millis() as u32
    } else {
        0
    };
    Some((run.phase(), remaining))
}

async fn with_state(f: impl FnOnce(&mut DriverState)) {
    let mut state = STATE.lock().await;
    f(&mut state);
}

async fn set_connection(connection: ConnectionState) {
    with_state(|s| s.connection = connection).await;
}

async fn record_error(e: Error) {
    warn!("Driver error: {}", e);
    with_state(|s| s.last_error = Some(e)).await;
    EVENTS.send(DriverEvent::Error(e)).await;
}

async fn clear_session_state() {
    with_state(|s| {
        s.connection = ConnectionState::Disconnected;
        s.attached = false;
        s.battery = None;
        s.flex = 0.5;
        s.orientation = Orientation::ZERO;
        s.calibration = None;
    })
    .await;
}

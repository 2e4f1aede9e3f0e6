//! Guided calibration: three touch points, then a pressure sweep.
//!
//! The session drives the controller through its calibration commands and
//! walks the user along via a step notifier the UI layer supplies. Points
//! are armed one at a time with `CAL_POINT`; after each accepted touch the
//! session settles briefly so the UI can move its crosshair before the
//! device re-arms. The pressure phase collects resistance extremes until
//! the device reports `STOP` (finger lifted) or a soft timeout expires.
//!
//! A successful run installs the solved calibration into the shared mapper
//! and persists it, so the event loop picks it up immediately and the next
//! launch restores it.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Instant, Timer};
use embedded_io_async::{Read, Write};
use log::{debug, info, warn};

use crate::config::{CALIBRATION_POINT_COUNT, PRESSURE_TIMEOUT_MS, SETTLE_DELAY_MS};
use crate::error::CalibrationError;
use crate::mapping::SharedMapper;
use crate::protocol::{FrameReader, HostCommand, Message, RawSample};
use crate::settings::{save_calibration, SettingsStore};
use crate::solve::{calibration_targets, solve_affine, solve_pressure, Calibration, TargetPoint};

/// Cooperative stop handle shared with whoever owns the UI.
pub type StopSignal = Signal<CriticalSectionRawMutex, ()>;

/// Session timing and display geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub display_width: i32,
    pub display_height: i32,
    /// Pause after each accepted point before the next one is armed.
    pub settle_delay: Duration,
    /// How long the pressure phase waits for traffic before giving up on a
    /// device-side `STOP`.
    pub pressure_timeout: Duration,
}

impl SessionConfig {
    pub fn new(display_width: i32, display_height: i32) -> Self {
        Self {
            display_width,
            display_height,
            settle_delay: Duration::from_millis(SETTLE_DELAY_MS),
            pressure_timeout: Duration::from_millis(PRESSURE_TIMEOUT_MS),
        }
    }
}

/// Where the session currently is; readable after `run` returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    CollectingPoints,
    MeasuringPressure,
    Solving,
    Finished,
    Failed,
}

/// Progress events for the calibration UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationStep {
    /// Draw the crosshair at `target` and wait for touch `index`.
    ShowTarget { index: usize, target: TargetPoint },
    PointAccepted { index: usize },
    /// Ask the user to press one spot with varying force.
    PressurePhase,
    Solving,
    Finished,
}

/// Outcome of the pressure phase: whether the device announced the end
/// itself or the host has to.
enum Phase {
    DeviceStopped,
    HostEnds,
}

/// One guided calibration run over a serial channel.
pub struct CalibrationSession<'a, R> {
    reader: FrameReader<R>,
    config: SessionConfig,
    mapper: &'a SharedMapper,
    stop: &'a StopSignal,
    state: SessionState,
}

impl<'a, R: Read + Write> CalibrationSession<'a, R> {
    pub fn new(
        channel: R,
        config: SessionConfig,
        mapper: &'a SharedMapper,
        stop: &'a StopSignal,
    ) -> Self {
        Self {
            reader: FrameReader::new(channel),
            config,
            mapper,
            stop,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Hands the channel back after the run, so the event loop can resume
    /// on the same connection.
    pub fn release(self) -> R {
        self.reader.release()
    }

    /// Runs the whole session. On success the solved calibration is already
    /// installed in the shared mapper and saved to `store`.
    pub async fn run<S, N>(
        &mut self,
        store: &mut S,
        notify: &mut N,
    ) -> Result<Calibration, CalibrationError>
    where
        S: SettingsStore,
        N: FnMut(CalibrationStep),
    {
        let result = self.drive(store, notify).await;
        match &result {
            Ok(_) => self.state = SessionState::Finished,
            Err(e) => {
                self.state = SessionState::Failed;
                warn!("calibration failed: {}", e);
            }
        }
        result
    }

    async fn drive<S, N>(
        &mut self,
        store: &mut S,
        notify: &mut N,
    ) -> Result<Calibration, CalibrationError>
    where
        S: SettingsStore,
        N: FnMut(CalibrationStep),
    {
        let targets = calibration_targets(self.config.display_width, self.config.display_height);
        let mut touches = [RawSample::default(); CALIBRATION_POINT_COUNT];

        self.state = SessionState::CollectingPoints;
        for (index, target) in targets.iter().enumerate() {
            notify(CalibrationStep::ShowTarget {
                index,
                target: *target,
            });
            self.reader.send(HostCommand::CalPoint).await?;
            touches[index] = self.await_point().await?;
            debug!("point {} accepted: {:?}", index, touches[index]);
            notify(CalibrationStep::PointAccepted { index });
            Timer::after(self.config.settle_delay).await;
        }

        self.state = SessionState::MeasuringPressure;
        notify(CalibrationStep::PressurePhase);
        self.reader.send(HostCommand::CalPressure).await?;
        let (res_min, res_max, phase) = self.sweep_pressure().await?;
        if matches!(phase, Phase::HostEnds) {
            self.reader.send(HostCommand::CalPressureEnd).await?;
        }

        self.state = SessionState::Solving;
        notify(CalibrationStep::Solving);
        let calibration = Calibration {
            affine: solve_affine(&touches, &targets)?,
            pressure: solve_pressure(res_min, res_max)?,
        };

        self.mapper.install(calibration);
        save_calibration(store, &calibration);
        info!("calibration solved and installed");
        notify(CalibrationStep::Finished);
        Ok(calibration)
    }

    /// Waits for the next coordinate frame. Any point name counts; the
    /// armed controller reports exactly one point per `CAL_POINT`.
    async fn await_point(&mut self) -> Result<RawSample, CalibrationError> {
        loop {
            match select(self.reader.next_message(), self.stop.wait()).await {
                Either::First(message) => match message? {
                    Message::Point { sample, .. } => return Ok(sample),
                    Message::Log { text } => debug!("device: {}", text),
                    message if message.is_stop() => return Err(CalibrationError::Cancelled),
                    message => debug!("ignoring {:?} while waiting for a point", message),
                },
                Either::Second(()) => return Err(CalibrationError::Cancelled),
            }
        }
    }

    /// Collects resistance extremes until the device stops, the caller
    /// stops, or the soft deadline passes. The deadline is fixed at phase
    /// entry, not per frame, so a chatty controller cannot stretch the
    /// phase forever.
    async fn sweep_pressure(&mut self) -> Result<(i32, i32, Phase), CalibrationError> {
        let deadline = Instant::now() + self.config.pressure_timeout;
        let mut res_min = i32::MAX;
        let mut res_max = i32::MIN;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining == Duration::from_ticks(0) {
                debug!("pressure sweep deadline reached");
                return Ok((res_min, res_max, Phase::HostEnds));
            }
            let event = with_timeout(
                remaining,
                select(self.reader.next_message(), self.stop.wait()),
            )
            .await;
            match event {
                Err(_) => {
                    debug!("pressure sweep deadline reached");
                    return Ok((res_min, res_max, Phase::HostEnds));
                }
                Ok(Either::Second(())) => return Ok((res_min, res_max, Phase::HostEnds)),
                Ok(Either::First(message)) => match message? {
                    Message::Point { sample, .. } => {
                        res_min = res_min.min(sample.z);
                        res_max = res_max.max(sample.z);
                    }
                    Message::Log { text } => debug!("device: {}", text),
                    message if message.is_stop() => {
                        return Ok((res_min, res_max, Phase::DeviceStopped))
                    }
                    message => debug!("ignoring {:?} during pressure sweep", message),
                },
            }
        }
    }
}

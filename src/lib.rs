//! Host-side bridge for an Arduino-class resistive touchscreen controller.
//!
//! The controller sits on the far side of a serial byte channel (Bluetooth
//! RFCOMM or USB-serial) and speaks a `<...>`-delimited ASCII protocol. This
//! crate turns that byte stream into calibrated touch events:
//!
//! - [`protocol`] recovers framed messages from the raw stream,
//! - [`solve`] fits the three-point affine transform and the pressure range,
//! - [`mapping`] applies the fit, rotation-corrected, to each raw sample,
//! - [`session`] walks the user through point and pressure acquisition,
//! - [`event_loop`] runs the steady-state decode-map-deliver loop.
//!
//! The transport itself, the input-injection sink, calibration UI, and
//! settings persistence are collaborators: any `embedded_io_async` channel,
//! an `FnMut` delivery callback, an `FnMut` step notifier, and the
//! [`settings::SettingsStore`] trait.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod event_loop;
pub mod mapping;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod solve;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{CalibrationError, ChannelError, DecodeError, ReadError};
pub use event_loop::TouchEventLoop;
pub use mapping::{CoordinateMapper, HostSample, Rotation, SharedMapper};
pub use protocol::{FrameDecoder, FrameReader, HostCommand, Message, RawSample};
pub use session::{CalibrationSession, CalibrationStep, SessionConfig, SessionState, StopSignal};
pub use settings::{clear_calibration, load_calibration, save_calibration, SettingsStore};
pub use solve::{
    calibration_targets, solve_affine, solve_pressure, AffineCoefficients, Calibration,
    PressureCoefficients, TargetPoint,
};

//! Raw-sample to host-event coordinate mapping.
//!
//! The affine fit from [`crate::solve`] puts samples into the display's
//! natural orientation; the mapper then corrects for the host's current
//! screen rotation and clamps into the visible area. [`SharedMapper`] wraps
//! a mapper for concurrent use, so a finished calibration session can swap
//! in new coefficients while the event loop keeps mapping.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::protocol::RawSample;
use crate::solve::Calibration;

/// Host screen rotation, counter-clockwise from the display's natural
/// orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parses the rotation values a host windowing layer reports.
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/// A mapped touch ready for the host input sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HostSample {
    pub x: i32,
    pub y: i32,
    pub pressure: i32,
}

/// Applies calibration, rotation, and clamping to raw samples.
///
/// `x_max`/`y_max` are the highest valid pixel coordinates in the natural
/// orientation (width-1, height-1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    calibration: Calibration,
    rotation: Rotation,
    x_max: i32,
    y_max: i32,
}

impl CoordinateMapper {
    /// A pass-through mapper for the given display bounds. Raw coordinates
    /// are clamped but otherwise untouched until a calibration is installed.
    pub const fn identity(x_max: i32, y_max: i32) -> Self {
        Self {
            calibration: Calibration::IDENTITY,
            rotation: Rotation::Deg0,
            x_max,
            y_max,
        }
    }

    pub const fn new(calibration: Calibration, rotation: Rotation, x_max: i32, y_max: i32) -> Self {
        Self {
            calibration,
            rotation,
            x_max,
            y_max,
        }
    }

    pub fn set_calibration(&mut self, calibration: Calibration) {
        self.calibration = calibration;
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Raw sample to host sample: affine transform, rotate, clamp, then the
    /// pressure ramp.
    pub fn map(&self, sample: RawSample) -> HostSample {
        let (x, y) = self.calibration.affine.apply(sample);
        let (x, y) = match self.rotation {
            Rotation::Deg0 => (x, y),
            Rotation::Deg90 => (y, self.x_max - x),
            Rotation::Deg180 => (self.x_max - x, self.y_max - y),
            Rotation::Deg270 => (self.y_max - y, x),
        };
        HostSample {
            x: x.clamp(0, self.x_max),
            y: y.clamp(0, self.y_max),
            pressure: self.calibration.pressure.apply(sample.z),
        }
    }
}

/// A mapper shared between the calibration session (writer) and the touch
/// event loop (reader). Mapping is a handful of multiplies, so a blocking
/// critical-section mutex is enough.
pub struct SharedMapper {
    inner: Mutex<CriticalSectionRawMutex, RefCell<CoordinateMapper>>,
}

impl SharedMapper {
    pub const fn new(mapper: CoordinateMapper) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(mapper)),
        }
    }

    /// Swaps in a freshly solved calibration.
    pub fn install(&self, calibration: Calibration) {
        self.inner
            .lock(|cell| cell.borrow_mut().set_calibration(calibration));
    }

    pub fn set_rotation(&self, rotation: Rotation) {
        self.inner
            .lock(|cell| cell.borrow_mut().set_rotation(rotation));
    }

    pub fn map(&self, sample: RawSample) -> HostSample {
        self.inner.lock(|cell| cell.borrow().map(sample))
    }

    pub fn snapshot(&self) -> CoordinateMapper {
        self.inner.lock(|cell| *cell.borrow())
    }
}

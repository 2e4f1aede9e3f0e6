//! Three-point affine calibration and pressure-range fitting.
//!
//! The controller reports raw ADC coordinates; the host needs display
//! coordinates. Three touch points on known display targets determine the
//! six-coefficient affine transform exactly. Pressure is a separate linear
//! ramp fitted from the lightest and firmest resistance seen while the user
//! varies finger pressure on one spot.

use crate::config::{PRESSURE_MAX, PRESSURE_SPAN, TARGET_INSET_DIVISOR};
use crate::error::CalibrationError;
use crate::protocol::RawSample;

/// Guard against coefficient blow-up from near-collinear touch points.
const DEGENERACY_EPSILON: f32 = 1e-6;

/// A display-space calibration target, zero-indexed pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetPoint {
    pub x: i32,
    pub y: i32,
}

/// `display_x = a*raw_x + b*raw_y + c`, `display_y = d*raw_x + e*raw_y + f`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineCoefficients {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl AffineCoefficients {
    /// Passes raw coordinates through unchanged. Placeholder until a real
    /// calibration is loaded or solved.
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
        e: 1.0,
        f: 0.0,
    };

    pub fn apply(&self, sample: RawSample) -> (i32, i32) {
        let rx = sample.x as f32;
        let ry = sample.y as f32;
        (
            round(self.a * rx + self.b * ry + self.c),
            round(self.d * rx + self.e * ry + self.f),
        )
    }
}

/// Linear resistance-to-pressure ramp. Raw resistance drops as the press
/// firms up, so the ramp inverts: lightest touch maps near 0, firmest near
/// [`PRESSURE_MAX`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PressureCoefficients {
    pub offset: f32,
    pub scale: f32,
}

impl PressureCoefficients {
    /// Maps every resistance to full pressure; used before any pressure
    /// calibration exists so uncalibrated taps still register as presses.
    pub const IDENTITY: Self = Self {
        offset: 0.0,
        scale: 0.0,
    };

    pub fn apply(&self, z: i32) -> i32 {
        let pressure = round(PRESSURE_MAX as f32 - (z as f32 - self.offset) * self.scale);
        pressure.clamp(0, PRESSURE_MAX)
    }
}

/// The complete fit: coordinate transform plus pressure ramp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    pub affine: AffineCoefficients,
    pub pressure: PressureCoefficients,
}

impl Calibration {
    pub const IDENTITY: Self = Self {
        affine: AffineCoefficients::IDENTITY,
        pressure: PressureCoefficients::IDENTITY,
    };
}

/// Where the user is asked to touch on a `width` x `height` display:
/// mid-right, bottom-center, top-left, each inset a tenth of the display
/// from its edges. Spreading the points across both axes keeps the solve
/// well-conditioned.
pub fn calibration_targets(width: i32, height: i32) -> [TargetPoint; 3] {
    let x_inset = width / TARGET_INSET_DIVISOR;
    let y_inset = height / TARGET_INSET_DIVISOR;
    [
        TargetPoint {
            x: width - x_inset - 1,
            y: height / 2 - 1,
        },
        TargetPoint {
            x: width / 2 - 1,
            y: height - y_inset - 1,
        },
        TargetPoint {
            x: x_inset - 1,
            y: y_inset - 1,
        },
    ]
}

/// Solves the affine transform that carries the three raw touches onto the
/// three display targets. Fails with [`CalibrationError::Degenerate`] when
/// the touches are collinear or duplicated, rather than emitting NaN or
/// infinite coefficients.
pub fn solve_affine(
    raw: &[RawSample; 3],
    targets: &[TargetPoint; 3],
) -> Result<AffineCoefficients, CalibrationError> {
    let (t1x, t1y) = (raw[0].x as f32, raw[0].y as f32);
    let (t2x, t2y) = (raw[1].x as f32, raw[1].y as f32);
    let (t3x, t3y) = (raw[2].x as f32, raw[2].y as f32);
    let (d1x, d1y) = (targets[0].x as f32, targets[0].y as f32);
    let (d2x, d2y) = (targets[1].x as f32, targets[1].y as f32);
    let (d3x, d3y) = (targets[2].x as f32, targets[2].y as f32);

    // Twice the signed area of the raw-point triangle; zero means collinear.
    let denom = t1x * (t2y - t3y) + t2x * (t3y - t1y) + t3x * (t1y - t2y);
    if abs(denom) < DEGENERACY_EPSILON || abs(t2y - t3y) < DEGENERACY_EPSILON {
        return Err(CalibrationError::Degenerate);
    }

    let a = (d1x * (t2y - t3y) + d2x * (t3y - t1y) + d3x * (t1y - t2y)) / denom;
    let b = (a * (t3x - t2x) + d2x - d3x) / (t2y - t3y);
    let c = d3x - a * t3x - b * t3y;

    let d = (d1y * (t2y - t3y) + d2y * (t3y - t1y) + d3y * (t1y - t2y)) / denom;
    let e = (d * (t3x - t2x) + d2y - d3y) / (t2y - t3y);
    let f = d3y - d * t3x - e * t3y;

    Ok(AffineCoefficients { a, b, c, d, e, f })
}

/// Fits the pressure ramp from the resistance extremes observed during the
/// pressure phase. An empty or inverted range is degenerate.
pub fn solve_pressure(
    res_min: i32,
    res_max: i32,
) -> Result<PressureCoefficients, CalibrationError> {
    if res_max <= res_min {
        return Err(CalibrationError::Degenerate);
    }
    Ok(PressureCoefficients {
        offset: res_min as f32,
        scale: PRESSURE_SPAN / (res_max - res_min) as f32,
    })
}

/// Round-half-away-from-zero; `f32::round` is not available without std.
fn round(v: f32) -> i32 {
    if v >= 0.0 {
        (v + 0.5) as i32
    } else {
        (v - 0.5) as i32
    }
}

fn abs(v: f32) -> f32 {
    if v < 0.0 {
        -v
    } else {
        v
    }
}

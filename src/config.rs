//! Protocol and calibration tuning constants.

/// Longest accepted frame body between the `<` and `>` delimiters. Anything
/// larger is treated as line noise and dropped until the next `<`.
pub const FRAME_BODY_MAX: usize = 64;
/// Cap for the first token of a frame (command or point name).
pub const NAME_MAX: usize = 16;
/// Cap for log text and command arguments.
pub const TEXT_MAX: usize = 48;
/// Per-read chunk size for the framed reader.
pub const READ_CHUNK: usize = 64;

/// Calibration touch points acquired per run.
pub const CALIBRATION_POINT_COUNT: usize = 3;
/// Settle time between accepted calibration points, so the UI can animate to
/// the next target before the device re-arms.
pub const SETTLE_DELAY_MS: u64 = 1_000;
/// The controller does not always send `STOP` after the finger lifts during
/// pressure acquisition; stop waiting after this long and keep what we have.
pub const PRESSURE_TIMEOUT_MS: u64 = 10_000;

/// Calibration targets sit one tenth of the display in from the edges.
pub const TARGET_INSET_DIVISOR: i32 = 10;
/// Highest host pressure value.
pub const PRESSURE_MAX: i32 = 255;
/// Span of the resistance-to-pressure ramp.
pub const PRESSURE_SPAN: f32 = 256.0;

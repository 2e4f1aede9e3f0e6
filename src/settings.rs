//! Calibration persistence behind a key-value store trait.
//!
//! The host platform owns the actual storage (preferences file, registry,
//! flash page); this module only fixes the key names and the shape of a
//! complete record. A calibration is loaded only when the `calibrated` flag
//! and every coefficient are present, so a half-written record falls back
//! to the identity mapping instead of garbage.

use crate::solve::{AffineCoefficients, Calibration, PressureCoefficients};

/// Key-value backend for calibration state. Getters return `None` for keys
/// never written; writes are fire-and-forget like a preferences store.
pub trait SettingsStore {
    fn get_f32(&self, key: &str) -> Option<f32>;
    fn put_f32(&mut self, key: &str, value: f32);
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn put_bool(&mut self, key: &str, value: bool);
}

pub mod keys {
    pub const CALIBRATED: &str = "pref_key_calibrated";
    pub const CAL_A: &str = "pref_key_cal_a";
    pub const CAL_B: &str = "pref_key_cal_b";
    pub const CAL_C: &str = "pref_key_cal_c";
    pub const CAL_D: &str = "pref_key_cal_d";
    pub const CAL_E: &str = "pref_key_cal_e";
    pub const CAL_F: &str = "pref_key_cal_f";
    pub const PRESSURE_OFFSET: &str = "pref_key_pressure_offset";
    pub const PRESSURE_SCALE: &str = "pref_key_pressure_scale";
}

/// Writes all eight coefficients, then the `calibrated` flag last.
pub fn save_calibration<S: SettingsStore>(store: &mut S, calibration: &Calibration) {
    store.put_f32(keys::CAL_A, calibration.affine.a);
    store.put_f32(keys::CAL_B, calibration.affine.b);
    store.put_f32(keys::CAL_C, calibration.affine.c);
    store.put_f32(keys::CAL_D, calibration.affine.d);
    store.put_f32(keys::CAL_E, calibration.affine.e);
    store.put_f32(keys::CAL_F, calibration.affine.f);
    store.put_f32(keys::PRESSURE_OFFSET, calibration.pressure.offset);
    store.put_f32(keys::PRESSURE_SCALE, calibration.pressure.scale);
    store.put_bool(keys::CALIBRATED, true);
}

/// Returns the stored calibration, or `None` when the device has never been
/// calibrated or the record is incomplete.
pub fn load_calibration<S: SettingsStore>(store: &S) -> Option<Calibration> {
    if !store.get_bool(keys::CALIBRATED)? {
        return None;
    }
    Some(Calibration {
        affine: AffineCoefficients {
            a: store.get_f32(keys::CAL_A)?,
            b: store.get_f32(keys::CAL_B)?,
            c: store.get_f32(keys::CAL_C)?,
            d: store.get_f32(keys::CAL_D)?,
            e: store.get_f32(keys::CAL_E)?,
            f: store.get_f32(keys::CAL_F)?,
        },
        pressure: PressureCoefficients {
            offset: store.get_f32(keys::PRESSURE_OFFSET)?,
            scale: store.get_f32(keys::PRESSURE_SCALE)?,
        },
    })
}

/// Clears the flag so the next load falls back to identity. The stale
/// coefficients stay behind; they are unreachable without the flag.
pub fn clear_calibration<S: SettingsStore>(store: &mut S) {
    store.put_bool(keys::CALIBRATED, false);
}

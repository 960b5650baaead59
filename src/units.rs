//! Conversions between physical quantities and device command codes.
//!
//! The tracer hardware takes integer codes, not volts or amperes: the base
//! current DAC is programmed in microamps and the collector voltage DAC in
//! millivolts. All conversions here are pure and all range limits clamp
//! silently; an out-of-range request saturates instead of erroring so a bad
//! sweep specification can never overdrive the device under test.

/// Upper limit of the base/diode current DAC.
pub const BASE_CURRENT_MAX_A: f64 = 5.0e-3;

/// Upper limit of the collector voltage DAC.
pub const COLLECTOR_VOLTAGE_MAX_V: f64 = 20.0;

/// Empirical emitter shunt resistance used to infer current from the
/// measured voltage drop.
pub const EMITTER_SHUNT_OHMS: f64 = 1000.0;

/// Convert a base current in amperes to the integer `B` command code
/// (microamps), saturating to `[0, 5 mA]`.
pub fn base_current_code(amps: f64) -> u16 {
    (amps.clamp(0.0, BASE_CURRENT_MAX_A) * 1.0e6).round() as u16
}

/// Convert a collector voltage in volts to the integer `C` command code
/// (millivolts), saturating to `[0, 20 V]`.
pub fn collector_voltage_code(volts: f64) -> u16 {
    (volts.clamp(0.0, COLLECTOR_VOLTAGE_MAX_V) * 1.0e3).round() as u16
}

/// Infer the emitter current from the voltage across the emitter shunt.
pub fn emitter_current(shunt_volts: f64) -> f64 {
    shunt_volts / EMITTER_SHUNT_OHMS
}

//! Millimeter fixed-point helpers for the bus encoding.
//!
//! The board exchanges positions as big-endian `i16`. Telemetry is always in
//! millimeters; command fields are scaled by a configurable factor.

/// Millimeters per meter.
pub const MM_PER_M: f64 = 1000.0;

/// Height channel multiplier the board expects: the value goes out as a plain `(int16_t)` cast.
pub const RAW_Z_SCALE: f64 = 1.0;

/// Decode a millimeter field to meters.
#[inline]
pub fn mm_to_m(mm: i16) -> f64 {
    f64::from(mm) / MM_PER_M
}

/// Truncate toward zero and wrap into `i16`, matching a C-style `(int16_t)` cast
/// on the board side. NaN maps to 0.
#[inline]
pub fn wrap_to_i16(v: f64) -> i16 {
    if v.is_nan() {
        return 0;
    }
    // f64 -> i64 saturates, i64 -> i16 keeps the low 16 bits.
    (v.trunc() as i64) as i16
}

/// Scale a meter value and pack it with wrapping semantics.
#[inline]
pub fn scale_to_i16(meters: f64, scale: f64) -> i16 {
    wrap_to_i16(meters * scale)
}

#[inline]
pub fn read_be_i16(bytes: &[u8], at: usize) -> Option<i16> {
    let hi = *bytes.get(at)?;
    let lo = *bytes.get(at + 1)?;
    Some(i16::from_be_bytes([hi, lo]))
}

//! Shared numeric helpers: directive float formatting, tolerance rounding and
//! safe matrix inversion.

use glam::DMat4;

/// Decimal digits used when printing floats into the directive stream.
pub const OBJ_FLOAT_PRECISION: u32 = 8;

/// Default decimal digits for "is this effectively zero" and axis-equality
/// checks on keyframe data.
pub const DEFAULT_KEYFRAME_PRECISION: u32 = 5;

/// Round `v` to `digits` decimal digits.
pub fn round_to(v: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (v * factor).round() / factor
}

/// True when `v` rounds to zero at `digits` decimal digits.
pub fn is_zero(v: f64, digits: u32) -> bool {
    round_to(v, digits) == 0.0
}

/// Format a float the way the OBJ8 directive stream expects: fixed precision
/// with trailing zeros and any trailing decimal point stripped.
pub fn float_to_str(n: f64) -> String {
    let n = round_to(n, OBJ_FLOAT_PRECISION);
    if n == n.trunc() && n.abs() < 1e15 {
        // Integral values print without a fraction; -0.0 collapses to "0".
        format!("{}", n.trunc() as i64)
    } else {
        let s = format!("{:.*}", OBJ_FLOAT_PRECISION as usize, n);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Invert a matrix, falling back to identity when it is singular.
pub fn safe_inverse(m: &DMat4) -> DMat4 {
    if m.determinant().abs() <= f64::EPSILON {
        DMat4::IDENTITY
    } else {
        m.inverse()
    }
}

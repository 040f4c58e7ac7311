//! Integer rounding helpers
//!
//! All rounding in the engine is "round half away from zero". Scaling uses
//! exact rational arithmetic so no intermediate float can move a value
//! across a `.5` boundary.

/// `round(value × numerator / denominator)`, half away from zero.
///
/// `denominator` must be positive.
pub fn round_ratio(value: i64, numerator: i64, denominator: i64) -> i64 {
    debug_assert!(denominator > 0, "denominator must be positive");
    let n = value as i128 * numerator as i128;
    let d = denominator as i128;
    let rounded = if n >= 0 {
        (2 * n + d) / (2 * d)
    } else {
        -((-2 * n + d) / (2 * d))
    };
    rounded as i64
}

/// Round a float half away from zero into an integer.
pub fn round_f64(value: f64) -> i64 {
    value.round() as i64
}

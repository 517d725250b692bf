//! Small numeric helpers shared by the ledger and instrument variations.

/// Returns the sign of a value as -1, 0 or 1.
pub fn sign(value: i64) -> i64 {
    match value {
        v if v > 0 => 1,
        v if v < 0 => -1,
        _ => 0,
    }
}

/// Rounds a value to a multiple of `step` using the provided rounding function.
pub fn round_step(value: f64, step: f64, round: fn(f64) -> f64) -> f64 {
    round(value / step) * step
}

/// Rounds a value down to a multiple of `step`.
pub fn round_step_floor(value: f64, step: f64) -> f64 {
    round_step(value, step, f64::floor)
}

/// Rounds a value up to a multiple of `step`.
pub fn round_step_ceil(value: f64, step: f64) -> f64 {
    round_step(value, step, f64::ceil)
}

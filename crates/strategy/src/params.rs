//! Typed access to the open parameter map of a strategy definition.
//!
//! A missing key falls back to the default. A present key with the wrong type
//! is an `InvalidParameter` error, never silently replaced.

use common::{Error, Params, Result};

pub fn param_f64(params: &Params, key: &str, default: f64) -> Result<f64> {
    match params.get(key) {
        None => Ok(default),
        Some(value) => as_f64(key, value),
    }
}

pub fn required_f64(params: &Params, key: &str) -> Result<f64> {
    match params.get(key) {
        None => Err(Error::invalid_param(key, "is required")),
        Some(value) => as_f64(key, value),
    }
}

pub fn param_usize(params: &Params, key: &str, default: usize) -> Result<usize> {
    let Some(value) = params.get(key) else {
        return Ok(default);
    };
    if let Some(n) = value.as_u64() {
        return Ok(n as usize);
    }
    // TOML and JSON clients sometimes send whole numbers as floats
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as usize),
        _ => Err(Error::invalid_param(key, format!("expected a non-negative integer, got {value}"))),
    }
}

fn as_f64(key: &str, value: &serde_json::Value) -> Result<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| Error::invalid_param(key, format!("expected a number, got {value}")))
}

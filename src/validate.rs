//! Input validation for the service boundary
//!
//! The engine assumes symbols are well-formed, batches are non-empty and
//! finite, and window exponents are in range. These checks establish that
//! before a request reaches it.

use crate::error::{Result, StatsError};
use crate::window::WindowExponent;

/// Default maximum symbol length, in characters
pub const DEFAULT_MAX_SYMBOL_LEN: usize = 20;

/// Default maximum number of samples per batch
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;

/// Limits applied to incoming requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum symbol length, in characters
    pub max_symbol_len: usize,
    /// Maximum number of samples per batch
    pub max_batch_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_symbol_len: DEFAULT_MAX_SYMBOL_LEN,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl Limits {
    /// Check a symbol
    pub fn symbol<'a>(&self, symbol: &'a str) -> Result<&'a str> {
        validate_symbol(symbol, self.max_symbol_len)
    }

    /// Check a batch of samples
    pub fn batch<'a>(&self, values: &'a [f64]) -> Result<&'a [f64]> {
        validate_batch(values, self.max_batch_size)
    }
}

/// Symbol must be non-empty and at most `max_len` characters
pub fn validate_symbol(symbol: &str, max_len: usize) -> Result<&str> {
    if symbol.is_empty() {
        return Err(StatsError::InvalidSymbol(
            "Symbol must be non-empty".to_string(),
        ));
    }
    if symbol.chars().count() > max_len {
        return Err(StatsError::InvalidSymbol(format!(
            "Symbol must not exceed {} characters",
            max_len
        )));
    }
    Ok(symbol)
}

/// Batch must hold between 1 and `max_size` finite values
pub fn validate_batch(values: &[f64], max_size: usize) -> Result<&[f64]> {
    if values.is_empty() {
        return Err(StatsError::InvalidBatch(
            "Batch must contain at least 1 value".to_string(),
        ));
    }
    if values.len() > max_size {
        return Err(StatsError::InvalidBatch(format!(
            "Batch must contain at most {} values, got {}",
            max_size,
            values.len()
        )));
    }
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(StatsError::InvalidBatch(format!(
            "Value at index {} is not a finite number",
            pos
        )));
    }
    Ok(values)
}

/// Window exponent must be in `[1, 8]`
pub fn validate_window_exponent(k: i64) -> Result<WindowExponent> {
    WindowExponent::new(k)
}

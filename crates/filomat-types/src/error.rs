use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid color hex {value:?}: expected 6 or 8 hex digits without '#'")]
    InvalidColorHex { value: String },

    #[error("invalid temperature for {field}: {value:?} is not a decimal number")]
    InvalidTemperature { field: &'static str, value: String },

    #[error("invalid capacity {0:?}")]
    InvalidCapacity(String),
}

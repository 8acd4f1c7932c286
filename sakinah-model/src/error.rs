use thiserror::Error;

pub type ValidationResult<T> = Result<T, ValidationError>;

/// A domain value outside its allowed range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u8,
        max: u8,
        value: String,
    },

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("entry id must not be empty")]
    EmptyId,
}

use thiserror::Error;

/// Errors raised synchronously by timer construction, mutation and option handling
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    /// The time string is not `SS`, `MM:SS`, `HH:MM:SS` or a date-time
    #[error("Expected time format (HH:MM:SS, MM:SS or SS), instead got: {0}")]
    InvalidTimeFormat(String),
    /// The time is below zero, or a deadline that has already passed
    #[error("Expected a time of zero or more, instead got: {0}")]
    NegativeTime(String),
    /// The time came from a loosely typed source and was neither a string nor a number
    #[error("Expected time to be a string or number, instead got: {0}")]
    InvalidTimeType(String),
    /// The time is larger than 999:59:59
    #[error("Sorry, we don't support any time over 999:59:59, got: {0}")]
    TimeExceedsMaximum(String),
    #[error("Invalid output format {format:?}: {reason}")]
    InvalidOutputFormat { format: String, reason: String },
    #[error("Invalid value for option {option}: {reason}")]
    InvalidOptionType { option: String, reason: String },
    /// The timer was destroyed and cannot be used again
    #[error("Timer has been destroyed")]
    Destroyed,
}

pub type Result<T, E = TimerError> = std::result::Result<T, E>;

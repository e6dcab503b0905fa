//! Error types for ClockEngine

use thiserror::Error;

use crate::types::{BindingId, ClockId, TimerId};

/// Errors returned by registry, clock and timer operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClockError {
    #[error("Invalid tick size {value}: must be strictly positive")]
    InvalidTickSize { value: f64 },

    #[error("Invalid timer interval {value}: must be strictly positive")]
    InvalidInterval { value: f64 },

    #[error("Invalid timer repetition: count must be at least 1")]
    InvalidRepetition,

    #[error("Invalid modifier value {value}")]
    InvalidModifierValue { value: f64 },

    #[error("Invalid elapsed time {value}: must be finite and non-negative")]
    InvalidElapsedTime { value: f64 },

    #[error("Clock '{name}' not found")]
    ClockNotFound { name: String },

    #[error("Clock {0} does not exist")]
    UnknownClock(ClockId),

    #[error("Binding {0} is not registered")]
    BindingNotFound(BindingId),

    #[error("Binding {0} was already unregistered")]
    BindingAlreadyRemoved(BindingId),

    #[error("Timer {0} not found")]
    TimerNotFound(TimerId),

    #[error("Timer {0} was already removed or expired")]
    TimerAlreadyRemoved(TimerId),

    #[error("Clock '{name}' already exists")]
    ClockAlreadyExists { name: String },

    #[error("The reference clock cannot be deleted")]
    ReferenceClockProtected,

    #[error("Operation not allowed while clocks are updating")]
    UpdateLocked,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`ClockError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    /// Removal of something already removed; reported but non-fatal
    NoOpRemoval,
    Locked,
    Config,
}

impl ClockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClockError::InvalidTickSize { .. }
            | ClockError::InvalidInterval { .. }
            | ClockError::InvalidRepetition
            | ClockError::InvalidModifierValue { .. }
            | ClockError::InvalidElapsedTime { .. }
            | ClockError::ReferenceClockProtected => ErrorKind::InvalidArgument,
            ClockError::ClockNotFound { .. }
            | ClockError::UnknownClock(_)
            | ClockError::BindingNotFound(_)
            | ClockError::TimerNotFound(_) => ErrorKind::NotFound,
            ClockError::BindingAlreadyRemoved(_) | ClockError::TimerAlreadyRemoved(_) => {
                ErrorKind::NoOpRemoval
            }
            ClockError::ClockAlreadyExists { .. } => ErrorKind::AlreadyExists,
            ClockError::UpdateLocked => ErrorKind::Locked,
            ClockError::Config(_) => ErrorKind::Config,
        }
    }

    /// True for errors the caller may safely ignore
    pub fn is_benign(&self) -> bool {
        self.kind() == ErrorKind::NoOpRemoval
    }
}

impl From<toml::de::Error> for ClockError {
    fn from(err: toml::de::Error) -> Self {
        ClockError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ClockError {
    fn from(err: toml::ser::Error) -> Self {
        ClockError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ClockError {
    fn from(err: std::io::Error) -> Self {
        ClockError::Config(err.to_string())
    }
}

//! Crate-wide error type for the handful of genuinely fallible operations
//! (file I/O, CLI parsing) at the system boundary. The sample-rate pipeline
//! itself never returns `Result` — see spec §7.

use std::fmt;

#[derive(Debug)]
pub enum ReceiverError {
    Io(std::io::Error),
    BadArgs(String),
}

impl fmt::Display for ReceiverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverError::Io(e) => write!(f, "I/O error: {e}"),
            ReceiverError::BadArgs(s) => write!(f, "bad arguments: {s}"),
        }
    }
}

impl std::error::Error for ReceiverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReceiverError::Io(e) => Some(e),
            ReceiverError::BadArgs(_) => None,
        }
    }
}

impl From<std::io::Error> for ReceiverError {
    fn from(e: std::io::Error) -> Self {
        ReceiverError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, ReceiverError>;

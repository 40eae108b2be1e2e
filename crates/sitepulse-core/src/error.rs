//! Workspace error type.

use thiserror::Error;

/// Errors surfaced by SitePulse core components.
#[derive(Debug, Error)]
pub enum SitePulseError {
    /// Configuration could not be read, parsed, or written.
    #[error("config error: {0}")]
    Config(String),
    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SitePulseError>;

//! # Error Types
//!
//! This module defines all error types for the RTTTL player.
//!
//! Parse errors carry the byte offset in the tune text so a caller can point at the
//! offending character. Nothing in the engine panics on bad input: every failure is a
//! value the caller can inspect.
//!
//! ## Error Types
//! - `MalformedTune` - Missing `:` separator, zero duration or tempo
//! - `ChannelFull` - The background worker did not accept a command in time
//! - `WorkerStopped` - The background worker has exited
//! - `ConfigError` - Invalid YAML player configuration
//!
//! ## Usage
//! ```rust
//! use rtttl::{Tune, RtttlError};
//!
//! match Tune::parse("NoColonsHere") {
//!     Ok(tune) => println!("Parsed {}", tune.name()),
//!     Err(RtttlError::MalformedTune { position, message }) => {
//!         eprintln!("Bad tune at byte {}: {}", position, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RtttlError {
    /// Malformed tune with the byte offset where parsing gave up.
    ///
    /// # Example
    /// ```
    /// # use rtttl::RtttlError;
    /// let err = RtttlError::MalformedTune {
    ///     position: 12,
    ///     message: "missing ':' before note section".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Malformed tune at byte 12: missing ':' before note section");
    /// ```
    #[error("Malformed tune at byte {position}: {message}")]
    MalformedTune { position: usize, message: String },

    /// A command could not be queued before the send timeout expired.
    ///
    /// # Example
    /// ```
    /// # use rtttl::RtttlError;
    /// let err = RtttlError::ChannelFull { timeout_ms: 250 };
    /// assert_eq!(err.to_string(), "Command channel full: gave up after 250 ms");
    /// ```
    #[error("Command channel full: gave up after {timeout_ms} ms")]
    ChannelFull { timeout_ms: u64 },

    /// The background worker is no longer receiving commands.
    #[error("Player worker has stopped")]
    WorkerStopped,

    /// Invalid player configuration.
    ///
    /// # Example
    /// ```
    /// # use rtttl::RtttlError;
    /// let err = RtttlError::ConfigError("channel-capacity must be at least 1".to_string());
    /// assert_eq!(err.to_string(), "Invalid configuration: channel-capacity must be at least 1");
    /// ```
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("WAV output error: {0}")]
    Wav(#[from] hound::Error),
}

impl RtttlError {
    pub(crate) fn malformed(position: usize, message: impl Into<String>) -> Self {
        RtttlError::MalformedTune {
            position,
            message: message.into(),
        }
    }

    /// True for errors caused by the tune text itself.
    pub fn is_malformed(&self) -> bool {
        matches!(self, RtttlError::MalformedTune { .. })
    }
}

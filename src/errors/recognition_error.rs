//! Error type shared by the recognition client, its transports and audio sources.

use thiserror::Error;

/// Errors that can occur while setting up or running a recognition session.
///
/// Only [`RecognitionError::Configuration`] is returned synchronously; every
/// other variant reaches the caller through the session's event callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// Missing or invalid input detected before any network I/O.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The transport could not establish the connection.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// An inbound frame was malformed or unexpected.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No inbound activity within the configured window, or the service
    /// reported that no speech was detected.
    #[error("Inactivity timeout: {0}")]
    InactivityTimeout(String),

    /// Mid-stream I/O failure on send or receive.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error reported by the service in an `{"error": ...}` message.
    #[error("Service error: {0}")]
    Service(String),
}

impl RecognitionError {
    /// Close code sent to the peer when a session fails with this error.
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Protocol(_) => 1002,
            _ => 1000,
        }
    }
}

/// Result type for recognition operations.
pub type RecognizeResult<T> = Result<T, RecognitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecognitionError::Connect("refused".to_string());
        assert_eq!(err.to_string(), "Connection failed: refused");

        let err = RecognitionError::InactivityTimeout("no frame for 5s".to_string());
        assert_eq!(err.to_string(), "Inactivity timeout: no frame for 5s");
    }

    #[test]
    fn test_close_codes() {
        assert_eq!(RecognitionError::Protocol("bad".into()).close_code(), 1002);
        assert_eq!(RecognitionError::Service("boom".into()).close_code(), 1000);
    }
}

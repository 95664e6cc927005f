//! Error taxonomy for the bridge.

use crate::framing::FrameError;
use thiserror::Error;

/// Errors raised anywhere in the bridge.
///
/// `Config` is the only fatal class: it aborts filter construction and the
/// filter refuses to serve any stream. Every other variant terminates a
/// single call and is converted into a synthesized gRPC-style reply by the
/// orchestrator; it never tears down the connection.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("routing error: {0}")]
    Routing(String),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("transcoding error: {0}")]
    Transcode(String),

    #[error("unexpected content type: {0}")]
    ContentType(String),

    #[error("buffered data exceeds configured limit of {0} bytes")]
    BufferLimit(usize),

    #[error("precondition violated: {0}")]
    Precondition(String),
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_converts() {
        let err: BridgeError = FrameError::TooSmall(3).into();
        assert!(matches!(err, BridgeError::Frame(FrameError::TooSmall(3))));
    }

    #[test]
    fn test_error_display() {
        let err = BridgeError::BufferLimit(1024);
        assert_eq!(
            err.to_string(),
            "buffered data exceeds configured limit of 1024 bytes"
        );

        let err = BridgeError::ContentType("text/plain".to_string());
        assert_eq!(err.to_string(), "unexpected content type: text/plain");

        let err = BridgeError::Precondition("session has no resolved method".to_string());
        assert_eq!(
            err.to_string(),
            "precondition violated: session has no resolved method"
        );
    }
}

// src/error.rs
//
// Crate-wide error taxonomy. Leaf modules return these typed variants;
// the CLI boundary wraps them with anyhow context and maps them to exit
// codes. No component both logs and returns an error.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed audio, unsupported format, or an invalid configuration
    /// (e.g. hop size larger than the window).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Preprocessing only understands mono and stereo input.
    #[error("unsupported channel count {0}, expected 1 or 2")]
    UnsupportedChannels(usize),

    /// The operation needs mono audio; run the preprocessor first.
    #[error("requires mono audio, got {0} channels")]
    RequiresMono(usize),

    /// Audio shorter than a single analysis window.
    #[error("audio too short: {samples} samples, need at least {window}")]
    TooShort { samples: usize, window: usize },

    /// The vector index reached its configured capacity.
    #[error("index full: capacity of {capacity} vectors reached")]
    IndexFull { capacity: usize },

    #[error("unknown track: {0}")]
    UnknownTrack(String),

    #[error("duplicate track: {0}")]
    DuplicateTrack(String),

    /// The caller's cancellation token fired at a checkpoint.
    #[error("operation cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An invariant that should be unbreakable was broken; this is a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error points at the caller's input rather than at a
    /// processing or environment failure. The CLI uses this to pick
    /// between exit codes 1 and 2.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::UnsupportedChannels(_)
                | Error::RequiresMono(_)
                | Error::TooShort { .. }
                | Error::UnknownTrack(_)
                | Error::DuplicateTrack(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::TooShort { samples: 100, window: 1024 };
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("1024"));

        let err = Error::UnknownTrack("abc".to_string());
        assert_eq!(err.to_string(), "unknown track: abc");
    }

    #[test]
    fn test_input_error_classification() {
        assert!(Error::InvalidInput("x".into()).is_input_error());
        assert!(Error::TooShort { samples: 0, window: 1 }.is_input_error());
        assert!(!Error::Cancelled.is_input_error());
        assert!(!Error::Internal("x".into()).is_input_error());
        assert!(!Error::IndexFull { capacity: 10 }.is_input_error());
    }
}

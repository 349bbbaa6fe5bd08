//! Error types for hmmviz-vis.

use thiserror::Error;

/// Result type for hmmviz-vis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while ingesting, configuring, or exporting diagrams.
///
/// Playback no-ops (play while playing, step while playing) are not errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A snapshot was malformed and rejected; the buffer is unchanged.
    #[error("validation error: {0}")]
    Validation(String),

    /// An index was outside the buffer.
    #[error("index {index} out of range for buffer of length {len}")]
    Range { index: usize, len: usize },

    /// A settings value or speed multiplier was invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A rendering backend failed.
    #[error("export error: {0}")]
    Export(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Range,
    Configuration,
    Export,
    Serialization,
    Io,
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub(crate) fn export(msg: impl Into<String>) -> Self {
        Error::Export(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Range { .. } => ErrorKind::Range,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Export(_) => ErrorKind::Export,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_error_message_names_bounds() {
        let err = Error::Range { index: 7, len: 3 };
        assert_eq!(err.to_string(), "index 7 out of range for buffer of length 3");
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}

//! Error types for the skylight window core

use std::fmt;
use thiserror::Error;

use crate::runtime::CloneError;

/// Error kinds, named after the DOM exception or script error they surface as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    /// SyntaxError - malformed URL or target origin, or an unserializable message
    SyntaxError,
    /// TypeError - wrong type for an operation
    TypeError,
    /// DataCloneError - structured clone failure
    DataCloneError,
    /// NetworkError - navigation refused to start
    NetworkError,
    /// Generic Error - user-thrown Error objects
    GenericError,
    /// InternalError - misconfiguration or embedder error
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::SyntaxError => write!(f, "SyntaxError"),
            ErrorKind::TypeError => write!(f, "TypeError"),
            ErrorKind::DataCloneError => write!(f, "DataCloneError"),
            ErrorKind::NetworkError => write!(f, "NetworkError"),
            ErrorKind::GenericError => write!(f, "Error"),
            ErrorKind::InternalError => write!(f, "InternalError"),
        }
    }
}

/// Main error type for skylight
#[derive(Error, Debug)]
pub enum Error {
    /// Synchronous contract violation surfaced to the caller as a SyntaxError
    #[error("SyntaxError: {message}")]
    SyntaxError {
        message: String,
        #[source]
        cause: Option<CloneError>,
    },

    /// Structured clone failure
    #[error("DataCloneError: {0}")]
    DataClone(#[from] CloneError),

    /// Uncaught error thrown by a callback or listener
    #[error("{kind}: {message}")]
    Exception { kind: ErrorKind, message: String },

    /// Navigation refused to start
    #[error("NetworkError: {0}")]
    Navigation(String),

    /// Configuration could not be loaded
    #[error("ConfigError: {0}")]
    Config(String),

    /// IO error
    #[error("IOError: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a SyntaxError
    pub fn syntax_error(message: impl Into<String>) -> Self {
        Error::SyntaxError {
            message: message.into(),
            cause: None,
        }
    }

    /// Create a SyntaxError caused by a failed serialization
    pub fn syntax_error_from_clone(message: impl Into<String>, cause: CloneError) -> Self {
        Error::SyntaxError {
            message: message.into(),
            cause: Some(cause),
        }
    }

    /// Create a TypeError exception
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Exception {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create a generic exception, as thrown by `throw new Error(message)`
    pub fn exception(message: impl Into<String>) -> Self {
        Error::Exception {
            kind: ErrorKind::GenericError,
            message: message.into(),
        }
    }

    /// The kind this error surfaces as
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SyntaxError { .. } => ErrorKind::SyntaxError,
            Error::DataClone(_) => ErrorKind::DataCloneError,
            Error::Exception { kind, .. } => *kind,
            Error::Navigation(_) => ErrorKind::NetworkError,
            Error::Config(_) | Error::Io { .. } => ErrorKind::InternalError,
        }
    }

    /// Whether this error surfaces as a SyntaxError
    pub fn is_syntax_error(&self) -> bool {
        self.kind() == ErrorKind::SyntaxError
    }
}

/// Result type alias for skylight
pub type Result<T> = std::result::Result<T, Error>;

/// Standardized error message templates
pub mod messages {
    pub const INVALID_URL: &str = "URL is not valid";
    pub const INVALID_TARGET_ORIGIN: &str = "Invalid URL for targetOrigin";
    pub const UNSERIALIZABLE_MESSAGE: &str = "Message could not be serialized";

    /// Format an "Invalid URL for targetOrigin: 'X'" message
    pub fn invalid_target_origin(target_origin: &str) -> String {
        format!("{}: '{}'", INVALID_TARGET_ORIGIN, target_origin)
    }

    /// Format a "URL is not valid: 'X'" message
    pub fn invalid_url(url: &str) -> String {
        format!("{}: '{}'", INVALID_URL, url)
    }
}

//! Error types for directory and site-follow operations.
//!
//! Errors are categorized so callers can give appropriate feedback. Setup
//! failures (credentials, authentication, empty user sets) are fatal for a
//! run; everything else is captured per pair or per item.

use std::fmt;

/// Result type alias for graphkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of Graph errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Token acquisition failed or the token was rejected.
    Auth,
    /// Transport failure or server-side error.
    Network,
    /// The user, group or site does not exist.
    NotFound,
    /// The tenant is being rate limited.
    Throttled,
    /// Local configuration is incomplete.
    Config,
    /// The API returned something we could not interpret.
    Format,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::Throttled)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Auth => "Authentication failed",
            Self::Network => "Network or service issue",
            Self::NotFound => "Object not found",
            Self::Throttled => "Request throttled",
            Self::Config => "Incomplete configuration",
            Self::Format => "Unexpected API response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Auth => {
                "Check the tenant id, client id and secret, and that the app has Sites.ReadWrite.All consent"
            }
            Self::Network => "Check connectivity and try again",
            Self::NotFound => "Verify the user, group or site identifier",
            Self::Throttled => "Increase --pair-delay-ms and run again later",
            Self::Config => "Pass the value as a flag, environment variable or config entry",
            Self::Format => "Run with -vv to inspect the raw responses",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the directory.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Client-credential exchange failed.
    #[error("authentication failed: {message}")]
    Auth {
        /// HTTP status code if the identity provider answered.
        status: Option<u16>,
        /// Error message.
        message: String,
    },

    /// A Graph request failed.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Response body did not match the expected shape.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// A required credential field is empty.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// User resolution produced nothing to process.
    #[error("no users to process")]
    NoUsers,

    /// I/O error while reading a response body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Auth {
            status,
            message: message.into(),
        }
    }

    /// HTTP status attached to this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Auth { status, .. } | Error::Http { status, .. } => *status,
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Auth { .. } => ErrorCategory::Auth,
            Error::Http { status, .. } => match status {
                Some(401 | 403) => ErrorCategory::Auth,
                Some(404) => ErrorCategory::NotFound,
                Some(429) => ErrorCategory::Throttled,
                Some(code) if *code >= 500 => ErrorCategory::Network,
                Some(_) => ErrorCategory::Other,
                None => ErrorCategory::Network,
            },
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Io(_) => ErrorCategory::Network,
            Error::MissingCredential(_) | Error::NoUsers => ErrorCategory::Config,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            ureq::Error::Io(io) => Self::Io(io),
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

//! Error types
//!
//! One crate-wide error enum. Transport failures are retried at the call site
//! that issued the request; authentication failures end one negotiation run;
//! everything the reservation loop catches becomes a transient outcome.

use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request kept failing after every attempt of its retry policy
    #[error("{operation} failed after {attempts} attempts: {message}")]
    Transport {
        /// The request that failed, e.g. `login`
        operation: String,
        /// Attempts made before giving up
        attempts: u32,
        /// Rendering of the last underlying error
        message: String,
        /// Whether the last attempt ended in a timeout
        timed_out: bool,
    },

    /// A handshake step could not produce what the next step needs
    #[error("Authentication failed at {stage}: {reason}")]
    Auth {
        /// Handshake step that failed
        stage: AuthStage,
        /// Human-readable cause, usually the portal's own message
        reason: String,
    },

    /// The portal demands an interactive picture captcha
    #[error("Interactive verification required: log in once through {login_page} and retry")]
    CaptchaRequired {
        /// Page where the user can clear the challenge by hand
        login_page: String,
    },

    /// Password encryption failures
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Configuration errors
    #[error("Configuration error in {field}: {message}")]
    Config {
        /// The configuration field that has an error
        field: String,
        /// Error message describing the issue
        message: String,
    },

    /// Validation errors
    #[error("Validation failed for {field}: {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Error message describing the validation failure
        message: String,
    },

    /// Re-authentication refused because the last attempt was too recent
    #[error("Rate limited: {message}")]
    RateLimit {
        /// Message describing the rate limit
        message: String,
        /// Milliseconds to wait before retrying
        retry_after_ms: u64,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal issue
        message: String,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Steps of the login handshake, in protocol order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    /// Local precondition checks on the credentials
    Credentials,
    /// Encrypted password submission
    Login,
    /// Redirect URL lookup with the user token
    Ticket,
    /// Redirect chain that yields the service ticket
    Redirect,
    /// Registration lookup that yields the bearer token
    Token,
    /// Open registration window and class-id prefix
    Batch,
}

impl AuthStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthStage::Credentials => "credentials",
            AuthStage::Login => "login",
            AuthStage::Ticket => "ticket",
            AuthStage::Redirect => "redirect",
            AuthStage::Token => "token",
            AuthStage::Batch => "batch",
        }
    }
}

impl std::fmt::Display for AuthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Create an authentication error for a handshake step
    pub fn auth<S: Into<String>>(stage: AuthStage, reason: S) -> Self {
        Self::Auth {
            stage,
            reason: reason.into(),
        }
    }

    /// Create a transport error after `attempts` failed tries
    pub fn transport<S: Into<String>>(operation: S, attempts: u32, source: &Error) -> Self {
        Self::Transport {
            operation: operation.into(),
            attempts,
            message: source.to_string(),
            timed_out: source.is_timeout(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(field: S, message: S) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the underlying failure was a request timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout(),
            Error::Transport { timed_out, .. } => *timed_out,
            _ => false,
        }
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Transport { .. } => true,
            Error::RateLimit { .. } => true,
            _ => false,
        }
    }

    /// Whether this error ended a negotiation run
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Error::Auth { .. } | Error::CaptchaRequired { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Http(..) => "http",
            Error::Json(..) => "json",
            Error::Toml(..) => "toml",
            Error::Url(..) => "url",
            Error::Io(..) => "io",
            Error::Transport { .. } => "transport",
            Error::Auth { .. } => "auth",
            Error::CaptchaRequired { .. } => "captcha",
            Error::Crypto(..) => "crypto",
            Error::Config { .. } => "config",
            Error::Validation { .. } => "validation",
            Error::RateLimit { .. } => "rate_limit",
            Error::Internal { .. } => "internal",
        }
    }
}

//! Remote platform error types and retry classification.

use std::time::Duration;

/// Failure conditions reported by the remote chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PlatformErrorKind {
    /// The platform throttled the call, optionally saying when to retry.
    #[display("Rate limited (retry after {:?})", retry_after)]
    RateLimited {
        /// Platform-provided wait before the next attempt
        retry_after: Option<Duration>,
    },
    /// Transport failure or timeout talking to the platform.
    #[display("Network error: {}", _0)]
    Network(String),
    /// The bot lacks the permission required for the call.
    #[display("Permission denied: {}", _0)]
    PermissionDenied(String),
    /// The target resource does not exist (anymore).
    #[display("Not found: {}", _0)]
    NotFound(String),
    /// Any other non-retryable rejection.
    #[display("Rejected: {}", _0)]
    Rejected(String),
}

impl PlatformErrorKind {
    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformErrorKind::RateLimited { .. } | PlatformErrorKind::Network(_)
        )
    }

    /// Wait requested by the platform before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PlatformErrorKind::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Map an HTTP status code and message onto an error kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use speakhub_error::PlatformErrorKind;
    ///
    /// assert!(PlatformErrorKind::from_status(503, "unavailable").is_retryable());
    /// assert!(!PlatformErrorKind::from_status(403, "missing access").is_retryable());
    /// ```
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            429 => PlatformErrorKind::RateLimited { retry_after: None },
            401 | 403 => PlatformErrorKind::PermissionDenied(message),
            404 => PlatformErrorKind::NotFound(message),
            408 | 500 | 502 | 503 | 504 => PlatformErrorKind::Network(message),
            _ => PlatformErrorKind::Rejected(message),
        }
    }
}

/// Remote platform error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Platform Error: {} at line {} in {}", kind, line, file)]
pub struct PlatformError {
    /// Error kind
    pub kind: PlatformErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PlatformError {
    /// Create a new PlatformError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PlatformErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for a throttling error.
    #[track_caller]
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::new(PlatformErrorKind::RateLimited { retry_after })
    }

    /// True when the resource is already gone remotely.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, PlatformErrorKind::NotFound(_))
    }
}

/// Result type for remote platform calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Trait for errors that support retry logic.
///
/// This trait lets the dispatcher decide whether a failure should be retried
/// and whether the platform asked for a specific wait.
///
/// # Examples
///
/// ```
/// use speakhub_error::{PlatformError, RetryableError};
/// use std::time::Duration;
///
/// let err = PlatformError::rate_limited(Some(Duration::from_secs(5)));
/// assert!(err.is_retryable());
/// assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
/// ```
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;

    /// Platform-mandated wait before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl RetryableError for PlatformError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn retry_after(&self) -> Option<Duration> {
        self.kind.retry_after()
    }
}

//! Command dispatcher error types.

use crate::{PlatformError, RetryableError};
use std::time::Duration;

/// Reasons the dispatcher could not complete a command.
#[derive(Debug, Clone, derive_more::Display)]
pub enum DispatchErrorKind {
    /// The platform rejected the command with a terminal error.
    #[display("{}", _0)]
    Platform(PlatformError),
    /// Every allowed attempt failed with a transient error.
    #[display("Gave up after {} attempts: {}", attempts, last)]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error returned by the final attempt
        last: PlatformError,
    },
    /// The command did not complete within the submission timeout.
    #[display("Timed out after {:?}", _0)]
    Timeout(Duration),
}

/// Dispatcher error with location tracking.
///
/// # Examples
///
/// ```
/// use speakhub_error::{DispatchError, DispatchErrorKind, PlatformError, PlatformErrorKind};
///
/// let err = DispatchError::new(DispatchErrorKind::Platform(PlatformError::new(
///     PlatformErrorKind::PermissionDenied("manage channels".to_string()),
/// )));
/// assert!(err.is_terminal());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Dispatch Error: {} at line {} in {}", kind, line, file)]
pub struct DispatchError {
    /// Error kind
    pub kind: DispatchErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl DispatchError {
    /// Create a new DispatchError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: DispatchErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// The underlying platform error, if the platform was reached.
    pub fn platform_error(&self) -> Option<&PlatformError> {
        match &self.kind {
            DispatchErrorKind::Platform(err) => Some(err),
            DispatchErrorKind::RetriesExhausted { last, .. } => Some(last),
            DispatchErrorKind::Timeout(_) => None,
        }
    }

    /// True when retrying the same command later cannot succeed.
    ///
    /// Exhausted retries and timeouts are not terminal: the condition is
    /// handed to reconciliation instead of being retried in place.
    pub fn is_terminal(&self) -> bool {
        match &self.kind {
            DispatchErrorKind::Platform(err) => !err.is_retryable(),
            DispatchErrorKind::RetriesExhausted { .. } | DispatchErrorKind::Timeout(_) => false,
        }
    }

    /// True when the target resource is already gone remotely.
    pub fn is_not_found(&self) -> bool {
        matches!(&self.kind, DispatchErrorKind::Platform(err) if err.is_not_found())
    }
}

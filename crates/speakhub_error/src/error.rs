//! Top-level error wrapper types.

use crate::{
    BuilderError, ConfigError, DispatchError, LifecycleError, PlatformError, StorageError,
};

/// Every error condition the speakhub crates can surface.
///
/// # Examples
///
/// ```
/// use speakhub_error::{ConfigError, SpeakhubError};
///
/// let err: SpeakhubError = ConfigError::new("missing guilds table").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum SpeakhubErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
    /// Remote platform call failed
    #[from(PlatformError)]
    Platform(PlatformError),
    /// Command dispatcher gave up on a command
    #[from(DispatchError)]
    Dispatch(DispatchError),
    /// Orchestrator or owner control refused an operation
    #[from(LifecycleError)]
    Lifecycle(LifecycleError),
    /// Persistence error
    #[from(StorageError)]
    Storage(StorageError),
}

/// Speakhub error with kind discrimination.
///
/// # Examples
///
/// ```
/// use speakhub_error::{SpeakhubErrorKind, SpeakhubResult, StorageError, StorageErrorKind};
///
/// fn load() -> SpeakhubResult<()> {
///     Err(StorageError::new(StorageErrorKind::FileRead("channels.json".to_string())))?
/// }
///
/// let err = load().unwrap_err();
/// assert!(matches!(err.kind(), SpeakhubErrorKind::Storage(_)));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Speakhub Error: {}", _0)]
pub struct SpeakhubError(Box<SpeakhubErrorKind>);

impl SpeakhubError {
    /// Create a new error from a kind.
    pub fn new(kind: SpeakhubErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &SpeakhubErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to SpeakhubErrorKind
impl<T> From<T> for SpeakhubError
where
    T: Into<SpeakhubErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for speakhub operations.
pub type SpeakhubResult<T> = std::result::Result<T, SpeakhubError>;

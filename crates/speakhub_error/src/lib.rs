//! Error types for the speakhub voice channel manager.
//!
//! This crate provides the foundation error types used throughout the speakhub workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! Remote failures are split into two classes through [`RetryableError`]:
//! transient (throttling, network) and terminal (permission denied, not found,
//! rejected). The dispatcher retries the first class and gives up on the second.
//!
//! # Examples
//!
//! ```
//! use speakhub_error::{PlatformError, PlatformErrorKind, RetryableError, SpeakhubResult};
//!
//! fn delete_channel() -> SpeakhubResult<()> {
//!     Err(PlatformError::new(PlatformErrorKind::NotFound("channel 42".to_string())))?
//! }
//!
//! let err = PlatformError::new(PlatformErrorKind::Network("connection reset".to_string()));
//! assert!(err.is_retryable());
//! assert!(delete_channel().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod dispatch;
mod error;
mod lifecycle;
mod platform;
mod storage;

pub use builder::{BuilderError, BuilderErrorKind};
pub use config::ConfigError;
pub use dispatch::{DispatchError, DispatchErrorKind};
pub use error::{SpeakhubError, SpeakhubErrorKind, SpeakhubResult};
pub use lifecycle::{LifecycleError, LifecycleErrorKind};
pub use platform::{PlatformError, PlatformErrorKind, PlatformResult, RetryableError};
pub use storage::{StorageError, StorageErrorKind};

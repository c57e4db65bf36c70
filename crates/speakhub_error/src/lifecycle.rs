//! Lifecycle and owner-control error types.

use crate::DispatchError;

/// Conditions under which the orchestrator refuses or fails an operation.
#[derive(Debug, Clone, derive_more::Display)]
pub enum LifecycleErrorKind {
    /// No configuration exists for the guild.
    #[display("Guild {} is not configured", _0)]
    UnknownGuild(u64),
    /// The channel is not a managed channel.
    #[display("Channel {} is not managed", _0)]
    NotManaged(u64),
    /// The acting user does not own a managed channel.
    #[display("User {} does not own a managed channel", _0)]
    NotOwner(u64),
    /// The target user is not in the managed channel.
    #[display("User {} is not in the channel", _0)]
    NotInChannel(u64),
    /// An argument was outside its allowed range.
    #[display("Invalid argument: {}", _0)]
    InvalidArgument(String),
    /// The same invite was sent too recently.
    #[display("Invite cooldown active for {} more seconds", remaining_secs)]
    InviteCooldown {
        /// Seconds until the invite may be repeated
        remaining_secs: u64,
    },
    /// Another operation on the channel is in flight.
    #[display("Operation already in flight for channel {}", _0)]
    Busy(u64),
    /// The command dispatcher failed.
    #[display("{}", _0)]
    Dispatch(DispatchError),
}

/// Lifecycle error with location tracking.
///
/// # Examples
///
/// ```
/// use speakhub_error::{LifecycleError, LifecycleErrorKind};
///
/// let err = LifecycleError::new(LifecycleErrorKind::NotOwner(7));
/// assert!(format!("{}", err).contains("does not own"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Lifecycle Error: {} at line {} in {}", kind, line, file)]
pub struct LifecycleError {
    /// Error kind
    pub kind: LifecycleErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl LifecycleError {
    /// Create a new LifecycleError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: LifecycleErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl From<DispatchError> for LifecycleError {
    #[track_caller]
    fn from(err: DispatchError) -> Self {
        Self::new(LifecycleErrorKind::Dispatch(err))
    }
}

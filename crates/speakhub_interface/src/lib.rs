//! Outbound platform interface for the speakhub voice channel manager.
//!
//! [`VoicePlatform`] is the boundary between the lifecycle core and the
//! remote real-time platform: every mutating call and every reconciliation
//! snapshot goes through it. Each call resolves to success, a transient
//! failure (optionally carrying a retry-after hint) or a terminal failure,
//! classified by [`speakhub_error::RetryableError`].
//!
//! [`InMemoryPlatform`] implements the trait over local state and records
//! every call, for tests and dry runs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod memory;
mod traits;
mod types;

pub use memory::{CallKind, InMemoryPlatform, RecordedCall};
pub use traits::VoicePlatform;
pub use types::{RemoteChannel, RemoteSnapshot};

//! Rate-limited command dispatcher for speakhub.
//!
//! Every mutating call the lifecycle core makes against the remote platform
//! goes through a [`CommandDispatcher`]. Commands draw tokens from a
//! per-guild bucket of their resource class and from a global limiter,
//! transient failures are retried with exponential backoff, and an explicit
//! retry-after from the platform freezes the bucket until it has passed.
//!
//! ## Ordering
//!
//! Commands for the same target resource (a channel, a creation slot or a
//! member) execute in submission order. Commands for different resources
//! have no ordering guarantee.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod command;
mod config;
mod dispatcher;
mod idempotency;

pub use bucket::{Bucket, BucketClass, BucketKey};
pub use command::{Command, CommandOutput, ResourceKey};
pub use config::{DispatcherConfig, DispatcherConfigBuilder};
pub use dispatcher::CommandDispatcher;
pub use idempotency::IdempotencyWindow;

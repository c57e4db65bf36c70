//! Speakhub - join-to-create voice channels
//!
//! Speakhub watches a guild's voice traffic and gives every member who joins
//! a designated "join" channel a temporary voice channel of their own. The
//! member is moved into it, owns it, and the channel is deleted once it has
//! stayed empty for the guild's grace window.
//!
//! # Features
//!
//! - **Event-driven lifecycle**: create, move, transfer and tear down
//!   channels from the voice event stream
//! - **Exactly-once under concurrency**: at most one channel per member,
//!   however many duplicate or concurrent triggers arrive
//! - **Rate-limited dispatch**: per-bucket quotas, retry with backoff and
//!   idempotent replays for every outbound call
//! - **Reconciliation**: periodic sweeps repair missed events and restarts
//! - **Owner controls**: lock, rename, limit, kick, block and invite
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use speakhub::{InMemoryPlatform, SpeakhubConfig, VoiceServer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SpeakhubConfig::load()?;
//!     config.validate()?;
//!
//!     let server = Arc::new(VoiceServer::new(config, Arc::new(InMemoryPlatform::new())));
//!     server.start().await?;
//!     server.sweep_all().await;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Cargo Features
//!
//! - `discord` - Discord gateway and HTTP adapter (serenity)
//! - `observability` - OpenTelemetry span export
//! - `all` - Enable all features
//!
//! # Architecture
//!
//! Speakhub is organized as a workspace with focused crates:
//!
//! - `speakhub_error` - Error types
//! - `speakhub_core` - Identifiers, channel records, events and settings
//! - `speakhub_interface` - VoicePlatform trait and in-memory platform
//! - `speakhub_rate_limit` - Rate-limited command dispatcher
//! - `speakhub_cache` - State cache
//! - `speakhub_storage` - Managed channel persistence
//! - `speakhub_orchestrator` - Normalizer, lifecycle, sweeper and controls
//! - `speakhub_social` - Discord adapter
//! - `speakhub_bot` - Configuration and server composition
//!
//! This crate (`speakhub`) re-exports everything for convenience.

pub use speakhub_bot::*;
pub use speakhub_cache::*;
pub use speakhub_core::*;
pub use speakhub_error::*;
pub use speakhub_interface::*;
pub use speakhub_orchestrator::*;
pub use speakhub_rate_limit::*;
pub use speakhub_social::*;
pub use speakhub_storage::*;

pub mod observability;

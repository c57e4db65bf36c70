//! Voice channel lifecycle orchestration for speakhub.
//!
//! This crate turns the inbound voice event stream into channel lifecycle
//! decisions:
//!
//! - [`EventNormalizer`] maps raw transport events onto the
//!   [`NormalizedEvent`](speakhub_core::NormalizedEvent) vocabulary and drops
//!   redeliveries
//! - [`Orchestrator`] is the per-slot state machine that creates, transfers
//!   and tears down managed channels
//! - [`Sweeper`] reconciles the cache with remote snapshots
//! - [`OwnerControls`] lets owners edit their channel
//! - [`EventRouter`] runs one worker per guild
//!
//! All mutation of shared state goes through the atomic primitives of
//! [`StateCache`](speakhub_cache::StateCache); all remote calls go through
//! the [`CommandDispatcher`](speakhub_rate_limit::CommandDispatcher).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod controls;
mod lifecycle;
mod metrics;
mod normalizer;
mod router;
mod sweeper;

pub use controls::OwnerControls;
pub use lifecycle::{Orchestrator, Suppression, TeardownOutcome, Transition};
pub use metrics::{
    ChannelMetricSnapshot, EventMetricSnapshot, LifecycleMetrics, LifecycleMetricsSnapshot,
    ReconciliationMetricSnapshot,
};
pub use normalizer::{EventNormalizer, Normalized, NormalizerConfig, NormalizerConfigBuilder};
pub use router::EventRouter;
pub use sweeper::{SweepReport, Sweeper};

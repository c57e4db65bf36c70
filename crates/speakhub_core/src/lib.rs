//! Core data types for the speakhub voice channel manager.
//!
//! This crate provides the vocabulary shared by every other speakhub crate:
//! platform identifiers, the [`ManagedChannel`] record, in-flight
//! [`PendingOperation`] guards, permission templates, per-guild settings and
//! the normalized event set consumed by the lifecycle orchestrator.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod channel;
mod drift;
mod event;
mod ids;
mod operation;
mod permissions;
mod settings;

pub use channel::{ChannelEdit, ChannelSpec, CreationSource, ManagedChannel};
pub use drift::DriftCondition;
pub use event::{DeliveryId, NormalizedEvent, RawEvent, RawEventKind};
pub use ids::{ChannelId, GuildId, UserId};
pub use operation::{
    IdempotencyKey, OperationKey, OperationKind, OperationOutcome, PendingOperation,
};
pub use permissions::{OverwriteTarget, Permission, PermissionOverwrite, PermissionTemplate};
pub use settings::{GuildSettings, GuildSettingsBuilder, OwnerLeavePolicy};

//! Discord integration for speakhub.
//!
//! The gateway side turns serenity events into [`RawEvent`]s and pushes them,
//! together with cache readiness notices, onto a [`GatewaySignal`] channel
//! owned by the composition root. The HTTP side implements
//! [`VoicePlatform`](speakhub_interface::VoicePlatform) on top of serenity's
//! client and gateway cache.
//!
//! Everything serenity-specific is behind the `discord` feature; the signal
//! types are always available so the rest of the workspace can be wired and
//! tested without a bot token.
//!
//! [`RawEvent`]: speakhub_core::RawEvent

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod signal;

#[cfg(feature = "discord")]
mod discord;

pub use signal::{DeliverySequence, GatewaySignal};

#[cfg(feature = "discord")]
pub use discord::{
    DiscordError, DiscordErrorKind, DiscordResult, SerenityPlatform, SpeakhubBot,
    SpeakhubHandler, platform_error,
};

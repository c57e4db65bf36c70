//! Serenity-backed gateway handler and voice platform.
//!
//! # Architecture
//!
//! - **handler**: serenity `EventHandler` that forwards voice, channel and
//!   membership events as [`GatewaySignal`](crate::GatewaySignal)s
//! - **platform**: [`VoicePlatform`](speakhub_interface::VoicePlatform) over
//!   serenity's HTTP client, with voice states read from the gateway cache
//! - **client**: client construction and lifecycle
//! - **conversions**: id, permission and error mapping
//!
//! Available with the `discord` feature.

mod client;
mod conversions;
mod error;
mod handler;
mod platform;

pub use client::SpeakhubBot;
pub use conversions::platform_error;
pub use error::{DiscordError, DiscordErrorKind, DiscordResult};
pub use handler::SpeakhubHandler;
pub use platform::SerenityPlatform;

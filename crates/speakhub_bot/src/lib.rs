//! Composition root of the speakhub voice channel manager.
//!
//! This crate loads [`SpeakhubConfig`] and builds a [`VoiceServer`] around
//! any [`VoicePlatform`](speakhub_interface::VoicePlatform):
//! - the state cache is seeded from the optional channel store
//! - gateway signals are pumped into the per-guild event router
//! - each guild is reconciled on its own interval, with the store written
//!   after every sweep and at shutdown

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod server;

pub use config::SpeakhubConfig;
pub use server::VoiceServer;

//! State cache for speakhub.
//!
//! The [`StateCache`] is the orchestrator's belief about which managed
//! channels exist, who owns them and who is in them, keyed by guild. It is
//! the only mutable state shared between event handling and reconciliation,
//! and every access goes through an atomic primitive: guard acquisition
//! (`try_begin_*`) is a test-and-set under the guild's lock, never a
//! read-then-write across a suspension point.
//!
//! Occupancy is derived from a per-guild presence map (user to channel,
//! stamped with the source timestamp). Presence updates older than the
//! stored one are ignored, so occupancy converges regardless of the order
//! voice events arrive in.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod gate;
mod state;

pub use cache::StateCache;
pub use gate::{CreationGate, DeletionGate, GuildSnapshot, PresenceChange};

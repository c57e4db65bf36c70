//! Managed channel persistence for speakhub.
//!
//! Persistence is optional: the reconciliation sweeper can rebuild the
//! state cache from a remote snapshot, so a store only shortens the window
//! after a restart during which orphaned channels go unnoticed.
//!
//! # Example
//!
//! ```no_run
//! use speakhub_storage::{ChannelStore, JsonChannelStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), speakhub_error::StorageError> {
//! let store = JsonChannelStore::new("/var/lib/speakhub/channels.json");
//! let channels = store.load().await?;
//! store.save(&channels).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod json;
mod store;

pub use config::StorageConfig;
pub use json::JsonChannelStore;
pub use store::ChannelStore;

//! Storage trait for managed channel records.

use async_trait::async_trait;
use speakhub_core::ManagedChannel;
use speakhub_error::StorageError;

/// Persists the set of managed channels between process runs.
///
/// Implementations must be safe to call concurrently; `save` replaces the
/// whole stored set.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Load every stored record. A store that was never written is empty.
    async fn load(&self) -> Result<Vec<ManagedChannel>, StorageError>;

    /// Replace the stored records with `channels`.
    async fn save(&self, channels: &[ManagedChannel]) -> Result<(), StorageError>;

    /// Name of the backend for logging.
    fn backend_name(&self) -> &'static str;
}

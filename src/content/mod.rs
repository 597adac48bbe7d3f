//! Content-store abstraction: volume placement plus keyed byte streams.

pub mod localfs;
pub mod memory;
pub mod router;

use std::path::PathBuf;

pub type BackendError = Box<dyn std::error::Error + Send + Sync>;
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Placement descriptor for a storage volume: the opaque name persisted in a
/// directory entry's `location` field plus the backend-internal root needed
/// to address it. Never cached — re-derived by `find` on every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    /// Filesystem root for path-addressed backends; empty for backends that
    /// address objects by name alone.
    pub root: PathBuf,
}

/// Byte-level contract required of a content store. Offsets are absolute
/// within the object addressed by `(volume, key)`; `total_size` is a sizing
/// hint for backends that preallocate, not a hard cap.
#[async_trait::async_trait]
pub trait ContentBackend: Send + Sync {
    /// Picks a volume capable of holding roughly `size_hint` bytes.
    async fn allocate(&self, size_hint: u64) -> BackendResult<Volume>;

    /// Re-resolves placement for an already-assigned volume name.
    async fn find(&self, name: &str) -> BackendResult<Volume>;

    async fn write_at(
        &self,
        volume: &Volume,
        key: &str,
        offset: u64,
        total_size: u64,
        data: &[u8],
    ) -> BackendResult<usize>;

    /// Bounded read: returns at most `len` bytes starting at `offset`,
    /// fewer if the object ends earlier.
    async fn read_at(
        &self,
        volume: &Volume,
        key: &str,
        offset: u64,
        len: usize,
    ) -> BackendResult<Vec<u8>>;

    /// Removes the object. Deleting an absent key is not an error.
    async fn delete(&self, volume: &Volume, key: &str) -> BackendResult<()>;
}

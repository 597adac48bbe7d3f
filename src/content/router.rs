//! Volume placement and content-key generation.
//!
//! Placement and addressing are deliberately split: many files share a
//! volume while each keeps a private content key. The volume name is
//! memoized into the entry's `location` field at first write; the key is
//! generated once alongside it and never changes.

use crate::content::{ContentBackend, Volume};
use crate::error::{FsError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use rand::RngCore;
use std::sync::Arc;

/// 1024 bits of entropy per content key.
const CONTENT_KEY_BYTES: usize = 128;

#[derive(Clone)]
pub struct VolumeRouter {
    backend: Arc<dyn ContentBackend>,
}

impl VolumeRouter {
    pub fn new(backend: Arc<dyn ContentBackend>) -> Self {
        VolumeRouter { backend }
    }

    /// Asks the backend for a placement able to hold roughly `size` bytes.
    /// Called once per file, on first write.
    pub async fn allocate_for_size(&self, size: u64) -> Result<Volume> {
        self.backend
            .allocate(size)
            .await
            .map_err(|e| FsError::Content(format!("allocate: size: {size}: {e}")))
    }

    /// Re-resolves placement parameters for an already-assigned volume.
    /// Called on every read or write against bound content.
    pub async fn find_by_name(&self, name: &str) -> Result<Volume> {
        self.backend
            .find(name)
            .await
            .map_err(|e| FsError::Content(format!("find volume: {name}: {e}")))
    }

    /// Collision-resistant content key: identity prefix plus URL-safe base64
    /// of CSPRNG bytes.
    pub fn generate_key(username: &str) -> String {
        let mut buf = [0u8; CONTENT_KEY_BYTES];
        rand::rng().fill_bytes(&mut buf);
        format!("{username}:{}", URL_SAFE.encode(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::memory::MemoryBackend;

    #[tokio::test]
    async fn test_allocate_and_find_by_name() {
        let router = VolumeRouter::new(Arc::new(MemoryBackend::new(2)));
        let vol = router.allocate_for_size(1024).await.unwrap();
        let found = router.find_by_name(&vol.name).await.unwrap();
        assert_eq!(found.name, vol.name);

        assert!(matches!(
            router.find_by_name("vol-777").await,
            Err(FsError::Content(_))
        ));
    }

    #[test]
    fn test_generate_key_shape() {
        let key = VolumeRouter::generate_key("alice");
        assert!(key.starts_with("alice:"));
        // 128 bytes of entropy survive the encoding.
        let encoded = &key["alice:".len()..];
        assert!(encoded.len() >= 170);
    }

    #[test]
    fn test_generate_key_unique() {
        let a = VolumeRouter::generate_key("alice");
        let b = VolumeRouter::generate_key("alice");
        assert_ne!(a, b);
    }
}

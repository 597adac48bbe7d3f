//! In-memory content backend for local development and tests.

use crate::content::{BackendResult, ContentBackend, Volume};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct MemoryBackend {
    volumes: Vec<String>,
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    next: AtomicUsize,
}

impl MemoryBackend {
    pub fn new(volume_count: usize) -> Self {
        MemoryBackend {
            volumes: (0..volume_count.max(1)).map(|i| format!("vol-{i:03}")).collect(),
            objects: Mutex::new(HashMap::new()),
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl ContentBackend for MemoryBackend {
    async fn allocate(&self, _size_hint: u64) -> BackendResult<Volume> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.volumes.len();
        Ok(Volume {
            name: self.volumes[idx].clone(),
            root: PathBuf::new(),
        })
    }

    async fn find(&self, name: &str) -> BackendResult<Volume> {
        if !self.volumes.iter().any(|v| v == name) {
            return Err(format!("unknown volume: {name}").into());
        }
        Ok(Volume {
            name: name.to_string(),
            root: PathBuf::new(),
        })
    }

    async fn write_at(
        &self,
        volume: &Volume,
        key: &str,
        offset: u64,
        _total_size: u64,
        data: &[u8],
    ) -> BackendResult<usize> {
        let mut objects = self.objects.lock().unwrap();
        let buf = objects
            .entry((volume.name.clone(), key.to_string()))
            .or_default();
        let end = offset as usize + data.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[offset as usize..end].copy_from_slice(data);
        Ok(data.len())
    }

    async fn read_at(
        &self,
        volume: &Volume,
        key: &str,
        offset: u64,
        len: usize,
    ) -> BackendResult<Vec<u8>> {
        let objects = self.objects.lock().unwrap();
        let buf = objects
            .get(&(volume.name.clone(), key.to_string()))
            .ok_or_else(|| format!("no object for key: {key}"))?;
        let offset = offset as usize;
        if offset >= buf.len() {
            return Ok(Vec::new());
        }
        let end = (offset + len).min(buf.len());
        Ok(buf[offset..end].to_vec())
    }

    async fn delete(&self, volume: &Volume, key: &str) -> BackendResult<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(volume.name.clone(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_roundtrip() {
        let backend = MemoryBackend::new(2);
        let vol = backend.allocate(8).await.unwrap();

        backend.write_at(&vol, "k", 3, 8, b"abcde").await.unwrap();
        let out = backend.read_at(&vol, "k", 0, 16).await.unwrap();
        assert_eq!(&out[..3], &[0, 0, 0]);
        assert_eq!(&out[3..], b"abcde");

        backend.delete(&vol, "k").await.unwrap();
        assert!(backend.read_at(&vol, "k", 0, 1).await.is_err());
    }
}

//! Local-directory content backend: one subdirectory per volume, one file
//! per content key.

use crate::content::{BackendResult, ContentBackend, Volume};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

pub struct LocalFsBackend {
    root: PathBuf,
    volumes: Vec<String>,
    next: AtomicUsize,
}

impl LocalFsBackend {
    /// Creates the volume directories under `root` if they do not exist yet.
    pub async fn open<P: AsRef<Path>>(root: P, volume_count: usize) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut volumes = Vec::with_capacity(volume_count.max(1));
        for i in 0..volume_count.max(1) {
            let name = format!("vol-{i:03}");
            fs::create_dir_all(root.join(&name)).await?;
            volumes.push(name);
        }
        Ok(LocalFsBackend {
            root,
            volumes,
            next: AtomicUsize::new(0),
        })
    }

    fn path_for(volume: &Volume, key: &str) -> PathBuf {
        volume.root.join(key)
    }
}

#[async_trait::async_trait]
impl ContentBackend for LocalFsBackend {
    async fn allocate(&self, _size_hint: u64) -> BackendResult<Volume> {
        // Round-robin placement; all local volumes are equivalent.
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.volumes.len();
        let name = self.volumes[idx].clone();
        let root = self.root.join(&name);
        Ok(Volume { name, root })
    }

    async fn find(&self, name: &str) -> BackendResult<Volume> {
        if !self.volumes.iter().any(|v| v == name) {
            return Err(format!("unknown volume: {name}").into());
        }
        Ok(Volume {
            name: name.to_string(),
            root: self.root.join(name),
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
        let path = Self::path_for(volume, key);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .await?;
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(data.len())
    }

    async fn read_at(
        &self,
        volume: &Volume,
        key: &str,
        offset: u64,
        len: usize,
    ) -> BackendResult<Vec<u8>> {
        let path = Self::path_for(volume, key);
        let mut file = fs::File::open(path).await?;
        let object_len = file.metadata().await?.len();
        if offset >= object_len {
            return Ok(Vec::new());
        }
        let take = len.min((object_len - offset) as usize);
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; take];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn delete(&self, volume: &Volume, key: &str) -> BackendResult<()> {
        match fs::remove_file(Self::path_for(volume, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allocate_and_find() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::open(tmp.path(), 2).await.unwrap();

        let a = backend.allocate(10).await.unwrap();
        let b = backend.allocate(10).await.unwrap();
        assert_ne!(a.name, b.name);

        let found = backend.find(&a.name).await.unwrap();
        assert_eq!(found, a);
        assert!(backend.find("vol-999").await.is_err());
    }

    #[tokio::test]
    async fn test_write_read_at_offsets() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::open(tmp.path(), 1).await.unwrap();
        let vol = backend.allocate(16).await.unwrap();

        backend.write_at(&vol, "k", 0, 5, b"hello").await.unwrap();
        backend.write_at(&vol, "k", 5, 11, b" world").await.unwrap();

        let out = backend.read_at(&vol, "k", 0, 64).await.unwrap();
        assert_eq!(out, b"hello world");

        let mid = backend.read_at(&vol, "k", 6, 5).await.unwrap();
        assert_eq!(mid, b"world");

        // Reads past the end are bounded, not an error.
        let past = backend.read_at(&vol, "k", 100, 4).await.unwrap();
        assert!(past.is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::open(tmp.path(), 1).await.unwrap();
        let vol = backend.allocate(4).await.unwrap();

        backend.write_at(&vol, "k", 0, 4, b"data").await.unwrap();
        backend.delete(&vol, "k").await.unwrap();
        backend.delete(&vol, "k").await.unwrap();
        assert!(backend.read_at(&vol, "k", 0, 4).await.is_err());
    }
}

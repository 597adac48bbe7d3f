//! Per-open file handle: offset-tracked reads and writes over a content
//! volume, with size/mtime bookkeeping flushed through the metadata store.
//!
//! A handle starts unbound (the entry has no volume yet) and binds on the
//! first successful write: the allocator picks a volume sized to that write
//! and a fresh content key is generated. Reads against an unbound handle are
//! end of stream. Dropping the handle closes it; nothing is persisted beyond
//! what each operation already flushed.

use crate::content::Volume;
use crate::content::router::VolumeRouter;
use crate::domain::DirEntry;
use crate::domain::entry::flags;
use crate::error::{FsError, Result};
use crate::vfs::FsContext;
use chrono::Utc;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Backend sub-write granularity for bulk ingest.
const WRITE_CHUNK: usize = 256 * 1024;

pub struct FileHandle {
    ctx: Arc<FsContext>,
    username: String,
    entry: DirEntry,
    offset: u64,
    list_cursor: usize,
}

impl FileHandle {
    pub(crate) fn new(ctx: Arc<FsContext>, username: String, entry: DirEntry, open_flags: u32) -> Self {
        let offset = if !entry.is_dir() && open_flags & flags::APPEND != 0 {
            entry.size as u64
        } else {
            0
        };
        FileHandle {
            ctx,
            username,
            entry,
            offset,
            list_cursor: 0,
        }
    }

    pub fn entry(&self) -> &DirEntry {
        &self.entry
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Binds the entry to a volume and content key on first write;
    /// re-resolves the existing volume afterwards.
    async fn bind_or_find(&mut self, size_hint: u64) -> Result<Volume> {
        if self.entry.location.is_empty() {
            let volume = self.ctx.volumes.allocate_for_size(size_hint).await?;
            self.entry.location = volume.name.clone();
            self.entry.content_key = VolumeRouter::generate_key(&self.username);
            Ok(volume)
        } else {
            self.ctx.volumes.find_by_name(&self.entry.location).await
        }
    }

    async fn flush_entry(&mut self, end: u64) -> Result<()> {
        if end > self.entry.size as u64 {
            self.entry.size = end as i64;
        }
        self.entry.modified = Utc::now();
        self.ctx.meta.update(&self.entry).await
    }

    /// Bounded read at the current offset. Unbound content or a cursor at or
    /// past `size` reads as end of stream (`Ok(0)`).
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.entry.is_dir() {
            return Err(FsError::Invalid(format!(
                "read: {} is a directory",
                self.entry.filename
            )));
        }
        if self.entry.location.is_empty() || self.offset >= self.entry.size as u64 {
            return Ok(0);
        }

        let volume = self.ctx.volumes.find_by_name(&self.entry.location).await?;
        let want = buf.len().min((self.entry.size as u64 - self.offset) as usize);
        let data = self
            .ctx
            .content
            .read_at(&volume, &self.entry.content_key, self.offset, want)
            .await
            .map_err(|e| {
                FsError::Content(format!(
                    "read: {}, offset: {}, len: {}: {e}",
                    self.entry.describe(),
                    self.offset,
                    want
                ))
            })?;

        buf[..data.len()].copy_from_slice(&data);
        self.offset += data.len() as u64;
        Ok(data.len())
    }

    /// Writes `data` at the current offset, then persists size/mtime and the
    /// (possibly just-bound) volume and key through the metadata store. On
    /// any failure the offset does not advance.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.entry.is_dir() {
            return Err(FsError::Invalid(format!(
                "write: {} is a directory",
                self.entry.filename
            )));
        }

        let volume = self.bind_or_find(data.len() as u64).await?;
        let total_size = self.offset + data.len() as u64;
        let written = self
            .ctx
            .content
            .write_at(&volume, &self.entry.content_key, self.offset, total_size, data)
            .await
            .map_err(|e| {
                FsError::Content(format!(
                    "write: {}, offset: {}, len: {}: {e}",
                    self.entry.describe(),
                    self.offset,
                    data.len()
                ))
            })?;

        let end = self.offset + written as u64;
        self.flush_entry(end).await?;
        self.offset = end;

        tracing::debug!(
            "write: username: {}, filename: {}, offset: {}, written: {}",
            self.username,
            self.entry.filename,
            self.offset,
            written
        );
        Ok(written)
    }

    /// Bulk ingest from a stream of indeterminate length, capped at
    /// `total_size`. The transfer is chunked into backend sub-writes; if at
    /// least one chunk lands the call reports the committed byte count and
    /// only logs the trailing failure — callers compare the return value
    /// against `total_size` to detect partial completion. An error is
    /// returned only when nothing was committed.
    pub async fn write_from<R>(&mut self, src: &mut R, total_size: u64) -> Result<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        if self.entry.is_dir() {
            return Err(FsError::Invalid(format!(
                "bulk write: {} is a directory",
                self.entry.filename
            )));
        }
        if total_size == 0 {
            return Ok(0);
        }

        let volume = self.bind_or_find(total_size).await?;
        let mut chunk = vec![0u8; WRITE_CHUNK.min(total_size as usize)];
        let mut committed: u64 = 0;
        let mut last_err: Option<FsError> = None;

        while committed < total_size {
            let cap = chunk.len().min((total_size - committed) as usize);
            let n = match src.read(&mut chunk[..cap]).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    last_err = Some(FsError::Io(e));
                    break;
                }
            };

            let offset = self.offset + committed;
            match self
                .ctx
                .content
                .write_at(&volume, &self.entry.content_key, offset, total_size, &chunk[..n])
                .await
            {
                Ok(written) => committed += written as u64,
                Err(e) => {
                    last_err = Some(FsError::Content(format!(
                        "bulk write: {}, offset: {offset}, total: {total_size}: {e}",
                        self.entry.describe()
                    )));
                    break;
                }
            }
        }

        if committed == 0 {
            return match last_err {
                Some(e) => Err(e),
                None => Ok(0),
            };
        }
        if let Some(e) = &last_err {
            tracing::warn!(
                "bulk write stopped early: username: {}, filename: {}, committed: {committed}/{total_size}: {e}",
                self.username,
                self.entry.filename
            );
        }

        let end = self.offset + committed;
        self.flush_entry(end).await?;
        self.offset = end;
        Ok(committed)
    }

    /// Cursor arithmetic only; never touches a backend. END is relative to
    /// the entry's current size. A negative result is rejected.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.entry.is_dir() {
            return Err(FsError::Invalid(format!(
                "seek: {} is a directory",
                self.entry.filename
            )));
        }
        let next: i128 = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.offset as i128 + delta as i128,
            SeekFrom::End(delta) => self.entry.size as i128 + delta as i128,
        };
        if next < 0 {
            return Err(FsError::Invalid(format!(
                "seek: negative offset {next} for {}",
                self.entry.filename
            )));
        }
        self.offset = next as u64;
        Ok(self.offset)
    }

    /// Paginated listing for directory handles. Children are re-scanned on
    /// every call and sorted by name so the cursor stays stable; entry names
    /// come back with the parent prefix stripped. `count <= 0` returns all
    /// remaining; a cursor past the end is end of stream (empty).
    pub async fn readdir(&mut self, count: i64) -> Result<Vec<DirEntry>> {
        if !self.entry.is_dir() {
            return Err(FsError::Invalid(format!(
                "readdir: {} is not a directory",
                self.entry.filename
            )));
        }

        let mut children = self
            .ctx
            .meta
            .scan_children(&self.username, &self.entry.filename, None)
            .await?;
        children.sort_by(|a, b| a.filename.cmp(&b.filename));

        if self.list_cursor >= children.len() {
            return Ok(Vec::new());
        }
        let remaining = children.len() - self.list_cursor;
        let take = if count > 0 {
            remaining.min(count as usize)
        } else {
            remaining
        };

        let out: Vec<DirEntry> = children[self.list_cursor..self.list_cursor + take]
            .iter()
            .map(|child| {
                let mut stripped = child.clone();
                stripped.filename = child.name().to_string();
                stripped
            })
            .collect();
        self.list_cursor += take;
        Ok(out)
    }

    /// Deletes this entry's bytes from the content store. Invoked only after
    /// the metadata row is gone; a failure here leaves an orphaned blob for
    /// out-of-band garbage collection.
    pub(crate) async fn remove_content(&self) -> Result<()> {
        if self.entry.location.is_empty() {
            return Ok(());
        }
        let volume = self.ctx.volumes.find_by_name(&self.entry.location).await?;
        self.ctx
            .content
            .delete(&volume, &self.entry.content_key)
            .await
            .map_err(|e| {
                FsError::Content(format!("remove content: {}: {e}", self.entry.describe()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::memory::MemoryBackend;
    use crate::content::{BackendResult, ContentBackend};
    use crate::domain::entry::flags::{APPEND, CREATE, RDONLY, WRONLY};
    use crate::meta::SqliteEntryStore;
    use crate::vfs::fs::UserFs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn test_ctx_with(content: Arc<dyn ContentBackend>) -> Arc<FsContext> {
        let pool = crate::meta::tests::memory_pool().await;
        let meta = Arc::new(SqliteEntryStore::new(pool));
        Arc::new(FsContext::new(meta, content))
    }

    async fn test_fs() -> UserFs {
        let ctx = test_ctx_with(Arc::new(MemoryBackend::new(2))).await;
        UserFs::new(ctx, "alice").unwrap()
    }

    /// Backend that starts failing writes after a fixed number of calls.
    struct FlakyBackend {
        inner: MemoryBackend,
        fail_after: usize,
        writes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ContentBackend for FlakyBackend {
        async fn allocate(&self, size_hint: u64) -> BackendResult<crate::content::Volume> {
            self.inner.allocate(size_hint).await
        }
        async fn find(&self, name: &str) -> BackendResult<crate::content::Volume> {
            self.inner.find(name).await
        }
        async fn write_at(
            &self,
            volume: &crate::content::Volume,
            key: &str,
            offset: u64,
            total_size: u64,
            data: &[u8],
        ) -> BackendResult<usize> {
            if self.writes.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
                return Err("injected write failure".into());
            }
            self.inner.write_at(volume, key, offset, total_size, data).await
        }
        async fn read_at(
            &self,
            volume: &crate::content::Volume,
            key: &str,
            offset: u64,
            len: usize,
        ) -> BackendResult<Vec<u8>> {
            self.inner.read_at(volume, key, offset, len).await
        }
        async fn delete(&self, volume: &crate::content::Volume, key: &str) -> BackendResult<()> {
            self.inner.delete(volume, key).await
        }
    }

    #[tokio::test]
    async fn test_read_unbound_is_eof() {
        let fs = test_fs().await;
        let mut handle = fs.open("/empty", CREATE | WRONLY, 0o644).await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(handle.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_binds_location_and_key() {
        let fs = test_fs().await;
        let mut handle = fs.open("/f", CREATE | WRONLY, 0o644).await.unwrap();
        assert!(handle.entry().location.is_empty());

        handle.write(b"hello").await.unwrap();
        assert!(!handle.entry().location.is_empty());
        assert!(handle.entry().content_key.starts_with("alice:"));
        assert_eq!(handle.entry().size, 5);

        // The binding is persisted, not just in the handle.
        let stat = fs.stat("/f").await.unwrap();
        assert_eq!(stat.location, handle.entry().location);
        assert_eq!(stat.content_key, handle.entry().content_key);

        // A later write reuses the bound volume and key.
        handle.write(b" world").await.unwrap();
        let again = fs.stat("/f").await.unwrap();
        assert_eq!(again.location, stat.location);
        assert_eq!(again.content_key, stat.content_key);
        assert_eq!(again.size, 11);
    }

    #[tokio::test]
    async fn test_seek_semantics() {
        let fs = test_fs().await;
        let mut handle = fs.open("/f", CREATE | WRONLY, 0o644).await.unwrap();
        handle.write(b"0123456789").await.unwrap();

        assert_eq!(handle.seek(SeekFrom::Start(4)).unwrap(), 4);
        assert_eq!(handle.seek(SeekFrom::Current(2)).unwrap(), 6);
        assert_eq!(handle.seek(SeekFrom::End(-3)).unwrap(), 7);
        assert!(matches!(
            handle.seek(SeekFrom::Current(-100)),
            Err(FsError::Invalid(_))
        ));
        // Failed seek leaves the cursor untouched.
        assert_eq!(handle.offset(), 7);
    }

    #[tokio::test]
    async fn test_append_flag_positions_cursor() {
        let fs = test_fs().await;
        let mut handle = fs.open("/log", CREATE | WRONLY, 0o644).await.unwrap();
        handle.write(b"one").await.unwrap();

        let mut appender = fs.open("/log", WRONLY | APPEND, 0o644).await.unwrap();
        assert_eq!(appender.offset(), 3);
        appender.write(b"two").await.unwrap();

        let mut reader = fs.open("/log", RDONLY, 0).await.unwrap();
        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"onetwo");
    }

    #[tokio::test]
    async fn test_write_from_full_transfer() {
        let fs = test_fs().await;
        let mut handle = fs.open("/bulk", CREATE | WRONLY, 0o644).await.unwrap();

        let data = vec![9u8; 1000];
        let mut src = &data[..];
        let committed = handle.write_from(&mut src, 1000).await.unwrap();
        assert_eq!(committed, 1000);
        assert_eq!(handle.entry().size, 1000);
        assert_eq!(handle.offset(), 1000);
    }

    #[tokio::test]
    async fn test_write_from_is_capped_at_total_size() {
        let fs = test_fs().await;
        let mut handle = fs.open("/bulk", CREATE | WRONLY, 0o644).await.unwrap();

        let data = vec![1u8; 500];
        let mut src = &data[..];
        let committed = handle.write_from(&mut src, 100).await.unwrap();
        assert_eq!(committed, 100);
        assert_eq!(handle.entry().size, 100);
    }

    #[tokio::test]
    async fn test_write_from_partial_failure_keeps_committed_bytes() {
        let flaky = Arc::new(FlakyBackend {
            inner: MemoryBackend::new(1),
            fail_after: 1,
            writes: AtomicUsize::new(0),
        });
        let ctx = test_ctx_with(flaky).await;
        let fs = UserFs::new(ctx, "alice").unwrap();
        let mut handle = fs.open("/bulk", CREATE | WRONLY, 0o644).await.unwrap();

        // Two chunks needed; the second one fails.
        let total = (WRITE_CHUNK + 100) as u64;
        let data = vec![5u8; total as usize];
        let mut src = &data[..];
        let committed = handle.write_from(&mut src, total).await.unwrap();
        assert_eq!(committed, WRITE_CHUNK as u64);
        assert_eq!(handle.entry().size, WRITE_CHUNK as i64);
        assert_eq!(handle.offset(), WRITE_CHUNK as u64);
    }

    #[tokio::test]
    async fn test_write_from_total_failure_returns_last_error() {
        let flaky = Arc::new(FlakyBackend {
            inner: MemoryBackend::new(1),
            fail_after: 0,
            writes: AtomicUsize::new(0),
        });
        let ctx = test_ctx_with(flaky).await;
        let fs = UserFs::new(ctx, "alice").unwrap();
        let mut handle = fs.open("/bulk", CREATE | WRONLY, 0o644).await.unwrap();

        let data = vec![5u8; 10];
        let mut src = &data[..];
        assert!(matches!(
            handle.write_from(&mut src, 10).await,
            Err(FsError::Content(_))
        ));
        assert_eq!(handle.offset(), 0);
    }

    #[tokio::test]
    async fn test_directory_handle_rejects_stream_ops() {
        let fs = test_fs().await;
        fs.mkdir("/d", 0o755).await.unwrap();
        let mut handle = fs.open("/d", RDONLY, 0).await.unwrap();

        let mut buf = [0u8; 4];
        assert!(matches!(handle.read(&mut buf).await, Err(FsError::Invalid(_))));
        assert!(matches!(handle.write(b"x").await, Err(FsError::Invalid(_))));
        assert!(matches!(handle.seek(SeekFrom::Start(0)), Err(FsError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_readdir_rejects_file_handle() {
        let fs = test_fs().await;
        let mut handle = fs.open("/f", CREATE | WRONLY, 0o644).await.unwrap();
        assert!(matches!(handle.readdir(0).await, Err(FsError::Invalid(_))));
    }
}

//! Per-user filesystem façade: binds an authenticated identity to path
//! resolution, open-flag semantics and the directory tree operations.

use crate::domain::DirEntry;
use crate::domain::entry::{MODE_DIR, MODE_PERM_MASK, flags};
use crate::error::{FsError, Result};
use crate::vfs::file::FileHandle;
use crate::vfs::{FsContext, clean_path, parent_path};
use chrono::Utc;
use futures::future::BoxFuture;
use std::sync::Arc;

pub struct UserFs {
    ctx: Arc<FsContext>,
    username: String,
}

impl UserFs {
    /// Requests must arrive with an authenticated, non-empty username.
    pub fn new(ctx: Arc<FsContext>, username: &str) -> Result<Self> {
        if username.is_empty() {
            return Err(FsError::Unauthorized("empty username".to_string()));
        }
        Ok(UserFs {
            ctx,
            username: username.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The parent must already exist and be a directory; root needs no row.
    async fn resolve_parent(&self, parent: &str) -> Result<()> {
        if parent == "/" {
            return Ok(());
        }
        let entry = self.ctx.meta.stat(&self.username, parent).await?;
        if !entry.is_dir() {
            return Err(FsError::Invalid(format!(
                "parent is not a directory: {parent}"
            )));
        }
        Ok(())
    }

    pub async fn stat(&self, path: &str) -> Result<DirEntry> {
        let filename = clean_path(path);
        if filename == "/" {
            // Root always exists; it is synthesized, never stored.
            return Ok(DirEntry::root(&self.username));
        }
        self.ctx.meta.stat(&self.username, &filename).await
    }

    pub async fn mkdir(&self, path: &str, mode: u32) -> Result<()> {
        let filename = clean_path(path);
        if filename == "/" {
            return Err(FsError::Invalid("cannot create root".to_string()));
        }
        let parent = parent_path(&filename);
        self.resolve_parent(&parent).await?;

        let mut entry = DirEntry::new(
            &self.username,
            &filename,
            &parent,
            (mode & MODE_PERM_MASK) | MODE_DIR,
        );
        self.ctx.meta.insert(&mut entry).await?;
        tracing::info!("mkdir: {}", entry.describe());
        Ok(())
    }

    /// Opens `path`, creating it when `CREATE` is set and the entry is
    /// absent. Write-intent flags against root are rejected. With write
    /// intent plus `TRUNC` on a non-empty file, the size is reset and
    /// persisted here, before any byte transfer.
    pub async fn open(&self, path: &str, open_flags: u32, mode: u32) -> Result<FileHandle> {
        let filename = clean_path(path);
        if filename == "/" {
            if flags::has_write_intent(open_flags) {
                return Err(FsError::PermissionDenied(
                    "write access to root".to_string(),
                ));
            }
            return Ok(FileHandle::new(
                self.ctx.clone(),
                self.username.clone(),
                DirEntry::root(&self.username),
                open_flags,
            ));
        }

        let mut entry = match self.ctx.meta.stat(&self.username, &filename).await {
            Ok(existing) => existing,
            Err(FsError::NotFound(_)) if open_flags & flags::CREATE != 0 => {
                let parent = parent_path(&filename);
                self.resolve_parent(&parent).await?;
                let mut entry =
                    DirEntry::new(&self.username, &filename, &parent, mode & MODE_PERM_MASK);
                self.ctx.meta.insert(&mut entry).await?;
                tracing::info!(
                    "open: created: username: {}, filename: {}, flags: {:#x}",
                    self.username,
                    filename,
                    open_flags
                );
                entry
            }
            Err(e) => return Err(e),
        };

        if flags::has_write_intent(open_flags)
            && open_flags & flags::TRUNC != 0
            && entry.size != 0
        {
            entry.size = 0;
            entry.modified = Utc::now();
            self.ctx.meta.update(&entry).await?;
        }

        Ok(FileHandle::new(
            self.ctx.clone(),
            self.username.clone(),
            entry,
            open_flags,
        ))
    }

    /// Removes an entry. Directories must be empty — removing a non-empty
    /// directory is refused rather than orphaning its children. For files
    /// with bound content, the bytes are deleted after the metadata row; a
    /// content-store failure at that point leaves an orphaned blob.
    pub async fn remove_all(&self, path: &str) -> Result<()> {
        let filename = clean_path(path);
        if filename == "/" {
            return Err(FsError::Invalid("cannot remove root".to_string()));
        }

        let entry = self.ctx.meta.stat(&self.username, &filename).await?;
        if entry.is_dir() {
            let children = self
                .ctx
                .meta
                .scan_children(&self.username, &filename, None)
                .await?;
            if !children.is_empty() {
                return Err(FsError::NotEmpty(format!(
                    "{filename} has {} entries",
                    children.len()
                )));
            }
        }

        self.ctx.meta.delete(&self.username, &filename).await?;
        tracing::info!("remove: {}", entry.describe());

        if !entry.is_dir() && !entry.location.is_empty() {
            let handle = FileHandle::new(
                self.ctx.clone(),
                self.username.clone(),
                entry,
                flags::RDONLY,
            );
            handle.remove_content().await?;
        }
        Ok(())
    }

    /// Renames `old` to `new`. Identity renames are a no-op; renaming a path
    /// into its own subtree is rejected. A directory may land on an existing
    /// destination only if that destination is an empty directory; a file
    /// landing on an existing file replaces it, content included. The move is
    /// delete-then-insert per entry, recursing over a directory's children;
    /// atomicity is per entry only.
    pub async fn rename(&self, old: &str, new: &str) -> Result<()> {
        self.rename_boxed(old, new).await
    }

    fn rename_boxed<'a>(&'a self, old: &'a str, new: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let old_path = clean_path(old);
            let new_path = clean_path(new);
            if old_path == "/" || new_path == "/" {
                return Err(FsError::Invalid("cannot rename root".to_string()));
            }
            if old_path == new_path {
                return Ok(());
            }
            if new_path.starts_with(&format!("{old_path}/")) {
                return Err(FsError::Invalid(format!(
                    "cannot rename {old_path} into its own subtree {new_path}"
                )));
            }

            let source = self.ctx.meta.stat(&self.username, &old_path).await?;
            let new_parent = parent_path(&new_path);
            self.resolve_parent(&new_parent).await?;

            // The destination must be cleared before the insert under the
            // (username, filename) key; the source row is only deleted once
            // the collision checks have passed.
            match self.ctx.meta.stat(&self.username, &new_path).await {
                Ok(dest) if source.is_dir() => {
                    if !dest.is_dir() {
                        return Err(FsError::Invalid(format!(
                            "rename: {old_path} -> {new_path}: destination is not a directory"
                        )));
                    }
                    let occupants = self
                        .ctx
                        .meta
                        .scan_children(&self.username, &new_path, None)
                        .await?;
                    if !occupants.is_empty() {
                        return Err(FsError::NotEmpty(format!(
                            "rename: {old_path} -> {new_path}: destination has {} entries",
                            occupants.len()
                        )));
                    }
                    // Empty directory collision: the destination row is
                    // replaced by the moved one.
                    self.ctx.meta.delete(&self.username, &new_path).await?;
                }
                Ok(dest) => {
                    if dest.is_dir() {
                        return Err(FsError::Invalid(format!(
                            "rename: {old_path} -> {new_path}: destination is a directory"
                        )));
                    }
                    // File collision: the destination is replaced, its bytes
                    // deleted after the row.
                    self.ctx.meta.delete(&self.username, &new_path).await?;
                    if !dest.location.is_empty() {
                        let handle = FileHandle::new(
                            self.ctx.clone(),
                            self.username.clone(),
                            dest,
                            flags::RDONLY,
                        );
                        handle.remove_content().await?;
                    }
                }
                Err(FsError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }

            self.ctx.meta.delete(&self.username, &old_path).await?;
            let mut moved = source.clone();
            moved.filename = new_path.clone();
            moved.parent = new_parent;
            self.ctx.meta.insert(&mut moved).await?;
            tracing::info!(
                "rename: username: {}, {} -> {}",
                self.username,
                old_path,
                new_path
            );

            if !source.is_dir() {
                return Ok(());
            }
            let children = self
                .ctx
                .meta
                .scan_children(&self.username, &old_path, None)
                .await?;
            for child in children {
                let name = child.name();
                let src = format!("{old_path}/{name}");
                let dst = format!("{new_path}/{name}");
                self.rename_boxed(&src, &dst).await?;
            }
            Ok(())
        })
    }
}

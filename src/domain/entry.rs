use chrono::{DateTime, Utc};
use serde::Serialize;

/// Open flags accepted by `UserFs::open`. Modeled after the POSIX open(2)
/// flag set the WebDAV front end translates into.
pub mod flags {
    pub const RDONLY: u32 = 0;
    pub const WRONLY: u32 = 1 << 0;
    pub const RDWR: u32 = 1 << 1;
    pub const CREATE: u32 = 1 << 2;
    pub const TRUNC: u32 = 1 << 3;
    pub const APPEND: u32 = 1 << 4;

    pub fn has_write_intent(flags: u32) -> bool {
        flags & (WRONLY | RDWR) != 0
    }
}

/// Directory bit carried in `DirEntry::mode` alongside the permission bits.
pub const MODE_DIR: u32 = 0o40000;
pub const MODE_PERM_MASK: u32 = 0o7777;

/// One row of directory metadata. Uniquely keyed by `(username, filename)`;
/// `parent` is the cleaned path of the containing directory (`/` for root).
///
/// `location` names the content-store volume holding this file's bytes and
/// `content_key` addresses the byte stream inside it. Both are empty until
/// the first write binds them, and stay empty forever for directories.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct DirEntry {
    pub username: String,
    pub filename: String,
    pub parent: String,
    pub location: String,
    pub content_key: String,
    pub mode: u32,
    pub size: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl DirEntry {
    pub fn new(username: &str, filename: &str, parent: &str, mode: u32) -> Self {
        let now = Utc::now();
        DirEntry {
            username: username.to_string(),
            filename: filename.to_string(),
            parent: parent.to_string(),
            location: String::new(),
            content_key: String::new(),
            mode,
            size: 0,
            created: now,
            modified: now,
        }
    }

    /// Synthetic root directory entry. Root is never stored as a row but
    /// always exists for stat/readdir purposes.
    pub fn root(username: &str) -> Self {
        DirEntry::new(username, "/", "/", MODE_DIR | 0o755)
    }

    pub fn is_dir(&self) -> bool {
        self.mode & MODE_DIR != 0
    }

    /// Final path component, e.g. `c` for `/a/b/c`. Root yields `/`.
    pub fn name(&self) -> &str {
        match self.filename.rfind('/') {
            Some(n) if self.filename.len() > n + 1 => &self.filename[n + 1..],
            _ => &self.filename,
        }
    }

    /// Log-friendly one-liner identifying this entry.
    pub fn describe(&self) -> String {
        format!(
            "username: {}, filename: {}, parent: {}, location: {}, mode: {:o}, size: {}",
            self.username, self.filename, self.parent, self.location, self.mode, self.size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_and_dir_bit() {
        let e = DirEntry::new("alice", "/a/b/c", "/a/b", 0o644);
        assert_eq!(e.name(), "c");
        assert!(!e.is_dir());

        let d = DirEntry::new("alice", "/a", "/", MODE_DIR | 0o755);
        assert_eq!(d.name(), "a");
        assert!(d.is_dir());

        assert_eq!(DirEntry::root("alice").name(), "/");
        assert!(DirEntry::root("alice").is_dir());
    }

    #[test]
    fn test_write_intent() {
        assert!(!flags::has_write_intent(flags::RDONLY));
        assert!(flags::has_write_intent(flags::WRONLY | flags::CREATE));
        assert!(flags::has_write_intent(flags::RDWR));
        assert!(!flags::has_write_intent(flags::CREATE));
    }
}

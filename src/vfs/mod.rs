//! Virtual filesystem layer: maps file operations onto the directory-entry
//! table and the content store.

pub mod file;
pub mod fs;

use crate::content::ContentBackend;
use crate::content::router::VolumeRouter;
use crate::error::Result;
use crate::meta::EntryStore;
use std::sync::Arc;

/// Shared backend handles, constructed once at startup and passed explicitly
/// to every component. No ambient globals.
pub struct FsContext {
    pub meta: Arc<dyn EntryStore>,
    pub content: Arc<dyn ContentBackend>,
    pub volumes: VolumeRouter,
}

impl FsContext {
    pub fn new(meta: Arc<dyn EntryStore>, content: Arc<dyn ContentBackend>) -> Self {
        let volumes = VolumeRouter::new(content.clone());
        FsContext {
            meta,
            content,
            volumes,
        }
    }

    pub async fn ping(&self) -> Result<()> {
        self.meta.ping().await
    }
}

/// Canonicalizes a path to absolute form: collapses repeated separators,
/// resolves `.` and `..` (bounded at root), strips trailing slashes.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Containing directory of a cleaned path; `/` is its own parent.
pub fn parent_path(cleaned: &str) -> String {
    match cleaned.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(n) => cleaned[..n].to_string(),
    }
}

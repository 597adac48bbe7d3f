use crate::config::Config;
use crate::content::ContentBackend;
use crate::meta::users::{SqliteUserStore, UserStore};
use crate::meta::{EntryStore, SqliteEntryStore};
use crate::vfs::FsContext;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<FsContext>,
    pub users: Arc<dyn UserStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, pool: Arc<Pool<Sqlite>>, content: Arc<dyn ContentBackend>) -> Self {
        let meta: Arc<dyn EntryStore> = Arc::new(SqliteEntryStore::new(pool.clone()));
        AppState {
            ctx: Arc::new(FsContext::new(meta, content)),
            users: Arc::new(SqliteUserStore::new(pool)),
            config: Arc::new(config),
        }
    }
}

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub(crate) struct Args {
    /// Server listening host
    #[arg(long, env = "WEBFS_HOST", default_value = "127.0.0.1")]
    pub(crate) host: String,

    /// Server listening port
    #[arg(short, long, env = "WEBFS_PORT", default_value_t = 8970)]
    pub(crate) port: u16,

    /// Metadata database URL
    #[arg(
        long,
        env = "WEBFS_DATABASE_URL",
        default_value = "sqlite:/var/lib/webfs/webfs.db"
    )]
    pub(crate) database_url: String,

    /// Content store root path
    #[arg(long, env = "WEBFS_CONTENT_ROOT", default_value = "/var/lib/webfs/content")]
    pub(crate) content_root: String,

    /// Number of content volumes under the root
    #[arg(long, env = "WEBFS_VOLUMES", default_value_t = 4)]
    pub(crate) volumes: usize,
}

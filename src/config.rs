#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_url: String,
    pub content_root: String,
    pub volume_count: usize,
}

pub mod entry;
pub mod user;

pub use entry::DirEntry;
pub use user::User;

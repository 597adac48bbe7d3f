pub mod cli;
pub mod password;
pub mod state;

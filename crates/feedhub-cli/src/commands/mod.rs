pub mod add;
pub mod articles;
pub mod config;
pub mod delete;
pub mod fetch;
pub mod list;
pub mod status;

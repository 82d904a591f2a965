mod article_repo;
mod config_repo;
mod database;
mod feed_repo;
mod repository;

pub use article_repo::ArticleRepository;
pub use config_repo::{ConfigRepository, StoredSchedulerConfig};
pub use database::Database;
pub use feed_repo::FeedRepository;
pub use repository::Repository;

pub mod config;
pub mod error;
pub mod feed;
pub mod lock;
pub mod scheduler;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use lock::SingletonLock;
pub use scheduler::{ConfigSync, Scheduler, SchedulerOptions};

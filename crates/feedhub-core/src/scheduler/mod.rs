mod interval;
mod service;
mod sync;
mod worker;

pub use interval::{format_interval, parse_interval};
pub use service::{Scheduler, SchedulerOptions};
pub use sync::ConfigSync;

pub mod config;
pub mod core;
pub mod pipeline;
pub mod scheduler;
pub mod sink;
pub mod source;

pub use crate::config::Config;
pub use crate::core::*;
pub use crate::pipeline::Pipeline;
pub use crate::scheduler::{Scheduler, SchedulerState};

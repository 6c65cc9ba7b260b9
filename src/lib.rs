// In-process emulator for a queue (SQS-like) and topic (SNS-like)
// messaging bus. Core library module.

pub mod arn;
pub mod bus;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod move_task;
pub mod pagination;
pub mod queue;
pub mod sequence;
pub mod time;
pub mod topic;
pub mod usage;

pub use bus::MessageBus;
pub use config::BusConfig;
pub use error::{BusError, Result};
pub use time::{SystemTimeProvider, TimeProvider};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

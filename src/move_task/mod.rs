pub mod worker;

pub use worker::{run, QueueResolver};

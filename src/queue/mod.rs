pub mod core;
pub mod group;
pub mod visibility;

pub use core::{QueueCore, ReceiveInput, ReceivedMessage, SendInput, SendOutput};

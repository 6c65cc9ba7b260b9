// MoveTask data model (§3, §4.3).

use crate::arn::Arn;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTaskStatus {
    Running,
    Cancelling,
    Cancelled,
    Completed,
    Failed,
}

impl MoveTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveTaskStatus::Running => "RUNNING",
            MoveTaskStatus::Cancelling => "CANCELLING",
            MoveTaskStatus::Cancelled => "CANCELLED",
            MoveTaskStatus::Completed => "COMPLETED",
            MoveTaskStatus::Failed => "FAILED",
        }
    }
}

#[derive(Debug)]
pub struct MoveTask {
    pub task_handle: String,
    pub source_queue_arn: Arn,
    pub destination_queue_arn: Option<Arn>,
    pub rate_limit_per_second: u32,
    pub status: parking_lot::RwLock<MoveTaskStatus>,
    pub moved: AtomicU64,
    pub to_move: AtomicI64,
}

impl MoveTask {
    pub fn new(
        task_handle: String,
        source_queue_arn: Arn,
        destination_queue_arn: Option<Arn>,
        rate_limit_per_second: u32,
        to_move: u64,
    ) -> Self {
        Self {
            task_handle,
            source_queue_arn,
            destination_queue_arn,
            rate_limit_per_second,
            status: parking_lot::RwLock::new(MoveTaskStatus::Running),
            moved: AtomicU64::new(0),
            to_move: AtomicI64::new(to_move as i64),
        }
    }

    pub fn status(&self) -> MoveTaskStatus {
        *self.status.read()
    }

    pub fn set_status(&self, status: MoveTaskStatus) {
        *self.status.write() = status;
    }

    pub fn moved_count(&self) -> u64 {
        self.moved.load(Ordering::SeqCst)
    }

    pub fn to_move_count(&self) -> i64 {
        self.to_move.load(Ordering::SeqCst)
    }

    pub fn record_move(&self) {
        self.moved.fetch_add(1, Ordering::SeqCst);
        self.to_move.fetch_sub(1, Ordering::SeqCst);
    }
}

// MoveWorker (§4.3): redrives messages out of a dead-letter queue on a
// periodic tick, rate-limited and driven entirely by the injected clock.
// Runs as one spawned task per RUNNING move task.

use crate::arn::Arn;
use crate::model::{MoveTask, MoveTaskStatus};
use crate::queue::QueueCore;
use crate::time::{CancellationToken, TimeProvider};
use std::sync::Arc;
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Resolves a queue ARN to its live `QueueCore`, or `None` if it has since
/// been deleted (arena-style lookup, §9 Design Notes).
pub type QueueResolver = Arc<dyn Fn(&Arn) -> Option<Arc<QueueCore>> + Send + Sync>;

pub async fn run(
    task: Arc<MoveTask>,
    source: Arc<QueueCore>,
    time: Arc<dyn TimeProvider>,
    resolve_queue: QueueResolver,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(source = %source.arn, moved = task.moved_count(), "move task cancelled");
                task.set_status(MoveTaskStatus::Cancelled);
                return;
            }
            _ = time.sleep(TICK_INTERVAL) => {}
        }

        let budget = task.rate_limit_per_second.max(1);
        for _ in 0..budget {
            if task.to_move_count() <= 0 {
                tracing::info!(source = %source.arn, moved = task.moved_count(), "move task completed");
                task.set_status(MoveTaskStatus::Completed);
                return;
            }
            let Some(message) = source.drain_one_for_move() else {
                tracing::info!(source = %source.arn, moved = task.moved_count(), "move task completed");
                task.set_status(MoveTaskStatus::Completed);
                return;
            };

            let mut redriven = message;
            redriven.strip_receive_lifecycle();

            let destination_arn = task.destination_queue_arn.clone().or_else(|| {
                redriven
                    .system_attributes
                    .dead_letter_queue_source_arn
                    .as_deref()
                    .and_then(|s| Arn::parse(s).ok())
            });

            let Some(destination_arn) = destination_arn else {
                continue;
            };
            let Some(destination) = resolve_queue(&destination_arn) else {
                continue;
            };
            match destination.enqueue_from_redrive(redriven) {
                Ok(()) => task.record_move(),
                Err(e) => tracing::warn!(
                    source = %source.arn,
                    destination = %destination_arn,
                    error = %e,
                    "failed to move message out of dead-letter queue"
                ),
            }
        }
    }
}

// One VisibilityTimer per in-flight message (§2, §4.1.5): on expiry it
// re-enqueues the message into the owning queue's ready structure. Races
// between timer-fire, delete and changeVisibility(0) are resolved by
// `DashMap::remove` — whichever call removes the entry first acts; the
// others observe absence and no-op (see `QueueCore::resolve_in_flight`).

use crate::model::Message;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct InFlightEntry {
    pub message: Message,
    pub group_id: Option<String>,
    pub timer: JoinHandle<()>,
}

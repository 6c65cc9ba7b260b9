// Injected clock. Every suspension point in the bus (visibility timers,
// delayed send, receive long-poll, the move-worker tick) goes through a
// `TimeProvider` rather than sleeping on the wall clock directly, so tests
// can advance a `FakeClock` and observe timing behaviour deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

#[async_trait]
pub trait TimeProvider: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock time, used outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

#[async_trait]
impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tokio::time::sleep(duration).await;
    }
}

struct Waiter {
    deadline: DateTime<Utc>,
    tx: oneshot::Sender<()>,
}

struct FakeClockState {
    now: DateTime<Utc>,
    waiters: Vec<Waiter>,
}

/// A deterministic clock: `now()` only moves when `advance()` is called.
/// Every outstanding `sleep()` whose deadline has passed fires, in deadline
/// order, when `advance()` crosses it.
#[derive(Debug)]
pub struct FakeClock {
    inner: Mutex<FakeClockState>,
}

impl std::fmt::Debug for FakeClockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeClockState")
            .field("now", &self.now)
            .field("pending_waiters", &self.waiters.len())
            .finish()
    }
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(FakeClockState {
                now: start,
                waiters: Vec::new(),
            }),
        })
    }

    pub fn epoch() -> Arc<Self> {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Move time forward, waking every waiter whose deadline has been
    /// reached or passed, in deadline order.
    pub fn advance(&self, delta: Duration) {
        let mut state = self.inner.lock();
        state.now += chrono::Duration::from_std(delta).unwrap_or_default();
        let now = state.now;
        let mut due: Vec<Waiter> = Vec::new();
        let mut remaining: Vec<Waiter> = Vec::new();
        for w in state.waiters.drain(..) {
            if w.deadline <= now {
                due.push(w);
            } else {
                remaining.push(w);
            }
        }
        state.waiters = remaining;
        drop(state);
        due.sort_by_key(|w| w.deadline);
        for w in due {
            let _ = w.tx.send(());
        }
    }
}

#[async_trait]
impl TimeProvider for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let rx = {
            let mut state = self.inner.lock();
            let deadline = state.now + chrono::Duration::from_std(duration).unwrap_or_default();
            let (tx, rx) = oneshot::channel();
            state.waiters.push(Waiter { deadline, tx });
            rx
        };
        let _ = rx.await;
    }
}

/// Hand-rolled cooperative cancellation: cheaper than pulling in `tokio-util`
/// for the one signal the long-poll receive path needs.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    notify: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

//! Severity-aware FIFO queue per fingerprint (SPEC_FULL.md §3 supplement):
//! under `FingerprintPolicy::Queue`, a `critical` incident queued for a
//! fingerprint that already has lower-severity submissions waiting cuts
//! ahead of them rather than waiting its literal arrival order.
//!
//! `FingerprintPolicy::Reject` has no queue to reorder — a rejected
//! submission never waits — so this type is only used by the `Queue` path.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::domain::Severity;

struct Waiter {
    severity_rank: u8,
    seq: u64,
    notify: Arc<Notify>,
}

impl PartialEq for Waiter {
    fn eq(&self, other: &Self) -> bool {
        self.severity_rank == other.severity_rank && self.seq == other.seq
    }
}
impl Eq for Waiter {}
impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher severity should pop first, and
        // among equal severity the earlier arrival (lower seq) should pop
        // first, so seq comparison is reversed.
        self.severity_rank
            .cmp(&other.severity_rank)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct State {
    locked: bool,
    waiters: BinaryHeap<Waiter>,
}

/// One severity-ordered exclusive lock per fingerprint. There is no guard
/// type: acquisition and release happen from independent points in the
/// orchestrator's submission/completion flow, so `release` is called
/// explicitly rather than on drop.
pub struct PriorityLock {
    state: Mutex<State>,
    seq: AtomicU64,
}

impl PriorityLock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            seq: AtomicU64::new(0),
        }
    }

    /// Wait for exclusive access. Higher-`severity` callers cut ahead of
    /// already-queued lower-severity ones; equal severity preserves arrival
    /// order.
    pub async fn acquire(&self, severity: &Severity) {
        let notify = Arc::new(Notify::new());
        {
            let mut state = self.state.lock().await;
            if !state.locked {
                state.locked = true;
                return;
            }
            let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
            state.waiters.push(Waiter {
                severity_rank: severity.rank(),
                seq,
                notify: notify.clone(),
            });
        }
        notify.notified().await;
    }

    /// Release the lock, waking the highest-severity (then earliest)
    /// waiter if any are queued.
    pub async fn release(&self) {
        let mut state = self.state.lock().await;
        match state.waiters.pop() {
            Some(waiter) => waiter.notify.notify_one(),
            None => state.locked = false,
        }
    }
}

impl Default for PriorityLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[tokio::test]
    async fn second_acquirer_waits_until_release() {
        let lock = Arc::new(PriorityLock::new());
        lock.acquire(&Severity::Low).await;

        let waiter_lock = lock.clone();
        let handle = tokio::spawn(async move {
            waiter_lock.acquire(&Severity::Low).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        lock.release().await;
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should be released")
            .unwrap();
    }

    #[tokio::test]
    async fn critical_severity_preempts_already_queued_low_severity() {
        let lock = Arc::new(PriorityLock::new());
        lock.acquire(&Severity::Low).await; // holds the lock

        let order = Arc::new(StdMutex::new(Vec::new()));

        let low_lock = lock.clone();
        let low_order = order.clone();
        let low = tokio::spawn(async move {
            low_lock.acquire(&Severity::Low).await;
            low_order.lock().unwrap().push("low");
            low_lock.release().await;
        });
        // ensure `low` has enqueued before `critical` arrives.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let crit_lock = lock.clone();
        let crit_order = order.clone();
        let critical = tokio::spawn(async move {
            crit_lock.acquire(&Severity::Critical).await;
            crit_order.lock().unwrap().push("critical");
            crit_lock.release().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        lock.release().await; // releases the initial holder, queue now decides

        tokio::time::timeout(Duration::from_secs(1), low).await.unwrap().unwrap();
        tokio::time::timeout(Duration::from_secs(1), critical).await.unwrap().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["critical", "low"]);
    }
}

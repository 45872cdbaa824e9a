//! Bounded admission control for call attempts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// The gate was closed while waiting for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("concurrency gate closed")]
pub struct GateClosed;

/// Limits simultaneous call attempts to a fixed capacity.
///
/// Waiters are admitted in FIFO order.
#[derive(Debug)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    acquired_total: AtomicU64,
}

/// One occupied slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct GateSlot {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Create a gate with `capacity` slots, clamped to `1..=Semaphore::MAX_PERMITS`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            acquired_total: AtomicU64::new(0),
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<GateSlot, GateClosed> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        self.acquired_total.fetch_add(1, Ordering::Relaxed);
        Ok(GateSlot { _permit: permit })
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<GateSlot> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        self.acquired_total.fetch_add(1, Ordering::Relaxed);
        Some(GateSlot { _permit: permit })
    }

    /// Wake all waiters with [`GateClosed`]. Held slots stay valid.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Slots handed out since creation.
    pub fn acquired_total(&self) -> u64 {
        self.acquired_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, assert_ready_err, task};

    #[test]
    fn test_zero_capacity_clamped() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.capacity(), 1);
        assert_eq!(gate.available(), 1);
    }

    #[test]
    fn test_oversized_capacity_clamped() {
        let gate = ConcurrencyGate::new(usize::MAX);
        assert_eq!(gate.capacity(), Semaphore::MAX_PERMITS);
    }

    #[test]
    fn test_pending_acquire_completes_on_release() {
        let gate = ConcurrencyGate::new(1);
        let held = gate.try_acquire().unwrap();

        let mut acquire = task::spawn(gate.acquire());
        assert_pending!(acquire.poll());

        drop(held);
        assert!(acquire.is_woken());
        let slot = assert_ready!(acquire.poll());
        assert!(slot.is_ok());
    }

    #[tokio::test]
    async fn test_slot_released_on_drop() {
        let gate = ConcurrencyGate::new(2);
        let a = gate.acquire().await.unwrap();
        let _b = gate.acquire().await.unwrap();
        assert_eq!(gate.in_use(), 2);
        assert!(gate.try_acquire().is_none());

        drop(a);
        assert_eq!(gate.in_use(), 1);
        assert!(gate.try_acquire().is_some());
        assert_eq!(gate.acquired_total(), 3);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_slot_released_when_task_panics() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        let slot = gate.acquire().await.unwrap();

        let handle = tokio::spawn(async move {
            let _slot = slot;
            panic!("attempt blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let gate = Arc::new(ConcurrencyGate::new(1));
        let _held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire().await.map(|_| ()) })
        };
        tokio::task::yield_now().await;

        gate.close();
        assert_eq!(waiter.await.unwrap(), Err(GateClosed));
    }

    #[test]
    fn test_close_keeps_held_slots_valid() {
        let gate = ConcurrencyGate::new(1);
        let held = gate.try_acquire().unwrap();

        let mut acquire = task::spawn(gate.acquire());
        assert_pending!(acquire.poll());

        gate.close();
        assert!(gate.is_closed());
        assert!(acquire.is_woken());
        assert_ready_err!(acquire.poll());

        drop(held);
        assert_eq!(gate.in_use(), 0);
    }
}

//! Admission control for external calls.
//!
//! A [`ConcurrencyGate`] is a counting semaphore shared by every agent that
//! holds the same [`AgentContext`](super::AgentContext). A slot is held by a
//! [`GatePermit`] and released when the permit is dropped, so success, error
//! and cancellation all give the slot back.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// The gate's semaphore was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Concurrency gate is closed")]
pub struct GateClosed;

/// Bounded number of in-flight external calls.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One admitted slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl ConcurrencyGate {
    pub const DEFAULT_CAPACITY: usize = 5;

    /// Creates a gate admitting at most `capacity` holders (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free slot. Waiters are admitted in FIFO order.
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        if self.semaphore.available_permits() == 0 {
            debug!(capacity = self.capacity, "Waiting for a concurrency slot");
        }
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    /// Runs `future` while holding a slot.
    pub async fn run<F, T, E>(&self, future: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<GateClosed>,
    {
        let _permit = self.acquire().await?;
        future.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{FuturesUnordered, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_capacity() {
        let gate = ConcurrencyGate::new(5);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = FuturesUnordered::new();
        for _ in 0..11 {
            let gate = gate.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                gate.run(async {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, GateClosed>(())
                })
                .await
            }));
        }
        while let Some(joined) = tasks.next().await {
            joined.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 5);
        assert_eq!(gate.available(), 5);
    }

    #[tokio::test]
    async fn test_released_on_error() {
        let gate = ConcurrencyGate::new(2);
        let result: Result<(), TestError> = gate.run(async { Err(TestError::Boom) }).await;
        assert!(matches!(result, Err(TestError::Boom)));
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_on_cancellation() {
        let gate = ConcurrencyGate::new(1);
        let guarded = gate.run(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, GateClosed>(())
        });
        let timed_out = tokio::time::timeout(Duration::from_secs(1), guarded).await;
        assert!(timed_out.is_err());
        assert_eq!(gate.available(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(ConcurrencyGate::new(0).capacity(), 1);
        assert_eq!(ConcurrencyGate::default().capacity(), 5);
    }

    #[derive(Debug)]
    enum TestError {
        Closed,
        Boom,
    }

    impl From<GateClosed> for TestError {
        fn from(_: GateClosed) -> Self {
            TestError::Closed
        }
    }
}

//! Bounded worker pool
//!
//! A counting admission gate over a [`tokio::sync::Semaphore`]. Waiters are
//! served in FIFO order, and a pending [`WorkerPool::acquire`] can be
//! dropped at any time without leaking a slot.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::SyncError;

/// Fixed-capacity pool of worker slots
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Creates a pool with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Waits for a free slot
    ///
    /// # Errors
    /// Returns [`SyncError::PoolClosed`] if the pool was closed.
    pub async fn acquire(&self) -> Result<WorkerSlot, SyncError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SyncError::PoolClosed)?;
        Ok(self.admit(permit))
    }

    /// Takes a slot only if one is free right now
    pub fn try_acquire(&self) -> Option<WorkerSlot> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| self.admit(permit))
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> WorkerSlot {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        WorkerSlot {
            in_flight: Arc::clone(&self.in_flight),
            _permit: permit,
        }
    }

    /// Closes the pool; pending and future `acquire` calls fail
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of slots held at once since creation
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// A held pool slot; dropping it releases the slot
#[derive(Debug)]
pub struct WorkerSlot {
    in_flight: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        // Runs before the permit field is dropped, so in_flight never
        // exceeds capacity.
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

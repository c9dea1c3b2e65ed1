// Adjustable Concurrency Gate
//
// Counting semaphore whose total permit capacity can be resized while
// acquisitions are outstanding. Growth makes new permits available
// immediately. Shrink absorbs whatever is free right away and parks the
// remainder in a deficit counter that is consumed as in-flight permits are
// released; outstanding holders are never revoked and the `set_capacity`
// caller never blocks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct Shared {
    sem: Arc<Semaphore>,
    /// Permits still to be absorbed after a capacity decrease
    deficit: AtomicUsize,
    /// Latest requested capacity; guards all resize transitions
    capacity: Mutex<usize>,
}

/// Concurrency gate with runtime-adjustable capacity.
pub struct AdjustableSemaphore {
    shared: Arc<Shared>,
}

/// RAII permit. Releases on drop on every exit path; if a shrink is
/// pending, the release is absorbed instead of returning to the pool.
pub struct Permit {
    shared: Arc<Shared>,
    inner: Option<OwnedSemaphorePermit>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(permit) = self.inner.take() {
            if consume_deficit(&self.shared.deficit) {
                permit.forget();
            }
            // else: dropping the inner permit returns it to the pool
        }
    }
}

/// Decrement the deficit if positive. CAS loop so concurrent releases
/// never absorb more permits than the pending shrink asked for.
fn consume_deficit(deficit: &AtomicUsize) -> bool {
    let mut current = deficit.load(Ordering::Acquire);
    while current > 0 {
        match deficit.compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return true,
            Err(observed) => current = observed,
        }
    }
    false
}

impl AdjustableSemaphore {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                sem: Arc::new(Semaphore::new(capacity)),
                deficit: AtomicUsize::new(0),
                capacity: Mutex::new(capacity),
            }),
        }
    }

    /// Block until a permit is available. Never times out: with capacity
    /// zero this waits until the capacity is raised again.
    pub async fn acquire(&self) -> Permit {
        let permit = self
            .shared
            .sem
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");
        Permit {
            shared: self.shared.clone(),
            inner: Some(permit),
        }
    }

    /// Bounded wait. None means the caller must not proceed with dispatch.
    pub async fn try_acquire(&self, timeout: Duration) -> Option<Permit> {
        let acquired =
            tokio::time::timeout(timeout, self.shared.sem.clone().acquire_owned()).await;
        match acquired {
            Ok(Ok(permit)) => Some(Permit {
                shared: self.shared.clone(),
                inner: Some(permit),
            }),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Change the total permit capacity. Non-blocking for the caller:
    /// a decrease absorbs free permits immediately and leaves the rest to
    /// be swallowed as outstanding permits are released.
    pub fn set_capacity(&self, new_capacity: usize) {
        let mut capacity = self
            .shared
            .capacity
            .lock()
            .expect("capacity lock poisoned");

        let current = *capacity;
        if new_capacity >= current {
            let mut grow = new_capacity - current;
            // A pending shrink cancels against growth first.
            while grow > 0 && consume_deficit(&self.shared.deficit) {
                grow -= 1;
            }
            if grow > 0 {
                self.shared.sem.add_permits(grow);
            }
        } else {
            let mut shrink = current - new_capacity;
            // Take whatever is free right now.
            while shrink > 0 {
                match self.shared.sem.try_acquire() {
                    Ok(permit) => {
                        permit.forget();
                        shrink -= 1;
                    }
                    Err(_) => break,
                }
            }
            // The rest is absorbed lazily on release.
            if shrink > 0 {
                self.shared.deficit.fetch_add(shrink, Ordering::AcqRel);
            }
        }

        *capacity = new_capacity;
    }

    /// Latest requested capacity
    pub fn capacity(&self) -> usize {
        *self
            .shared
            .capacity
            .lock()
            .expect("capacity lock poisoned")
    }

    /// Permits currently free (settles below capacity while a shrink is
    /// still absorbing)
    pub fn available(&self) -> usize {
        self.shared.sem.available_permits()
    }
}

// Bounded multi-producer multi-consumer FIFO for the in-process container

use std::collections::{TryReserveError, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// Fixed-capacity FIFO shared by every worker of a channel container.
///
/// `available` holds one permit per stored item. A push adds its permit only
/// after the item is in the deque and a pop takes a permit before touching the
/// deque, so a popper holding a permit always finds an item.
pub struct BoundedBuffer<M> {
    items: Mutex<VecDeque<M>>,
    available: Semaphore,
    capacity: usize,
}

impl<M> BoundedBuffer<M> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Semaphore::new(0),
            capacity,
        }
    }

    /// Buffer with storage for all `capacity` items reserved up front
    ///
    /// Fails instead of aborting when the reservation cannot be satisfied.
    pub fn try_new(capacity: usize) -> Result<Self, TryReserveError> {
        let mut items = VecDeque::new();
        items.try_reserve_exact(capacity)?;
        Ok(Self {
            items: Mutex::new(items),
            available: Semaphore::new(0),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-blocking enqueue; hands the message back when full
    pub fn try_push(&self, msg: M) -> Result<(), M> {
        {
            let mut items = self.lock();
            if items.len() >= self.capacity {
                return Err(msg);
            }
            items.push_back(msg);
        }
        self.available.add_permits(1);
        Ok(())
    }

    /// Non-blocking dequeue; `None` when empty
    pub fn try_pop(&self) -> Option<M> {
        let permit = self.available.try_acquire().ok()?;
        permit.forget();
        self.lock().pop_front()
    }

    /// Wait until an item is available and take it
    pub async fn pop(&self) -> M {
        loop {
            match self.available.acquire().await {
                Ok(permit) => permit.forget(),
                // The semaphore is never closed
                Err(_) => std::future::pending::<()>().await,
            }
            if let Some(msg) = self.lock().pop_front() {
                return msg;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<M>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

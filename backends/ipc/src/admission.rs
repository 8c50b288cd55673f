//! Bounded admission of requests to the socket writer.
//!
//! The queue starts paused with no slots. Calls made before the connection is
//! up wait in line and are released in arrival order once
//! [`AdmissionQueue::open`] hands out the configured number of slots.
//!
//! Waiters take a fair turn lock before the semaphore, and keep it while
//! [`AdmissionQueue::admit`] runs their hand-off. A woken task that is
//! scheduled late therefore cannot be overtaken by the next one in line.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// FIFO admission gate with a fixed number of slots.
#[derive(Debug)]
pub struct AdmissionQueue {
    semaphore: Arc<Semaphore>,
    turn: Mutex<()>,
    concurrency: usize,
    opened: AtomicBool,
    waiting: AtomicUsize,
}

/// Permission to hand one request to the writer.
///
/// The slot returns to the queue when dropped, which the writer does once
/// the request bytes are on the wire.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

struct WaitGuard<'a>(&'a AtomicUsize);

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) { self.0.fetch_sub(1, Ordering::SeqCst); }
}

impl AdmissionQueue {
    /// Creates a queue with `concurrency` slots that admits nothing until opened.
    pub fn paused(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(0)),
            turn: Mutex::new(()),
            concurrency: concurrency.max(1),
            opened: AtomicBool::new(false),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Releases the slots. Only the first call has an effect.
    pub fn open(&self) {
        if !self.opened.swap(true, Ordering::SeqCst) {
            self.semaphore.add_permits(self.concurrency);
        }
    }

    /// Stops admitting; current and future waiters get `None`.
    pub fn close(&self) { self.semaphore.close(); }

    /// Waits for a slot in arrival order and passes it to `hand_off` before
    /// the next waiter is served.
    ///
    /// Returns `None` once the queue is closed.
    pub async fn admit<T>(&self, hand_off: impl FnOnce(Slot) -> T) -> Option<T> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let waiting = WaitGuard(&self.waiting);
        let _turn = self.turn.lock().await;
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;
        drop(waiting);
        Some(hand_off(Slot { _permit: permit }))
    }

    /// Waits for a slot in arrival order.
    ///
    /// Returns `None` once the queue is closed.
    pub async fn acquire(&self) -> Option<Slot> { self.admit(|slot| slot).await }

    /// Whether slots are being handed out.
    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::SeqCst) && !self.semaphore.is_closed()
    }

    /// Configured number of slots.
    pub fn concurrency(&self) -> usize { self.concurrency }

    /// Slots currently held by admitted requests not yet written.
    pub fn in_flight(&self) -> usize {
        if !self.is_open() {
            return 0;
        }
        self.concurrency.saturating_sub(self.semaphore.available_permits())
    }

    /// Calls waiting for a slot.
    pub fn waiting(&self) -> usize { self.waiting.load(Ordering::SeqCst) }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_paused_until_opened() {
        let queue = Arc::new(AdmissionQueue::paused(2));
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.acquire().await.is_some() })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        assert_eq!(queue.waiting(), 1);

        queue.open();
        assert!(waiter.await.expect("join"));
        assert_eq!(queue.waiting(), 0);
        assert!(queue.is_open());
    }

    #[tokio::test]
    async fn test_slots_bound_admission() {
        let queue = AdmissionQueue::paused(2);
        queue.open();
        queue.open();

        let a = queue.acquire().await.expect("slot a");
        let _b = queue.acquire().await.expect("slot b");
        assert_eq!(queue.in_flight(), 2);

        let third = tokio::time::timeout(Duration::from_millis(10), queue.acquire()).await;
        assert!(third.is_err(), "third caller must wait for a free slot");

        drop(a);
        assert_eq!(queue.in_flight(), 1);
        assert!(queue.acquire().await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hand_off_follows_arrival_order() {
        let queue = Arc::new(AdmissionQueue::paused(3));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut waiters = Vec::new();
        for n in 0..16 {
            let task_queue = Arc::clone(&queue);
            let order = Arc::clone(&order);
            waiters.push(tokio::spawn(async move {
                task_queue
                    .admit(|slot| {
                        order.lock().expect("order").push(n);
                        slot
                    })
                    .await
                    .is_some()
            }));
            while queue.waiting() < n + 1 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }

        queue.open();
        for waiter in waiters {
            assert!(waiter.await.expect("join"));
        }
        assert_eq!(*order.lock().expect("order"), (0..16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let queue = Arc::new(AdmissionQueue::paused(1));
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.acquire().await.is_none() })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        queue.close();
        assert!(waiter.await.expect("join"));
        assert!(!queue.is_open());
        assert_eq!(queue.in_flight(), 0);
    }
}

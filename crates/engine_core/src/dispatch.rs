//! Background compute dispatch.
//!
//! Producers run on a rayon thread pool; every producer is paired with
//! a completion closure that only ever runs on the thread that owns
//! the queue, when that thread calls [`ComputeQueue::drain`] once per
//! tick. Deliveries happen in completion order: whichever producer
//! finishes first is delivered first, regardless of submission order.
//!
//! The in-flight counter is the back-pressure surface: `submit`
//! rejects with [`SubmitError::QueueFull`] once `capacity` submissions
//! are outstanding instead of queueing unboundedly, and callers retry
//! on a later tick.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use crate::error::SubmitError;

type Completion = Box<dyn FnOnce() + Send>;

/// Compute-on-worker, deliver-on-owner dispatcher.
///
/// Constructed on the thread that will mutate renderable state; that
/// thread is the only one allowed to call [`drain`](Self::drain).
pub struct ComputeQueue {
    pool: rayon::ThreadPool,
    completed: Arc<Mutex<VecDeque<Completion>>>,
    in_flight: Arc<AtomicUsize>,
    capacity: usize,
    owner: ThreadId,
}

impl ComputeQueue {
    /// Spawn a pool of `workers` named threads accepting at most
    /// `capacity` outstanding submissions.
    pub fn new(workers: usize, capacity: usize) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("compute-{i}"))
            .build()
            .expect("failed to build compute thread pool");

        Self {
            pool,
            completed: Arc::new(Mutex::new(VecDeque::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            capacity: capacity.max(1),
            owner: thread::current().id(),
        }
    }

    /// Run `producer` on a pool thread and deliver its value to
    /// `on_complete` during a later `drain` on the owning thread.
    ///
    /// The producer must not touch owner-thread state; its only output
    /// is the returned value.
    pub fn submit<T, P, C>(&self, producer: P, on_complete: C) -> Result<(), SubmitError>
    where
        T: Send + 'static,
        P: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        // Reserve an in-flight slot before the job exists, so a worker
        // can never observe (and decrement) a counter that has not been
        // incremented yet.
        let capacity = self.capacity;
        let reserved = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n >= capacity {
                    None
                } else {
                    Some(n + 1)
                }
            });
        if reserved.is_err() {
            return Err(SubmitError::QueueFull);
        }

        let completed = Arc::clone(&self.completed);
        let in_flight = Arc::clone(&self.in_flight);
        self.pool.spawn(move || {
            // A panicking producer is a programming defect, not an
            // expected condition; log it and keep the worker alive.
            match catch_unwind(AssertUnwindSafe(producer)) {
                Ok(value) => completed
                    .lock()
                    .unwrap()
                    .push_back(Box::new(move || on_complete(value))),
                Err(_) => {
                    log::error!("compute producer panicked; its result is dropped");
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            }
        });
        Ok(())
    }

    /// Deliver every queued completion, FIFO in completion order.
    /// Returns the number of completions run.
    ///
    /// Completions may submit follow-up work; those submissions land
    /// in a later drain, never the current one.
    pub fn drain(&self) -> usize {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "drain must run on the thread that owns the queue"
        );

        // Swap the queue out so completions can lock it again to
        // enqueue follow-up work.
        let pending = std::mem::take(&mut *self.completed.lock().unwrap());
        let count = pending.len();
        for completion in pending {
            completion();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        count
    }

    /// Submissions accepted but not yet delivered (queued, running, or
    /// awaiting drain).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::{Duration, Instant};

    fn drain_until(queue: &ComputeQueue, expected: usize, delivered: &AtomicUsize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while delivered.load(Ordering::SeqCst) < expected {
            queue.drain();
            assert!(Instant::now() < deadline, "timed out waiting for deliveries");
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// N submissions produce exactly N completions, all on the owning
    /// thread.
    #[test]
    fn delivers_every_submission_on_owner_thread() {
        let queue = ComputeQueue::new(4, 64);
        let owner = thread::current().id();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let delivered = Arc::new(AtomicUsize::new(0));

        for i in 0..32usize {
            let seen = Arc::clone(&seen);
            let delivered = Arc::clone(&delivered);
            queue
                .submit(
                    move || i * 2,
                    move |value| {
                        assert_eq!(thread::current().id(), owner);
                        seen.lock().unwrap().push(value);
                        delivered.fetch_add(1, Ordering::SeqCst);
                    },
                )
                .unwrap();
        }

        drain_until(&queue, 32, &delivered);

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        let expected: Vec<usize> = (0..32).map(|i| i * 2).collect();
        assert_eq!(seen, expected, "each submission delivered exactly once");
        assert_eq!(queue.in_flight(), 0);
    }

    /// Deliveries happen in completion order, not submission order: a
    /// gated first producer is delivered after an unblocked second one.
    #[test]
    fn delivers_in_completion_order() {
        let queue = ComputeQueue::new(2, 8);
        let order = Arc::new(Mutex::new(Vec::new()));

        let (release_tx, release_rx) = channel::<()>();
        let slow_order = Arc::clone(&order);
        queue
            .submit(
                move || {
                    release_rx.recv().unwrap();
                    1
                },
                move |value| slow_order.lock().unwrap().push(value),
            )
            .unwrap();

        let fast_order = Arc::clone(&order);
        queue
            .submit(move || 2, move |value| fast_order.lock().unwrap().push(value))
            .unwrap();

        // Only the unblocked producer can be delivered first.
        let deadline = Instant::now() + Duration::from_secs(5);
        while order.lock().unwrap().is_empty() {
            queue.drain();
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(*order.lock().unwrap(), vec![2]);

        release_tx.send(()).unwrap();
        while order.lock().unwrap().len() < 2 {
            queue.drain();
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(*order.lock().unwrap(), vec![2, 1]);
    }

    /// At capacity the submission is rejected instead of blocking, and
    /// a slot opens up again once a delivery lands.
    #[test]
    fn rejects_when_at_capacity() {
        let queue = ComputeQueue::new(1, 2);

        // Gate the single worker so both slots stay occupied.
        let (started_tx, started_rx) = channel::<()>();
        let (release_tx, release_rx) = channel::<()>();

        queue
            .submit(
                move || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                },
                |_| {},
            )
            .unwrap();
        started_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker never picked up the gate job");

        // Worker is blocked; this one takes the second and last slot.
        queue.submit(|| (), |_| {}).unwrap();

        assert_eq!(queue.submit(|| (), |_| {}), Err(SubmitError::QueueFull));

        release_tx.send(()).unwrap();
        let delivered = AtomicUsize::new(0);
        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.in_flight() > 0 {
            delivered.fetch_add(queue.drain(), Ordering::SeqCst);
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
        queue.submit(|| (), |_| {}).expect("capacity frees up after delivery");
    }

    /// A panicking producer is dropped without poisoning the pool, and
    /// its in-flight slot is released.
    #[test]
    fn survives_panicking_producer() {
        let queue = ComputeQueue::new(1, 16);
        queue
            .submit(|| panic!("deliberate test panic"), |_: ()| {})
            .unwrap();

        let delivered = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&delivered);
        queue
            .submit(move || 7usize, move |v| {
                assert_eq!(v, 7);
                flag.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while delivered.load(Ordering::SeqCst) == 0 || queue.in_flight() > 0 {
            queue.drain();
            assert!(Instant::now() < deadline, "pool died after panic");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(queue.in_flight(), 0, "panicked submission must release its slot");
    }
}

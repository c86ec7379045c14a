//! Work queues feeding the commit thread and the inference workers.
//!
//! Both queues shed on saturation rather than blocking producers: a reasoner
//! that cannot keep up loses derivations, not input.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};
use parking_lot::{Condvar, Mutex};

use crate::base::AssertionId;
use crate::kb::{Assertion, PotentialAssertion, Rule};
use crate::unify::Bindings;

/// How long producers wait on a saturated queue before shedding.
pub(crate) const OFFER_TIMEOUT: Duration = Duration::from_millis(100);

/// A unit of inference work, ordered by priority.
#[derive(Debug, Clone)]
pub enum InferenceTask {
    /// Match every antecedent of `rule` against the KB, seeded by the
    /// bindings obtained from the triggering assertion.
    MatchAntecedent {
        rule: Arc<Rule>,
        trigger: AssertionId,
        bindings: Bindings,
    },
    /// Apply an oriented equality left-to-right to one target assertion.
    ApplyOrderedRewrite {
        rewrite: Arc<Assertion>,
        target: Arc<Assertion>,
    },
}

/// Producer handle for the commit queue.
#[derive(Clone)]
pub struct CommitSender {
    tx: Sender<PotentialAssertion>,
}

impl CommitSender {
    /// Offer a candidate, waiting up to [`OFFER_TIMEOUT`]. On saturation the
    /// candidate is dropped with a warning.
    pub fn offer(&self, candidate: PotentialAssertion) -> bool {
        match self.tx.send_timeout(candidate, OFFER_TIMEOUT) {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(candidate)) => {
                tracing::warn!(kif = %candidate.kif, "commit queue saturated; dropping candidate");
                false
            }
            Err(SendTimeoutError::Disconnected(_)) => false,
        }
    }
}

/// Bounded FIFO carrying candidate assertions to the single committer.
pub fn commit_queue(capacity: usize) -> (CommitSender, Receiver<PotentialAssertion>) {
    let (tx, rx) = bounded(capacity);
    (CommitSender { tx }, rx)
}

struct TaskEntry {
    priority: f64,
    seq: u64,
    task: InferenceTask,
}

// Max-heap on priority; FIFO on ties via the sequence number.
impl Ord for TaskEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TaskEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TaskEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TaskEntry {}

/// Bounded priority queue of inference tasks, highest priority first.
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<TaskEntry>>,
    available: Condvar,
    capacity: usize,
    seq: AtomicU64,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            available: Condvar::new(),
            capacity,
            seq: AtomicU64::new(0),
        }
    }

    /// Enqueue a task unless the queue is full. Sheds (with a warning) on
    /// saturation; warns once when crossing the 50% and 90% marks.
    pub fn offer(&self, task: InferenceTask, priority: f64) -> bool {
        let mut heap = self.heap.lock();
        if heap.len() >= self.capacity {
            tracing::warn!("task queue saturated; dropping task");
            return false;
        }
        heap.push(TaskEntry {
            priority,
            seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
            task,
        });
        let len = heap.len();
        if len == self.capacity / 2 {
            tracing::warn!(len, capacity = self.capacity, "task queue at 50%");
        } else if len == self.capacity * 9 / 10 {
            tracing::warn!(len, capacity = self.capacity, "task queue at 90%");
        }
        drop(heap);
        self.available.notify_one();
        true
    }

    /// Pop the highest-priority task, waiting up to `timeout` for one to
    /// arrive.
    pub fn poll(&self, timeout: Duration) -> Option<InferenceTask> {
        let mut heap = self.heap.lock();
        if let Some(entry) = heap.pop() {
            return Some(entry.task);
        }
        self.available.wait_for(&mut heap, timeout);
        heap.pop().map(|entry| entry.task)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.heap.lock().clear();
    }

    /// Wake all waiters (used at shutdown).
    pub fn wake_all(&self) {
        self.available.notify_all();
    }
}

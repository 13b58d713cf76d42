use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use derive_more::{Display, From, Into};
use ordered_float::OrderedFloat;

use crate::ProcessId;

/// Identifies a scheduled event.
///
/// IDs are issued in scheduling order and double as the tie-breaker between events
/// scheduled for the same time.
#[derive(From, Into, Debug, PartialEq, PartialOrd, Eq, Ord, Copy, Clone, Hash, Display)]
pub struct EventId(u64);

/// Entry stored in the event queue: the process to resume, the time when it is supposed to
/// happen, and the payload passed back to the process.
#[derive(Debug, Clone)]
pub struct Event<T> {
    time: f64,
    id: EventId,
    process: ProcessId,
    payload: T,
}

impl<T> Event<T> {
    /// Time at which the event fires.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// ID issued at scheduling.
    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The process to resume.
    #[must_use]
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// Value passed back to the process.
    #[must_use]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consumes the event and returns its payload.
    pub fn into_payload(self) -> T {
        self.payload
    }

    fn key(&self) -> (OrderedFloat<f64>, EventId) {
        (OrderedFloat(self.time), self.id)
    }
}

impl<T> PartialEq for Event<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for Event<T> {}

impl<T> PartialOrd for Event<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed, so that the max-heap yields the earliest event first.
impl<T> Ord for Event<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Pending events ordered by `(time, id)`.
///
/// Events scheduled for the same time are popped in the order they were scheduled.
/// Canceled events stay in the heap and are skipped when they reach the top.
///
/// # Examples
///
/// ```
/// # use simcore::{EventQueue, ProcessId};
/// let mut queue = EventQueue::default();
/// queue.schedule(2.0, ProcessId::from(0), "late");
/// queue.schedule(1.0, ProcessId::from(1), "first");
/// queue.schedule(1.0, ProcessId::from(2), "second");
/// let order: Vec<_> = std::iter::from_fn(|| queue.pop_earliest())
///     .map(|e| *e.payload())
///     .collect();
/// assert_eq!(order, vec!["first", "second", "late"]);
/// ```
#[derive(Debug)]
pub struct EventQueue<T> {
    heap: BinaryHeap<Event<T>>,
    live: HashSet<EventId>,
    next_id: u64,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            live: HashSet::new(),
            next_id: 0,
        }
    }
}

impl<T> EventQueue<T> {
    /// Inserts a new event to resume `process` at `time` with `payload`.
    ///
    /// The caller is responsible for `time` not being in the past; see
    /// [`Scheduler::schedule`](crate::Scheduler::schedule).
    pub fn schedule(&mut self, time: f64, process: ProcessId, payload: T) -> EventId {
        debug_assert!(!time.is_nan(), "event time must be a number");
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.heap.push(Event {
            time,
            id,
            process,
            payload,
        });
        self.live.insert(id);
        id
    }

    /// Removes and returns the earliest pending event, or `None` if none are left.
    pub fn pop_earliest(&mut self) -> Option<Event<T>> {
        while let Some(event) = self.heap.pop() {
            if self.live.remove(&event.id) {
                return Some(event);
            }
        }
        None
    }

    /// Returns the time of the earliest pending event.
    pub fn peek_time(&mut self) -> Option<f64> {
        while let Some(event) = self.heap.peek() {
            if self.live.contains(&event.id) {
                return Some(event.time);
            }
            self.heap.pop();
        }
        None
    }

    /// Cancels a pending event. Returns `false` if the event has already fired or was canceled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.live.remove(&id)
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Checks if there are no pending events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

use std::cell::Cell;
use std::rc::Rc;

use crate::{Error, Event, EventId, EventQueue, ProcessId, Result, Wake};

/// Simulation clock.
pub type Clock = Rc<Cell<f64>>;

/// This struct has only immutable access to the simulation clock exposed.
#[derive(Debug, Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl From<Clock> for ClockRef {
    fn from(clock: Clock) -> Self {
        Self { clock }
    }
}

impl ClockRef {
    /// Return the current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.clock.get()
    }
}

/// Scheduler is used to keep the current time and information about the upcoming events.
#[derive(Debug)]
pub struct Scheduler {
    events: EventQueue<Wake>,
    clock: Clock,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            events: EventQueue::default(),
            clock: Rc::new(Cell::new(0.0)),
        }
    }
}

impl Scheduler {
    /// Schedules `process` to be woken up with `wake` at `self.time() + delay`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDelay`] if `delay` is negative, NaN, or infinite, or if the
    /// resulting time overflows.
    pub fn schedule(&mut self, delay: f64, process: ProcessId, wake: Wake) -> Result<EventId> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(Error::InvalidDelay(delay));
        }
        let time = self.time() + delay;
        if !time.is_finite() {
            return Err(Error::InvalidDelay(delay));
        }
        Ok(self.events.schedule(time, process, wake))
    }

    /// Schedules `process` to be woken up with `wake` at `self.time()`.
    pub fn schedule_immediately(&mut self, process: ProcessId, wake: Wake) -> EventId {
        self.events.schedule(self.time(), process, wake)
    }

    /// Cancels a pending event. Returns `false` if it is no longer pending.
    pub fn cancel(&mut self, event: EventId) -> bool {
        self.events.cancel(event)
    }

    /// Returns the current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.clock.get()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Time of the next pending event.
    pub fn peek_time(&mut self) -> Option<f64> {
        self.events.peek_time()
    }

    /// Number of pending events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.events.len()
    }

    /// Removes and returns the next scheduled event or `None` if none are left.
    /// The clock is moved forward to the time of the returned event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfOrder`] if the event precedes the current time.
    pub fn pop(&mut self) -> Result<Option<Event<Wake>>> {
        match self.events.pop_earliest() {
            None => Ok(None),
            Some(event) => {
                let now = self.time();
                if event.time() < now {
                    return Err(Error::OutOfOrder {
                        event: event.time(),
                        now,
                    });
                }
                self.clock.replace(event.time());
                Ok(Some(event))
            }
        }
    }
}

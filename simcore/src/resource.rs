use std::collections::VecDeque;

use derive_more::{Display, From, Into};

use crate::{Error, ProcessId, Result};

/// Identifies a resource within a simulation.
#[derive(From, Into, Debug, PartialEq, PartialOrd, Eq, Ord, Copy, Clone, Hash, Display)]
pub struct ResourceId(usize);

/// A shared entity with a limited number of slots.
///
/// Requests that cannot be granted right away wait in a FIFO list, and each freed slot is
/// handed over directly to the head of that list.
///
/// # Examples
///
/// ```
/// # use simcore::{ProcessId, Resource, ResourceId};
/// # fn main() -> simcore::Result<()> {
/// let mut resource = Resource::new(ResourceId::from(0), 1)?;
/// assert!(resource.acquire(ProcessId::from(0))?);
/// assert!(!resource.acquire(ProcessId::from(1))?);
/// assert_eq!(resource.queue_length(), 1);
/// assert_eq!(resource.release()?, Some(ProcessId::from(1)));
/// assert_eq!(resource.held_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Resource {
    id: ResourceId,
    capacity: usize,
    held: usize,
    waiting: VecDeque<ProcessId>,
}

impl Resource {
    /// Creates a resource with `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capacity`] if `capacity` is 0.
    pub fn new(id: ResourceId, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Capacity(capacity));
        }
        Ok(Self {
            id,
            capacity,
            held: 0,
            waiting: VecDeque::new(),
        })
    }

    /// ID of this resource.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently granted.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held
    }

    /// Number of free slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.capacity - self.held
    }

    /// Number of processes waiting for a slot.
    #[must_use]
    pub fn queue_length(&self) -> usize {
        self.waiting.len()
    }

    /// Iterates over waiting processes, head first.
    pub fn waiting(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.waiting.iter().copied()
    }

    /// Requests a slot for `process`. Returns `true` if it was granted, or `false` if the
    /// process has been appended to the wait list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyWaiting`] if `process` is already in the wait list.
    pub fn acquire(&mut self, process: ProcessId) -> Result<bool> {
        if self.held < self.capacity {
            self.held += 1;
            return Ok(true);
        }
        if self.waiting.contains(&process) {
            return Err(Error::AlreadyWaiting {
                process,
                resource: self.id,
            });
        }
        self.waiting.push_back(process);
        Ok(false)
    }

    /// Frees a slot. If any process is waiting, the slot is granted to the head of the wait
    /// list, which is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdleRelease`] if no slot is held.
    pub fn release(&mut self) -> Result<Option<ProcessId>> {
        if self.held == 0 {
            return Err(Error::IdleRelease(self.id));
        }
        self.held -= 1;
        let next = self.waiting.pop_front();
        if next.is_some() {
            self.held += 1;
        }
        Ok(next)
    }

    /// Removes `process` from the wait list. Returns `false` if it was not waiting.
    pub fn withdraw(&mut self, process: ProcessId) -> bool {
        if let Some(pos) = self.waiting.iter().position(|&p| p == process) {
            self.waiting.remove(pos);
            true
        } else {
            false
        }
    }
}

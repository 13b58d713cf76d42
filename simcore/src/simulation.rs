use crate::{
    ClockRef, Context, Error, Event, EventId, Process, ProcessError, ProcessId, ProcessState,
    Resource, ResourceId, Result, Scheduler, Step, Wake,
};

/// Bookkeeping of a single process.
struct Slot<S> {
    name: String,
    logic: Option<Box<dyn Process<S>>>,
    state: ProcessState,
    pending: Option<EventId>,
    held: Vec<ResourceId>,
}

/// Everything a running process may touch besides the user state: scheduler, resources,
/// and the process table.
pub(crate) struct Kernel<S> {
    pub(crate) scheduler: Scheduler,
    resources: Vec<Resource>,
    processes: Vec<Slot<S>>,
}

impl<S> Kernel<S> {
    fn new() -> Self {
        Self {
            scheduler: Scheduler::default(),
            resources: Vec::new(),
            processes: Vec::new(),
        }
    }

    pub(crate) fn name(&self, process: ProcessId) -> Option<&str> {
        self.processes
            .get(usize::from(process))
            .map(|slot| slot.name.as_str())
    }

    fn slot_mut(&mut self, process: ProcessId) -> Result<&mut Slot<S>> {
        self.processes
            .get_mut(usize::from(process))
            .ok_or(Error::UnknownProcess(process))
    }

    pub(crate) fn resource(&self, resource: ResourceId) -> Result<&Resource> {
        self.resources
            .get(usize::from(resource))
            .ok_or(Error::UnknownResource(resource))
    }

    fn resource_mut(&mut self, resource: ResourceId) -> Result<&mut Resource> {
        self.resources
            .get_mut(usize::from(resource))
            .ok_or(Error::UnknownResource(resource))
    }

    pub(crate) fn holds(&self, process: ProcessId, resource: ResourceId) -> usize {
        self.processes
            .get(usize::from(process))
            .map_or(0, |slot| slot.held.iter().filter(|&&r| r == resource).count())
    }

    pub(crate) fn spawn(&mut self, name: String, logic: Box<dyn Process<S>>) -> ProcessId {
        let id = ProcessId::from(self.processes.len());
        let event = self.scheduler.schedule_immediately(id, Wake::Start);
        log::debug!("[{:.3}] Spawned process {} ({})", self.scheduler.time(), id, name);
        self.processes.push(Slot {
            name,
            logic: Some(logic),
            state: ProcessState::Pending,
            pending: Some(event),
            held: Vec::new(),
        });
        id
    }

    /// Requests a slot for `process`, returning `true` if it was granted right away.
    fn acquire(&mut self, process: ProcessId, resource: ResourceId) -> Result<bool> {
        let granted = self.resource_mut(resource)?.acquire(process)?;
        if granted {
            self.slot_mut(process)?.held.push(resource);
        } else {
            log::trace!(
                "[{:.3}] Process {} waits for resource {}",
                self.scheduler.time(),
                process,
                resource
            );
        }
        Ok(granted)
    }

    pub(crate) fn release(&mut self, process: ProcessId, resource: ResourceId) -> Result<()> {
        let slot = self.slot_mut(process)?;
        let pos = slot
            .held
            .iter()
            .position(|&r| r == resource)
            .ok_or(Error::NotHeld { process, resource })?;
        slot.held.remove(pos);
        self.free_slot(resource)
    }

    /// Returns a slot to the resource and hands it over to the next waiting process, if any.
    fn free_slot(&mut self, resource: ResourceId) -> Result<()> {
        if let Some(next) = self.resource_mut(resource)?.release()? {
            let event = self
                .scheduler
                .schedule_immediately(next, Wake::Granted(resource));
            log::trace!(
                "[{:.3}] Resource {} granted to process {}",
                self.scheduler.time(),
                resource,
                next
            );
            let slot = self.slot_mut(next)?;
            slot.held.push(resource);
            slot.pending = Some(event);
        }
        Ok(())
    }

    /// Marks the process as terminated and frees everything it still holds.
    /// The slot itself stays, so the ID and name remain valid; only the logic and
    /// holdings are dropped.
    fn terminate(&mut self, process: ProcessId) -> Result<Vec<ResourceId>> {
        let slot = self.slot_mut(process)?;
        slot.state = ProcessState::Terminated;
        slot.logic = None;
        slot.pending = None;
        let held = std::mem::take(&mut slot.held);
        for &resource in &held {
            self.free_slot(resource)?;
        }
        Ok(held)
    }

    pub(crate) fn cancel(&mut self, process: ProcessId) -> Result<bool> {
        let slot = self.slot_mut(process)?;
        let waiting_on = match slot.state {
            ProcessState::Terminated => return Ok(false),
            ProcessState::Runnable => return Err(Error::CancelRunning(process)),
            ProcessState::SuspendedOnResource(resource) => Some(resource),
            ProcessState::Pending | ProcessState::SuspendedOnTimeout => None,
        };
        let pending = slot.pending.take();
        if let Some(event) = pending {
            self.scheduler.cancel(event);
        }
        if let Some(resource) = waiting_on {
            self.resource_mut(resource)?.withdraw(process);
        }
        let released = self.terminate(process)?;
        log::debug!(
            "[{:.3}] Canceled process {} (released {} slot(s))",
            self.scheduler.time(),
            process,
            released.len()
        );
        Ok(true)
    }
}

/// Why a run has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// No events are left.
    Exhausted,
    /// The next event is at or after the horizon.
    Horizon,
}

/// The main simulation object.
///
/// It owns the clock, the processes, the resources, and a user-defined state `S` that
/// processes access through their [`Context`], typically to record samples.
///
/// The process table is append-only: every spawned process keeps an entry with its name and
/// final state for the lifetime of the simulation.
///
/// # Examples
///
/// ```
/// # use simcore::{Collector, Script, Simulation, Stop};
/// # fn main() -> simcore::Result<()> {
/// let mut sim = Simulation::new(Collector::default());
/// let counter = sim.add_resource(1)?;
/// for _ in 0..3 {
///     sim.spawn(
///         "customer",
///         Script::builder()
///             .acquire(counter)
///             .emit_waited("wait")
///             .timeout(2.0)
///             .release(counter)
///             .build(),
///     );
/// }
/// assert_eq!(sim.run_until(10.0)?, Stop::Exhausted);
/// assert_eq!(sim.state().samples("wait"), &[0.0, 2.0, 4.0]);
/// # Ok(())
/// # }
/// ```
pub struct Simulation<S> {
    kernel: Kernel<S>,
    state: S,
    halted: bool,
}

impl<S: Default> Default for Simulation<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> Simulation<S> {
    /// Creates a simulation at time 0 with the given state.
    pub fn new(state: S) -> Self {
        Self {
            kernel: Kernel::new(),
            state,
            halted: false,
        }
    }

    /// Current simulation time.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.kernel.scheduler.time()
    }

    /// Returns a structure with immutable access to the simulation time.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        self.kernel.scheduler.clock()
    }

    /// Simulation state.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Mutable simulation state.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Tears down the simulation, returning its state.
    pub fn into_state(self) -> S {
        self.state
    }

    /// Checks if the simulation was halted by a fatal error.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Creates a new resource with `capacity` slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capacity`] if `capacity` is 0.
    pub fn add_resource(&mut self, capacity: usize) -> Result<ResourceId> {
        let id = ResourceId::from(self.kernel.resources.len());
        self.kernel.resources.push(Resource::new(id, capacity)?);
        Ok(id)
    }

    /// Returns the resource, or `None` if it does not exist.
    #[must_use]
    pub fn resource(&self, resource: ResourceId) -> Option<&Resource> {
        self.kernel.resource(resource).ok()
    }

    /// Spawns a new process starting at the current time.
    pub fn spawn<P, N>(&mut self, name: N, process: P) -> ProcessId
    where
        P: Process<S> + 'static,
        N: Into<String>,
    {
        self.kernel.spawn(name.into(), Box::new(process))
    }

    /// Returns the lifecycle state of the process, or `None` if it does not exist.
    #[must_use]
    pub fn process_state(&self, process: ProcessId) -> Option<ProcessState> {
        self.kernel
            .processes
            .get(usize::from(process))
            .map(|slot| slot.state)
    }

    /// Returns the name of the process, or `None` if it does not exist.
    #[must_use]
    pub fn process_name(&self, process: ProcessId) -> Option<&str> {
        self.kernel.name(process)
    }

    /// Number of pending events.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.kernel.scheduler.pending()
    }

    /// Cancels a process: its pending event is removed, it leaves any wait list, and all
    /// resources it holds are released. Returns `false` if it has already terminated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProcess`] if no such process exists.
    pub fn cancel(&mut self, process: ProcessId) -> Result<bool> {
        self.kernel.cancel(process)
    }

    /// Processes a single event. Returns `false` if no events were left.
    ///
    /// # Errors
    ///
    /// See [`run_until`](Self::run_until).
    pub fn step(&mut self) -> Result<bool> {
        if self.halted {
            return Err(Error::Halted);
        }
        let result = self.step_inner();
        if result.is_err() {
            self.halted = true;
        }
        result
    }

    /// Runs until no events are left.
    ///
    /// # Errors
    ///
    /// See [`run_until`](Self::run_until).
    pub fn run(&mut self) -> Result<Stop> {
        self.run_until(f64::INFINITY)
    }

    /// Runs all events scheduled before `horizon`. Events at or after `horizon` stay pending,
    /// and a later call with a greater horizon continues from there.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidHorizon`] if `horizon` is NaN;
    /// - [`Error::ProcessLogic`] if a process fails;
    /// - [`Error::OutOfOrder`] on an internal scheduling error;
    /// - [`Error::Halted`] if a previous run has failed.
    ///
    /// Any of the last three leaves the simulation halted, with its state still accessible.
    pub fn run_until(&mut self, horizon: f64) -> Result<Stop> {
        if self.halted {
            return Err(Error::Halted);
        }
        if horizon.is_nan() {
            return Err(Error::InvalidHorizon(horizon));
        }
        loop {
            match self.kernel.scheduler.peek_time() {
                None => return Ok(Stop::Exhausted),
                Some(time) if time >= horizon => return Ok(Stop::Horizon),
                Some(_) => {
                    if let Err(err) = self.step_inner() {
                        self.halted = true;
                        return Err(err);
                    }
                }
            }
        }
    }

    fn step_inner(&mut self) -> Result<bool> {
        match self.kernel.scheduler.pop()? {
            Some(event) => {
                self.dispatch(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn dispatch(&mut self, event: Event<Wake>) -> Result<()> {
        let process = event.process();
        let wake = event.into_payload();
        log::trace!("[{:.3}] Resuming process {} ({:?})", self.now(), process, wake);
        let slot = self.kernel.slot_mut(process)?;
        match slot.logic.take() {
            Some(logic) => {
                slot.pending = None;
                slot.state = ProcessState::Runnable;
                self.resume(process, wake, logic)
            }
            None => {
                log::warn!("Dropped event for terminated process {}", process);
                Ok(())
            }
        }
    }

    /// Runs the process logic until it suspends or finishes.
    fn resume(
        &mut self,
        process: ProcessId,
        mut wake: Wake,
        mut logic: Box<dyn Process<S>>,
    ) -> Result<()> {
        loop {
            let step = {
                let mut ctx = Context {
                    id: process,
                    wake,
                    kernel: &mut self.kernel,
                    state: &mut self.state,
                };
                logic.resume(&mut ctx)
            };
            let step = match step {
                Ok(step) => step,
                Err(source) => return Err(self.fail(process, source)),
            };
            match step {
                Step::Timeout(delay) => {
                    let event = match self.kernel.scheduler.schedule(delay, process, Wake::Timeout)
                    {
                        Ok(event) => event,
                        Err(err) => return Err(self.fail(process, err.into())),
                    };
                    return self.suspend(
                        process,
                        ProcessState::SuspendedOnTimeout,
                        Some(event),
                        logic,
                    );
                }
                Step::Acquire(resource) => match self.kernel.acquire(process, resource) {
                    Ok(true) => wake = Wake::Granted(resource),
                    Ok(false) => {
                        return self.suspend(
                            process,
                            ProcessState::SuspendedOnResource(resource),
                            None,
                            logic,
                        );
                    }
                    Err(err) => return Err(self.fail(process, err.into())),
                },
                Step::Finish => {
                    let held = self.kernel.terminate(process)?;
                    if !held.is_empty() {
                        log::warn!(
                            "[{:.3}] Process {} finished holding {} slot(s); released",
                            self.now(),
                            process,
                            held.len()
                        );
                    }
                    log::debug!("[{:.3}] Process {} finished", self.now(), process);
                    return Ok(());
                }
            }
        }
    }

    fn suspend(
        &mut self,
        process: ProcessId,
        state: ProcessState,
        pending: Option<EventId>,
        logic: Box<dyn Process<S>>,
    ) -> Result<()> {
        let slot = self.kernel.slot_mut(process)?;
        slot.state = state;
        slot.pending = pending;
        slot.logic = Some(logic);
        Ok(())
    }

    /// Halts the simulation and builds the error reported for the failed process.
    fn fail(&mut self, process: ProcessId, source: ProcessError) -> Error {
        self.halted = true;
        let name = self.kernel.name(process).unwrap_or_default().to_string();
        let time = self.now();
        log::error!(
            "[{:.3}] Process {} ({}) failed: {}",
            time,
            process,
            name,
            source
        );
        Error::ProcessLogic {
            process,
            name,
            time,
            source,
        }
    }
}

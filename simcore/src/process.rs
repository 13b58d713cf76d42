use std::marker::PhantomData;

use derive_more::{Display, From, Into};

use crate::simulation::Kernel;
use crate::{Error, ProcessError, Resource, ResourceId, Result};

/// Identifies a process within a simulation.
#[derive(From, Into, Debug, PartialEq, PartialOrd, Eq, Ord, Copy, Clone, Hash, Display)]
pub struct ProcessId(usize);

/// Reason for resuming a process, delivered as the payload of its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// First resumption after being spawned.
    Start,
    /// The requested timeout has elapsed.
    Timeout,
    /// A slot of the resource has been granted.
    Granted(ResourceId),
}

/// Lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned, but its start event has not fired yet.
    Pending,
    /// Currently executing. At most one process is in this state at any time.
    Runnable,
    /// Waiting for a timeout to elapse.
    SuspendedOnTimeout,
    /// Waiting for a slot of the resource.
    SuspendedOnResource(ResourceId),
    /// Finished or canceled. No transitions leave this state.
    Terminated,
}

/// Suspending step returned by a process when it yields control back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Resume after the given delay.
    Timeout(f64),
    /// Resume once a slot of the resource is granted.
    /// If a slot is free, the process is resumed right away without suspending.
    Acquire(ResourceId),
    /// The process logic is complete.
    Finish,
}

/// A suspendable unit of simulation logic.
///
/// The scheduler calls [`resume`](Process::resume) when the process starts and every time the
/// condition of its last [`Step`] is satisfied. Implementors keep track of where they left off,
/// and use the context for everything that does not suspend: releasing resources, recording
/// samples in the state, spawning other processes.
pub trait Process<S> {
    /// Runs the process until its next suspending step.
    ///
    /// # Errors
    ///
    /// Any returned error halts the simulation.
    fn resume(&mut self, ctx: &mut Context<'_, S>) -> Result<Step, ProcessError>;
}

/// Process defined by a closure. See [`from_fn`].
pub struct FnProcess<S, F> {
    f: F,
    _marker: PhantomData<fn(&mut S)>,
}

impl<S, F> Process<S> for FnProcess<S, F>
where
    F: FnMut(&mut Context<'_, S>) -> Result<Step, ProcessError>,
{
    fn resume(&mut self, ctx: &mut Context<'_, S>) -> Result<Step, ProcessError> {
        (self.f)(ctx)
    }
}

/// Wraps a closure into a process. The closure is called on every resumption.
///
/// ```
/// # use simcore::{process, Simulation, Step};
/// let mut sim = Simulation::new(Vec::<f64>::new());
/// sim.spawn(
///     "ticker",
///     process::from_fn::<Vec<f64>, _>(|ctx| {
///         let now = ctx.now();
///         ctx.state_mut().push(now);
///         Ok(if now < 2.0 { Step::Timeout(1.0) } else { Step::Finish })
///     }),
/// );
/// sim.run().unwrap();
/// assert_eq!(sim.state(), &vec![0.0, 1.0, 2.0]);
/// ```
pub fn from_fn<S, F>(f: F) -> FnProcess<S, F>
where
    F: FnMut(&mut Context<'_, S>) -> Result<Step, ProcessError>,
{
    FnProcess {
        f,
        _marker: PhantomData,
    }
}

/// Access to the simulation given to a process while it runs.
pub struct Context<'a, S> {
    pub(crate) id: ProcessId,
    pub(crate) wake: Wake,
    pub(crate) kernel: &'a mut Kernel<S>,
    pub(crate) state: &'a mut S,
}

impl<'a, S> Context<'a, S> {
    /// ID of the running process.
    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Name the running process was spawned with.
    #[must_use]
    pub fn name(&self) -> &str {
        self.kernel.name(self.id).unwrap_or_default()
    }

    /// Why the process has been resumed.
    #[must_use]
    pub fn wake(&self) -> Wake {
        self.wake
    }

    /// Current simulation time.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.kernel.scheduler.time()
    }

    /// Simulation state.
    #[must_use]
    pub fn state(&self) -> &S {
        &*self.state
    }

    /// Mutable simulation state.
    pub fn state_mut(&mut self) -> &mut S {
        &mut *self.state
    }

    /// Spawns a new process starting at the current time.
    /// The running process continues until its own next step.
    pub fn spawn<P, N>(&mut self, name: N, process: P) -> ProcessId
    where
        P: Process<S> + 'static,
        N: Into<String>,
    {
        self.kernel.spawn(name.into(), Box::new(process))
    }

    /// Releases one slot of `resource` held by the running process.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotHeld`] if the process does not hold the resource.
    pub fn release(&mut self, resource: ResourceId) -> Result<()> {
        self.kernel.release(self.id, resource)
    }

    /// Returns the resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResource`] if no such resource exists.
    pub fn resource(&self, resource: ResourceId) -> Result<&Resource> {
        self.kernel.resource(resource)
    }

    /// Number of processes waiting for `resource` at this moment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResource`] if no such resource exists.
    pub fn queue_length(&self, resource: ResourceId) -> Result<usize> {
        self.kernel.resource(resource).map(Resource::queue_length)
    }

    /// Number of slots of `resource` held by the running process.
    #[must_use]
    pub fn holds(&self, resource: ResourceId) -> usize {
        self.kernel.holds(self.id, resource)
    }

    /// Cancels another process. See [`Simulation::cancel`](crate::Simulation::cancel).
    ///
    /// # Errors
    ///
    /// Returns [`Error::CancelRunning`] when called on the running process itself.
    pub fn cancel(&mut self, process: ProcessId) -> Result<bool> {
        if process == self.id {
            return Err(Error::CancelRunning(process));
        }
        self.kernel.cancel(process)
    }
}

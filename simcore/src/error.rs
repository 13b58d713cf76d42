use thiserror::Error;

use crate::{ProcessId, ResourceId};

/// Error type returned from process logic.
///
/// Any error that is `Send + Sync + 'static` converts into it with `?`, including [`Error`]
/// itself, so engine calls made through [`Context`](crate::Context) can be propagated directly.
pub type ProcessError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type used throughout the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors reported by the simulation engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A popped event was scheduled before the current clock.
    /// This is an internal invariant violation and always halts the simulation.
    #[error("event scheduled at {event} precedes the clock at {now}")]
    OutOfOrder {
        /// Time of the offending event.
        event: f64,
        /// Clock time when the event was popped.
        now: f64,
    },

    /// A resource was configured with capacity lower than 1.
    #[error("resource capacity must be at least 1, got {0}")]
    Capacity(usize),

    /// Process logic returned an error. The simulation is halted.
    #[error("process {process} ({name}) failed at time {time}")]
    ProcessLogic {
        /// ID of the failed process.
        process: ProcessId,
        /// Name the process was spawned with.
        name: String,
        /// Virtual time at failure.
        time: f64,
        /// Error returned from the process logic.
        #[source]
        source: ProcessError,
    },

    /// A timeout was requested with a negative or non-finite delay.
    #[error("invalid delay: {0}")]
    InvalidDelay(f64),

    /// A run was requested with a NaN horizon.
    #[error("invalid horizon: {0}")]
    InvalidHorizon(f64),

    /// A process released a resource it does not hold.
    #[error("process {process} released resource {resource} which it does not hold")]
    NotHeld {
        /// Releasing process.
        process: ProcessId,
        /// Released resource.
        resource: ResourceId,
    },

    /// A resource with no held slots was released.
    #[error("resource {0} released while idle")]
    IdleRelease(ResourceId),

    /// A process requested a resource it is already waiting for.
    #[error("process {process} is already waiting for resource {resource}")]
    AlreadyWaiting {
        /// Requesting process.
        process: ProcessId,
        /// Requested resource.
        resource: ResourceId,
    },

    /// The resource ID was not issued by this simulation.
    #[error("unknown resource {0}")]
    UnknownResource(ResourceId),

    /// The process ID was not issued by this simulation.
    #[error("unknown process {0}")]
    UnknownProcess(ProcessId),

    /// A process attempted to cancel itself while running.
    #[error("process {0} cannot be canceled while it is running")]
    CancelRunning(ProcessId),

    /// The simulation was halted by an earlier fatal error.
    #[error("simulation halted after a fatal error")]
    Halted,
}

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

//! This is a general purpose discrete-event simulation engine that provides the mechanisms such
//! as: virtual clock, event scheduler, suspendable processes, and capacity-limited resources.
//!
//! Everything runs on a single logical thread. Exactly one process executes at a time, until it
//! returns its next [`Step`]; the scheduler then resumes whichever process has the earliest
//! pending event. Events scheduled for the same time fire in the order they were scheduled.

pub use error::{Error, ProcessError, Result};
pub use event::{Event, EventId, EventQueue};
pub use process::{Context, Process, ProcessId, ProcessState, Step, Wake};
pub use resource::{Resource, ResourceId};
pub use scheduler::{Clock, ClockRef, Scheduler};
pub use script::{Action, Measure, Script, ScriptBuilder};
pub use simulation::{Simulation, Stop};
pub use stats::{Collector, Sink};

mod error;
mod event;
pub mod process;
mod resource;
mod scheduler;
pub mod script;
mod simulation;
mod stats;

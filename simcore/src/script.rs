//! Processes defined declaratively as a list of actions.

use crate::{Context, Process, ProcessError, ResourceId, Sink, Step, Wake};

/// Value recorded by [`Action::Emit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure {
    /// A constant.
    Value(f64),
    /// Current time.
    Now,
    /// Time since the script started.
    Elapsed,
    /// Duration of the most recent suspension; 0 if the last step did not suspend.
    Waited,
    /// Number of processes waiting for the resource.
    QueueLength(ResourceId),
}

/// A single step of a [`Script`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Suspend for the given delay.
    Timeout(f64),
    /// Request a slot of the resource.
    Acquire(ResourceId),
    /// Release a held slot of the resource.
    Release(ResourceId),
    /// Record a sample in the state.
    Emit {
        /// Sample stream label.
        label: String,
        /// What to record.
        measure: Measure,
    },
}

/// A process executing a fixed sequence of actions, then finishing.
#[derive(Debug, Clone)]
pub struct Script {
    actions: Vec<Action>,
    cursor: usize,
    started: f64,
    suspended_at: f64,
}

impl Script {
    /// Creates a script from actions.
    #[must_use]
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            cursor: 0,
            started: 0.0,
            suspended_at: 0.0,
        }
    }

    /// Returns a builder of a script.
    #[must_use]
    pub fn builder() -> ScriptBuilder {
        ScriptBuilder::default()
    }
}

impl<S: Sink> Process<S> for Script {
    #[allow(clippy::cast_precision_loss)]
    fn resume(&mut self, ctx: &mut Context<'_, S>) -> Result<Step, ProcessError> {
        if ctx.wake() == Wake::Start {
            self.started = ctx.now();
            self.suspended_at = ctx.now();
        }
        while let Some(action) = self.actions.get(self.cursor) {
            self.cursor += 1;
            match action {
                Action::Timeout(delay) => {
                    self.suspended_at = ctx.now();
                    return Ok(Step::Timeout(*delay));
                }
                Action::Acquire(resource) => {
                    self.suspended_at = ctx.now();
                    return Ok(Step::Acquire(*resource));
                }
                Action::Release(resource) => ctx.release(*resource)?,
                Action::Emit { label, measure } => {
                    let value = match *measure {
                        Measure::Value(value) => value,
                        Measure::Now => ctx.now(),
                        Measure::Elapsed => ctx.now() - self.started,
                        Measure::Waited => ctx.now() - self.suspended_at,
                        Measure::QueueLength(resource) => ctx.queue_length(resource)? as f64,
                    };
                    ctx.state_mut().record(label, value);
                }
            }
        }
        Ok(Step::Finish)
    }
}

/// Builds a [`Script`] step by step.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    actions: Vec<Action>,
}

impl ScriptBuilder {
    /// Appends a timeout.
    #[must_use]
    pub fn timeout(mut self, delay: f64) -> Self {
        self.actions.push(Action::Timeout(delay));
        self
    }

    /// Appends a resource request.
    #[must_use]
    pub fn acquire(mut self, resource: ResourceId) -> Self {
        self.actions.push(Action::Acquire(resource));
        self
    }

    /// Appends a resource release.
    #[must_use]
    pub fn release(mut self, resource: ResourceId) -> Self {
        self.actions.push(Action::Release(resource));
        self
    }

    /// Appends a sample emission.
    #[must_use]
    pub fn emit<L: Into<String>>(mut self, label: L, measure: Measure) -> Self {
        self.actions.push(Action::Emit {
            label: label.into(),
            measure,
        });
        self
    }

    /// Shortcut for emitting [`Measure::Waited`].
    #[must_use]
    pub fn emit_waited<L: Into<String>>(self, label: L) -> Self {
        self.emit(label, Measure::Waited)
    }

    /// Finishes the script.
    #[must_use]
    pub fn build(self) -> Script {
        Script::new(self.actions)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Collector, Simulation};

    #[test]
    fn test_measures() {
        let mut sim = Simulation::new(Collector::default());
        let resource = sim.add_resource(1).unwrap();
        sim.spawn("blocker", Script::builder().acquire(resource).timeout(4.0).build());
        sim.spawn(
            "probe",
            Script::builder()
                .timeout(1.0)
                .emit("now", Measure::Now)
                .emit("constant", Measure::Value(7.5))
                .acquire(resource)
                .emit("waited", Measure::Waited)
                .emit("elapsed", Measure::Elapsed)
                .emit("queue", Measure::QueueLength(resource))
                .release(resource)
                .build(),
        );
        sim.run().unwrap();
        let stats = sim.state();
        assert_eq!(stats.samples("now"), &[1.0]);
        assert_eq!(stats.samples("constant"), &[7.5]);
        // The blocker never releases; its slot is freed when it finishes at 4.
        assert_eq!(stats.samples("waited"), &[3.0]);
        assert_eq!(stats.samples("elapsed"), &[4.0]);
        assert_eq!(stats.samples("queue"), &[0.0]);
    }

    #[test]
    fn test_release_not_held() {
        let mut sim = Simulation::new(Collector::default());
        let resource = sim.add_resource(1).unwrap();
        sim.spawn("p", Script::builder().release(resource).build());
        assert!(matches!(
            sim.run(),
            Err(crate::Error::ProcessLogic { time, .. }) if time == 0.0
        ));
    }

    #[test]
    fn test_new_equals_builder() {
        let resource = ResourceId::from(0);
        let script = Script::new(vec![
            Action::Acquire(resource),
            Action::Timeout(1.0),
            Action::Release(resource),
        ]);
        let built = Script::builder()
            .acquire(resource)
            .timeout(1.0)
            .release(resource)
            .build();
        assert_eq!(script.actions, built.actions);
    }
}

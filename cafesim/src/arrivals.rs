use std::rc::Rc;

use rand_distr::Distribution;
use simcore::{Context, Process, ProcessError, Step, Wake};

use crate::customer::Customer;
use crate::{Sampler, Shop, Station};

/// Generates customers for as long as the simulation runs.
///
/// The first interval is drawn at start, so the first customer does not arrive at time 0.
pub(crate) struct Arrivals {
    interval: Sampler,
    stations: Rc<[Station]>,
    generated: usize,
}

impl Arrivals {
    pub(crate) fn new(interval: Sampler, stations: Rc<[Station]>) -> Self {
        Self {
            interval,
            stations,
            generated: 0,
        }
    }
}

impl Process<Shop> for Arrivals {
    fn resume(&mut self, ctx: &mut Context<'_, Shop>) -> Result<Step, ProcessError> {
        if ctx.wake() == Wake::Timeout {
            self.generated += 1;
            ctx.spawn(
                format!("Customer {}", self.generated),
                Customer::new(Rc::clone(&self.stations)),
            );
        }
        let interval = self.interval.sample(ctx.state_mut().rng_mut());
        Ok(Step::Timeout(interval))
    }
}

use std::rc::Rc;

use rand_distr::Distribution;
use simcore::{Context, Process, ProcessError, Sink, Step, Wake};

use crate::{queue_length_label, Shop, Station, ARRIVAL, DEPARTURE, TOTAL_TIME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Arriving,
    Waiting(usize),
    Served(usize),
    Departed,
}

/// A customer visiting every station in order: waiting in line, being served, and moving on.
pub(crate) struct Customer {
    stations: Rc<[Station]>,
    arrival: f64,
    stage: Stage,
}

impl Customer {
    pub(crate) fn new(stations: Rc<[Station]>) -> Self {
        Self {
            stations,
            arrival: 0.0,
            stage: Stage::Arriving,
        }
    }

    fn line_up(&mut self, station: usize) -> Result<Step, ProcessError> {
        let resource = self
            .stations
            .get(station)
            .ok_or_else(|| format!("no station at position {}", station))?
            .resource;
        self.stage = Stage::Waiting(station);
        Ok(Step::Acquire(resource))
    }
}

impl Process<Shop> for Customer {
    #[allow(clippy::cast_precision_loss)]
    fn resume(&mut self, ctx: &mut Context<'_, Shop>) -> Result<Step, ProcessError> {
        match self.stage {
            Stage::Arriving => {
                self.arrival = ctx.now();
                log::info!("{} arrives at {:.2}", ctx.name(), self.arrival);
                ctx.state_mut().record(ARRIVAL, self.arrival);
                self.line_up(0)
            }
            Stage::Waiting(idx) => {
                let stations = Rc::clone(&self.stations);
                let station = &stations[idx];
                if ctx.wake() != Wake::Granted(station.resource) {
                    return Err(format!(
                        "expected to be served at {}, woken by {:?}",
                        station.name,
                        ctx.wake()
                    )
                    .into());
                }
                let queue_length = ctx.queue_length(station.resource)?;
                ctx.state_mut()
                    .record(&queue_length_label(&station.name), queue_length as f64);
                log::info!(
                    "{} is served at {} at {:.2} ({} waiting)",
                    ctx.name(),
                    station.name,
                    ctx.now(),
                    queue_length
                );
                let service_time = station.service.sample(ctx.state_mut().rng_mut());
                self.stage = Stage::Served(idx);
                Ok(Step::Timeout(service_time))
            }
            Stage::Served(idx) => {
                let stations = Rc::clone(&self.stations);
                let station = &stations[idx];
                log::info!("{} is done at {} at {:.2}", ctx.name(), station.name, ctx.now());
                ctx.release(station.resource)?;
                if idx + 1 < stations.len() {
                    return self.line_up(idx + 1);
                }
                let now = ctx.now();
                let total_time = now - self.arrival;
                log::info!(
                    "{} leaves at {:.2} (total time: {:.2} min)",
                    ctx.name(),
                    now,
                    total_time
                );
                ctx.state_mut().record(DEPARTURE, now);
                ctx.state_mut().record(TOTAL_TIME, total_time);
                self.stage = Stage::Departed;
                Ok(Step::Finish)
            }
            Stage::Departed => Err("customer resumed after leaving".into()),
        }
    }
}

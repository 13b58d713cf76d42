#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Coffee shop simulation: customers arrive at random intervals and pass through a sequence of
//! service stations with limited capacity, e.g., an order taker followed by a coffee maker.
//!
//! Each customer waits in line at a station until one of its slots frees up, is served for a
//! random time, and moves on to the next station, leaving the shop after the last one.

use std::rc::Rc;

use itertools::Itertools;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use simcore::{Collector, ResourceId, Simulation, Sink};
use thiserror::Error;

pub use config::{Config, ConfigError, Sampler, StationConfig, TimeDistribution};
pub use report::{Report, StationReport};

mod arrivals;
mod config;
mod customer;
mod report;

/// Label of customer arrival times.
pub const ARRIVAL: &str = "arrival";
/// Label of times at which customers left the shop.
pub const DEPARTURE: &str = "departure";
/// Label of times between arrival and leaving.
pub const TOTAL_TIME: &str = "total_time";

/// Label of the line length observed at `station` whenever a customer starts service there.
#[must_use]
pub fn queue_length_label(station: &str) -> String {
    format!("queue_length/{}", station)
}

/// State shared by all processes of a coffee shop simulation.
#[derive(Debug, Clone)]
pub struct Shop {
    stats: Collector,
    rng: ChaCha8Rng,
}

impl Shop {
    /// Creates an empty shop with a random generator seeded with `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            stats: Collector::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Samples recorded so far.
    #[must_use]
    pub fn stats(&self) -> &Collector {
        &self.stats
    }

    /// Consumes the shop, returning the recorded samples.
    #[must_use]
    pub fn into_stats(self) -> Collector {
        self.stats
    }

    pub(crate) fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}

impl Sink for Shop {
    fn record(&mut self, label: &str, value: f64) {
        self.stats.record(label, value);
    }
}

/// A station as seen by customers during a run.
pub(crate) struct Station {
    pub(crate) name: String,
    pub(crate) resource: ResourceId,
    pub(crate) service: Sampler,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Summary statistics.
    pub report: Report,
    /// All recorded samples.
    pub samples: Collector,
}

/// Errors that can occur while running the simulation.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration is invalid.
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    /// The simulation could not be assembled, e.g., a station has zero capacity.
    #[error("unable to set up the simulation")]
    Setup(#[source] simcore::Error),
    /// The simulation failed while running.
    #[error("simulation failed at {time:.2}")]
    Failed {
        /// Underlying engine error.
        #[source]
        source: simcore::Error,
        /// Samples recorded up to the failure.
        samples: Collector,
        /// Time of the failure.
        time: f64,
    },
}

/// Runs the simulation described by `config` until its horizon.
///
/// # Errors
///
/// See [`RunError`].
///
/// # Examples
///
/// ```
/// # use cafesim::{Config, TOTAL_TIME};
/// # fn main() -> Result<(), cafesim::RunError> {
/// let mut config = Config::default();
/// config.horizon = 30.0;
/// let outcome = cafesim::run(&config)?;
/// assert_eq!(outcome.report.served, outcome.samples.count(TOTAL_TIME));
/// assert_eq!(cafesim::run(&config)?, outcome);
/// # Ok(())
/// # }
/// ```
pub fn run(config: &Config) -> Result<Outcome, RunError> {
    config.validate()?;
    let mut sim = Simulation::new(Shop::new(config.seed));
    let mut stations = Vec::with_capacity(config.stations.len());
    for station in &config.stations {
        stations.push(Station {
            name: station.name.clone(),
            resource: sim.add_resource(station.capacity).map_err(RunError::Setup)?,
            service: station.service_time.sampler()?,
        });
    }
    let stations: Rc<[Station]> = Rc::from(stations);
    log::info!(
        "Starting simulation (seed: {}, horizon: {}, arrivals: {}, stations: {})",
        config.seed,
        config.horizon,
        config.arrival_interval,
        config
            .stations
            .iter()
            .map(|s| format!("{} x{} {}", s.name, s.capacity, s.service_time))
            .join(", ")
    );
    sim.spawn(
        "Arrivals",
        arrivals::Arrivals::new(config.arrival_interval.sampler()?, stations),
    );
    match sim.run_until(config.horizon) {
        Ok(stop) => {
            log::info!("Simulation stopped at {:.2} ({:?})", sim.now(), stop);
            let samples = sim.into_state().into_stats();
            Ok(Outcome {
                report: Report::new(config, &samples),
                samples,
            })
        }
        Err(source) => {
            let time = sim.now();
            Err(RunError::Failed {
                source,
                samples: sim.into_state().into_stats(),
                time,
            })
        }
    }
}

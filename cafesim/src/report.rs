use std::fmt;

use serde::Serialize;
use simcore::Collector;

use crate::{queue_length_label, Config, ARRIVAL, TOTAL_TIME};

/// Queue statistics of a single station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationReport {
    /// Station name.
    pub name: String,
    /// Number of customers served at the same time.
    pub capacity: usize,
    /// Customers that started service here.
    pub entered: usize,
    /// Longest line observed when a customer started service, or `None` if nobody did.
    pub max_queue_length: Option<usize>,
}

/// Summary of a single simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Configured observation horizon.
    pub horizon: f64,
    /// Customers that arrived before the horizon.
    pub arrived: usize,
    /// Customers that left the shop before the horizon.
    pub served: usize,
    /// Mean time from arrival to leaving over served customers.
    pub average_total_time: Option<f64>,
    /// Longest time from arrival to leaving.
    pub max_total_time: Option<f64>,
    /// Per-station statistics, in the order customers visit them.
    pub stations: Vec<StationReport>,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_count(value: f64) -> usize {
    value as usize
}

impl Report {
    /// Summarizes the samples collected in a run of the given configuration.
    #[must_use]
    pub fn new(config: &Config, samples: &Collector) -> Self {
        let stations = config
            .stations
            .iter()
            .map(|station| {
                let label = queue_length_label(&station.name);
                StationReport {
                    name: station.name.clone(),
                    capacity: station.capacity,
                    entered: samples.count(&label),
                    max_queue_length: samples.max(&label).map(to_count),
                }
            })
            .collect();
        Self {
            horizon: config.horizon,
            arrived: samples.count(ARRIVAL),
            served: samples.count(TOTAL_TIME),
            average_total_time: samples.mean(TOTAL_TIME),
            max_total_time: samples.max(TOTAL_TIME),
            stations,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Simulation Results ===")?;
        match self.average_total_time {
            Some(average) => writeln!(
                f,
                "Average total time per customer: {:.2} minutes",
                average
            )?,
            None => writeln!(f, "Average total time per customer: n/a")?,
        }
        for station in &self.stations {
            writeln!(
                f,
                "Max queue length ({}): {}",
                station.name,
                station.max_queue_length.unwrap_or(0)
            )?;
        }
        write!(f, "Total customers served: {}", self.served)
    }
}

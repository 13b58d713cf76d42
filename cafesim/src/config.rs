//! Anything related to loading up the simulation from configuration files.

use std::fmt;
use std::io::Read;

use rand::Rng;
use rand_distr::{Distribution, Exp, Uniform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors in the simulation configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Distribution parameters are out of range.
    #[error("invalid {distribution} distribution: {reason}")]
    Distribution {
        /// The offending distribution.
        distribution: TimeDistribution,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// Horizon is negative or not finite.
    #[error("horizon must be a non-negative finite number, got {0}")]
    Horizon(f64),
    /// No stations were configured.
    #[error("at least one station is required")]
    NoStations,
    /// The input could not be parsed.
    #[error("unable to parse configuration")]
    Parse(#[from] serde_json::Error),
}

/// Distribution of time intervals, e.g., between arrivals or of a service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeDistribution {
    /// Uniformly distributed between `low` and `high`, inclusive.
    Uniform {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// Exponentially distributed with the given mean.
    Exponential {
        /// Mean interval.
        mean: f64,
    },
    /// Always the same value.
    Constant {
        /// The interval.
        value: f64,
    },
}

impl fmt::Display for TimeDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform { low, high } => write!(f, "uniform[{}, {}]", low, high),
            Self::Exponential { mean } => write!(f, "exponential(mean={})", mean),
            Self::Constant { value } => write!(f, "constant({})", value),
        }
    }
}

impl TimeDistribution {
    /// Validates the parameters and returns a sampler.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Distribution`] if any parameter is negative or not finite,
    /// if `low > high`, or if the exponential mean is 0.
    pub fn sampler(&self) -> Result<Sampler, ConfigError> {
        let invalid = |reason| ConfigError::Distribution {
            distribution: *self,
            reason,
        };
        match *self {
            Self::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || low < 0.0 {
                    Err(invalid("bounds must be non-negative and finite"))
                } else if low > high {
                    Err(invalid("lower bound exceeds upper bound"))
                } else {
                    Ok(Sampler::Uniform(Uniform::new_inclusive(low, high)))
                }
            }
            Self::Exponential { mean } => {
                if !mean.is_finite() || mean <= 0.0 {
                    return Err(invalid("mean must be positive and finite"));
                }
                Exp::new(1.0 / mean)
                    .map(Sampler::Exponential)
                    .map_err(|_| invalid("rate out of range"))
            }
            Self::Constant { value } => {
                if !value.is_finite() || value < 0.0 {
                    Err(invalid("value must be non-negative and finite"))
                } else {
                    Ok(Sampler::Constant(value))
                }
            }
        }
    }
}

/// A validated [`TimeDistribution`] ready to draw samples.
#[derive(Debug, Clone, Copy)]
pub enum Sampler {
    /// See [`TimeDistribution::Uniform`].
    Uniform(Uniform<f64>),
    /// See [`TimeDistribution::Exponential`].
    Exponential(Exp<f64>),
    /// See [`TimeDistribution::Constant`].
    Constant(f64),
}

impl Distribution<f64> for Sampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Uniform(dist) => dist.sample(rng),
            Self::Exponential(dist) => dist.sample(rng),
            Self::Constant(value) => *value,
        }
    }
}

/// A service station customers pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    /// Name used in logs and in the report.
    pub name: String,
    /// Number of customers served at the same time.
    pub capacity: usize,
    /// Time to serve one customer.
    pub service_time: TimeDistribution,
}

/// Simulation configuration typically loaded from a file.
///
/// Missing fields take the values of [`Config::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Random seed.
    pub seed: u64,
    /// Time at which the simulation stops. Events at this time or later are not executed.
    pub horizon: f64,
    /// Time between consecutive customer arrivals.
    pub arrival_interval: TimeDistribution,
    /// Stations in the order customers visit them.
    pub stations: Vec<StationConfig>,
}

impl Default for Config {
    /// An order taker followed by a coffee maker, two of each, observed for 60 minutes.
    fn default() -> Self {
        Self {
            seed: 42,
            horizon: 60.0,
            arrival_interval: TimeDistribution::Uniform {
                low: 2.0,
                high: 5.0,
            },
            stations: vec![
                StationConfig {
                    name: String::from("Order Taker"),
                    capacity: 2,
                    service_time: TimeDistribution::Uniform {
                        low: 1.0,
                        high: 2.0,
                    },
                },
                StationConfig {
                    name: String::from("Coffee Maker"),
                    capacity: 2,
                    service_time: TimeDistribution::Uniform {
                        low: 5.0,
                        high: 8.0,
                    },
                },
            ],
        }
    }
}

impl Config {
    /// Loads and validates a config in JSON format.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid config; see [`Config::validate`].
    ///
    /// # Example
    ///
    /// ```
    /// # use cafesim::{Config, TimeDistribution};
    /// # fn main() -> Result<(), cafesim::ConfigError> {
    /// let input = r#"{
    ///     "seed": 7,
    ///     "horizon": 120,
    ///     "arrival_interval": {"kind": "exponential", "mean": 3},
    ///     "stations": [
    ///         {"name": "Till", "capacity": 1, "service_time": {"kind": "constant", "value": 2}}
    ///     ]
    /// }"#;
    /// let config = Config::from_json(input.as_bytes())?;
    /// assert_eq!(config.seed, 7);
    /// assert_eq!(config.horizon, 120.0);
    /// assert_eq!(config.arrival_interval, TimeDistribution::Exponential { mean: 3.0 });
    /// assert_eq!(config.stations.len(), 1);
    /// assert_eq!(config.stations[0].service_time, TimeDistribution::Constant { value: 2.0 });
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_json<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the horizon, the presence of stations, and all distributions.
    /// Station capacities are checked when resources are created.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.horizon.is_finite() || self.horizon < 0.0 {
            return Err(ConfigError::Horizon(self.horizon));
        }
        if self.stations.is_empty() {
            return Err(ConfigError::NoStations);
        }
        self.arrival_interval.sampler()?;
        for station in &self.stations {
            station.service_time.sampler()?;
        }
        Ok(())
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Implementors accept labeled samples emitted by processes.
pub trait Sink {
    /// Appends `value` to the stream labeled `label`.
    fn record(&mut self, label: &str, value: f64);
}

/// Append-only sample streams keyed by label.
///
/// Aggregates over a label without samples return `None` (or 0 for [`count`](Self::count))
/// rather than failing.
///
/// ```
/// # use simcore::{Collector, Sink};
/// let mut stats = Collector::default();
/// stats.record("wait", 1.0);
/// stats.record("wait", 3.0);
/// assert_eq!(stats.mean("wait"), Some(2.0));
/// assert_eq!(stats.max("wait"), Some(3.0));
/// assert_eq!(stats.count("wait"), 2);
/// assert_eq!(stats.mean("missing"), None);
/// assert_eq!(stats.count("missing"), 0);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collector {
    samples: BTreeMap<String, Vec<f64>>,
}

impl Sink for Collector {
    fn record(&mut self, label: &str, value: f64) {
        if let Some(samples) = self.samples.get_mut(label) {
            samples.push(value);
        } else {
            self.samples.insert(label.to_string(), vec![value]);
        }
    }
}

impl Collector {
    /// All samples recorded under `label`, in recording order.
    #[must_use]
    pub fn samples(&self, label: &str) -> &[f64] {
        self.samples.get(label).map_or(&[], Vec::as_slice)
    }

    /// Number of samples recorded under `label`.
    #[must_use]
    pub fn count(&self, label: &str) -> usize {
        self.samples(label).len()
    }

    /// Arithmetic mean of the samples, or `None` if there are none.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self, label: &str) -> Option<f64> {
        let samples = self.samples(label);
        if samples.is_empty() {
            None
        } else {
            Some(samples.iter().sum::<f64>() / samples.len() as f64)
        }
    }

    /// Maximum sample, or `None` if there are none.
    #[must_use]
    pub fn max(&self, label: &str) -> Option<f64> {
        self.samples(label).iter().copied().reduce(f64::max)
    }

    /// Minimum sample, or `None` if there are none.
    #[must_use]
    pub fn min(&self, label: &str) -> Option<f64> {
        self.samples(label).iter().copied().reduce(f64::min)
    }

    /// Iterates over labels with at least one sample, in lexicographic order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    /// Checks if no samples have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

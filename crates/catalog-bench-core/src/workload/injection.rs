use std::time::Duration;

use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::config::{ConfigError, WorkloadConfig};

/// Open-model arrival schedule: `rate` new iterations per second for `duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionProfile {
    rate: f64,
    mean_gap: Duration,
    duration: Duration,
    randomized: bool,
    max_in_flight: Option<usize>,
}

impl InjectionProfile {
    pub fn constant(rate: f64, duration: Duration) -> Result<Self, ConfigError> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "injection rate must be positive, got {}",
                rate
            )));
        }
        // The spacing must be representable and at least one nanosecond
        let mean_gap = Duration::try_from_secs_f64(1.0 / rate)
            .ok()
            .filter(|gap| !gap.is_zero())
            .ok_or_else(|| {
                ConfigError::Invalid(format!("injection rate {} is out of range", rate))
            })?;
        Ok(Self {
            rate,
            mean_gap,
            duration,
            randomized: false,
            max_in_flight: None,
        })
    }

    pub fn from_config(workload: &WorkloadConfig) -> Result<Self, ConfigError> {
        Ok(Self::constant(workload.throughput, workload.duration())?
            .randomized(workload.randomized)
            .with_max_in_flight(workload.max_in_flight))
    }

    /// Space arrivals with exponentially distributed gaps of the same mean.
    pub fn randomized(mut self, randomized: bool) -> Self {
        self.randomized = randomized;
        self
    }

    pub fn with_max_in_flight(mut self, max: Option<usize>) -> Self {
        self.max_in_flight = max;
        self
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn max_in_flight(&self) -> Option<usize> {
        self.max_in_flight
    }

    /// Expected number of arrivals over the whole profile.
    pub fn expected_arrivals(&self) -> f64 {
        self.rate * self.duration.as_secs_f64()
    }

    /// Gap between the current arrival and the next one. A randomized gap
    /// too long to represent saturates at `Duration::MAX`.
    pub fn next_gap<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if !self.randomized {
            return self.mean_gap;
        }
        match Exp::new(self.rate) {
            Ok(exp) => Duration::try_from_secs_f64(exp.sample(rng)).unwrap_or(Duration::MAX),
            Err(_) => self.mean_gap,
        }
    }
}

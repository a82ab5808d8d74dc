//! Reconnection backoff for the reconciliation loop.

use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// Exponential backoff without an elapsed-time limit.
///
/// Each call to [`next_delay`](ExponentialBackoff::next_delay) returns the
/// current interval spread by the randomization factor, then grows the
/// interval by the multiplier up to the configured maximum.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    randomization: f64,
    current: Duration,
}

impl ExponentialBackoff {
    pub fn new(config: &BackoffConfig) -> Self {
        let initial = Duration::from_millis(config.initial_interval_ms);
        Self {
            initial,
            max: Duration::from_millis(config.max_interval_ms).max(initial),
            multiplier: config.multiplier.max(1.0),
            randomization: config.randomization_factor.clamp(0.0, 1.0),
            current: initial,
        }
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.randomize(self.current);
        self.current = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .map_or(self.max, |next| next.min(self.max));
        delay
    }

    fn randomize(&self, interval: Duration) -> Duration {
        if self.randomization == 0.0 {
            return interval;
        }
        let spread = interval.as_secs_f64() * self.randomization;
        let low = interval.as_secs_f64() - spread;
        let high = interval.as_secs_f64() + spread;
        Duration::try_from_secs_f64(rand::thread_rng().gen_range(low..=high)).unwrap_or(interval)
    }
}

/// Backoff for a long-running job.
///
/// An attempt that stayed up for at least `min_job_interval` counts as a
/// success, so the next failure starts again from the initial interval.
#[derive(Debug, Clone)]
pub struct JobBackoff {
    inner: ExponentialBackoff,
    min_job_interval: Duration,
}

impl JobBackoff {
    pub fn new(config: &BackoffConfig) -> Self {
        Self {
            inner: ExponentialBackoff::new(config),
            min_job_interval: Duration::from_millis(config.min_job_interval_ms),
        }
    }

    /// Delay before the next attempt, given how long the last one ran.
    pub fn next_delay(&mut self, ran_for: Duration) -> Duration {
        if ran_for >= self.min_job_interval {
            self.inner.reset();
        }
        self.inner.next_delay()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic() -> BackoffConfig {
        BackoffConfig {
            initial_interval_ms: 100,
            max_interval_ms: 400,
            multiplier: 2.0,
            randomization_factor: 0.0,
            min_job_interval_ms: 1_000,
        }
    }

    #[test]
    fn grows_until_capped() {
        let mut backoff = ExponentialBackoff::new(&deterministic());
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 400, 400]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn randomized_delay_stays_in_range() {
        let mut backoff = ExponentialBackoff::new(&BackoffConfig {
            randomization_factor: 0.5,
            ..deterministic()
        });
        for _ in 0..50 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(600));
        }
    }

    #[test]
    fn huge_multiplier_saturates_at_max() {
        let mut backoff = JobBackoff::new(&BackoffConfig {
            multiplier: 1e30,
            max_interval_ms: u64::MAX,
            randomization_factor: 0.5,
            ..deterministic()
        });
        let short = Duration::from_millis(10);
        for _ in 0..5 {
            backoff.next_delay(short);
        }
        assert!(backoff.next_delay(short) <= Duration::from_millis(u64::MAX).mul_f64(1.5));
    }

    #[test]
    fn long_running_job_resets_backoff() {
        let mut backoff = JobBackoff::new(&deterministic());
        let short = Duration::from_millis(10);
        assert_eq!(backoff.next_delay(short), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(short), Duration::from_millis(200));
        assert_eq!(
            backoff.next_delay(Duration::from_secs(5)),
            Duration::from_millis(100)
        );
    }
}

//! Exponential backoff with jitter for transient transport failures
//! (spec.md §7: "transient (retry with exponential backoff + jitter;
//! capped attempts)").
//!
//! Adapted from the teacher's `resilience::backoff::ExponentialBackoff`
//! almost unchanged — the algorithm is domain-agnostic.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: Option<usize>,
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_retries: Some(5),
            jitter_factor: 0.1,
        }
    }
}

pub struct ExponentialBackoff {
    config: BackoffConfig,
    current_attempt: usize,
    current_delay: Duration,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { current_delay: config.initial_delay, current_attempt: 0, config }
    }

    /// Next delay, advancing the backoff state. `None` once `max_retries` is
    /// exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max_retries) = self.config.max_retries {
            if self.current_attempt >= max_retries {
                return None;
            }
        }

        let delay = self.jittered_delay();
        self.current_attempt += 1;
        self.current_delay = std::cmp::min(
            Duration::from_secs_f64(self.current_delay.as_secs_f64() * self.config.multiplier),
            self.config.max_delay,
        );
        Some(delay)
    }

    fn jittered_delay(&self) -> Duration {
        if self.config.jitter_factor == 0.0 {
            return self.current_delay;
        }
        let mut rng = rand::thread_rng();
        let jitter = rng.gen::<f64>() * self.config.jitter_factor;
        let multiplier = 1.0 + (jitter - self.config.jitter_factor / 2.0);
        Duration::from_secs_f64(self.current_delay.as_secs_f64() * multiplier.max(0.0))
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
        self.current_delay = self.config.initial_delay;
    }

    pub fn attempt_number(&self) -> usize {
        self.current_attempt
    }

    pub fn can_retry(&self) -> bool {
        match self.config.max_retries {
            Some(max) => self.current_attempt < max,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_each_attempt() {
        let mut backoff = ExponentialBackoff::new(BackoffConfig { jitter_factor: 0.0, ..Default::default() });
        let first = backoff.next_delay().unwrap();
        let second = backoff.next_delay().unwrap();
        assert!(second > first);
    }

    #[test]
    fn exhausts_after_max_retries() {
        let mut backoff =
            ExponentialBackoff::new(BackoffConfig { max_retries: Some(2), jitter_factor: 0.0, ..Default::default() });
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn reset_returns_to_initial_delay() {
        let mut backoff = ExponentialBackoff::new(BackoffConfig { jitter_factor: 0.0, ..Default::default() });
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt_number(), 0);
        assert!(backoff.can_retry());
    }
}

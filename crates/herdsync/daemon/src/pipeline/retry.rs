//! Retry delays.

use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// Exponential backoff with optional jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Backoff {
    /// Delay before retry number `attempt` (zero-based).
    ///
    /// With jitter the delay is drawn from the upper half of the window, so
    /// it never drops below half the nominal value.
    pub fn delay(&self, attempt: u32) -> Duration {
        let nominal = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = nominal.min(self.max.as_secs_f64());
        let secs = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            capped
        };
        Duration::from_secs_f64(secs)
    }
}

impl From<&BackoffConfig> for Backoff {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_delay_ms),
            max: Duration::from_millis(config.max_delay_ms.max(config.initial_delay_ms)),
            multiplier: config.multiplier.max(1.0),
            jitter: config.jitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(jitter: bool) -> BackoffConfig {
        BackoffConfig {
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_exponential_and_capped() {
        let backoff = Backoff::from(&config(false));
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(10), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_in_window() {
        let backoff = Backoff::from(&config(true));
        for _ in 0..100 {
            let delay = backoff.delay(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(200));
        }
    }
}

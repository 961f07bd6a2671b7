//! Engine configuration

use std::time::Duration;

/// Passthrough engine configuration
#[derive(Debug, Clone)]
pub struct PassthroughConfig {
    /// Delay between reconnection attempts after a teardown or a failed
    /// acquire, applied uniformly to both pumps.
    pub retry_delay: Duration,

    /// Length of the traffic-rate reporting window.
    pub rate_window: Duration,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            rate_window: Duration::from_secs(1),
        }
    }
}

impl PassthroughConfig {
    /// Create a configuration with the defaults (1 second retry delay,
    /// 1 second rate window).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the rate reporting window.
    pub fn with_rate_window(mut self, window: Duration) -> Self {
        self.rate_window = window;
        self
    }
}

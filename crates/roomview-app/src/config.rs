//! Runtime configuration.

use std::time::Duration;

use roomview_controller::ControllerConfig;

/// Default interval between controller ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Default capacity of the signal broadcast channel.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 64;

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Interval between ticks (throttle flushes)
    pub tick_interval: Duration,
    /// Signals buffered per slow receiver before it lags
    pub signal_capacity: usize,
    /// Controller configuration
    pub controller: ControllerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
            controller: ControllerConfig::default(),
        }
    }
}

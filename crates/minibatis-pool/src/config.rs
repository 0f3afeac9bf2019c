//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Configuration for the connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Connections opened eagerly when the pool is constructed.
    pub initial_size: u32,

    /// Idle level at or below which the pool tops itself up.
    ///
    /// Each top-up opens `min_idle / 2 + 1` connections.
    pub min_idle: u32,

    /// Maximum number of connections checked out at once.
    pub max_active: u32,

    /// Default time an acquire may wait for a connection.
    pub max_wait: Duration,

    /// Keep waiting when `max_active` is reached instead of failing at once.
    ///
    /// When `false` (the default) an acquire at capacity fails immediately
    /// with [`PoolError::CapacityExceeded`]. When `true` the caller waits for
    /// a release and fails with [`PoolError::AcquisitionTimeout`] at the
    /// deadline.
    pub wait_on_capacity: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 5,
            min_idle: 2,
            max_active: 10,
            max_wait: Duration::from_secs(30),
            wait_on_capacity: false,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of connections opened at construction.
    #[must_use]
    pub fn initial_size(mut self, count: u32) -> Self {
        self.initial_size = count;
        self
    }

    /// Set the idle top-up threshold.
    #[must_use]
    pub fn min_idle(mut self, count: u32) -> Self {
        self.min_idle = count;
        self
    }

    /// Set the maximum number of checked-out connections.
    #[must_use]
    pub fn max_active(mut self, count: u32) -> Self {
        self.max_active = count;
        self
    }

    /// Set the default acquisition timeout.
    #[must_use]
    pub fn max_wait(mut self, timeout: Duration) -> Self {
        self.max_wait = timeout;
        self
    }

    /// Choose between failing fast and waiting when at capacity.
    #[must_use]
    pub fn wait_on_capacity(mut self, enabled: bool) -> Self {
        self.wait_on_capacity = enabled;
        self
    }

    /// Number of connections a single idle top-up opens.
    #[must_use]
    pub fn replenish_batch(&self) -> u32 {
        self.min_idle / 2 + 1
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_active == 0 {
            return Err(PoolError::Configuration(
                "max_active must be greater than 0".into(),
            ));
        }
        if self.min_idle > self.max_active {
            return Err(PoolError::Configuration(
                "min_idle cannot be greater than max_active".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.initial_size, 5);
        assert_eq!(config.min_idle, 2);
        assert_eq!(config.max_active, 10);
        assert!(!config.wait_on_capacity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_methods() {
        let config = PoolConfig::new()
            .initial_size(3)
            .min_idle(4)
            .max_active(50)
            .max_wait(Duration::from_millis(250))
            .wait_on_capacity(true);

        assert_eq!(config.initial_size, 3);
        assert_eq!(config.min_idle, 4);
        assert_eq!(config.max_active, 50);
        assert_eq!(config.max_wait, Duration::from_millis(250));
        assert!(config.wait_on_capacity);
    }

    #[test]
    fn test_replenish_batch() {
        assert_eq!(PoolConfig::new().min_idle(0).replenish_batch(), 1);
        assert_eq!(PoolConfig::new().min_idle(2).replenish_batch(), 2);
        assert_eq!(PoolConfig::new().min_idle(5).replenish_batch(), 3);
    }

    #[test]
    fn test_config_validation_zero_max() {
        let config = PoolConfig::new().min_idle(0).max_active(0);

        let result = config.validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("max_active must be greater than 0")
        );
    }

    #[test]
    fn test_config_validation_min_idle_greater_than_max() {
        let config = PoolConfig::new().min_idle(20).max_active(10);

        let result = config.validate();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("min_idle cannot be greater than max_active")
        );
    }

    #[test]
    fn test_initial_size_may_exceed_max_active() {
        // Idle connections do not count against max_active.
        let config = PoolConfig::new().initial_size(20).max_active(10);
        assert!(config.validate().is_ok());
    }
}

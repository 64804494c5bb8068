//! Generator configuration.

use fx3pps_errors::ConfigError;
use serde::{Deserialize, Serialize};

use crate::rt_setup::RtSetup;
use crate::{
    DEFAULT_INITIAL_WRITE_TIME_NS, DEFAULT_MAX_HOLD_NS, DEFAULT_SEND_DELAY_NS,
    DEFAULT_WARMUP_SAMPLES, NSEC_PER_SEC, SAFETY_MARGIN_NS, SEND_DELAY_MAX_NS,
};

/// Largest accepted warm-up sample count.
pub const MAX_WARMUP_SAMPLES: u32 = 1024;

/// Per-generator settings.
///
/// Everything is plain data; it is validated once at attach and then copied into
/// the timer thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Assert-to-clear separation within each second (ns).
    ///
    /// Default: 100ms. Bounded to `0..=SEND_DELAY_MAX_NS`.
    pub send_delay_ns: u64,

    /// Run the warm-up write burst before the timer is armed.
    pub calibrate_on_attach: bool,

    /// Writes in the warm-up burst. Must be a power of two.
    pub warmup_samples: u32,

    /// Write-time seed used when warm-up is disabled (ns).
    pub initial_write_time_ns: u64,

    /// Cap on each busy-wait of a callback (ns).
    ///
    /// The assert spin may run this long past the wake-up slack the look-ahead
    /// planned for; the clear spin may run this long past the end of the assert
    /// spin. Must leave room for the send delay plus three safety margins.
    pub max_hold_ns: u64,

    /// Real-time setup of the timer thread.
    pub rt: RtSetup,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            send_delay_ns: DEFAULT_SEND_DELAY_NS,
            calibrate_on_attach: true,
            warmup_samples: DEFAULT_WARMUP_SAMPLES,
            initial_write_time_ns: DEFAULT_INITIAL_WRITE_TIME_NS,
            max_hold_ns: DEFAULT_MAX_HOLD_NS,
            rt: RtSetup::default(),
        }
    }
}

impl GeneratorConfig {
    #[must_use]
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::default()
    }

    /// Smallest `max_hold_ns` accepted for a given send delay.
    pub fn min_hold_ns(send_delay_ns: u64) -> u64 {
        send_delay_ns + 3 * SAFETY_MARGIN_NS as u64
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.send_delay_ns > SEND_DELAY_MAX_NS {
            return Err(ConfigError::out_of_range(
                "send_delay_ns",
                self.send_delay_ns,
                0,
                SEND_DELAY_MAX_NS,
            ));
        }
        if !(1..=MAX_WARMUP_SAMPLES).contains(&self.warmup_samples) {
            return Err(ConfigError::out_of_range(
                "warmup_samples",
                self.warmup_samples,
                1,
                MAX_WARMUP_SAMPLES,
            ));
        }
        if !self.warmup_samples.is_power_of_two() {
            return Err(ConfigError::not_power_of_two(
                "warmup_samples",
                u64::from(self.warmup_samples),
            ));
        }
        if self.initial_write_time_ns > SEND_DELAY_MAX_NS {
            return Err(ConfigError::out_of_range(
                "initial_write_time_ns",
                self.initial_write_time_ns,
                0,
                SEND_DELAY_MAX_NS,
            ));
        }
        let min_hold = Self::min_hold_ns(self.send_delay_ns);
        let max_hold = NSEC_PER_SEC as u64;
        if !(min_hold..=max_hold).contains(&self.max_hold_ns) {
            return Err(ConfigError::out_of_range(
                "max_hold_ns",
                self.max_hold_ns,
                min_hold,
                max_hold,
            ));
        }
        if self.rt.high_priority && !(1..=99).contains(&self.rt.priority) {
            return Err(ConfigError::out_of_range(
                "rt.priority",
                self.rt.priority,
                1,
                99,
            ));
        }
        Ok(())
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug, Default)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    #[must_use]
    pub fn send_delay_ns(mut self, ns: u64) -> Self {
        self.config.send_delay_ns = ns;
        self
    }

    #[must_use]
    pub fn calibrate_on_attach(mut self, enabled: bool) -> Self {
        self.config.calibrate_on_attach = enabled;
        self
    }

    #[must_use]
    pub fn warmup_samples(mut self, samples: u32) -> Self {
        self.config.warmup_samples = samples;
        self
    }

    #[must_use]
    pub fn initial_write_time_ns(mut self, ns: u64) -> Self {
        self.config.initial_write_time_ns = ns;
        self
    }

    #[must_use]
    pub fn max_hold_ns(mut self, ns: u64) -> Self {
        self.config.max_hold_ns = ns;
        self
    }

    #[must_use]
    pub fn rt(mut self, rt: RtSetup) -> Self {
        self.config.rt = rt;
        self
    }

    /// Build and validate.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the resulting configuration is invalid.
    pub fn build(self) -> Result<GeneratorConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GeneratorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_legacy_send_delay_is_valid() {
        let cfg = GeneratorConfig::builder().send_delay_ns(30_000).build();
        assert!(cfg.is_ok());
    }

    #[test]
    fn test_send_delay_bound() {
        let err = GeneratorConfig::builder()
            .send_delay_ns(SEND_DELAY_MAX_NS + 1)
            .build()
            .err();
        assert_eq!(
            err.as_ref().and_then(ConfigError::field),
            Some("send_delay_ns")
        );
    }

    #[test]
    fn test_warmup_must_be_power_of_two() {
        let err = GeneratorConfig::builder().warmup_samples(24).build().err();
        assert_eq!(
            err,
            Some(ConfigError::not_power_of_two("warmup_samples", 24))
        );
        assert!(GeneratorConfig::builder().warmup_samples(0).build().is_err());
        assert!(GeneratorConfig::builder().warmup_samples(2048).build().is_err());
        assert!(GeneratorConfig::builder().warmup_samples(1).build().is_ok());
    }

    #[test]
    fn test_hold_must_cover_send_delay() {
        let err = GeneratorConfig::builder()
            .send_delay_ns(100_000_000)
            .max_hold_ns(100_000_000)
            .build()
            .err();
        assert_eq!(
            err.as_ref().and_then(ConfigError::field),
            Some("max_hold_ns")
        );
        assert!(
            GeneratorConfig::builder()
                .send_delay_ns(100_000_000)
                .max_hold_ns(GeneratorConfig::min_hold_ns(100_000_000))
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_priority_only_checked_when_enabled() {
        let rt = RtSetup::minimal().with_priority(0);
        assert!(GeneratorConfig::builder().rt(rt.clone()).build().is_ok());
        assert!(
            GeneratorConfig::builder()
                .rt(rt.with_high_priority(true))
                .build()
                .is_err()
        );
    }
}

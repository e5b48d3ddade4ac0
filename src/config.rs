//! Buffer configuration, built with the same validating-builder
//! convention as `flux::disruptor::RingBufferConfig::new().with_*`: each
//! step returns `Result` so invalid combinations are rejected at
//! construction time rather than surfacing later as a confusing panic.

use crate::constants::{DEFAULT_EPS, MIN_CAPACITY, MIN_PREFETCH_CAP};
use crate::error::{ReplayError, Result};

/// Configuration shared by the uniform and prioritized buffers.
#[derive(Debug, Clone)]
pub struct ReplayBufferConfig {
    pub(crate) capacity: usize,
    pub(crate) pin_memory: bool,
    pub(crate) prefetch: Option<usize>,
}

impl ReplayBufferConfig {
    /// Start building a configuration for a buffer of the given
    /// capacity. Fails with [`ReplayError::InvalidArgument`] if
    /// `capacity == 0`.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < MIN_CAPACITY {
            return Err(ReplayError::invalid_argument("capacity must be greater than 0"));
        }
        Ok(Self { capacity, pin_memory: false, prefetch: None })
    }

    /// Enable or disable host-memory pinning on sampled/read output.
    pub fn with_pin_memory(mut self, pin_memory: bool) -> Self {
        self.pin_memory = pin_memory;
        self
    }

    /// Enable background prefetching with the given queue capacity.
    /// Fails with [`ReplayError::InvalidArgument`] if `cap == 0`.
    pub fn with_prefetch(mut self, cap: usize) -> Result<Self> {
        if cap < MIN_PREFETCH_CAP {
            return Err(ReplayError::invalid_argument("prefetch capacity must be at least 1"));
        }
        self.prefetch = Some(cap);
        Ok(self)
    }

    /// Buffer capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Additional configuration for [`crate::buffer::PrioritizedBuffer`].
#[derive(Debug, Clone)]
pub struct PrioritizedConfig {
    pub(crate) base: ReplayBufferConfig,
    pub(crate) alpha: f64,
    pub(crate) beta: f64,
    pub(crate) eps: f64,
}

impl PrioritizedConfig {
    /// Start building a prioritized-buffer configuration.
    ///
    /// `alpha` must be strictly positive and `beta` must be
    /// non-negative, matching the reference implementation's
    /// constructor checks.
    pub fn new(capacity: usize, alpha: f64, beta: f64) -> Result<Self> {
        if alpha <= 0.0 {
            return Err(ReplayError::invalid_argument(format!(
                "alpha must be strictly greater than 0, got alpha={alpha}"
            )));
        }
        if beta < 0.0 {
            return Err(ReplayError::invalid_argument(format!(
                "beta must be greater or equal to 0, got beta={beta}"
            )));
        }
        Ok(Self {
            base: ReplayBufferConfig::new(capacity)?,
            alpha,
            beta,
            eps: DEFAULT_EPS,
        })
    }

    /// Override the default `ε` priority stabilizer.
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Enable or disable host-memory pinning on sampled/read output.
    pub fn with_pin_memory(mut self, pin_memory: bool) -> Self {
        self.base = self.base.with_pin_memory(pin_memory);
        self
    }

    /// Enable background prefetching with the given queue capacity.
    pub fn with_prefetch(mut self, cap: usize) -> Result<Self> {
        self.base = self.base.with_prefetch(cap)?;
        Ok(self)
    }

    /// Buffer capacity.
    pub fn capacity(&self) -> usize {
        self.base.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_capacity() {
        assert!(ReplayBufferConfig::new(0).is_err());
    }

    #[test]
    fn rejects_zero_prefetch_cap() {
        let cfg = ReplayBufferConfig::new(4).unwrap();
        assert!(cfg.with_prefetch(0).is_err());
    }

    #[test]
    fn prioritized_rejects_non_positive_alpha() {
        assert!(PrioritizedConfig::new(4, 0.0, 0.0).is_err());
    }

    #[test]
    fn prioritized_rejects_negative_beta() {
        assert!(PrioritizedConfig::new(4, 1.0, -0.1).is_err());
    }

    #[test]
    fn prioritized_defaults_eps() {
        let cfg = PrioritizedConfig::new(4, 0.6, 0.4).unwrap();
        assert_eq!(cfg.eps, DEFAULT_EPS);
    }
}

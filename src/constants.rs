//! Replay buffer tuning constants and defaults

/// Default priority stabilizer `ε` added before raising to `α`, matching
/// the Prioritized Experience Replay reference implementation.
pub const DEFAULT_EPS: f64 = 1e-8;

/// `max_priority` high-watermark seed value used before any priority has
/// been observed.
pub const DEFAULT_MAX_PRIORITY: f64 = 1.0;

/// Minimum accepted prefetch queue capacity.
pub const MIN_PREFETCH_CAP: usize = 1;

/// Minimum accepted buffer capacity.
pub const MIN_CAPACITY: usize = 1;

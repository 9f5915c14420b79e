//! Compile-time defaults for the stream driver.

/// Default worker-thread request; 0 means auto-detect one per core.
pub const NB_WORKERS_DEFAULT: usize = 0;

/// Upper bound on the `-T` worker count.
pub const NB_WORKERS_MAX: usize = 200;

//! Pool configuration.

use crate::errors::PoolError;
use std::env;
use std::time::Duration;
use zk_engine::{ContextConfig, DEFAULT_ARENA_CAPACITY};
use zk_telemetry::parse_flag;

/// Default number of execution contexts.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Upper bound for any pool, detected or requested.
pub const MAX_POOL_SIZE: usize = 64;

/// Default number of contexts brought up at the same time.
pub const DEFAULT_SPAWN_CONCURRENCY: usize = 4;

/// Configuration for a [`WorkerPool`](crate::WorkerPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Requested number of slots (ignored when `detect_hardware` is set)
    pub size: usize,

    /// Size the pool from the number of logical CPUs
    pub detect_hardware: bool,

    /// Maximum contexts initializing concurrently
    pub spawn_concurrency: usize,

    /// Optional per-request deadline for every slot's client
    pub request_timeout: Option<Duration>,

    /// Arena capacity for each context, in bytes
    pub arena_capacity: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            detect_hardware: false,
            spawn_concurrency: DEFAULT_SPAWN_CONCURRENCY,
            request_timeout: None,
            arena_capacity: DEFAULT_ARENA_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ZK_POOL_SIZE`: Number of slots (default: 4)
    /// - `ZK_POOL_DETECT`: Size from logical CPUs (default: false)
    /// - `ZK_POOL_SPAWN_CONCURRENCY`: Contexts started at once (default: 4)
    /// - `ZK_REQUEST_TIMEOUT_MS`: Per-request deadline (default: none)
    /// - `ZK_ARENA_CAPACITY`: Arena bytes per context (default: 256 MiB)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            size: number("ZK_POOL_SIZE")
                .map(|n| n as usize)
                .unwrap_or(defaults.size),
            detect_hardware: lookup("ZK_POOL_DETECT")
                .map(|v| parse_flag(&v, false))
                .unwrap_or(false),
            spawn_concurrency: number("ZK_POOL_SPAWN_CONCURRENCY")
                .map(|n| n as usize)
                .unwrap_or(defaults.spawn_concurrency),
            request_timeout: number("ZK_REQUEST_TIMEOUT_MS").map(Duration::from_millis),
            arena_capacity: number("ZK_ARENA_CAPACITY").unwrap_or(defaults.arena_capacity),
        }
    }

    /// Builder-style method to set the pool size
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self.detect_hardware = false;
        self
    }

    /// Builder-style method to size from hardware
    pub fn with_hardware_detection(mut self) -> Self {
        self.detect_hardware = true;
        self
    }

    /// Builder-style method to set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builder-style method to set the arena capacity
    pub fn with_arena_capacity(mut self, bytes: u64) -> Self {
        self.arena_capacity = bytes;
        self
    }

    /// Builder-style method to set the spawn concurrency
    pub fn with_spawn_concurrency(mut self, concurrency: usize) -> Self {
        self.spawn_concurrency = concurrency;
        self
    }

    /// Number of slots the pool will have.
    #[must_use]
    pub fn resolved_size(&self) -> usize {
        if self.detect_hardware {
            num_cpus::get().clamp(1, MAX_POOL_SIZE)
        } else {
            self.size
        }
    }

    /// Check the configuration.
    ///
    /// A size of zero is not rejected here; it is reported by pool `init`.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.resolved_size() > MAX_POOL_SIZE {
            return Err(PoolError::InvalidConfig(format!(
                "pool size {} exceeds maximum {}",
                self.size, MAX_POOL_SIZE
            )));
        }
        if self.spawn_concurrency == 0 {
            return Err(PoolError::InvalidConfig(
                "spawn concurrency must be at least 1".into(),
            ));
        }
        if self.arena_capacity == 0 {
            return Err(PoolError::InvalidConfig(
                "arena capacity must be non-zero".into(),
            ));
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(PoolError::InvalidConfig(
                "request timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn context_config(&self) -> ContextConfig {
        ContextConfig {
            arena_capacity: self.arena_capacity,
            ..ContextConfig::default()
        }
    }
}

use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Field, ScanError};

pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 2000;

/// Scanner settings handed over by the settings layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Connect deadline for every probe, in milliseconds.
    pub socket_timeout_ms: u64,
    /// Maximum number of probes in flight on the worker pool.
    pub thread_pool_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            socket_timeout_ms: DEFAULT_SOCKET_TIMEOUT_MS,
            thread_pool_size: default_pool_size(),
        }
    }
}

impl ScannerConfig {
    pub fn new(socket_timeout_ms: u64, thread_pool_size: usize) -> Result<Self, ScanError> {
        let cfg = Self {
            socket_timeout_ms,
            thread_pool_size,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.socket_timeout_ms == 0 {
            return Err(ScanError::invalid(
                Field::SocketTimeout,
                "socket timeout cannot be less than 1ms",
            ));
        }
        if self.thread_pool_size == 0 {
            return Err(ScanError::invalid(
                Field::PoolSize,
                "thread pool size cannot be less than 1",
            ));
        }
        Ok(())
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }
}

/// Hardware parallelism, or 1 when it cannot be determined.
pub fn default_pool_size() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

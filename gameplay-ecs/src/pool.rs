// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Memory pooling for reducing allocation churn
//!
//! The scheduler hands every work item a fresh command segment each stage.
//! Segment buffers are drained during playback and returned here, so a
//! steady-state simulation stops allocating for deferred commands.

use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Configuration for buffer pool behavior
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Initial capacity for each freshly allocated buffer
    pub initial_capacity: usize,
    /// Maximum number of idle buffers to keep in the pool
    pub max_pool_size: usize,
    /// Whether to log when the pool has to allocate
    pub log_resize_events: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            initial_capacity: 64,
            max_pool_size: 8,
            log_resize_events: false,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with custom settings
    pub fn new(initial_capacity: usize, max_pool_size: usize) -> Self {
        PoolConfig {
            initial_capacity,
            max_pool_size,
            log_resize_events: false,
        }
    }

    /// Enable logging for allocation events
    pub fn with_logging(mut self) -> Self {
        self.log_resize_events = true;
        self
    }
}

/// Statistics for monitoring pool performance
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of times a buffer was served from the pool
    pub hits: usize,
    /// Number of times a new buffer had to be allocated
    pub misses: usize,
    /// Current number of idle buffers in the pool
    pub pool_size: usize,
    /// Peak number of idle buffers ever held
    pub peak_size: usize,
}

impl PoolStats {
    /// Calculate the hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A thread-safe pool of reusable `Vec` buffers
///
/// Cloning the pool yields another handle onto the same buffers.
pub struct VecPool<T> {
    pool: Arc<Mutex<Vec<Vec<T>>>>,
    config: PoolConfig,
    stats: Arc<Mutex<PoolStats>>,
}

impl<T> VecPool<T> {
    /// Create a new pool with default configuration
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a new pool with custom configuration
    pub fn with_config(config: PoolConfig) -> Self {
        VecPool {
            pool: Arc::new(Mutex::new(Vec::new())),
            config,
            stats: Arc::new(Mutex::new(PoolStats::default())),
        }
    }

    /// Take an empty buffer, allocating one if the pool is empty
    pub fn acquire(&self) -> Vec<T> {
        // LOCK ORDERING: pool lock is released before the stats lock is taken
        let (buffer, was_hit, pool_len) = {
            let mut pool = lock(&self.pool);
            let buffer = pool.pop();
            let was_hit = buffer.is_some();
            let buffer =
                buffer.unwrap_or_else(|| Vec::with_capacity(self.config.initial_capacity));
            (buffer, was_hit, pool.len())
        };

        {
            let mut stats = lock(&self.stats);
            if was_hit {
                stats.hits += 1;
            } else {
                stats.misses += 1;
                if self.config.log_resize_events {
                    debug!(
                        "VecPool: allocating new buffer (hit rate: {:.1}%)",
                        stats.hit_rate()
                    );
                }
            }
            stats.pool_size = pool_len;
        }

        buffer
    }

    /// Return a buffer for reuse
    ///
    /// The buffer is cleared; it is dropped instead when the pool is full.
    pub fn release(&self, mut buffer: Vec<T>) {
        buffer.clear();
        let pool_len = {
            let mut pool = lock(&self.pool);
            if pool.len() >= self.config.max_pool_size {
                return;
            }
            pool.push(buffer);
            pool.len()
        };

        let mut stats = lock(&self.stats);
        stats.pool_size = pool_len;
        stats.peak_size = stats.peak_size.max(pool_len);
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        lock(&self.stats).clone()
    }

    /// Drop all idle buffers
    pub fn clear(&self) {
        lock(&self.pool).clear();
        lock(&self.stats).pool_size = 0;
    }

    /// Get the current number of idle buffers
    pub fn len(&self) -> usize {
        lock(&self.pool).len()
    }

    /// Check if the pool holds no idle buffers
    pub fn is_empty(&self) -> bool {
        lock(&self.pool).is_empty()
    }
}

impl<T> Default for VecPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for VecPool<T> {
    fn clone(&self) -> Self {
        VecPool {
            pool: Arc::clone(&self.pool),
            config: self.config.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

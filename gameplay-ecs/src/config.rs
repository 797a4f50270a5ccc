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
//! Store and scheduler configuration
//!
//! Both configs follow the same builder pattern: start from `Default` or
//! `new`, chain `with_*` calls, and let the consumer call `validate`.

use crate::error::{EcsError, Result};
use crate::pool::PoolConfig;

/// Limits and layout for a [`World`](crate::ecs::World)
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Maximum number of simultaneously live entities
    pub max_entities: u32,
    /// Number of rows per storage chunk
    pub chunk_capacity: usize,
    /// Maximum number of chunks across all archetypes
    pub max_chunks: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            max_entities: 1 << 20,
            chunk_capacity: 128,
            max_chunks: 1 << 16,
        }
    }
}

impl WorldConfig {
    /// Create a configuration with the given entity limit and default layout
    pub fn new(max_entities: u32) -> Self {
        WorldConfig {
            max_entities,
            ..Self::default()
        }
    }

    /// Set the number of rows per chunk
    pub fn with_chunk_capacity(mut self, chunk_capacity: usize) -> Self {
        self.chunk_capacity = chunk_capacity;
        self
    }

    /// Set the maximum number of chunks
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Check that all limits are usable
    pub fn validate(&self) -> Result<()> {
        if self.max_entities == 0 {
            return Err(EcsError::InvalidConfig("max_entities must be > 0".into()));
        }
        if self.chunk_capacity == 0 {
            return Err(EcsError::InvalidConfig("chunk_capacity must be > 0".into()));
        }
        if self.max_chunks == 0 {
            return Err(EcsError::InvalidConfig("max_chunks must be > 0".into()));
        }
        Ok(())
    }
}

/// Worker pool and dispatch settings for a [`Scheduler`](crate::ecs::Scheduler)
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of worker threads, 0 selects the available hardware parallelism
    pub worker_threads: usize,
    /// Chunks bundled into one work item, 0 balances automatically
    pub chunks_per_work_item: usize,
    /// Log per-stage timings at debug level
    pub log_stage_timing: bool,
    /// Recycling of command segment buffers between stages
    pub segment_pool: PoolConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            worker_threads: 0,
            chunks_per_work_item: 0,
            log_stage_timing: false,
            segment_pool: PoolConfig::new(64, 64),
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with a fixed worker count
    pub fn new(worker_threads: usize) -> Self {
        SchedulerConfig {
            worker_threads,
            ..Self::default()
        }
    }

    /// Bundle a fixed number of chunks into each work item
    pub fn with_chunks_per_work_item(mut self, chunks: usize) -> Self {
        self.chunks_per_work_item = chunks;
        self
    }

    /// Enable debug logging of stage timings
    pub fn with_stage_timing(mut self) -> Self {
        self.log_stage_timing = true;
        self
    }

    /// Replace the segment pool configuration
    pub fn with_segment_pool(mut self, pool: PoolConfig) -> Self {
        self.segment_pool = pool;
        self
    }

    /// Worker count after resolving the automatic setting
    pub fn resolved_workers(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    /// Number of chunks per work item for a pass over `chunk_count` chunks
    ///
    /// The automatic setting aims for about four work items per worker so
    /// that uneven chunks still balance across the pool.
    pub fn work_item_size(&self, chunk_count: usize) -> usize {
        if self.chunks_per_work_item > 0 {
            return self.chunks_per_work_item;
        }
        let target_items = self.resolved_workers() * 4;
        chunk_count.div_ceil(target_items).max(1)
    }
}

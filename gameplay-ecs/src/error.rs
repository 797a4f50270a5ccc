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
//! Error types for the entity store, command playback and scheduling
//!
//! Store operations fail locally ([`EcsError::UnknownEntity`],
//! [`EcsError::MissingComponent`]) and never affect other entities.
//! [`EcsError::CapacityExceeded`] and [`EcsError::AccessConflict`] abort the
//! tick they occur in and are returned to the tick caller.

use crate::ecs::Entity;
use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, EcsError>;

/// Which configured limit was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityKind {
    /// Live entity slots
    Entities,
    /// Storage chunks across all archetypes
    Chunks,
}

impl fmt::Display for CapacityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityKind::Entities => f.write_str("entities"),
            CapacityKind::Chunks => f.write_str("chunks"),
        }
    }
}

/// Errors produced by store, command buffer and scheduler operations
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The handle is stale or was never issued
    #[error("unknown or stale entity {entity}")]
    UnknownEntity {
        /// Offending handle
        entity: Entity,
    },

    /// The entity exists but does not carry the requested component
    #[error("{entity} has no {component} component")]
    MissingComponent {
        /// Entity that was queried
        entity: Entity,
        /// Type name of the missing component
        component: &'static str,
    },

    /// A configured allocation limit was reached
    #[error("capacity exceeded: at most {limit} {resource}")]
    CapacityExceeded {
        /// Exhausted resource
        resource: CapacityKind,
        /// Configured limit
        limit: usize,
    },

    /// Two systems of one stage both declared write access to a component
    #[error("systems `{first}` and `{second}` both write {component} in the same stage")]
    AccessConflict {
        /// Type name of the contested component
        component: &'static str,
        /// System registered first
        first: String,
        /// System that caused the conflict
        second: String,
    },

    /// A command buffer entry could not be applied and was skipped
    #[error("command {origin}:{sequence} discarded: {source}")]
    PlaybackEntryFailure {
        /// Segment (worker) that recorded the entry
        origin: u32,
        /// Position of the entry within its segment
        sequence: u64,
        /// Underlying failure
        #[source]
        source: Box<EcsError>,
    },

    /// A singleton lookup did not find exactly one carrier
    #[error("expected exactly one {component} singleton, found {count}")]
    SingletonCount {
        /// Type name of the singleton component
        component: &'static str,
        /// Number of entities carrying it
        count: usize,
    },

    /// A command referenced an entity whose creation was never applied
    #[error("pending entity {origin}:{local} was never created")]
    UnresolvedPending {
        /// Segment that recorded the creation
        origin: u32,
        /// Creation index within the segment
        local: u32,
    },

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The worker pool could not be started
    #[cfg(feature = "parallel")]
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The scheduler was shut down and accepts no further ticks
    #[error("scheduler has been shut down")]
    SchedulerShutdown,
}

impl EcsError {
    /// Check whether this error must abort the current tick
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EcsError::CapacityExceeded { .. }
                | EcsError::AccessConflict { .. }
                | EcsError::SchedulerShutdown
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EcsError::MissingComponent {
            entity: Entity::new(3, 1),
            component: "Position",
        };
        assert_eq!(err.to_string(), "Entity(3, gen: 1) has no Position component");

        let err = EcsError::CapacityExceeded {
            resource: CapacityKind::Chunks,
            limit: 4,
        };
        assert_eq!(err.to_string(), "capacity exceeded: at most 4 chunks");
    }

    #[test]
    fn test_playback_failure_keeps_source() {
        use std::error::Error;

        let err = EcsError::PlaybackEntryFailure {
            origin: 2,
            sequence: 7,
            source: Box::new(EcsError::UnknownEntity {
                entity: Entity::new(1, 0),
            }),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("command 2:7 discarded"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EcsError::SchedulerShutdown.is_fatal());
        assert!(!EcsError::UnknownEntity {
            entity: Entity::new(0, 0)
        }
        .is_fatal());
    }
}

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
//! Entity Component System (ECS) core implementation
//!
//! This module provides the foundational ECS architecture including:
//! - Generation-checked entity handles
//! - Archetype storage split into fixed-capacity chunks
//! - Queries over archetype signatures
//! - Deferred structural changes through command buffers
//! - A staged scheduler with optional parallel execution via Rayon

mod archetype;
mod command;
mod component;
mod entity;
mod query;
mod system;
mod world;

/// Staged system scheduling
pub mod scheduler;

pub use archetype::{Archetype, Chunk};
pub use command::{
    Command, CommandBuffer, CommandEntry, CommandSegment, CommandTarget, ComponentValue,
    PendingEntity, PlaybackReport,
};
pub use component::{Component, ComponentType, Prefab, Signature};
pub use entity::{Entity, EntityAllocator, EntityId};
pub use query::{Query, QueryIter};
pub use scheduler::{stages, Scheduler, SchedulerState, StageId, SystemId, TickReport};
pub use system::{Access, AccessDecl, EntityMut, FnSystem, System, TickContext, TickTime};
pub use world::World;

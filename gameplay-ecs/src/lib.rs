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
//! # Gameplay ECS
//!
//! A chunked entity-component store with a staged, access-checked system
//! scheduler, built for gameplay code that runs alongside a physics step.
//!
//! ## Features
//!
//! - **Archetype storage**: entities with the same component set share
//!   fixed-capacity chunks of contiguous columns
//! - **Generation-checked handles**: stale entities are rejected, never aliased
//! - **Deferred commands**: structural changes recorded by systems are played
//!   back in a deterministic order at each stage barrier
//! - **Parallelization**: optional Rayon integration, one work item per group
//!   of chunks
//! - **Sample gameplay**: spawners, floaters, input movement and transform sync
//!
//! ## Example
//!
//! ```rust
//! use gameplay_ecs::ecs::World;
//! use gameplay_ecs::math::Float3;
//! use gameplay_ecs::samples::LocalTransform;
//!
//! let mut world = World::new();
//! let entity = world.create_entity().unwrap();
//! world
//!     .add_component(entity, LocalTransform::from_position(Float3::new(1.0, 0.0, 0.0)))
//!     .unwrap();
//! assert_eq!(world.get::<LocalTransform>(entity).unwrap().position.x, 1.0);
//! ```

#![warn(missing_docs)]

pub mod config;

/// Entity Component System implementation
pub mod ecs;

pub mod error;
pub mod math;
pub mod physics;
pub mod pool;
pub mod random;
pub mod samples;

pub use ecs::{Entity, World};
pub use error::{EcsError, Result};

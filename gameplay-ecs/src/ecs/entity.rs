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
//! Entity management
//!
//! Entities are generation-stamped slot indices. They carry no data of their
//! own; the [`EntityAllocator`] owns the slot table and records where each
//! live entity's row currently sits in archetype storage.

use crate::error::{CapacityKind, EcsError, Result};
use std::fmt;

/// Index of an entity slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u32);

impl EntityId {
    /// Create a new EntityId from a raw slot index
    pub fn new(id: u32) -> Self {
        EntityId(id)
    }

    /// Get the raw slot index
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Entity handle with generational index support for safe references
///
/// A handle stays valid only while its generation matches the generation
/// currently stored in its slot. Destroying the entity bumps the slot
/// generation, so every copy captured earlier becomes stale even after the
/// slot is handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    id: EntityId,
    generation: u32,
}

impl Entity {
    /// Create a new entity with the given slot index and generation
    pub fn new(id: u32, generation: u32) -> Self {
        Entity {
            id: EntityId::new(id),
            generation,
        }
    }

    /// Get the entity ID
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Get the generation number
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn index(&self) -> usize {
        self.id.0 as usize
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}, gen: {})", self.id.0, self.generation)
    }
}

/// Where a live entity's components are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntityLocation {
    pub archetype: usize,
    pub chunk: usize,
    pub row: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    location: Option<EntityLocation>,
}

/// Slot table handing out generation-stamped entity handles
///
/// Freed slots are reused LIFO. Allocation fails once `capacity` entities
/// are alive at the same time.
#[derive(Debug)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free: Vec<u32>,
    alive: usize,
    capacity: u32,
}

impl EntityAllocator {
    /// Create an allocator that allows up to `capacity` live entities
    pub fn new(capacity: u32) -> Self {
        EntityAllocator {
            slots: Vec::new(),
            free: Vec::new(),
            alive: 0,
            capacity,
        }
    }

    /// Allocate a fresh handle
    ///
    /// The entity is alive but unplaced until the store assigns a location.
    pub(crate) fn allocate(&mut self, location: EntityLocation) -> Result<Entity> {
        self.ensure_room()?;

        let entity = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.location = Some(location);
                Entity::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    location: Some(location),
                });
                Entity::new(index, 0)
            }
        };

        self.alive += 1;
        Ok(entity)
    }

    /// Fail with `CapacityExceeded` if no further entity may be allocated
    pub(crate) fn ensure_room(&self) -> Result<()> {
        if self.alive >= self.capacity as usize {
            return Err(EcsError::CapacityExceeded {
                resource: CapacityKind::Entities,
                limit: self.capacity as usize,
            });
        }
        Ok(())
    }

    /// Release a handle, invalidating every copy of it
    pub(crate) fn free(&mut self, entity: Entity) -> Result<EntityLocation> {
        let location = self.location(entity)?;
        let slot = &mut self.slots[entity.index()];
        slot.location = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(entity.id.0);
        self.alive -= 1;
        Ok(location)
    }

    /// Check if a handle refers to a live entity
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.location(entity).is_ok()
    }

    pub(crate) fn location(&self, entity: Entity) -> Result<EntityLocation> {
        self.slots
            .get(entity.index())
            .filter(|slot| slot.generation == entity.generation)
            .and_then(|slot| slot.location)
            .ok_or(EcsError::UnknownEntity { entity })
    }

    pub(crate) fn set_location(&mut self, entity: Entity, location: EntityLocation) {
        if let Some(slot) = self.slots.get_mut(entity.index()) {
            debug_assert_eq!(slot.generation, entity.generation);
            slot.location = Some(location);
        }
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.alive
    }

    /// Check if no entity is alive
    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Maximum number of simultaneously live entities
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Live entities in ascending slot order
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.location.is_some())
            .map(|(index, slot)| Entity::new(index as u32, slot.generation))
    }
}

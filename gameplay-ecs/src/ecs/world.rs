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
//! World management for the ECS
//!
//! The World is the container for all entities and their components. Every
//! entity lives in exactly one archetype row; adding or removing a component
//! relocates the row to the archetype of the new signature.

use std::any::TypeId;
use std::collections::HashMap;

use log::trace;

use crate::config::WorldConfig;
use crate::ecs::archetype::{clone_row, move_row, Archetype, Chunk};
use crate::ecs::component::{Component, ComponentType, Prefab, Signature};
use crate::ecs::entity::{EntityAllocator, EntityLocation};
use crate::ecs::query::{Query, QueryIter};
use crate::ecs::command::CommandSegment;
use crate::ecs::system::{EntityMut, System, TickContext};
use crate::ecs::Entity;
use crate::error::{CapacityKind, EcsError, Result};

/// The ECS world containing all entities and components
pub struct World {
    config: WorldConfig,
    entities: EntityAllocator,
    archetypes: Vec<Archetype>,
    archetype_index: HashMap<Signature, usize>,
    chunk_count: usize,
}

const EMPTY_ARCHETYPE: usize = 0;

fn missing<T: Component>(entity: Entity) -> EcsError {
    EcsError::MissingComponent {
        entity,
        component: ComponentType::of::<T>().name(),
    }
}

/// Two distinct elements of a slice
fn pair_mut<T>(slice: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut needs distinct indices");
    if a < b {
        let (left, right) = slice.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = slice.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

/// Two distinct chunks addressed by (archetype, chunk)
fn chunk_pair(
    archetypes: &mut [Archetype],
    a: (usize, usize),
    b: (usize, usize),
) -> (&mut Chunk, &mut Chunk) {
    if a.0 == b.0 {
        pair_mut(archetypes[a.0].chunks_mut(), a.1, b.1)
    } else {
        let (first, second) = pair_mut(archetypes, a.0, b.0);
        (&mut first.chunks_mut()[a.1], &mut second.chunks_mut()[b.1])
    }
}

impl World {
    /// Create a new empty world with default limits
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Create a new empty world with custom limits
    pub fn with_config(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        let empty = Signature::new();
        let mut archetype_index = HashMap::new();
        archetype_index.insert(empty.clone(), EMPTY_ARCHETYPE);
        World {
            entities: EntityAllocator::new(config.max_entities),
            archetypes: vec![Archetype::new(empty)],
            archetype_index,
            chunk_count: 0,
            config,
        }
    }

    /// The limits this world was built with
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Create a new entity with no components
    pub fn create_entity(&mut self) -> Result<Entity> {
        self.entities.ensure_room()?;
        let chunk = self.reserve_row(EMPTY_ARCHETYPE)?;
        let row = self.archetypes[EMPTY_ARCHETYPE].chunks()[chunk].len();
        let entity = self.entities.allocate(EntityLocation {
            archetype: EMPTY_ARCHETYPE,
            chunk,
            row,
        })?;
        self.archetypes[EMPTY_ARCHETYPE].chunks_mut()[chunk].push_entity(entity);
        trace!("created {}", entity);
        Ok(entity)
    }

    /// Destroy an entity and drop all of its components
    ///
    /// The handle and every copy of it become stale immediately.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<()> {
        let loc = self.entities.free(entity)?;
        let moved = self.archetypes[loc.archetype].chunks_mut()[loc.chunk].swap_remove(loc.row);
        if let Some(moved) = moved {
            self.entities.set_location(moved, loc);
        }
        trace!("destroyed {}", entity);
        Ok(())
    }

    /// Create a copy of `prefab` with every component except [`Prefab`]
    pub fn instantiate(&mut self, prefab: Entity) -> Result<Entity> {
        let src = self.entities.location(prefab)?;
        let signature = self.archetypes[src.archetype]
            .signature()
            .without(TypeId::of::<Prefab>());
        self.entities.ensure_room()?;
        let dst_archetype = self.archetype_for(signature);
        let dst_chunk = self.reserve_row(dst_archetype)?;
        let row = self.archetypes[dst_archetype].chunks()[dst_chunk].len();
        let entity = self.entities.allocate(EntityLocation {
            archetype: dst_archetype,
            chunk: dst_chunk,
            row,
        })?;

        if (src.archetype, src.chunk) == (dst_archetype, dst_chunk) {
            self.archetypes[dst_archetype].chunks_mut()[dst_chunk].duplicate_row(src.row, entity);
        } else {
            let (src_chunk, dst_chunk) = chunk_pair(
                &mut self.archetypes,
                (src.archetype, src.chunk),
                (dst_archetype, dst_chunk),
            );
            clone_row(src_chunk, src.row, dst_chunk, entity);
        }
        trace!("instantiated {} from {}", entity, prefab);
        Ok(entity)
    }

    /// Instantiate `prefab`, then reseed the copy's generators from `seed`
    ///
    /// See [`Component::reseed`].
    pub fn instantiate_seeded(&mut self, prefab: Entity, seed: u32) -> Result<Entity> {
        let entity = self.instantiate(prefab)?;
        let loc = self.entities.location(entity)?;
        self.archetypes[loc.archetype].chunks_mut()[loc.chunk].reseed_row(loc.row, seed);
        Ok(entity)
    }

    /// Attach a component, overwriting an existing value of the same type
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Result<()> {
        let loc = self.entities.location(entity)?;
        let ty = ComponentType::of::<T>();
        let signature = self.archetypes[loc.archetype].signature();
        if signature.contains(ty.id()) {
            if let Some(slot) = self.archetypes[loc.archetype].chunks_mut()[loc.chunk].get_mut::<T>(loc.row) {
                *slot = component;
            }
            return Ok(());
        }

        let signature = signature.with(ty);
        let dst_archetype = self.archetype_for(signature);
        let dst_chunk = self.relocate(entity, loc, dst_archetype)?;
        self.archetypes[dst_archetype].chunks_mut()[dst_chunk].push_value(component);
        Ok(())
    }

    /// Detach a component, returning its value if it was present
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<Option<T>> {
        let value = match self.get::<T>(entity) {
            Ok(value) => value.clone(),
            Err(EcsError::MissingComponent { .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        self.remove_component_by_id(entity, TypeId::of::<T>())?;
        Ok(Some(value))
    }

    /// Detach a component by type id
    ///
    /// Returns false if the entity did not carry the component.
    pub fn remove_component_by_id(&mut self, entity: Entity, id: TypeId) -> Result<bool> {
        let loc = self.entities.location(entity)?;
        let signature = self.archetypes[loc.archetype].signature();
        if !signature.contains(id) {
            return Ok(false);
        }
        let signature = signature.without(id);
        let dst_archetype = self.archetype_for(signature);
        self.relocate(entity, loc, dst_archetype)?;
        Ok(true)
    }

    /// Move an entity's row to another archetype
    ///
    /// Shared columns are moved, columns missing from the destination are
    /// dropped. Columns added by the destination must be pushed by the
    /// caller. Returns the destination chunk.
    fn relocate(&mut self, entity: Entity, loc: EntityLocation, dst_archetype: usize) -> Result<usize> {
        let dst_chunk = self.reserve_row(dst_archetype)?;
        let (src, dst) = chunk_pair(
            &mut self.archetypes,
            (loc.archetype, loc.chunk),
            (dst_archetype, dst_chunk),
        );
        let (row, moved) = move_row(src, loc.row, dst);
        if let Some(moved) = moved {
            self.entities.set_location(moved, loc);
        }
        self.entities.set_location(
            entity,
            EntityLocation {
                archetype: dst_archetype,
                chunk: dst_chunk,
                row,
            },
        );
        Ok(dst_chunk)
    }

    /// Read a component
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T> {
        let loc = self.entities.location(entity)?;
        self.archetypes[loc.archetype].chunks()[loc.chunk]
            .get::<T>(loc.row)
            .ok_or_else(|| missing::<T>(entity))
    }

    /// Mutably borrow a component
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        let loc = self.entities.location(entity)?;
        self.archetypes[loc.archetype].chunks_mut()[loc.chunk]
            .get_mut::<T>(loc.row)
            .ok_or_else(|| missing::<T>(entity))
    }

    /// Overwrite an existing component
    ///
    /// Unlike [`World::add_component`] this never changes the signature.
    pub fn set<T: Component>(&mut self, entity: Entity, component: T) -> Result<()> {
        *self.get_mut::<T>(entity)? = component;
        Ok(())
    }

    /// Check if a live entity carries component `T`
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.signature_of(entity)
            .map(|sig| sig.contains(TypeId::of::<T>()))
            .unwrap_or(false)
    }

    /// The component signature of an entity
    pub fn signature_of(&self, entity: Entity) -> Result<&Signature> {
        let loc = self.entities.location(entity)?;
        Ok(self.archetypes[loc.archetype].signature())
    }

    /// Chunks of every archetype matching `query`, skipping empty chunks
    pub fn query<'w, 'q>(&'w self, query: &'q Query) -> QueryIter<'w, 'q> {
        QueryIter::new(&self.archetypes, query)
    }

    /// Entities matching `query` in storage order
    pub fn query_entities(&self, query: &Query) -> Vec<Entity> {
        self.query(query)
            .flat_map(|chunk| chunk.entities().iter().copied())
            .collect()
    }

    /// The single entity carrying `T`
    pub fn singleton_entity<T: Component>(&self) -> Result<Entity> {
        let found = self.query_entities(&Query::new().with::<T>());
        match found.as_slice() {
            [entity] => Ok(*entity),
            _ => Err(EcsError::SingletonCount {
                component: ComponentType::of::<T>().name(),
                count: found.len(),
            }),
        }
    }

    /// Read the single instance of `T`
    pub fn singleton<T: Component>(&self) -> Result<&T> {
        let entity = self.singleton_entity::<T>()?;
        self.get::<T>(entity)
    }

    /// Mutably borrow the single instance of `T`
    pub fn singleton_mut<T: Component>(&mut self) -> Result<&mut T> {
        let entity = self.singleton_entity::<T>()?;
        self.get_mut::<T>(entity)
    }

    /// Store `value` as the single instance of `T`
    ///
    /// Overwrites the existing instance or creates a carrier entity.
    pub fn insert_singleton<T: Component>(&mut self, value: T) -> Result<Entity> {
        match self.singleton_entity::<T>() {
            Ok(entity) => {
                self.set(entity, value)?;
                Ok(entity)
            }
            Err(EcsError::SingletonCount { count: 0, .. }) => {
                let entity = self.create_entity()?;
                self.add_component(entity, value)?;
                Ok(entity)
            }
            Err(err) => Err(err),
        }
    }

    /// Run a system's per-entity update on one entity outside the scheduler
    ///
    /// Fails with `MissingComponent` if the entity lacks a type the system's
    /// query requires.
    pub fn update_entity(
        &mut self,
        entity: Entity,
        system: &dyn System,
        commands: &mut CommandSegment,
        ctx: &TickContext<'_>,
    ) -> Result<()> {
        let loc = self.entities.location(entity)?;
        let query = system.query();
        let signature = self.archetypes[loc.archetype].signature();
        if let Some(ty) = query.required().iter().find(|ty| !signature.contains(ty.id())) {
            return Err(EcsError::MissingComponent {
                entity,
                component: ty.name(),
            });
        }
        let access = system.access();
        let chunk = &mut self.archetypes[loc.archetype].chunks_mut()[loc.chunk];
        let mut view = EntityMut::new(entity, loc.row, chunk, &access);
        system.update(&mut view, commands, ctx)
    }

    /// Check if an entity is alive
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Get the number of alive entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// All live entities in ascending id order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter()
    }

    /// Every archetype, including ones that are currently empty
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    pub(crate) fn archetypes_mut(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    /// Number of archetypes created so far
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Number of chunks allocated across all archetypes
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    fn archetype_for(&mut self, signature: Signature) -> usize {
        if let Some(&index) = self.archetype_index.get(&signature) {
            return index;
        }
        let index = self.archetypes.len();
        trace!("new archetype {} {:?}", index, signature);
        self.archetypes.push(Archetype::new(signature.clone()));
        self.archetype_index.insert(signature, index);
        index
    }

    /// Index of a chunk with room for one more row, allocating if needed
    fn reserve_row(&mut self, archetype: usize) -> Result<usize> {
        if let Some(chunk) = self.archetypes[archetype].chunk_with_space() {
            return Ok(chunk);
        }
        if self.chunk_count >= self.config.max_chunks {
            return Err(EcsError::CapacityExceeded {
                resource: CapacityKind::Chunks,
                limit: self.config.max_chunks,
            });
        }
        self.chunk_count += 1;
        Ok(self.archetypes[archetype].push_chunk(self.config.chunk_capacity))
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        for archetype in &self.archetypes {
            for chunk in archetype.chunks() {
                assert!(chunk.is_consistent());
                for (row, &entity) in chunk.entities().iter().enumerate() {
                    let loc = self.entities.location(entity).unwrap();
                    assert_eq!(loc.row, row);
                }
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

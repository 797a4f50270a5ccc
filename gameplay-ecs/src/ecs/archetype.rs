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
//! Archetype and chunk storage
//!
//! An archetype groups every entity with the same component signature. Its
//! rows are split across fixed-capacity chunks; each chunk keeps one dense
//! column per component type plus the entity handle of every row. All
//! columns of a chunk always have the same length.

use std::any::TypeId;

use crate::ecs::component::{typed_mut, Column, Component, Signature, TypedColumn};
use crate::ecs::Entity;

/// A fixed-capacity block of rows sharing one signature
pub struct Chunk {
    entities: Vec<Entity>,
    // Sorted by TypeId, same order as the owning signature
    columns: Vec<Box<dyn Column>>,
    capacity: usize,
}

impl Chunk {
    pub(crate) fn new(signature: &Signature, capacity: usize) -> Self {
        Chunk {
            entities: Vec::with_capacity(capacity),
            columns: signature.iter().map(|ty| ty.new_column(capacity)).collect(),
            capacity,
        }
    }

    /// Number of occupied rows
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the chunk has no rows
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Check if no more rows fit
    pub fn is_full(&self) -> bool {
        self.entities.len() >= self.capacity
    }

    /// Maximum number of rows
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entity handles, one per row
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Check if the chunk stores component `T`
    pub fn has<T: Component>(&self) -> bool {
        self.column_index(TypeId::of::<T>()).is_some()
    }

    /// Read-only view of the `T` column
    pub fn column<T: Component>(&self) -> Option<&[T]> {
        let index = self.column_index(TypeId::of::<T>())?;
        self.columns[index]
            .as_any()
            .downcast_ref::<TypedColumn<T>>()
            .map(TypedColumn::as_slice)
    }

    /// Mutable view of the `T` column
    pub fn column_mut<T: Component>(&mut self) -> Option<&mut [T]> {
        let index = self.column_index(TypeId::of::<T>())?;
        self.columns[index]
            .as_any_mut()
            .downcast_mut::<TypedColumn<T>>()
            .map(TypedColumn::as_mut_slice)
    }

    pub(crate) fn get<T: Component>(&self, row: usize) -> Option<&T> {
        self.column::<T>()?.get(row)
    }

    pub(crate) fn get_mut<T: Component>(&mut self, row: usize) -> Option<&mut T> {
        self.column_mut::<T>()?.get_mut(row)
    }

    pub(crate) fn column_index(&self, id: TypeId) -> Option<usize> {
        self.columns
            .binary_search_by(|column| column.component_type().id().cmp(&id))
            .ok()
    }

    /// Append a value to the `T` column of the last pushed row
    pub(crate) fn push_value<T: Component>(&mut self, value: T) {
        if let Some(index) = self.column_index(TypeId::of::<T>()) {
            typed_mut::<T>(self.columns[index].as_mut()).push(value);
        }
    }

    /// Drop the row, returning the entity that was swapped into it
    pub(crate) fn swap_remove(&mut self, row: usize) -> Option<Entity> {
        for column in &mut self.columns {
            column.swap_remove_drop(row);
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Append a copy of `row` for `entity` within this chunk
    pub(crate) fn duplicate_row(&mut self, row: usize, entity: Entity) -> usize {
        for column in &mut self.columns {
            column.duplicate_row(row);
        }
        self.entities.push(entity);
        self.entities.len() - 1
    }

    pub(crate) fn reseed_row(&mut self, row: usize, seed: u32) {
        for column in &mut self.columns {
            column.reseed_row(row, seed);
        }
    }

    /// Append a row that only carries an entity handle
    ///
    /// Callers must push one value per column afterwards.
    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.columns
            .iter()
            .all(|column| column.len() == self.entities.len())
    }
}

/// Move `row` of `src` to the end of `dst`
///
/// Columns that `dst` lacks are dropped. Returns the new row in `dst` and the
/// entity that was swapped into `row` in `src`, if any.
pub(crate) fn move_row(src: &mut Chunk, row: usize, dst: &mut Chunk) -> (usize, Option<Entity>) {
    for column in &mut src.columns {
        let id = column.component_type().id();
        match dst.column_index(id) {
            Some(index) => column.swap_remove_into(row, dst.columns[index].as_mut()),
            None => column.swap_remove_drop(row),
        }
    }
    let entity = src.entities.swap_remove(row);
    dst.entities.push(entity);
    (dst.entities.len() - 1, src.entities.get(row).copied())
}

/// Clone `row` of `src` onto the end of `dst` for `entity`
///
/// Columns that `dst` lacks are skipped.
pub(crate) fn clone_row(src: &Chunk, row: usize, dst: &mut Chunk, entity: Entity) -> usize {
    for column in &src.columns {
        if let Some(index) = dst.column_index(column.component_type().id()) {
            column.clone_row_into(row, dst.columns[index].as_mut());
        }
    }
    dst.entities.push(entity);
    dst.entities.len() - 1
}

/// All entities sharing one component signature
pub struct Archetype {
    signature: Signature,
    chunks: Vec<Chunk>,
}

impl Archetype {
    pub(crate) fn new(signature: Signature) -> Self {
        Archetype {
            signature,
            chunks: Vec::new(),
        }
    }

    /// The component types stored by this archetype
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Chunks in allocation order, possibly including empty ones
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub(crate) fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    /// Number of entities across all chunks
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    /// Check if no entity has this signature
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Chunk::is_empty)
    }

    /// Index of the first chunk with a free row
    pub(crate) fn chunk_with_space(&self) -> Option<usize> {
        self.chunks.iter().position(|chunk| !chunk.is_full())
    }

    pub(crate) fn push_chunk(&mut self, capacity: usize) -> usize {
        self.chunks.push(Chunk::new(&self.signature, capacity));
        self.chunks.len() - 1
    }
}

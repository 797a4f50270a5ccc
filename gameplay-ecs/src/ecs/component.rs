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
//! Component types, type-erased columns and archetype signatures
//!
//! Components are plain data attached to entities. Each archetype stores one
//! dense column per component type; the column hides its element type behind
//! the [`Column`] trait so rows can be moved between archetypes without the
//! store knowing the concrete types involved.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Trait that all components must implement
///
/// Components should be plain data structures without behavior. They may
/// refer to other entities only through [`Entity`](crate::ecs::Entity)
/// handles. `Clone` is required so prefabs can be instantiated.
pub trait Component: Clone + Send + Sync + 'static {
    /// Give a freshly instantiated copy its own random stream
    ///
    /// Called by [`World::instantiate_seeded`](crate::ecs::World::instantiate_seeded)
    /// on every component of the new entity. Components carrying a
    /// generator replace it with one seeded from `seed`.
    fn reseed(&mut self, _seed: u32) {}
}

/// Marker for template entities
///
/// [`World::instantiate`](crate::ecs::World::instantiate) copies every
/// component of a prefab except this marker, so queries can exclude
/// templates with `.without::<Prefab>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prefab;

impl Component for Prefab {}

/// Runtime descriptor of a component type
///
/// Equality, ordering and hashing only consider the underlying `TypeId`.
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
    new_column: fn(usize) -> Box<dyn Column>,
}

impl ComponentType {
    /// Descriptor for `T`
    pub fn of<T: Component>() -> Self {
        ComponentType {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
            new_column: new_column::<T>,
        }
    }

    /// The `TypeId` of the component
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Short type name for diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn new_column(&self, capacity: usize) -> Box<dyn Column> {
        (self.new_column)(capacity)
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    if full.contains('<') {
        full
    } else {
        full.rsplit("::").next().unwrap_or(full)
    }
}

fn new_column<T: Component>(capacity: usize) -> Box<dyn Column> {
    Box::new(TypedColumn::<T>::with_capacity(capacity))
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl PartialOrd for ComponentType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComponentType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for ComponentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A sorted, duplicate-free set of component types
///
/// Identifies an archetype and doubles as the required/excluded sets of a
/// query and the read/write sets of an access declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    types: Vec<ComponentType>,
}

impl Signature {
    /// The empty signature
    pub fn new() -> Self {
        Signature { types: Vec::new() }
    }

    /// Build a signature from any collection of types
    pub fn from_types(types: impl IntoIterator<Item = ComponentType>) -> Self {
        let mut types: Vec<ComponentType> = types.into_iter().collect();
        types.sort();
        types.dedup();
        Signature { types }
    }

    /// Add a type, returning false if it was already present
    pub fn insert(&mut self, ty: ComponentType) -> bool {
        match self.types.binary_search(&ty) {
            Ok(_) => false,
            Err(pos) => {
                self.types.insert(pos, ty);
                true
            }
        }
    }

    /// Remove a type, returning false if it was absent
    pub fn remove(&mut self, id: TypeId) -> bool {
        match self.index_of(id) {
            Some(pos) => {
                self.types.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Copy of this signature with `ty` added
    pub fn with(&self, ty: ComponentType) -> Signature {
        let mut sig = self.clone();
        sig.insert(ty);
        sig
    }

    /// Copy of this signature with the type `id` removed
    pub fn without(&self, id: TypeId) -> Signature {
        let mut sig = self.clone();
        sig.remove(id);
        sig
    }

    /// Position of a type within the sorted set
    pub fn index_of(&self, id: TypeId) -> Option<usize> {
        self.types.binary_search_by(|probe| probe.id.cmp(&id)).ok()
    }

    /// Check if the type is present
    pub fn contains(&self, id: TypeId) -> bool {
        self.index_of(id).is_some()
    }

    /// Check if every type of `other` is present
    pub fn is_superset_of(&self, other: &Signature) -> bool {
        other.types.iter().all(|ty| self.contains(ty.id))
    }

    /// Check if no type of `other` is present
    pub fn is_disjoint(&self, other: &Signature) -> bool {
        other.types.iter().all(|ty| !self.contains(ty.id))
    }

    /// Iterate over the types in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &ComponentType> {
        self.types.iter()
    }

    /// Number of types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the signature has no types
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<ComponentType> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentType>>(iter: I) -> Self {
        Signature::from_types(iter)
    }
}

/// Type-erased dense storage for one component type
pub(crate) trait Column: Send + Sync {
    fn component_type(&self) -> ComponentType;

    #[cfg(test)]
    fn len(&self) -> usize;

    /// Remove `row` by swapping the last element into it, dropping the value
    fn swap_remove_drop(&mut self, row: usize);

    /// Remove `row` by swapping, appending the value to `dst`
    fn swap_remove_into(&mut self, row: usize, dst: &mut dyn Column);

    /// Append a clone of `row` to `dst`
    fn clone_row_into(&self, row: usize, dst: &mut dyn Column);

    /// Append a clone of `row` to this column
    fn duplicate_row(&mut self, row: usize);

    fn reseed_row(&mut self, row: usize, seed: u32);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct TypedColumn<T> {
    data: Vec<T>,
}

impl<T: Component> TypedColumn<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        TypedColumn {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn push(&mut self, value: T) {
        self.data.push(value);
    }
}

/// Downcast a column known to store `T`
///
/// # Panics
///
/// Panics if the column stores another type. Columns are only paired by
/// matching `TypeId`, so this indicates a bug in the store itself.
pub(crate) fn typed_mut<T: Component>(column: &mut dyn Column) -> &mut TypedColumn<T> {
    match column.as_any_mut().downcast_mut::<TypedColumn<T>>() {
        Some(typed) => typed,
        None => panic!(
            "column type mismatch: expected {}",
            std::any::type_name::<T>()
        ),
    }
}

impl<T: Component> Column for TypedColumn<T> {
    fn component_type(&self) -> ComponentType {
        ComponentType::of::<T>()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.data.len()
    }

    fn swap_remove_drop(&mut self, row: usize) {
        self.data.swap_remove(row);
    }

    fn swap_remove_into(&mut self, row: usize, dst: &mut dyn Column) {
        let value = self.data.swap_remove(row);
        typed_mut::<T>(dst).push(value);
    }

    fn clone_row_into(&self, row: usize, dst: &mut dyn Column) {
        typed_mut::<T>(dst).push(self.data[row].clone());
    }

    fn duplicate_row(&mut self, row: usize) {
        let value = self.data[row].clone();
        self.data.push(value);
    }

    fn reseed_row(&mut self, row: usize, seed: u32) {
        if let Some(value) = self.data.get_mut(row) {
            value.reseed(seed);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

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
//! Archetype queries
//!
//! A query selects archetypes by required and excluded component types and
//! yields their non-empty chunks. Chunks are disjoint, so every matching
//! entity appears in exactly one yielded chunk.

use std::slice;

use crate::ecs::archetype::{Archetype, Chunk};
use crate::ecs::component::{Component, ComponentType, Signature};

/// Required and excluded component types
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    required: Signature,
    excluded: Signature,
}

impl Query {
    /// A query matching every archetype
    pub fn new() -> Self {
        Query::default()
    }

    /// Require component `T`
    pub fn with<T: Component>(mut self) -> Self {
        self.required.insert(ComponentType::of::<T>());
        self
    }

    /// Exclude archetypes carrying component `T`
    pub fn without<T: Component>(mut self) -> Self {
        self.excluded.insert(ComponentType::of::<T>());
        self
    }

    /// Required component types
    pub fn required(&self) -> &Signature {
        &self.required
    }

    /// Excluded component types
    pub fn excluded(&self) -> &Signature {
        &self.excluded
    }

    /// Check if an archetype signature satisfies this query
    pub fn matches(&self, signature: &Signature) -> bool {
        signature.is_superset_of(&self.required) && signature.is_disjoint(&self.excluded)
    }
}

/// Iterator over the non-empty chunks matched by a [`Query`]
pub struct QueryIter<'w, 'q> {
    query: &'q Query,
    archetypes: slice::Iter<'w, Archetype>,
    chunks: slice::Iter<'w, Chunk>,
}

impl<'w, 'q> QueryIter<'w, 'q> {
    pub(crate) fn new(archetypes: &'w [Archetype], query: &'q Query) -> Self {
        QueryIter {
            query,
            archetypes: archetypes.iter(),
            chunks: (&[]).iter(),
        }
    }
}

impl<'w, 'q> Iterator for QueryIter<'w, 'q> {
    type Item = &'w Chunk;

    fn next(&mut self) -> Option<&'w Chunk> {
        let query = self.query;
        loop {
            if let Some(chunk) = self.chunks.find(|chunk| !chunk.is_empty()) {
                return Some(chunk);
            }
            let archetype = self
                .archetypes
                .find(|archetype| query.matches(archetype.signature()))?;
            self.chunks = archetype.chunks().iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Entity, World};

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct A(u32);
    impl Component for A {}

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct B;
    impl Component for B {}

    #[test]
    fn test_query_matching() {
        let a = Signature::from_types([ComponentType::of::<A>()]);
        let ab = a.with(ComponentType::of::<B>());

        let only_a = Query::new().with::<A>().without::<B>();
        assert!(only_a.matches(&a));
        assert!(!only_a.matches(&ab));
        assert!(Query::new().matches(&Signature::new()));
    }

    #[test]
    fn test_query_yields_each_entity_once() {
        let mut world = World::with_config(crate::config::WorldConfig::new(1000).with_chunk_capacity(8)).unwrap();
        let mut expected: Vec<Entity> = Vec::new();
        for i in 0..50 {
            let e = world.create_entity().unwrap();
            world.add_component(e, A(i)).unwrap();
            if i % 3 == 0 {
                world.add_component(e, B).unwrap();
            }
            expected.push(e);
        }

        let mut seen = world.query_entities(&Query::new().with::<A>());
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);

        let without_b = world.query_entities(&Query::new().with::<A>().without::<B>());
        assert_eq!(without_b.len(), 50 - 17);
        assert!(world.query(&Query::new().with::<A>()).all(|chunk| !chunk.is_empty()));
    }
}

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
//! System execution framework
//!
//! Systems contain the logic that operates on entities and components. A
//! system declares which archetypes it visits ([`Query`]) and which
//! components it touches ([`AccessDecl`]); the scheduler then calls
//! [`System::update`] once per matching entity, possibly on many worker
//! threads at once. Structural changes go through the [`CommandSegment`].

use std::any::TypeId;

use crate::ecs::archetype::Chunk;
use crate::ecs::command::CommandSegment;
use crate::ecs::component::{Component, ComponentType, Signature};
use crate::ecs::query::Query;
use crate::ecs::{Entity, World};
use crate::error::{EcsError, Result};
use crate::physics::PhysicsBackend;

/// Kind of access a system holds on a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Shared read
    Read,
    /// Exclusive write, implies read
    Write,
}

/// Read and write sets of a system
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessDecl {
    reads: Signature,
    writes: Signature,
}

impl AccessDecl {
    /// No access
    pub fn new() -> Self {
        AccessDecl::default()
    }

    /// Declare read access to `T`
    pub fn read<T: Component>(mut self) -> Self {
        self.reads.insert(ComponentType::of::<T>());
        self
    }

    /// Declare write access to `T`
    pub fn write<T: Component>(mut self) -> Self {
        self.writes.insert(ComponentType::of::<T>());
        self
    }

    /// Components declared for reading only
    pub fn reads(&self) -> &Signature {
        &self.reads
    }

    /// Components declared for writing
    pub fn writes(&self) -> &Signature {
        &self.writes
    }

    /// Strongest access declared for a component
    pub fn access_to(&self, id: TypeId) -> Option<Access> {
        if self.writes.contains(id) {
            Some(Access::Write)
        } else if self.reads.contains(id) {
            Some(Access::Read)
        } else {
            None
        }
    }

    /// First component both declarations write
    pub fn write_conflict(&self, other: &AccessDecl) -> Option<ComponentType> {
        self.writes
            .iter()
            .find(|ty| other.writes.contains(ty.id()))
            .copied()
    }
}

/// Time information for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickTime {
    /// Seconds since the simulation started
    pub elapsed: f64,
    /// Seconds since the previous tick
    pub delta: f32,
}

impl TickTime {
    /// Create a tick time
    pub fn new(elapsed: f64, delta: f32) -> Self {
        TickTime { elapsed, delta }
    }
}

/// Read-only data shared by every update of one tick
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    /// Current time
    pub time: TickTime,
    /// Tick counter, starting at 1
    pub tick: u64,
    /// Physics capabilities
    pub physics: &'a dyn PhysicsBackend,
}

impl<'a> TickContext<'a> {
    /// Create a context for one tick
    pub fn new(time: TickTime, tick: u64, physics: &'a dyn PhysicsBackend) -> Self {
        TickContext {
            time,
            tick,
            physics,
        }
    }
}

/// Component access to a single entity during an update
///
/// # Panics
///
/// Accessing a component that the running system did not declare panics.
pub struct EntityMut<'a> {
    entity: Entity,
    row: usize,
    chunk: &'a mut Chunk,
    access: &'a AccessDecl,
}

impl<'a> EntityMut<'a> {
    pub(crate) fn new(entity: Entity, row: usize, chunk: &'a mut Chunk, access: &'a AccessDecl) -> Self {
        EntityMut {
            entity,
            row,
            chunk,
            access,
        }
    }

    /// The entity being updated
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Check if the entity carries `T`
    pub fn has<T: Component>(&self) -> bool {
        self.chunk.has::<T>()
    }

    /// Read a component
    pub fn get<T: Component>(&self) -> Result<&T> {
        assert!(
            self.access.access_to(TypeId::of::<T>()).is_some(),
            "undeclared read of {}",
            ComponentType::of::<T>().name()
        );
        self.chunk.get::<T>(self.row).ok_or_else(|| self.missing::<T>())
    }

    /// Mutably borrow a component
    pub fn get_mut<T: Component>(&mut self) -> Result<&mut T> {
        assert!(
            self.access.access_to(TypeId::of::<T>()) == Some(Access::Write),
            "undeclared write of {}",
            ComponentType::of::<T>().name()
        );
        let missing = self.missing::<T>();
        self.chunk.get_mut::<T>(self.row).ok_or(missing)
    }

    /// Overwrite a component
    pub fn set<T: Component>(&mut self, value: T) -> Result<()> {
        *self.get_mut::<T>()? = value;
        Ok(())
    }

    fn missing<T: Component>(&self) -> EcsError {
        EcsError::MissingComponent {
            entity: self.entity,
            component: ComponentType::of::<T>().name(),
        }
    }
}

/// Trait for systems that operate on matching entities
///
/// `update` receives `&self` so that one system instance can run on many
/// threads at once; per-tick state is refreshed in `prepare`, which runs on
/// the scheduling thread before the stage starts.
pub trait System: Send + Sync {
    /// Get the name of this system for debugging
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Archetypes this system visits
    fn query(&self) -> Query;

    /// Components this system reads and writes
    fn access(&self) -> AccessDecl;

    /// Refresh per-tick state from the world
    ///
    /// Returning `Ok(false)` skips the system for this tick.
    fn prepare(&mut self, _world: &World, _time: &TickTime) -> Result<bool> {
        Ok(true)
    }

    /// Update one entity
    fn update(
        &self,
        entity: &mut EntityMut<'_>,
        commands: &mut CommandSegment,
        ctx: &TickContext<'_>,
    ) -> Result<()>;
}

/// A system built from a plain function or closure
pub struct FnSystem<F> {
    name: String,
    query: Query,
    access: AccessDecl,
    update: F,
}

impl<F> FnSystem<F>
where
    F: Fn(&mut EntityMut<'_>, &mut CommandSegment, &TickContext<'_>) -> Result<()> + Send + Sync,
{
    /// Wrap an update function
    pub fn new(name: impl Into<String>, query: Query, access: AccessDecl, update: F) -> Self {
        FnSystem {
            name: name.into(),
            query,
            access,
            update,
        }
    }
}

impl<F> System for FnSystem<F>
where
    F: Fn(&mut EntityMut<'_>, &mut CommandSegment, &TickContext<'_>) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self) -> Query {
        self.query.clone()
    }

    fn access(&self) -> AccessDecl {
        self.access.clone()
    }

    fn update(
        &self,
        entity: &mut EntityMut<'_>,
        commands: &mut CommandSegment,
        ctx: &TickContext<'_>,
    ) -> Result<()> {
        (self.update)(entity, commands, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::NoObstacles;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Counter(u32);
    impl Component for Counter {}

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Step(u32);
    impl Component for Step {}

    fn count(entity: &mut EntityMut<'_>, _: &mut CommandSegment, _: &TickContext<'_>) -> Result<()> {
        let step = entity.get::<Step>()?.0;
        entity.get_mut::<Counter>()?.0 += step;
        Ok(())
    }

    fn counting_system() -> impl System {
        FnSystem::new(
            "count",
            Query::new().with::<Counter>().with::<Step>(),
            AccessDecl::new().write::<Counter>().read::<Step>(),
            count,
        )
    }

    #[test]
    fn test_access_conflicts() {
        let a = AccessDecl::new().write::<Counter>().read::<Step>();
        let b = AccessDecl::new().read::<Counter>();
        let c = AccessDecl::new().write::<Counter>();

        assert!(a.write_conflict(&b).is_none());
        assert_eq!(a.write_conflict(&c).map(|ty| ty.name()), Some("Counter"));
        assert_eq!(a.access_to(TypeId::of::<Counter>()), Some(Access::Write));
        assert_eq!(a.access_to(TypeId::of::<Step>()), Some(Access::Read));
        assert_eq!(b.access_to(TypeId::of::<Step>()), None);
    }

    #[test]
    fn test_update_entity_outside_scheduler() {
        let mut world = World::new();
        let e = world.create_entity().unwrap();
        world.add_component(e, Counter(1)).unwrap();
        world.add_component(e, Step(2)).unwrap();

        let system = counting_system();
        let physics = NoObstacles;
        let ctx = TickContext::new(TickTime::new(0.0, 0.016), 1, &physics);
        let mut commands = CommandSegment::new(0);
        world.update_entity(e, &system, &mut commands, &ctx).unwrap();

        assert_eq!(world.get::<Counter>(e).unwrap(), &Counter(3));
        assert_eq!(system.name(), "count");
    }

    #[test]
    fn test_update_entity_requires_query_components() {
        let mut world = World::new();
        let e = world.create_entity().unwrap();
        world.add_component(e, Counter(1)).unwrap();

        let physics = NoObstacles;
        let ctx = TickContext::new(TickTime::default(), 1, &physics);
        let result = world.update_entity(e, &counting_system(), &mut CommandSegment::new(0), &ctx);
        assert!(matches!(result, Err(EcsError::MissingComponent { component: "Step", .. })));
    }

    #[test]
    #[should_panic(expected = "undeclared write")]
    fn test_undeclared_write_panics() {
        let mut world = World::new();
        let e = world.create_entity().unwrap();
        world.add_component(e, Counter(1)).unwrap();

        let system = FnSystem::new(
            "sneaky",
            Query::new().with::<Counter>(),
            AccessDecl::new().read::<Counter>(),
            |entity: &mut EntityMut<'_>, _: &mut CommandSegment, _: &TickContext<'_>| {
                entity.set(Counter(0))
            },
        );
        let physics = NoObstacles;
        let ctx = TickContext::new(TickTime::default(), 1, &physics);
        let _ = world.update_entity(e, &system, &mut CommandSegment::new(0), &ctx);
    }
}

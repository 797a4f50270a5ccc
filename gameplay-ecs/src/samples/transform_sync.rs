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
//! Mirroring entity transforms onto objects outside the store
//!
//! External objects (render proxies, audio emitters, UI anchors) register a
//! [`SyncTarget`] in a shared [`SyncTargets`] registry. Two systems feed them:
//!
//! - [`TransformSyncSystem`] copies the transform of every entity tagged with
//!   [`TransformSyncSource`] to all targets registered under the same id.
//! - [`SpawnSyncedSystem`] creates one target per [`SyncedInstance`] entity
//!   on its first update and keeps it in sync afterwards.
//!
//! Updates run on worker threads, so targets are shared through `Arc` and
//! guarded by a `Mutex`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use log::debug;

use crate::ecs::{
    AccessDecl, CommandSegment, Component, EntityMut, Prefab, Query, System, TickContext,
};
use crate::error::Result;
use crate::math::{Float3, Quaternion};
use crate::samples::components::{LocalTransform, TransformSyncSource};

/// Transform state held by an external object
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SyncedTransform {
    /// World position
    pub position: Float3,
    /// World rotation
    pub rotation: Quaternion,
}

/// An external object receiving transform updates
#[derive(Debug)]
pub struct SyncTarget {
    id: String,
    position: bool,
    rotation: bool,
    transform: Mutex<SyncedTransform>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncTarget {
    /// Id of the source this target follows
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latest synced transform
    pub fn transform(&self) -> SyncedTransform {
        *lock(&self.transform)
    }

    /// Copy the enabled parts of `source`
    pub fn apply(&self, source: &LocalTransform) {
        let mut transform = lock(&self.transform);
        if self.position {
            transform.position = source.position;
        }
        if self.rotation {
            transform.rotation = source.rotation;
        }
    }
}

/// Registry of live sync targets
#[derive(Debug, Default)]
pub struct SyncTargets {
    targets: RwLock<Vec<Arc<SyncTarget>>>,
}

impl SyncTargets {
    /// An empty registry
    pub fn new() -> Self {
        SyncTargets::default()
    }

    /// Register a target following source `id`
    pub fn register(&self, id: impl Into<String>, position: bool, rotation: bool) -> Arc<SyncTarget> {
        let target = Arc::new(SyncTarget {
            id: id.into(),
            position,
            rotation,
            transform: Mutex::new(SyncedTransform::default()),
        });
        self.targets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&target));
        target
    }

    /// Stop updating a target, returning false if it was not registered
    pub fn unregister(&self, target: &Arc<SyncTarget>) -> bool {
        let mut targets = self.targets.write().unwrap_or_else(PoisonError::into_inner);
        let before = targets.len();
        targets.retain(|t| !Arc::ptr_eq(t, target));
        targets.len() != before
    }

    /// Number of registered targets
    pub fn len(&self) -> usize {
        self.targets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if no target is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `source` to every target registered under `id`
    ///
    /// Returns the number of targets updated.
    pub fn sync(&self, id: &str, source: &LocalTransform) -> usize {
        let targets = self.targets.read().unwrap_or_else(PoisonError::into_inner);
        let mut updated = 0;
        for target in targets.iter().filter(|t| t.id == id) {
            target.apply(source);
            updated += 1;
        }
        updated
    }
}

/// Copies source transforms to registered targets
#[derive(Debug)]
pub struct TransformSyncSystem {
    targets: Arc<SyncTargets>,
}

impl TransformSyncSystem {
    /// Create a system feeding `targets`
    pub fn new(targets: Arc<SyncTargets>) -> Self {
        TransformSyncSystem { targets }
    }
}

impl System for TransformSyncSystem {
    fn name(&self) -> &str {
        "TransformSyncSystem"
    }

    fn query(&self) -> Query {
        Query::new()
            .with::<TransformSyncSource>()
            .with::<LocalTransform>()
            .without::<Prefab>()
    }

    fn access(&self) -> AccessDecl {
        AccessDecl::new()
            .read::<TransformSyncSource>()
            .read::<LocalTransform>()
    }

    fn update(
        &self,
        entity: &mut EntityMut<'_>,
        _commands: &mut CommandSegment,
        _ctx: &TickContext<'_>,
    ) -> Result<()> {
        let source = entity.get::<TransformSyncSource>()?;
        let transform = entity.get::<LocalTransform>()?;
        self.targets.sync(&source.id, transform);
        Ok(())
    }
}

/// Requests an external object that follows this entity
#[derive(Debug, Clone)]
pub struct SyncedInstance {
    /// Id the created target registers under
    pub id: String,
    /// Copy position
    pub position: bool,
    /// Copy rotation
    pub rotation: bool,
    /// Target created on first sync
    pub instance: Option<Arc<SyncTarget>>,
}

impl SyncedInstance {
    /// Request a target that follows both position and rotation
    pub fn new(id: impl Into<String>) -> Self {
        SyncedInstance {
            id: id.into(),
            position: true,
            rotation: true,
            instance: None,
        }
    }
}

impl Component for SyncedInstance {}

/// Creates and feeds one target per [`SyncedInstance`]
#[derive(Debug)]
pub struct SpawnSyncedSystem {
    targets: Arc<SyncTargets>,
}

impl SpawnSyncedSystem {
    /// Create a system registering into `targets`
    pub fn new(targets: Arc<SyncTargets>) -> Self {
        SpawnSyncedSystem { targets }
    }
}

impl System for SpawnSyncedSystem {
    fn name(&self) -> &str {
        "SpawnSyncedSystem"
    }

    fn query(&self) -> Query {
        Query::new()
            .with::<SyncedInstance>()
            .with::<LocalTransform>()
            .without::<Prefab>()
    }

    fn access(&self) -> AccessDecl {
        AccessDecl::new()
            .write::<SyncedInstance>()
            .read::<LocalTransform>()
    }

    fn update(
        &self,
        entity: &mut EntityMut<'_>,
        _commands: &mut CommandSegment,
        _ctx: &TickContext<'_>,
    ) -> Result<()> {
        let transform = *entity.get::<LocalTransform>()?;
        let owner = entity.entity();
        let synced = entity.get_mut::<SyncedInstance>()?;
        let target = match &synced.instance {
            Some(target) => Arc::clone(target),
            None => {
                let target = self.targets.register(synced.id.clone(), synced.position, synced.rotation);
                debug!("spawned sync target `{}` for {}", synced.id, owner);
                synced.instance = Some(Arc::clone(&target));
                target
            }
        };
        target.apply(&transform);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{TickTime, World};
    use crate::physics::NoObstacles;

    fn run(world: &mut World, system: &dyn System) {
        let physics = NoObstacles;
        let ctx = TickContext::new(TickTime::default(), 1, &physics);
        let query = system.query();
        for e in world.query_entities(&query) {
            world
                .update_entity(e, system, &mut CommandSegment::new(0), &ctx)
                .unwrap();
        }
    }

    #[test]
    fn test_sync_by_id() {
        let targets = Arc::new(SyncTargets::new());
        let both = targets.register("ship", true, true);
        let position_only = targets.register("ship", true, false);
        let other = targets.register("rock", true, true);

        let mut world = World::new();
        let e = world.create_entity().unwrap();
        world.add_component(e, TransformSyncSource::new("ship")).unwrap();
        let rotation = Quaternion::from_yaw(1.0);
        world
            .add_component(
                e,
                LocalTransform::from_position(Float3::new(1.0, 2.0, 3.0)).with_rotation(rotation),
            )
            .unwrap();

        run(&mut world, &TransformSyncSystem::new(Arc::clone(&targets)));

        assert_eq!(both.transform().position, Float3::new(1.0, 2.0, 3.0));
        assert_eq!(both.transform().rotation, rotation);
        assert_eq!(position_only.transform().rotation, Quaternion::IDENTITY);
        assert_eq!(other.transform(), SyncedTransform::default());
    }

    #[test]
    fn test_unregistered_target_is_not_updated() {
        let targets = SyncTargets::new();
        let target = targets.register("a", true, true);
        assert!(targets.unregister(&target));
        assert!(!targets.unregister(&target));
        assert_eq!(targets.sync("a", &LocalTransform::IDENTITY), 0);
        assert!(targets.is_empty());
    }

    #[test]
    fn test_synced_instance_spawns_once() {
        let targets = Arc::new(SyncTargets::new());
        let mut world = World::new();
        let e = world.create_entity().unwrap();
        world.add_component(e, SyncedInstance::new("proxy")).unwrap();
        world.add_component(e, LocalTransform::IDENTITY).unwrap();

        let system = SpawnSyncedSystem::new(Arc::clone(&targets));
        run(&mut world, &system);
        world
            .set(e, LocalTransform::from_position(Float3::new(0.0, 5.0, 0.0)))
            .unwrap();
        run(&mut world, &system);

        assert_eq!(targets.len(), 1);
        let instance = world.get::<SyncedInstance>(e).unwrap().instance.clone().unwrap();
        assert_eq!(instance.transform().position, Float3::new(0.0, 5.0, 0.0));
    }
}

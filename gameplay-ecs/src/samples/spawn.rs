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
//! Timed prefab spawning

use crate::ecs::{
    AccessDecl, CommandSegment, EntityMut, Prefab, Query, System, TickContext,
};
use crate::error::Result;
use crate::samples::components::{Area, LocalTransform, Spawner};

/// Instantiates `spawn_count` copies of a prefab whenever a spawner's
/// deadline passes
///
/// Each copy is placed at a random point of the spawner's [`Area`],
/// transformed by the spawner's [`LocalTransform`]. Every copy is reseeded
/// from the spawner's generator, so generator-carrying prefabs do not yield
/// instances that share a random stream. Instances are created through the
/// command segment and appear at the stage barrier.
#[derive(Debug, Default)]
pub struct SpawnSystem;

impl System for SpawnSystem {
    fn name(&self) -> &str {
        "SpawnSystem"
    }

    fn query(&self) -> Query {
        Query::new()
            .with::<Spawner>()
            .with::<Area>()
            .with::<LocalTransform>()
            .without::<Prefab>()
    }

    fn access(&self) -> AccessDecl {
        AccessDecl::new()
            .write::<Spawner>()
            .read::<Area>()
            .read::<LocalTransform>()
    }

    fn update(
        &self,
        entity: &mut EntityMut<'_>,
        commands: &mut CommandSegment,
        ctx: &TickContext<'_>,
    ) -> Result<()> {
        let transform = *entity.get::<LocalTransform>()?;
        let area = *entity.get::<Area>()?;
        let spawner = entity.get_mut::<Spawner>()?;
        if !spawner.poll(ctx.time.elapsed) {
            return Ok(());
        }

        for _ in 0..spawner.spawn_count {
            let seed = spawner.random.next_u32();
            let point = transform.transform_point(area.random_local_point(&mut spawner.random));
            let instance = commands.instantiate_seeded(spawner.prefab, seed);
            commands.add_component(instance, LocalTransform::from_position(point));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Command, CommandBuffer, Entity, TickTime, World};
    use crate::math::Float3;
    use crate::physics::NoObstacles;
    use crate::random::Random;
    use crate::samples::components::FloatTowards;

    fn spawner_world(next_spawn_time: f32) -> (World, Entity, Entity) {
        let mut world = World::new();
        let prefab = world.create_entity().unwrap();
        world.add_component(prefab, Prefab).unwrap();
        world.add_component(prefab, LocalTransform::IDENTITY).unwrap();

        let spawner = world.create_entity().unwrap();
        let mut component = Spawner::new(prefab, 2.0, 3, Random::new(9));
        component.next_spawn_time = next_spawn_time;
        world.add_component(spawner, component).unwrap();
        world.add_component(spawner, Area::new(Float3::new(10.0, 0.0, 10.0))).unwrap();
        world
            .add_component(spawner, LocalTransform::from_position(Float3::new(100.0, 0.0, 0.0)))
            .unwrap();
        (world, prefab, spawner)
    }

    #[test]
    fn test_spawn_fires_once_deadline_passes() {
        let (mut world, prefab, spawner) = spawner_world(0.0);
        let physics = NoObstacles;
        let ctx = TickContext::new(TickTime::new(2.5, 0.02), 1, &physics);
        let mut commands = CommandSegment::new(0);

        world.update_entity(spawner, &SpawnSystem, &mut commands, &ctx).unwrap();

        let instantiations = commands
            .entries()
            .iter()
            .filter(|e| matches!(e.command(), Command::Instantiate { prefab: p, .. } if *p == prefab))
            .count();
        assert_eq!(instantiations, 3);
        assert_eq!(commands.len(), 6);
        assert_eq!(world.get::<Spawner>(spawner).unwrap().next_spawn_time, 4.5);
    }

    #[test]
    fn test_sibling_instances_get_distinct_generators() {
        let (mut world, prefab, spawner) = spawner_world(0.0);
        world
            .add_component(prefab, FloatTowards::new(1.0, 5.0, Random::new(5)))
            .unwrap();
        let physics = NoObstacles;
        let ctx = TickContext::new(TickTime::new(0.0, 0.02), 1, &physics);
        let mut buffer = CommandBuffer::new();

        world
            .update_entity(spawner, &SpawnSystem, buffer.segment(0), &ctx)
            .unwrap();
        let report = buffer.playback(&mut world).unwrap();

        assert_eq!(report.created.len(), 3);
        let mut states: Vec<u32> = report
            .created
            .iter()
            .map(|&e| world.get::<FloatTowards>(e).unwrap().random.state())
            .collect();
        states.sort_unstable();
        states.dedup();
        assert_eq!(states.len(), 3);
        let template = world.get::<FloatTowards>(prefab).unwrap().random.state();
        assert!(!states.contains(&template));
    }

    #[test]
    fn test_spawn_waits_for_deadline() {
        let (mut world, _, spawner) = spawner_world(2.0);
        let physics = NoObstacles;
        let ctx = TickContext::new(TickTime::new(1.0, 0.02), 1, &physics);
        let mut commands = CommandSegment::new(0);

        world.update_entity(spawner, &SpawnSystem, &mut commands, &ctx).unwrap();
        assert!(commands.is_empty());
        assert_eq!(world.get::<Spawner>(spawner).unwrap().next_spawn_time, 2.0);
    }

    #[test]
    fn test_prefab_carriers_are_not_spawners() {
        let (world, prefab, _) = spawner_world(0.0);
        let matched = world.query_entities(&SpawnSystem.query());
        assert!(!matched.contains(&prefab));
        assert_eq!(matched.len(), 1);
    }
}

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
//! Input-driven movement

use crate::ecs::{
    AccessDecl, CommandSegment, EntityMut, Prefab, Query, System, TickContext, TickTime, World,
};
use crate::error::{EcsError, Result};
use crate::math::Float3;
use crate::physics::{steer_clear, Avoidance, PhysicsMass, PhysicsVelocity};
use crate::samples::components::{InputAxes, LocalTransform, Moving};

/// Pushes [`Moving`] bodies along their forward axis and yaws them
///
/// Reads the [`InputAxes`] singleton once per tick; without one the input
/// is treated as neutral.
#[derive(Debug, Default)]
pub struct MoveSystem {
    avoidance: Option<Avoidance>,
    input: InputAxes,
}

impl MoveSystem {
    /// Create the system without obstacle avoidance
    pub fn new() -> Self {
        MoveSystem::default()
    }

    /// Reverse the push when an obstacle lies ahead
    pub fn with_avoidance(mut self, avoidance: Avoidance) -> Self {
        self.avoidance = Some(avoidance);
        self
    }
}

impl System for MoveSystem {
    fn name(&self) -> &str {
        "MoveSystem"
    }

    fn query(&self) -> Query {
        Query::new()
            .with::<Moving>()
            .with::<LocalTransform>()
            .with::<PhysicsVelocity>()
            .with::<PhysicsMass>()
            .without::<Prefab>()
    }

    fn access(&self) -> AccessDecl {
        AccessDecl::new()
            .read::<Moving>()
            .read::<LocalTransform>()
            .write::<PhysicsVelocity>()
            .read::<PhysicsMass>()
    }

    fn prepare(&mut self, world: &World, _time: &TickTime) -> Result<bool> {
        self.input = match world.singleton::<InputAxes>() {
            Ok(input) => *input,
            Err(EcsError::SingletonCount { count: 0, .. }) => InputAxes::default(),
            Err(err) => return Err(err),
        };
        Ok(true)
    }

    fn update(
        &self,
        entity: &mut EntityMut<'_>,
        _commands: &mut CommandSegment,
        ctx: &TickContext<'_>,
    ) -> Result<()> {
        let forward = self.input.vertical * ctx.time.delta;
        let rotate = self.input.horizontal * ctx.time.delta;

        let moving = *entity.get::<Moving>()?;
        let transform = *entity.get::<LocalTransform>()?;
        let mass = *entity.get::<PhysicsMass>()?;

        let mut push = transform.forward() * (forward * moving.move_speed);
        if let Some(avoidance) = &self.avoidance {
            push = steer_clear(ctx.physics, transform.position, push, avoidance);
        }
        let yaw = Float3::new(0.0, rotate * moving.rotate_speed, 0.0);

        let velocity = entity.get_mut::<PhysicsVelocity>()?;
        ctx.physics.apply_linear_impulse(velocity, &mass, 1.0, push);
        ctx.physics.apply_angular_impulse(velocity, &mass, yaw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Entity;
    use crate::physics::{CollisionFilter, NoObstacles, PhysicsBackend};

    struct Wall;

    impl PhysicsBackend for Wall {
        fn cast_ray(&self, _start: Float3, _end: Float3, _filter: CollisionFilter) -> bool {
            true
        }
    }

    fn mover(world: &mut World) -> Entity {
        let e = world.create_entity().unwrap();
        world
            .add_component(e, Moving { move_speed: 2.0, rotate_speed: 3.0 })
            .unwrap();
        world.add_component(e, LocalTransform::IDENTITY).unwrap();
        world.add_component(e, PhysicsVelocity::default()).unwrap();
        world.add_component(e, PhysicsMass::default()).unwrap();
        e
    }

    fn step(world: &mut World, system: &mut MoveSystem, entity: Entity, physics: &dyn PhysicsBackend) {
        let time = TickTime::new(1.0, 0.5);
        system.prepare(world, &time).unwrap();
        let ctx = TickContext::new(time, 1, physics);
        world
            .update_entity(entity, &*system, &mut CommandSegment::new(0), &ctx)
            .unwrap();
    }

    #[test]
    fn test_input_drives_impulses() {
        let mut world = World::new();
        let e = mover(&mut world);
        world
            .insert_singleton(InputAxes { vertical: 1.0, horizontal: -1.0 })
            .unwrap();

        let mut system = MoveSystem::new();
        step(&mut world, &mut system, e, &NoObstacles);

        let velocity = world.get::<PhysicsVelocity>(e).unwrap();
        assert_eq!(velocity.linear, Float3::new(0.0, 0.0, 1.0));
        assert_eq!(velocity.angular, Float3::new(0.0, -1.5, 0.0));
    }

    #[test]
    fn test_neutral_without_input() {
        let mut world = World::new();
        let e = mover(&mut world);
        let mut system = MoveSystem::new();
        step(&mut world, &mut system, e, &NoObstacles);
        assert_eq!(world.get::<PhysicsVelocity>(e).unwrap().linear, Float3::ZERO);
    }

    #[test]
    fn test_blocked_push_is_reversed() {
        let mut world = World::new();
        let e = mover(&mut world);
        world
            .insert_singleton(InputAxes { vertical: 1.0, horizontal: 0.0 })
            .unwrap();

        let mut system = MoveSystem::new().with_avoidance(Avoidance::new(2.0));
        step(&mut world, &mut system, e, &Wall);
        assert_eq!(
            world.get::<PhysicsVelocity>(e).unwrap().linear,
            Float3::new(0.0, 0.0, -1.0)
        );
    }
}

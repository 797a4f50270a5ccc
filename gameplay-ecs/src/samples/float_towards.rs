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
//! Drifting toward random points of a target area
//!
//! Every floater pushes itself toward its current target with a constant
//! impulse and periodically picks a new target inside the single
//! [`FloatTargetArea`]. The system sits idle while no such area exists.

use log::debug;

use crate::ecs::{
    AccessDecl, CommandSegment, EntityMut, Prefab, Query, System, TickContext, TickTime, World,
};
use crate::error::{EcsError, Result};
use crate::physics::{steer_clear, Avoidance, PhysicsMass, PhysicsVelocity};
use crate::samples::components::{Area, FloatTargetArea, FloatTowards, LocalTransform};

/// Steers [`FloatTowards`] bodies toward their target points
#[derive(Debug, Default)]
pub struct FloatingTowardsSystem {
    avoidance: Option<Avoidance>,
    target_area: Option<(Area, LocalTransform)>,
}

impl FloatingTowardsSystem {
    /// Create the system without obstacle avoidance
    pub fn new() -> Self {
        FloatingTowardsSystem::default()
    }

    /// Turn away from obstacles ahead
    pub fn with_avoidance(mut self, avoidance: Avoidance) -> Self {
        self.avoidance = Some(avoidance);
        self
    }
}

impl System for FloatingTowardsSystem {
    fn name(&self) -> &str {
        "FloatingTowardsSystem"
    }

    fn query(&self) -> Query {
        Query::new()
            .with::<FloatTowards>()
            .with::<PhysicsVelocity>()
            .with::<PhysicsMass>()
            .with::<LocalTransform>()
            .without::<Prefab>()
    }

    fn access(&self) -> AccessDecl {
        AccessDecl::new()
            .write::<FloatTowards>()
            .write::<PhysicsVelocity>()
            .read::<PhysicsMass>()
            .read::<LocalTransform>()
    }

    fn prepare(&mut self, world: &World, _time: &TickTime) -> Result<bool> {
        self.target_area = match world.singleton_entity::<FloatTargetArea>() {
            Ok(carrier) => Some((*world.get::<Area>(carrier)?, *world.get::<LocalTransform>(carrier)?)),
            Err(EcsError::SingletonCount { count: 0, .. }) => None,
            Err(err) => return Err(err),
        };
        if self.target_area.is_none() {
            debug!("no float target area, skipping floaters");
        }
        Ok(self.target_area.is_some())
    }

    fn update(
        &self,
        entity: &mut EntityMut<'_>,
        _commands: &mut CommandSegment,
        ctx: &TickContext<'_>,
    ) -> Result<()> {
        let Some((area, area_transform)) = self.target_area else {
            return Ok(());
        };
        let transform = *entity.get::<LocalTransform>()?;
        let mass = *entity.get::<PhysicsMass>()?;

        let floater = entity.get_mut::<FloatTowards>()?;
        if floater.poll_retarget(ctx.time.elapsed) {
            let local = area.random_local_point(&mut floater.random);
            floater.target_point = area_transform.transform_point(local);
        }
        let (target, speed) = (floater.target_point, floater.speed);

        let mut movement = (target - transform.position).normalize_or_zero() * speed;
        if let Some(avoidance) = &self.avoidance {
            movement = steer_clear(ctx.physics, transform.position, movement, avoidance);
        }

        let velocity = entity.get_mut::<PhysicsVelocity>()?;
        ctx.physics
            .apply_linear_impulse(velocity, &mass, transform.scale, movement);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Entity;
    use crate::math::Float3;
    use crate::physics::NoObstacles;
    use crate::random::Random;

    fn floater_world() -> (World, Entity) {
        let mut world = World::new();
        let area = world.create_entity().unwrap();
        world.add_component(area, FloatTargetArea).unwrap();
        world.add_component(area, Area::new(Float3::splat(4.0))).unwrap();
        world
            .add_component(area, LocalTransform::from_position(Float3::new(0.0, 10.0, 0.0)))
            .unwrap();

        let floater = world.create_entity().unwrap();
        world.add_component(floater, FloatTowards::new(2.0, 5.0, Random::new(3))).unwrap();
        world.add_component(floater, PhysicsVelocity::default()).unwrap();
        world.add_component(floater, PhysicsMass::default()).unwrap();
        world.add_component(floater, LocalTransform::IDENTITY).unwrap();
        (world, floater)
    }

    fn tick(world: &mut World, system: &mut FloatingTowardsSystem, entity: Entity, elapsed: f64) {
        let time = TickTime::new(elapsed, 1.0);
        assert!(system.prepare(world, &time).unwrap());
        let physics = NoObstacles;
        let ctx = TickContext::new(time, elapsed as u64, &physics);
        world
            .update_entity(entity, &*system, &mut CommandSegment::new(0), &ctx)
            .unwrap();
    }

    #[test]
    fn test_idle_without_target_area() {
        let mut world = World::new();
        let mut system = FloatingTowardsSystem::new();
        assert!(!system.prepare(&world, &TickTime::default()).unwrap());

        // Two areas are ambiguous
        for _ in 0..2 {
            let e = world.create_entity().unwrap();
            world.add_component(e, FloatTargetArea).unwrap();
        }
        assert!(system.prepare(&world, &TickTime::default()).is_err());
    }

    #[test]
    fn test_target_lies_in_area() {
        let (mut world, floater) = floater_world();
        let mut system = FloatingTowardsSystem::new();
        tick(&mut world, &mut system, floater, 1.0);
        tick(&mut world, &mut system, floater, 6.0);

        let target = world.get::<FloatTowards>(floater).unwrap().target_point;
        assert!(target.x.abs() <= 2.0);
        assert!((8.0..=12.0).contains(&target.y));
        assert!(target.z.abs() <= 2.0);
    }

    #[test]
    fn test_impulse_points_at_target() {
        let (mut world, floater) = floater_world();
        world.get_mut::<FloatTowards>(floater).unwrap().target_point = Float3::new(0.0, 0.0, 5.0);
        let mut system = FloatingTowardsSystem::new();
        tick(&mut world, &mut system, floater, 1.0);

        let velocity = world.get::<PhysicsVelocity>(floater).unwrap();
        assert!(velocity.linear.abs_diff_eq(Float3::new(0.0, 0.0, 2.0), 1e-6));
    }
}

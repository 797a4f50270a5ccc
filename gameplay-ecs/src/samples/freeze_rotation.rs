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
//! Rotation locks

use crate::ecs::{AccessDecl, CommandSegment, EntityMut, Prefab, Query, System, TickContext};
use crate::error::Result;
use crate::physics::PhysicsMass;
use crate::samples::components::FreezeRotation;

/// Zeroes the inverse inertia of every locked axis
#[derive(Debug, Default)]
pub struct FreezeRotationSystem;

impl System for FreezeRotationSystem {
    fn name(&self) -> &str {
        "FreezeRotationSystem"
    }

    fn query(&self) -> Query {
        Query::new()
            .with::<FreezeRotation>()
            .with::<PhysicsMass>()
            .without::<Prefab>()
    }

    fn access(&self) -> AccessDecl {
        AccessDecl::new().read::<FreezeRotation>().write::<PhysicsMass>()
    }

    fn update(
        &self,
        entity: &mut EntityMut<'_>,
        _commands: &mut CommandSegment,
        _ctx: &TickContext<'_>,
    ) -> Result<()> {
        let freeze = *entity.get::<FreezeRotation>()?;
        let mass = entity.get_mut::<PhysicsMass>()?;
        if freeze.x {
            mass.inverse_inertia.x = 0.0;
        }
        if freeze.y {
            mass.inverse_inertia.y = 0.0;
        }
        if freeze.z {
            mass.inverse_inertia.z = 0.0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{TickTime, World};
    use crate::math::Float3;
    use crate::physics::NoObstacles;

    #[test]
    fn test_locked_axes_are_zeroed() {
        let mut world = World::new();
        let e = world.create_entity().unwrap();
        world
            .add_component(e, FreezeRotation { x: true, y: false, z: true })
            .unwrap();
        world.add_component(e, PhysicsMass::new(1.0, Float3::splat(2.0))).unwrap();

        let physics = NoObstacles;
        let ctx = TickContext::new(TickTime::default(), 1, &physics);
        world
            .update_entity(e, &FreezeRotationSystem, &mut CommandSegment::new(0), &ctx)
            .unwrap();

        let mass = world.get::<PhysicsMass>(e).unwrap();
        assert_eq!(mass.inverse_inertia, Float3::new(0.0, 0.5, 0.0));
    }
}

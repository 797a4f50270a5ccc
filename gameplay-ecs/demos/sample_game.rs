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
//! Sample arena
//!
//! Builds a world with a spawner, a float target area, an input-driven
//! player and a few spherical obstacles, then runs the scheduler for a
//! few simulated seconds. Velocities are integrated here in place of a
//! real physics step.
//!
//! Run with `RUST_LOG=debug cargo run --example sample_game` to see stage
//! timings and spawned sync targets.

use std::sync::Arc;

use gameplay_ecs::config::{SchedulerConfig, WorldConfig};
use gameplay_ecs::ecs::{stages, Entity, Prefab, Query, Scheduler, TickTime, World};
use gameplay_ecs::math::Float3;
use gameplay_ecs::physics::{Avoidance, PhysicsMass, PhysicsVelocity, SphereObstacles};
use gameplay_ecs::random::SeedSource;
use gameplay_ecs::samples::{
    Area, FloatTargetArea, FloatTowards, FloatingTowardsSystem, FreezeRotation,
    FreezeRotationSystem, InputAxes, LocalTransform, MoveSystem, Moving, SpawnSyncedSystem,
    SpawnSystem, Spawner, SyncTargets, SyncedInstance, TransformSyncSource, TransformSyncSystem,
};

const TICK: f32 = 1.0 / 50.0;
const TICKS: u32 = 250;

fn build_world(seeds: &SeedSource) -> gameplay_ecs::Result<(World, Entity)> {
    let mut world = World::with_config(WorldConfig::new(10_000).with_chunk_capacity(64))?;

    let floater = world.create_entity()?;
    world.add_component(floater, Prefab)?;
    world.add_component(floater, LocalTransform::IDENTITY)?;
    world.add_component(floater, FloatTowards::seeded(0.5, 3.0, seeds))?;
    world.add_component(floater, PhysicsVelocity::default())?;
    world.add_component(floater, PhysicsMass::new(1.0, Float3::ONE))?;

    let spawner = world.create_entity()?;
    world.add_component(spawner, Spawner::seeded(floater, 1.0, 5, seeds))?;
    world.add_component(spawner, Area::new(Float3::new(20.0, 2.0, 20.0)))?;
    world.add_component(spawner, LocalTransform::from_position(Float3::new(0.0, 1.0, 0.0)))?;

    let target = world.create_entity()?;
    world.add_component(target, FloatTargetArea)?;
    world.add_component(target, Area::new(Float3::new(30.0, 10.0, 30.0)))?;
    world.add_component(target, LocalTransform::from_position(Float3::new(0.0, 15.0, 0.0)))?;

    let player = world.create_entity()?;
    world.add_component(player, Moving { move_speed: 8.0, rotate_speed: 2.0 })?;
    world.add_component(player, LocalTransform::IDENTITY)?;
    world.add_component(player, PhysicsVelocity::default())?;
    world.add_component(player, PhysicsMass::new(2.0, Float3::ONE))?;
    world.add_component(player, FreezeRotation { x: true, y: false, z: true })?;
    world.add_component(player, TransformSyncSource::new("player"))?;
    world.add_component(player, SyncedInstance::new("player-shadow"))?;

    world.insert_singleton(InputAxes { vertical: 1.0, horizontal: 0.25 })?;
    Ok((world, player))
}

/// Semi-implicit Euler step standing in for the physics engine
fn integrate(world: &mut World, dt: f32) -> gameplay_ecs::Result<()> {
    let bodies = Query::new()
        .with::<PhysicsVelocity>()
        .with::<LocalTransform>()
        .without::<Prefab>();
    for e in world.query_entities(&bodies) {
        let velocity = *world.get::<PhysicsVelocity>(e)?;
        let transform = world.get_mut::<LocalTransform>(e)?;
        transform.position += velocity.linear * dt;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Gameplay ECS - Sample Arena");
    println!("===========================\n");

    let seeds = SeedSource::new(2025);
    let (mut world, player) = build_world(&seeds)?;
    let obstacles = SphereObstacles::new()
        .with_sphere(Float3::new(5.0, 1.0, 5.0), 2.0)
        .with_sphere(Float3::new(0.0, 1.0, 12.0), 1.5)
        .with_sphere(Float3::new(-6.0, 10.0, 0.0), 3.0);
    let targets = Arc::new(SyncTargets::new());
    let camera = targets.register("player", true, false);

    let mut scheduler = Scheduler::new(SchedulerConfig::default().with_stage_timing())?;
    scheduler.add_system(SpawnSystem, stages::BEGIN_SIMULATION)?;
    scheduler.add_system(
        FloatingTowardsSystem::new().with_avoidance(Avoidance::new(2.0)),
        stages::SIMULATION,
    )?;
    scheduler.add_system(
        MoveSystem::new().with_avoidance(Avoidance::new(1.5)),
        stages::PHYSICS_SETUP,
    )?;
    scheduler.add_system(FreezeRotationSystem, stages::BEGIN_SIMULATION)?;
    scheduler.add_system(TransformSyncSystem::new(Arc::clone(&targets)), stages::PRESENTATION)?;
    scheduler.add_system(SpawnSyncedSystem::new(Arc::clone(&targets)), stages::PRESENTATION)?;
    println!(
        "Registered {} systems in {} stages",
        scheduler.system_count(),
        scheduler.stage_count()
    );

    let mut elapsed = 0.0f64;
    let mut commands = 0;
    let mut failures = 0;
    for _ in 0..TICKS {
        let report = scheduler.run_tick(&mut world, TickTime::new(elapsed, TICK), &obstacles)?;
        commands += report.commands_applied;
        failures += report.entity_failures + report.playback_failures.len();
        integrate(&mut world, TICK)?;
        elapsed += f64::from(TICK);
    }

    let floaters = world.query_entities(&Query::new().with::<FloatTowards>().without::<Prefab>());
    println!("\nAfter {:.1}s ({} ticks):", elapsed, scheduler.tick_count());
    println!("  entities:     {}", world.entity_count());
    println!("  floaters:     {}", floaters.len());
    println!("  archetypes:   {}", world.archetype_count());
    println!("  chunks:       {}", world.chunk_count());
    println!("  commands:     {}", commands);
    println!("  failures:     {}", failures);
    println!("  player:       {:?}", world.get::<LocalTransform>(player)?.position);
    println!("  camera sync:  {:?}", camera.transform().position);
    println!("  sync targets: {}", targets.len());

    scheduler.shutdown();
    Ok(())
}

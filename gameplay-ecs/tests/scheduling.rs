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
//! Scheduler tests
//!
//! Full ticks over the sample systems: deterministic command playback,
//! access validation, timers and obstacle avoidance.

use gameplay_ecs::config::{SchedulerConfig, WorldConfig};
use gameplay_ecs::ecs::{
    stages, AccessDecl, CommandSegment, Component, Entity, EntityMut, FnSystem, Prefab, Query,
    Scheduler, SchedulerState, TickContext, TickTime, World,
};
use gameplay_ecs::error::EcsError;
use gameplay_ecs::math::Float3;
use gameplay_ecs::physics::{Avoidance, NoObstacles, PhysicsMass, PhysicsVelocity, SphereObstacles};
use gameplay_ecs::random::{Random, SeedSource};
use gameplay_ecs::samples::{
    Area, FloatTargetArea, FloatTowards, FloatingTowardsSystem, LocalTransform, SpawnSystem,
    Spawner,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Health(u32);
impl Component for Health {}

type UpdateResult = gameplay_ecs::Result<()>;

/// Many spawners spread over several small chunks, spawning floaters that
/// drift within a target area
fn spawner_world(seed: u64) -> World {
    let mut world = World::with_config(WorldConfig::new(4096).with_chunk_capacity(3)).unwrap();
    let area = world.create_entity().unwrap();
    world.add_component(area, FloatTargetArea).unwrap();
    world.add_component(area, Area::new(Float3::splat(6.0))).unwrap();
    world
        .add_component(area, LocalTransform::from_position(Float3::new(0.0, 10.0, 0.0)))
        .unwrap();

    let seeds = SeedSource::new(seed);
    let prefab = world.create_entity().unwrap();
    world.add_component(prefab, Prefab).unwrap();
    world.add_component(prefab, LocalTransform::IDENTITY).unwrap();
    world
        .add_component(prefab, FloatTowards::seeded(1.5, 1.0, &seeds))
        .unwrap();
    world.add_component(prefab, PhysicsVelocity::default()).unwrap();
    world.add_component(prefab, PhysicsMass::default()).unwrap();

    for i in 0..20 {
        let spawner = world.create_entity().unwrap();
        world
            .add_component(spawner, Spawner::seeded(prefab, 1.0, 2, &seeds))
            .unwrap();
        world.add_component(spawner, Area::new(Float3::splat(8.0))).unwrap();
        world
            .add_component(
                spawner,
                LocalTransform::from_position(Float3::new(i as f32 * 10.0, 0.0, 0.0)),
            )
            .unwrap();
    }
    world
}

/// Every component an entity may carry in [`spawner_world`]
#[derive(Debug, PartialEq)]
struct EntityState {
    entity: Entity,
    prefab: bool,
    transform: Option<LocalTransform>,
    spawner: Option<Spawner>,
    floater: Option<FloatTowards>,
    velocity: Option<PhysicsVelocity>,
    health: Option<Health>,
}

fn snapshot(world: &World) -> Vec<EntityState> {
    world
        .entities()
        .map(|e| EntityState {
            entity: e,
            prefab: world.has::<Prefab>(e),
            transform: world.get::<LocalTransform>(e).ok().copied(),
            spawner: world.get::<Spawner>(e).ok().copied(),
            floater: world.get::<FloatTowards>(e).ok().copied(),
            velocity: world.get::<PhysicsVelocity>(e).ok().copied(),
            health: world.get::<Health>(e).ok().copied(),
        })
        .collect()
}

/// Tags each spawner with the tick it was last visited in
fn stamp() -> FnSystem<impl Fn(&mut EntityMut<'_>, &mut CommandSegment, &TickContext<'_>) -> UpdateResult + Send + Sync>
{
    FnSystem::new(
        "stamp",
        Query::new().with::<Spawner>().with::<Area>(),
        AccessDecl::new().read::<Area>(),
        |entity: &mut EntityMut<'_>, commands: &mut CommandSegment, ctx: &TickContext<'_>| {
            commands.add_component(entity.entity(), Health(ctx.tick as u32));
            Ok(())
        },
    )
}

fn run_spawners(workers: usize) -> Vec<EntityState> {
    let mut world = spawner_world(42);
    let config = SchedulerConfig::new(workers).with_chunks_per_work_item(1);
    let mut scheduler = Scheduler::new(config).unwrap();
    scheduler.add_system(SpawnSystem, stages::SIMULATION).unwrap();
    scheduler
        .add_system(FloatingTowardsSystem::new(), stages::SIMULATION)
        .unwrap();
    scheduler.add_system(stamp(), stages::SIMULATION).unwrap();
    for tick in 0..3 {
        let time = TickTime::new(f64::from(tick) * 1.5, 1.5);
        scheduler.run_tick(&mut world, time, &NoObstacles).unwrap();
    }
    snapshot(&world)
}

#[test]
fn test_playback_is_deterministic() {
    init_logging();
    let single = run_spawners(1);
    let parallel = run_spawners(4);
    // area, prefab, 20 spawners, 3 rounds of 20 * 2 instances
    assert_eq!(single.len(), 2 + 20 + 3 * 40);
    assert_eq!(single, parallel);
    assert_eq!(parallel, run_spawners(4));

    let stamped = single.iter().filter(|s| s.health == Some(Health(3))).count();
    assert_eq!(stamped, 20);
    // Instances from the first round have retargeted by the third tick
    let retargeted = single
        .iter()
        .filter(|s| !s.prefab)
        .filter_map(|s| s.floater)
        .filter(|f| f.target_point != Float3::ZERO)
        .count();
    assert_eq!(retargeted, 40);
}

#[test]
fn test_spawn_fan_out() {
    init_logging();
    let mut world = World::new();
    let prefab = world.create_entity().unwrap();
    world.add_component(prefab, Prefab).unwrap();
    world.add_component(prefab, LocalTransform::IDENTITY).unwrap();

    let spawner = world.create_entity().unwrap();
    let mut component = Spawner::new(prefab, 2.0, 3, Random::new(5));
    component.next_spawn_time = 2.0;
    world.add_component(spawner, component).unwrap();
    world.add_component(spawner, Area::new(Float3::new(10.0, 0.0, 10.0))).unwrap();
    world
        .add_component(spawner, LocalTransform::from_position(Float3::new(100.0, 0.0, 0.0)))
        .unwrap();

    let mut scheduler = Scheduler::new(SchedulerConfig::new(2)).unwrap();
    scheduler.add_system(SpawnSystem, stages::SIMULATION).unwrap();

    let report = scheduler
        .run_tick(&mut world, TickTime::new(1.0, 1.0), &NoObstacles)
        .unwrap();
    assert_eq!(report.commands_applied, 0);

    let report = scheduler
        .run_tick(&mut world, TickTime::new(2.5, 1.5), &NoObstacles)
        .unwrap();
    assert_eq!(report.commands_applied, 6);
    assert_eq!(world.get::<Spawner>(spawner).unwrap().next_spawn_time, 4.5);

    let spawned = Query::new()
        .with::<LocalTransform>()
        .without::<Prefab>()
        .without::<Spawner>();
    let instances = world.query_entities(&spawned);
    assert_eq!(instances.len(), 3);
    for e in instances {
        let p = world.get::<LocalTransform>(e).unwrap().position;
        assert!((95.0..=105.0).contains(&p.x));
        assert_eq!(p.y, 0.0);
        assert!((-5.0..=5.0).contains(&p.z));
    }
}

fn writer(
    name: &str,
) -> FnSystem<impl Fn(&mut EntityMut<'_>, &mut CommandSegment, &TickContext<'_>) -> UpdateResult + Send + Sync>
{
    FnSystem::new(
        name,
        Query::new().with::<Health>(),
        AccessDecl::new().write::<Health>(),
        |entity: &mut EntityMut<'_>, _: &mut CommandSegment, _: &TickContext<'_>| {
            entity.get_mut::<Health>()?.0 += 1;
            Ok(())
        },
    )
}

#[test]
fn test_conflicting_writers_rejected() {
    let mut scheduler = Scheduler::new(SchedulerConfig::new(1)).unwrap();
    scheduler.add_system(writer("heal"), stages::SIMULATION).unwrap();

    let err = scheduler
        .add_system(writer("regen"), stages::SIMULATION)
        .unwrap_err();
    match err {
        EcsError::AccessConflict { first, second, .. } => {
            assert_eq!(first, "heal");
            assert_eq!(second, "regen");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Writers in different stages run one after another
    scheduler.add_system(writer("regen"), stages::PRESENTATION).unwrap();
    assert_eq!(scheduler.system_count(), 2);

    let mut world = World::new();
    let e = world.create_entity().unwrap();
    world.add_component(e, Health(0)).unwrap();
    scheduler
        .run_tick(&mut world, TickTime::default(), &NoObstacles)
        .unwrap();
    assert_eq!(*world.get::<Health>(e).unwrap(), Health(2));
}

#[test]
fn test_failed_commands_are_skipped() {
    init_logging();
    let mut world = World::new();
    let stale = world.create_entity().unwrap();
    world.destroy_entity(stale).unwrap();
    let e = world.create_entity().unwrap();
    world.add_component(e, Health(1)).unwrap();

    let reaper = FnSystem::new(
        "reaper",
        Query::new().with::<Health>(),
        AccessDecl::new().read::<Health>(),
        move |entity: &mut EntityMut<'_>, commands: &mut CommandSegment, _: &TickContext<'_>| {
            commands.destroy_entity(stale);
            commands.destroy_entity(entity.entity());
            Ok(())
        },
    );
    let mut scheduler = Scheduler::new(SchedulerConfig::new(2)).unwrap();
    scheduler.add_system(reaper, stages::END_SIMULATION).unwrap();

    let report = scheduler
        .run_tick(&mut world, TickTime::default(), &NoObstacles)
        .unwrap();
    assert_eq!(report.commands_applied, 1);
    assert_eq!(report.playback_failures.len(), 1);
    assert!(matches!(
        report.playback_failures[0],
        EcsError::PlaybackEntryFailure { sequence: 0, .. }
    ));
    assert!(!world.is_alive(e));
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

fn floater_world(target: Float3) -> (World, Entity) {
    let mut world = World::new();
    let area = world.create_entity().unwrap();
    world.add_component(area, FloatTargetArea).unwrap();
    world.add_component(area, Area::new(Float3::splat(2.0))).unwrap();
    world
        .add_component(area, LocalTransform::from_position(Float3::new(0.0, 20.0, 0.0)))
        .unwrap();

    let floater = world.create_entity().unwrap();
    let mut component = FloatTowards::new(2.0, 5.0, Random::new(11));
    component.target_point = target;
    world.add_component(floater, component).unwrap();
    world.add_component(floater, PhysicsVelocity::default()).unwrap();
    world.add_component(floater, PhysicsMass::default()).unwrap();
    world.add_component(floater, LocalTransform::IDENTITY).unwrap();
    (world, floater)
}

#[test]
fn test_retarget_schedule() {
    let (mut world, floater) = floater_world(Float3::new(0.0, 0.0, 5.0));
    let mut scheduler = Scheduler::new(SchedulerConfig::new(1)).unwrap();
    scheduler
        .add_system(FloatingTowardsSystem::new(), stages::SIMULATION)
        .unwrap();

    let mut next = Vec::new();
    for elapsed in [1.0, 6.0, 11.0] {
        scheduler
            .run_tick(&mut world, TickTime::new(elapsed, 0.02), &NoObstacles)
            .unwrap();
        next.push(world.get::<FloatTowards>(floater).unwrap().next_retarget_time);
    }
    assert_eq!(next, vec![6.0, 11.0, 16.0]);

    let target = world.get::<FloatTowards>(floater).unwrap().target_point;
    assert!((19.0..=21.0).contains(&target.y));
}

#[test]
fn test_blocked_floater_reverses() {
    let (mut world, floater) = floater_world(Float3::new(0.0, 0.0, 10.0));
    let obstacles = SphereObstacles::new().with_sphere(Float3::new(0.0, 0.0, 3.0), 1.0);
    let mut scheduler = Scheduler::new(SchedulerConfig::new(2)).unwrap();
    scheduler
        .add_system(
            FloatingTowardsSystem::new().with_avoidance(Avoidance::new(5.0)),
            stages::SIMULATION,
        )
        .unwrap();

    scheduler
        .run_tick(&mut world, TickTime::new(1.0, 0.02), &obstacles)
        .unwrap();
    let velocity = world.get::<PhysicsVelocity>(floater).unwrap().linear;
    assert!(velocity.abs_diff_eq(Float3::new(0.0, 0.0, -2.0), 1e-6));

    // Clear path once the obstacle is out of reach
    let (mut world, floater) = floater_world(Float3::new(0.0, 0.0, 10.0));
    scheduler
        .run_tick(&mut world, TickTime::new(1.0, 0.02), &SphereObstacles::new())
        .unwrap();
    let velocity = world.get::<PhysicsVelocity>(floater).unwrap().linear;
    assert!(velocity.abs_diff_eq(Float3::new(0.0, 0.0, 2.0), 1e-6));
}

#[test]
fn test_shutdown_rejects_ticks() {
    let mut scheduler = Scheduler::new(SchedulerConfig::new(1)).unwrap();
    scheduler.shutdown();
    let mut world = World::new();
    assert!(matches!(
        scheduler.run_tick(&mut world, TickTime::default(), &NoObstacles),
        Err(EcsError::SchedulerShutdown)
    ));
    assert_eq!(scheduler.state(), SchedulerState::ShutDown);
}

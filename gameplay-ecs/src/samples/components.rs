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
//! Components shared by the gameplay systems
//!
//! Plain data only. Timers are stored as absolute elapsed-time deadlines
//! rather than countdowns, so a system never has to decrement anything.

use crate::ecs::{Component, Entity};
use crate::math::{Float3, Quaternion};
use crate::random::{Random, SeedSource};

/// Position, rotation and uniform scale of an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalTransform {
    /// Translation
    pub position: Float3,
    /// Orientation
    pub rotation: Quaternion,
    /// Uniform scale
    pub scale: f32,
}

impl LocalTransform {
    /// Identity transform
    pub const IDENTITY: LocalTransform = LocalTransform {
        position: Float3::ZERO,
        rotation: Quaternion::IDENTITY,
        scale: 1.0,
    };

    /// Transform at `position` with no rotation and unit scale
    pub fn from_position(position: Float3) -> Self {
        LocalTransform {
            position,
            ..Self::IDENTITY
        }
    }

    /// Set the rotation
    pub fn with_rotation(mut self, rotation: Quaternion) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the scale
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Map a point from local to world space
    pub fn transform_point(&self, point: Float3) -> Float3 {
        self.position + self.rotation.rotate(point * self.scale)
    }

    /// Rotate a direction into world space
    pub fn transform_direction(&self, direction: Float3) -> Float3 {
        self.rotation.rotate(direction)
    }

    /// World-space forward (+Z) axis
    pub fn forward(&self) -> Float3 {
        self.transform_direction(Float3::FORWARD)
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        LocalTransform::IDENTITY
    }
}

impl Component for LocalTransform {}

/// A box-shaped region centered on the entity's transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Area {
    /// Full extents along each local axis
    pub size: Float3,
}

impl Area {
    /// Create an area with the given extents
    pub fn new(size: Float3) -> Self {
        Area { size }
    }

    /// Half the extents
    pub fn half_extents(&self) -> Float3 {
        self.size * 0.5
    }

    /// Uniformly distributed local point inside the area
    pub fn random_local_point(&self, random: &mut Random) -> Float3 {
        let half = self.half_extents();
        random.next_float3(-half, half)
    }
}

impl Component for Area {}

/// Periodically instantiates a prefab at random points of its [`Area`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spawner {
    /// Template to instantiate
    pub prefab: Entity,
    /// Seconds between spawns
    pub spawn_rate: f32,
    /// Instances per spawn
    pub spawn_count: u32,
    /// Elapsed time at which the next spawn fires
    pub next_spawn_time: f32,
    /// Point generator
    pub random: Random,
}

impl Spawner {
    /// Create a spawner that fires on its first update
    pub fn new(prefab: Entity, spawn_rate: f32, spawn_count: u32, random: Random) -> Self {
        Spawner {
            prefab,
            spawn_rate,
            spawn_count,
            next_spawn_time: 0.0,
            random,
        }
    }

    /// Create a spawner seeded from a seed source
    pub fn seeded(prefab: Entity, spawn_rate: f32, spawn_count: u32, seeds: &SeedSource) -> Self {
        Self::new(prefab, spawn_rate, spawn_count, seeds.next_random())
    }

    /// Check the deadline and schedule the next one if it has passed
    pub fn poll(&mut self, elapsed: f64) -> bool {
        if elapsed < f64::from(self.next_spawn_time) {
            return false;
        }
        self.next_spawn_time = (elapsed + f64::from(self.spawn_rate)) as f32;
        true
    }
}

impl Component for Spawner {
    fn reseed(&mut self, seed: u32) {
        self.random = Random::from_index(seed);
    }
}

/// Drifts toward a random point of the [`FloatTargetArea`], picking a new
/// point every `retarget_rate` seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatTowards {
    /// Impulse magnitude per update
    pub speed: f32,
    /// Seconds between retargets
    pub retarget_rate: f32,
    /// Current world-space target
    pub target_point: Float3,
    /// Elapsed time at which the next retarget fires
    ///
    /// A non-zero value set before the first update is kept as the first
    /// deadline. Zero means the first update schedules one `retarget_rate`
    /// seconds ahead.
    pub next_retarget_time: f32,
    /// Whether the first deadline has been scheduled
    pub armed: bool,
    /// Target generator
    pub random: Random,
}

impl FloatTowards {
    /// Create a floater with its target at the origin
    pub fn new(speed: f32, retarget_rate: f32, random: Random) -> Self {
        FloatTowards {
            speed,
            retarget_rate,
            target_point: Float3::ZERO,
            next_retarget_time: 0.0,
            armed: false,
            random,
        }
    }

    /// Create a floater seeded from a seed source
    pub fn seeded(speed: f32, retarget_rate: f32, seeds: &SeedSource) -> Self {
        Self::new(speed, retarget_rate, seeds.next_random())
    }

    /// Check whether a new target is due
    ///
    /// Without a stored deadline the first call only schedules one. A due
    /// retarget schedules the next one `retarget_rate` seconds after
    /// `elapsed`.
    pub fn poll_retarget(&mut self, elapsed: f64) -> bool {
        if !self.armed {
            self.armed = true;
            if self.next_retarget_time <= 0.0 {
                self.next_retarget_time = (elapsed + f64::from(self.retarget_rate)) as f32;
                return false;
            }
        }
        if elapsed < f64::from(self.next_retarget_time) {
            return false;
        }
        self.next_retarget_time = (elapsed + f64::from(self.retarget_rate)) as f32;
        true
    }
}

impl Component for FloatTowards {
    fn reseed(&mut self, seed: u32) {
        self.random = Random::from_index(seed);
    }
}

/// Tag of the single entity whose [`Area`] floaters drift within
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FloatTargetArea;

impl Component for FloatTargetArea {}

/// Input-driven movement speeds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moving {
    /// Forward impulse per unit of vertical input per second
    pub move_speed: f32,
    /// Yaw impulse per unit of horizontal input per second
    pub rotate_speed: f32,
}

impl Component for Moving {}

/// Player input, stored as a singleton
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputAxes {
    /// Forward/backward axis in `[-1, 1]`
    pub vertical: f32,
    /// Left/right axis in `[-1, 1]`
    pub horizontal: f32,
}

impl Component for InputAxes {}

/// Rotation axes to lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreezeRotation {
    /// Lock rotation around X
    pub x: bool,
    /// Lock rotation around Y
    pub y: bool,
    /// Lock rotation around Z
    pub z: bool,
}

impl Component for FreezeRotation {}

/// Marks an entity whose transform is mirrored to external objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSyncSource {
    /// Identifier the external objects register under
    pub id: String,
}

impl TransformSyncSource {
    /// Create a source with the given id
    pub fn new(id: impl Into<String>) -> Self {
        TransformSyncSource { id: id.into() }
    }
}

impl Component for TransformSyncSource {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_point() {
        let transform = LocalTransform::from_position(Float3::new(10.0, 0.0, 0.0))
            .with_rotation(Quaternion::from_yaw(std::f32::consts::FRAC_PI_2))
            .with_scale(2.0);
        let p = transform.transform_point(Float3::FORWARD);
        assert!(p.abs_diff_eq(Float3::new(12.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_spawner_poll() {
        let mut spawner = Spawner::new(Entity::new(0, 0), 2.0, 3, Random::new(1));
        spawner.next_spawn_time = 2.0;
        assert!(!spawner.poll(1.5));
        assert!(spawner.poll(2.5));
        assert_eq!(spawner.next_spawn_time, 4.5);
        assert!(!spawner.poll(4.0));
    }

    #[test]
    fn test_retarget_arms_on_first_poll() {
        let mut floater = FloatTowards::new(1.0, 5.0, Random::new(1));
        assert!(!floater.poll_retarget(1.0));
        assert_eq!(floater.next_retarget_time, 6.0);
        assert!(!floater.poll_retarget(5.9));
        assert!(floater.poll_retarget(6.0));
        assert_eq!(floater.next_retarget_time, 11.0);
    }

    #[test]
    fn test_authored_retarget_deadline_is_kept() {
        let mut floater = FloatTowards::new(1.0, 5.0, Random::new(1));
        floater.next_retarget_time = 3.0;
        assert!(!floater.poll_retarget(1.0));
        assert_eq!(floater.next_retarget_time, 3.0);
        assert!(floater.poll_retarget(3.5));
        assert_eq!(floater.next_retarget_time, 8.5);

        let mut late = FloatTowards::new(1.0, 5.0, Random::new(1));
        late.next_retarget_time = 2.0;
        assert!(late.poll_retarget(4.0));
        assert_eq!(late.next_retarget_time, 9.0);
    }

    #[test]
    fn test_reseed_replaces_generator() {
        let mut floater = FloatTowards::new(1.0, 5.0, Random::new(1));
        floater.reseed(77);
        assert_eq!(floater.random, Random::from_index(77));
        let mut spawner = Spawner::new(Entity::new(0, 0), 1.0, 1, Random::new(1));
        spawner.reseed(78);
        assert_eq!(spawner.random, Random::from_index(78));
    }

    #[test]
    fn test_random_point_inside_area() {
        let area = Area::new(Float3::new(4.0, 2.0, 6.0));
        let mut random = Random::new(42);
        for _ in 0..100 {
            let p = area.random_local_point(&mut random);
            assert!(p.x.abs() <= 2.0 && p.y.abs() <= 1.0 && p.z.abs() <= 3.0);
        }
    }
}

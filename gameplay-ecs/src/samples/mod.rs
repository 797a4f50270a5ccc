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
//! Sample gameplay built on the ECS
//!
//! Components and systems for a small arena: spawners that instantiate
//! prefabs, floaters drifting around a target area, an input-driven mover,
//! rotation locks, and transform mirroring to external objects.

mod components;
mod float_towards;
mod freeze_rotation;
mod moving;
mod spawn;
mod transform_sync;

pub use components::{
    Area, FloatTargetArea, FloatTowards, FreezeRotation, InputAxes, LocalTransform, Moving,
    Spawner, TransformSyncSource,
};
pub use float_towards::FloatingTowardsSystem;
pub use freeze_rotation::FreezeRotationSystem;
pub use moving::MoveSystem;
pub use spawn::SpawnSystem;
pub use transform_sync::{
    SpawnSyncedSystem, SyncTarget, SyncTargets, SyncedInstance, SyncedTransform,
    TransformSyncSystem,
};

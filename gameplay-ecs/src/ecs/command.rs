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
//! Deferred structural changes
//!
//! Systems never change the store's structure while they iterate it. They
//! record [`Command`]s into a per-worker [`CommandSegment`] instead; at the
//! stage barrier the scheduler collects the segments into a
//! [`CommandBuffer`] and plays them back on the main thread.
//!
//! # Ordering
//!
//! Every entry is keyed by `(origin, sequence)`. The origin is the index of
//! the work item that recorded it, so it does not depend on which thread ran
//! the work item. Playback walks segments in ascending origin and entries in
//! ascending sequence, which makes the resulting store identical across runs
//! with the same inputs.
//!
//! # Pending entities
//!
//! Creating or instantiating an entity through a segment returns a
//! [`PendingEntity`]. Later commands of the same buffer may target it; the
//! placeholder is resolved to the real handle during playback.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};

use crate::ecs::component::{Component, ComponentType};
use crate::ecs::{Entity, World};
use crate::error::{EcsError, Result};

/// Placeholder for an entity created by a not yet applied command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingEntity {
    origin: u32,
    local: u32,
}

impl PendingEntity {
    /// Segment that recorded the creation
    pub fn origin(&self) -> u32 {
        self.origin
    }

    /// Creation index within the segment
    pub fn local(&self) -> u32 {
        self.local
    }
}

/// The entity a command applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTarget {
    /// A live entity
    Entity(Entity),
    /// An entity created earlier in the same buffer
    Pending(PendingEntity),
}

impl From<Entity> for CommandTarget {
    fn from(entity: Entity) -> Self {
        CommandTarget::Entity(entity)
    }
}

impl From<PendingEntity> for CommandTarget {
    fn from(pending: PendingEntity) -> Self {
        CommandTarget::Pending(pending)
    }
}

/// A type-erased component value waiting to be inserted
pub trait ComponentValue: Send {
    /// Type of the boxed value
    fn component_type(&self) -> ComponentType;

    /// Attach the value to `entity`
    fn insert_into(self: Box<Self>, world: &mut World, entity: Entity) -> Result<()>;
}

struct Value<T>(T);

impl<T: Component> ComponentValue for Value<T> {
    fn component_type(&self) -> ComponentType {
        ComponentType::of::<T>()
    }

    fn insert_into(self: Box<Self>, world: &mut World, entity: Entity) -> Result<()> {
        world.add_component(entity, self.0)
    }
}

/// A deferred structural change
pub enum Command {
    /// Create an empty entity
    CreateEntity {
        /// Placeholder for the new entity
        pending: PendingEntity,
    },
    /// Copy a prefab
    Instantiate {
        /// Template entity
        prefab: Entity,
        /// Placeholder for the copy
        pending: PendingEntity,
        /// Seed for the copy's generators, see [`Component::reseed`]
        seed: Option<u32>,
    },
    /// Attach or overwrite a component
    AddComponent {
        /// Receiving entity
        target: CommandTarget,
        /// Value to attach
        value: Box<dyn ComponentValue>,
    },
    /// Detach a component
    RemoveComponent {
        /// Entity to modify
        target: CommandTarget,
        /// Component type to drop
        component: ComponentType,
    },
    /// Destroy an entity
    DestroyEntity {
        /// Entity to destroy
        target: CommandTarget,
    },
}

impl Command {
    /// An `AddComponent` command for a concrete value
    pub fn add_component<T: Component>(target: impl Into<CommandTarget>, value: T) -> Self {
        Command::AddComponent {
            target: target.into(),
            value: Box::new(Value(value)),
        }
    }

    /// A `RemoveComponent` command for type `T`
    pub fn remove_component<T: Component>(target: impl Into<CommandTarget>) -> Self {
        Command::RemoveComponent {
            target: target.into(),
            component: ComponentType::of::<T>(),
        }
    }

    fn shift_pending(&mut self, origin: u32, offset: u32) {
        let shift = |pending: &mut PendingEntity| {
            if pending.origin == origin {
                pending.local += offset;
            }
        };
        match self {
            Command::CreateEntity { pending } | Command::Instantiate { pending, .. } => shift(pending),
            Command::AddComponent { target, .. }
            | Command::RemoveComponent { target, .. }
            | Command::DestroyEntity { target } => {
                if let CommandTarget::Pending(pending) = target {
                    shift(pending);
                }
            }
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::CreateEntity { pending } => {
                f.debug_struct("CreateEntity").field("pending", pending).finish()
            }
            Command::Instantiate { prefab, pending, seed } => f
                .debug_struct("Instantiate")
                .field("prefab", prefab)
                .field("pending", pending)
                .field("seed", seed)
                .finish(),
            Command::AddComponent { target, value } => f
                .debug_struct("AddComponent")
                .field("target", target)
                .field("component", &value.component_type())
                .finish(),
            Command::RemoveComponent { target, component } => f
                .debug_struct("RemoveComponent")
                .field("target", target)
                .field("component", component)
                .finish(),
            Command::DestroyEntity { target } => {
                f.debug_struct("DestroyEntity").field("target", target).finish()
            }
        }
    }
}

/// A command tagged with its playback key
#[derive(Debug)]
pub struct CommandEntry {
    origin: u32,
    sequence: u64,
    command: Command,
}

impl CommandEntry {
    /// Segment that recorded the entry
    pub fn origin(&self) -> u32 {
        self.origin
    }

    /// Position within the segment
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The recorded command
    pub fn command(&self) -> &Command {
        &self.command
    }
}

/// Commands recorded by one work item
///
/// Sequence numbers increase strictly in recording order.
#[derive(Debug)]
pub struct CommandSegment {
    origin: u32,
    next_sequence: u64,
    next_local: u32,
    entries: Vec<CommandEntry>,
}

impl CommandSegment {
    /// An empty segment for the given origin
    pub fn new(origin: u32) -> Self {
        Self::with_buffer(origin, Vec::new())
    }

    pub(crate) fn with_buffer(origin: u32, mut buffer: Vec<CommandEntry>) -> Self {
        buffer.clear();
        CommandSegment {
            origin,
            next_sequence: 0,
            next_local: 0,
            entries: buffer,
        }
    }

    /// The origin stamped onto every entry
    pub fn origin(&self) -> u32 {
        self.origin
    }

    /// Recorded entries in sequence order
    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a command, returning its sequence number
    pub fn record(&mut self, command: Command) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push(CommandEntry {
            origin: self.origin,
            sequence,
            command,
        });
        sequence
    }

    fn next_pending(&mut self) -> PendingEntity {
        let pending = PendingEntity {
            origin: self.origin,
            local: self.next_local,
        };
        self.next_local += 1;
        pending
    }

    /// Defer creation of an empty entity
    pub fn create_entity(&mut self) -> PendingEntity {
        let pending = self.next_pending();
        self.record(Command::CreateEntity { pending });
        pending
    }

    /// Defer instantiation of a prefab
    pub fn instantiate(&mut self, prefab: Entity) -> PendingEntity {
        let pending = self.next_pending();
        self.record(Command::Instantiate {
            prefab,
            pending,
            seed: None,
        });
        pending
    }

    /// Defer instantiation of a prefab whose copy gets its own random streams
    pub fn instantiate_seeded(&mut self, prefab: Entity, seed: u32) -> PendingEntity {
        let pending = self.next_pending();
        self.record(Command::Instantiate {
            prefab,
            pending,
            seed: Some(seed),
        });
        pending
    }

    /// Defer attaching a component
    pub fn add_component<T: Component>(&mut self, target: impl Into<CommandTarget>, value: T) {
        self.record(Command::add_component(target, value));
    }

    /// Defer detaching a component
    pub fn remove_component<T: Component>(&mut self, target: impl Into<CommandTarget>) {
        self.record(Command::remove_component::<T>(target));
    }

    /// Defer destroying an entity
    pub fn destroy_entity(&mut self, target: impl Into<CommandTarget>) {
        self.record(Command::DestroyEntity {
            target: target.into(),
        });
    }

    /// Append all entries of another segment with the same origin
    fn append(&mut self, other: CommandSegment) {
        let offset = self.next_local;
        for mut entry in other.entries {
            entry.command.shift_pending(self.origin, offset);
            self.record(entry.command);
        }
        self.next_local += other.next_local;
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.next_sequence = 0;
        self.next_local = 0;
    }

    pub(crate) fn into_buffer(self) -> Vec<CommandEntry> {
        self.entries
    }
}

/// Outcome of a [`CommandBuffer::playback`]
#[derive(Debug, Default)]
pub struct PlaybackReport {
    /// Entries applied successfully
    pub applied: usize,
    /// Entries that failed and were skipped
    pub failures: Vec<EcsError>,
    /// Entities created by the playback, in playback order
    pub created: Vec<Entity>,
}

/// Ordered collection of command segments
#[derive(Debug, Default)]
pub struct CommandBuffer {
    // Sorted by origin, at most one segment per origin
    segments: Vec<CommandSegment>,
}

impl CommandBuffer {
    /// An empty buffer
    pub fn new() -> Self {
        CommandBuffer::default()
    }

    /// A buffer with one empty segment per worker, origins `0..workers`
    pub fn with_workers(workers: u32) -> Self {
        CommandBuffer {
            segments: (0..workers).map(CommandSegment::new).collect(),
        }
    }

    /// The segment for `origin`, created on first use
    pub fn segment(&mut self, origin: u32) -> &mut CommandSegment {
        let index = match self.segments.binary_search_by_key(&origin, |s| s.origin) {
            Ok(index) => index,
            Err(index) => {
                self.segments.insert(index, CommandSegment::new(origin));
                index
            }
        };
        &mut self.segments[index]
    }

    /// All segments in origin order
    pub fn segments_mut(&mut self) -> &mut [CommandSegment] {
        &mut self.segments
    }

    /// Add a recorded segment
    ///
    /// A segment whose origin is already present is appended after the
    /// existing entries and renumbered.
    pub fn push_segment(&mut self, segment: CommandSegment) {
        match self.segments.binary_search_by_key(&segment.origin, |s| s.origin) {
            Ok(index) => self.segments[index].append(segment),
            Err(index) => self.segments.insert(index, segment),
        }
    }

    /// Total number of recorded entries
    pub fn len(&self) -> usize {
        self.segments.iter().map(CommandSegment::len).sum()
    }

    /// Check if no entries were recorded
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(CommandSegment::is_empty)
    }

    /// Entries in playback order
    pub fn entries(&self) -> impl Iterator<Item = &CommandEntry> {
        self.segments.iter().flat_map(|segment| segment.entries.iter())
    }

    /// Apply every entry to `world` in playback order and empty the buffer
    ///
    /// An entry that fails locally (stale entity, missing component) is
    /// logged, reported and skipped. A capacity failure stops playback: the
    /// remaining entries are discarded and the error is returned.
    pub fn playback(&mut self, world: &mut World) -> Result<PlaybackReport> {
        let mut report = PlaybackReport::default();
        let mut pending: HashMap<PendingEntity, Entity> = HashMap::new();
        let mut fatal = None;

        'segments: for segment in &mut self.segments {
            for entry in segment.entries.drain(..) {
                let (origin, sequence) = (entry.origin, entry.sequence);
                match apply(entry.command, world, &mut pending, &mut report.created) {
                    Ok(()) => report.applied += 1,
                    Err(err) if err.is_fatal() => {
                        fatal = Some(err);
                        break 'segments;
                    }
                    Err(err) => {
                        warn!("command {}:{} failed: {}", origin, sequence, err);
                        report.failures.push(EcsError::PlaybackEntryFailure {
                            origin,
                            sequence,
                            source: Box::new(err),
                        });
                    }
                }
            }
        }

        for segment in &mut self.segments {
            segment.reset();
        }
        if let Some(err) = fatal {
            return Err(err);
        }
        debug!(
            "played back {} commands ({} failed)",
            report.applied,
            report.failures.len()
        );
        Ok(report)
    }

    /// Take the segment buffers for reuse
    pub(crate) fn into_buffers(self) -> impl Iterator<Item = Vec<CommandEntry>> {
        self.segments.into_iter().map(CommandSegment::into_buffer)
    }
}

fn resolve(target: CommandTarget, pending: &HashMap<PendingEntity, Entity>) -> Result<Entity> {
    match target {
        CommandTarget::Entity(entity) => Ok(entity),
        CommandTarget::Pending(p) => pending.get(&p).copied().ok_or(EcsError::UnresolvedPending {
            origin: p.origin,
            local: p.local,
        }),
    }
}

fn apply(
    command: Command,
    world: &mut World,
    pending: &mut HashMap<PendingEntity, Entity>,
    created: &mut Vec<Entity>,
) -> Result<()> {
    match command {
        Command::CreateEntity { pending: p } => {
            let entity = world.create_entity()?;
            pending.insert(p, entity);
            created.push(entity);
        }
        Command::Instantiate {
            prefab,
            pending: p,
            seed,
        } => {
            let entity = match seed {
                Some(seed) => world.instantiate_seeded(prefab, seed)?,
                None => world.instantiate(prefab)?,
            };
            pending.insert(p, entity);
            created.push(entity);
        }
        Command::AddComponent { target, value } => {
            let entity = resolve(target, pending)?;
            value.insert_into(world, entity)?;
        }
        Command::RemoveComponent { target, component } => {
            let entity = resolve(target, pending)?;
            remove_by_type(world, entity, component.id(), component.name())?;
        }
        Command::DestroyEntity { target } => {
            let entity = resolve(target, pending)?;
            world.destroy_entity(entity)?;
        }
    }
    Ok(())
}

fn remove_by_type(world: &mut World, entity: Entity, id: TypeId, name: &'static str) -> Result<()> {
    if world.remove_component_by_id(entity, id)? {
        Ok(())
    } else {
        Err(EcsError::MissingComponent {
            entity,
            component: name,
        })
    }
}

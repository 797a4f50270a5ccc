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
//! Rigid-body state and the physics capabilities gameplay systems rely on
//!
//! Collision detection and velocity integration happen elsewhere. Gameplay
//! systems only push impulses into [`PhysicsVelocity`] and ask the world for
//! raycasts, both through a [`PhysicsBackend`] handed to every update.

use crate::ecs::Component;
use crate::math::Float3;

/// Linear and angular velocity of a rigid body
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhysicsVelocity {
    /// World-space linear velocity
    pub linear: Float3,
    /// Angular velocity around the body's inertia axes
    pub angular: Float3,
}

impl Component for PhysicsVelocity {}

/// Inverse mass properties of a rigid body
///
/// Zero entries make the body immovable along that quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsMass {
    /// Reciprocal of the mass
    pub inverse_mass: f32,
    /// Reciprocal of the diagonal inertia tensor
    pub inverse_inertia: Float3,
}

impl PhysicsMass {
    /// Mass properties of a solid body
    ///
    /// Non-positive values produce an immovable body.
    pub fn new(mass: f32, inertia: Float3) -> Self {
        let recip = |v: f32| if v > 0.0 { 1.0 / v } else { 0.0 };
        PhysicsMass {
            inverse_mass: recip(mass),
            inverse_inertia: Float3::new(recip(inertia.x), recip(inertia.y), recip(inertia.z)),
        }
    }

    /// A body that ignores all impulses
    pub fn immovable() -> Self {
        PhysicsMass {
            inverse_mass: 0.0,
            inverse_inertia: Float3::ZERO,
        }
    }

    /// Mass properties of the same body uniformly scaled
    ///
    /// Mass grows with volume and inertia with the fifth power of scale.
    pub fn scaled(&self, scale: f32) -> Self {
        if scale == 1.0 || scale <= 0.0 {
            return *self;
        }
        let s3 = scale * scale * scale;
        PhysicsMass {
            inverse_mass: self.inverse_mass / s3,
            inverse_inertia: self.inverse_inertia / (s3 * scale * scale),
        }
    }
}

impl Default for PhysicsMass {
    fn default() -> Self {
        PhysicsMass::new(1.0, Float3::ONE)
    }
}

impl Component for PhysicsMass {}

/// Collision layer masks for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    /// Layers the query belongs to
    pub belongs_to: u32,
    /// Layers the query can hit
    pub collides_with: u32,
}

impl CollisionFilter {
    /// Filter that hits every layer
    pub const ALL: CollisionFilter = CollisionFilter {
        belongs_to: u32::MAX,
        collides_with: u32::MAX,
    };

    /// Check if a body on `layers` is hit by this filter
    pub fn hits(&self, layers: u32) -> bool {
        self.collides_with & layers != 0
    }
}

impl Default for CollisionFilter {
    fn default() -> Self {
        CollisionFilter::ALL
    }
}

/// Physics capabilities available to gameplay systems
///
/// Implementations must be shareable across worker threads. The impulse
/// methods default to the usual rigid-body response.
pub trait PhysicsBackend: Send + Sync {
    /// Change linear velocity by `impulse` for a body uniformly scaled by `scale`
    fn apply_linear_impulse(
        &self,
        velocity: &mut PhysicsVelocity,
        mass: &PhysicsMass,
        scale: f32,
        impulse: Float3,
    ) {
        velocity.linear += impulse * mass.scaled(scale).inverse_mass;
    }

    /// Change angular velocity by `impulse`, expressed in inertia space
    fn apply_angular_impulse(&self, velocity: &mut PhysicsVelocity, mass: &PhysicsMass, impulse: Float3) {
        velocity.angular += impulse.scale(mass.inverse_inertia);
    }

    /// Check if the segment from `start` to `end` hits anything
    fn cast_ray(&self, start: Float3, end: Float3, filter: CollisionFilter) -> bool;
}

/// A backend for worlds without static geometry
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObstacles;

impl PhysicsBackend for NoObstacles {
    fn cast_ray(&self, _start: Float3, _end: Float3, _filter: CollisionFilter) -> bool {
        false
    }
}

/// A static sphere obstacle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Sphere center
    pub center: Float3,
    /// Sphere radius
    pub radius: f32,
    /// Collision layers of the sphere
    pub layers: u32,
}

/// A backend whose only geometry is a set of static spheres
#[derive(Debug, Clone, Default)]
pub struct SphereObstacles {
    spheres: Vec<Sphere>,
}

impl SphereObstacles {
    /// Create an empty obstacle set
    pub fn new() -> Self {
        SphereObstacles::default()
    }

    /// Add a sphere on every layer
    pub fn with_sphere(mut self, center: Float3, radius: f32) -> Self {
        self.spheres.push(Sphere {
            center,
            radius,
            layers: u32::MAX,
        });
        self
    }

    /// Add a sphere
    pub fn push(&mut self, sphere: Sphere) {
        self.spheres.push(sphere);
    }

    /// All obstacles
    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }
}

fn segment_hits_sphere(start: Float3, end: Float3, sphere: &Sphere) -> bool {
    let d = end - start;
    let f = start - sphere.center;
    let r2 = sphere.radius * sphere.radius;
    if f.dot(f) <= r2 {
        return true;
    }
    let a = d.dot(d);
    if a <= f32::EPSILON {
        return false;
    }
    // Closest point of the segment to the center
    let t = (-f.dot(d) / a).clamp(0.0, 1.0);
    let closest = f + d * t;
    closest.dot(closest) <= r2
}

impl PhysicsBackend for SphereObstacles {
    fn cast_ray(&self, start: Float3, end: Float3, filter: CollisionFilter) -> bool {
        self.spheres
            .iter()
            .filter(|sphere| filter.hits(sphere.layers))
            .any(|sphere| segment_hits_sphere(start, end, sphere))
    }
}

/// Obstacle avoidance settings for steering systems
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Avoidance {
    /// How far ahead to probe
    pub look_ahead: f32,
    /// Layers that count as obstacles
    pub filter: CollisionFilter,
}

impl Avoidance {
    /// Probe `look_ahead` units against every layer
    pub fn new(look_ahead: f32) -> Self {
        Avoidance {
            look_ahead,
            filter: CollisionFilter::ALL,
        }
    }

    /// Restrict the probe to some layers
    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Turn a movement vector around if an obstacle lies ahead
///
/// Probes from `origin` along `movement` for `look_ahead` units. On a hit the
/// exact negation of `movement` is returned, otherwise `movement` unchanged.
pub fn steer_clear(physics: &dyn PhysicsBackend, origin: Float3, movement: Float3, avoidance: &Avoidance) -> Float3 {
    let direction = movement.normalize_or_zero();
    if direction == Float3::ZERO {
        return movement;
    }
    let end = origin + direction * avoidance.look_ahead;
    if physics.cast_ray(origin, end, avoidance.filter) {
        -movement
    } else {
        movement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_impulse() {
        let backend = NoObstacles;
        let mut velocity = PhysicsVelocity::default();
        let mass = PhysicsMass::new(2.0, Float3::ONE);

        backend.apply_linear_impulse(&mut velocity, &mass, 1.0, Float3::new(4.0, 0.0, 0.0));
        assert_eq!(velocity.linear, Float3::new(2.0, 0.0, 0.0));

        // Doubling the scale makes the body eight times heavier
        backend.apply_linear_impulse(&mut velocity, &mass, 2.0, Float3::new(16.0, 0.0, 0.0));
        assert_eq!(velocity.linear, Float3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn test_angular_impulse_respects_frozen_axes() {
        let backend = NoObstacles;
        let mut velocity = PhysicsVelocity::default();
        let mut mass = PhysicsMass::default();
        mass.inverse_inertia.x = 0.0;

        backend.apply_angular_impulse(&mut velocity, &mass, Float3::ONE);
        assert_eq!(velocity.angular, Float3::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn test_immovable_body() {
        let backend = NoObstacles;
        let mut velocity = PhysicsVelocity::default();
        backend.apply_linear_impulse(&mut velocity, &PhysicsMass::immovable(), 1.0, Float3::ONE);
        assert_eq!(velocity.linear, Float3::ZERO);
    }

    #[test]
    fn test_sphere_raycast() {
        let obstacles = SphereObstacles::new().with_sphere(Float3::new(0.0, 0.0, 5.0), 1.0);
        let filter = CollisionFilter::ALL;
        assert!(obstacles.cast_ray(Float3::ZERO, Float3::new(0.0, 0.0, 10.0), filter));
        assert!(!obstacles.cast_ray(Float3::ZERO, Float3::new(0.0, 0.0, 3.0), filter));
        assert!(!obstacles.cast_ray(Float3::ZERO, Float3::new(10.0, 0.0, 0.0), filter));

        let blind = CollisionFilter {
            belongs_to: 1,
            collides_with: 0,
        };
        assert!(!obstacles.cast_ray(Float3::ZERO, Float3::new(0.0, 0.0, 10.0), blind));
    }

    #[test]
    fn test_steer_clear_negates_on_hit() {
        let obstacles = SphereObstacles::new().with_sphere(Float3::new(0.0, 0.0, 2.0), 0.5);
        let avoidance = Avoidance::new(5.0);
        let movement = Float3::new(0.0, 0.0, 3.0);

        assert_eq!(steer_clear(&obstacles, Float3::ZERO, movement, &avoidance), -movement);
        assert_eq!(steer_clear(&NoObstacles, Float3::ZERO, movement, &avoidance), movement);
        assert_eq!(steer_clear(&obstacles, Float3::ZERO, Float3::ZERO, &avoidance), Float3::ZERO);
    }
}

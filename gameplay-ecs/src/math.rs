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
//! Vector and rotation math used by gameplay components
//!
//! Pure value types, single precision, left-handed with +Z forward and +Y up.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// 3-component single-precision vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Float3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Float3 {
    /// All components zero
    pub const ZERO: Float3 = Float3::new(0.0, 0.0, 0.0);
    /// All components one
    pub const ONE: Float3 = Float3::new(1.0, 1.0, 1.0);
    /// World up (+Y)
    pub const UP: Float3 = Float3::new(0.0, 1.0, 0.0);
    /// World forward (+Z)
    pub const FORWARD: Float3 = Float3::new(0.0, 0.0, 1.0);

    /// Create a vector from its components
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Float3 { x, y, z }
    }

    /// Create a vector with every component set to `v`
    pub const fn splat(v: f32) -> Self {
        Float3::new(v, v, v)
    }

    /// Dot product
    pub fn dot(self, other: Float3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    pub fn cross(self, other: Float3) -> Float3 {
        Float3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Euclidean length
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero-length vector
    pub fn normalize_or_zero(self) -> Float3 {
        let len = self.length();
        if len > f32::EPSILON && len.is_finite() {
            self / len
        } else {
            Float3::ZERO
        }
    }

    /// Component-wise product
    pub fn scale(self, other: Float3) -> Float3 {
        Float3::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    /// Check if all components are finite
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Component-wise approximate equality
    pub fn abs_diff_eq(self, other: Float3, epsilon: f32) -> bool {
        (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.z - other.z).abs() <= epsilon
    }
}

impl From<[f32; 3]> for Float3 {
    fn from(v: [f32; 3]) -> Self {
        Float3::new(v[0], v[1], v[2])
    }
}

impl Add for Float3 {
    type Output = Float3;
    fn add(self, rhs: Float3) -> Float3 {
        Float3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Float3 {
    fn add_assign(&mut self, rhs: Float3) {
        *self = *self + rhs;
    }
}

impl Sub for Float3 {
    type Output = Float3;
    fn sub(self, rhs: Float3) -> Float3 {
        Float3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Float3 {
    fn sub_assign(&mut self, rhs: Float3) {
        *self = *self - rhs;
    }
}

impl Mul<f32> for Float3 {
    type Output = Float3;
    fn mul(self, rhs: f32) -> Float3 {
        Float3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Div<f32> for Float3 {
    type Output = Float3;
    fn div(self, rhs: f32) -> Float3 {
        Float3::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Float3 {
    type Output = Float3;
    fn neg(self) -> Float3 {
        Float3::new(-self.x, -self.y, -self.z)
    }
}

/// Unit quaternion rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    /// Vector part x
    pub x: f32,
    /// Vector part y
    pub y: f32,
    /// Vector part z
    pub z: f32,
    /// Scalar part
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Quaternion::IDENTITY
    }
}

impl Quaternion {
    /// No rotation
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Rotation of `angle` radians around `axis`
    pub fn from_axis_angle(axis: Float3, angle: f32) -> Self {
        let axis = axis.normalize_or_zero();
        let (sin, cos) = (angle * 0.5).sin_cos();
        Quaternion {
            x: axis.x * sin,
            y: axis.y * sin,
            z: axis.z * sin,
            w: cos,
        }
    }

    /// Rotation around the world up axis
    pub fn from_yaw(angle: f32) -> Self {
        Self::from_axis_angle(Float3::UP, angle)
    }

    /// Rotate a vector
    pub fn rotate(self, v: Float3) -> Float3 {
        // v' = v + 2w(q x v) + 2(q x (q x v))
        let q = Float3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }
}

impl std::ops::Mul for Quaternion {
    type Output = Quaternion;
    fn mul(self, rhs: Quaternion) -> Quaternion {
        Quaternion {
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        }
    }
}

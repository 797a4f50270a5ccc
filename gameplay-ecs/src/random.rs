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
//! Seedable random state embedded in components
//!
//! [`Random`] is a 32-bit xorshift generator small enough to live inside a
//! component and advance deterministically with every call. Each entity
//! receives its own generator when it is created; seeds come from a
//! [`SeedSource`], either an explicit one (reproducible runs) or the
//! process-wide [`SeedSource::global`].
//!
//! The state is never zero: zero seeds are remapped at construction, so
//! there is no "uninitialised" sentinel to check for at update time.
//!
//! Not cryptographically secure.

use crate::math::Float3;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// xorshift32 generator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Random {
    state: u32,
}

fn wang_hash(mut n: u32) -> u32 {
    n = (n ^ 61) ^ (n >> 16);
    n = n.wrapping_mul(9);
    n ^= n >> 4;
    n = n.wrapping_mul(0x27d4_eb2d);
    n ^ (n >> 15)
}

impl Random {
    /// Create a generator from a seed
    ///
    /// A zero seed is replaced by a hashed non-zero state.
    pub fn new(seed: u32) -> Self {
        let state = if seed == 0 { Self::hashed(0) } else { seed };
        let mut random = Random { state };
        random.next_state();
        random
    }

    /// Create a generator for the `index`-th entity of a batch
    ///
    /// Consecutive indices give well-separated streams.
    pub fn from_index(index: u32) -> Self {
        Self::new(Self::hashed(index))
    }

    fn hashed(index: u32) -> u32 {
        wang_hash(index.wrapping_add(62)).max(1)
    }

    /// Current raw state
    pub fn state(&self) -> u32 {
        self.state
    }

    fn next_state(&mut self) -> u32 {
        let t = self.state;
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        t
    }

    /// Next uniformly distributed `u32`
    pub fn next_u32(&mut self) -> u32 {
        self.next_state().wrapping_sub(1)
    }

    /// Next float in `[0, 1)`
    pub fn next_float(&mut self) -> f32 {
        f32::from_bits(0x3f80_0000 | (self.next_state() >> 9)) - 1.0
    }

    /// Next float in `[min, max)`
    pub fn next_float_range(&mut self, min: f32, max: f32) -> f32 {
        self.next_float() * (max - min) + min
    }

    /// Next vector with each component in `[min, max)`
    pub fn next_float3(&mut self, min: Float3, max: Float3) -> Float3 {
        let x = self.next_float_range(min.x, max.x);
        let y = self.next_float_range(min.y, max.y);
        let z = self.next_float_range(min.z, max.z);
        Float3::new(x, y, z)
    }
}

/// Source of per-entity seeds
///
/// Seeds are derived with splitmix64 from an atomic counter, so a source can
/// be shared between threads and two sources built from the same seed hand
/// out the same sequence.
#[derive(Debug)]
pub struct SeedSource {
    counter: AtomicU64,
}

const SPLITMIX_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

impl SeedSource {
    /// Create a source with an explicit seed
    pub fn new(seed: u64) -> Self {
        SeedSource {
            counter: AtomicU64::new(seed),
        }
    }

    /// Process-wide source, seeded from the system clock on first use
    pub fn global() -> &'static SeedSource {
        static GLOBAL: OnceLock<SeedSource> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(SPLITMIX_GAMMA);
            SeedSource::new(nanos)
        })
    }

    /// Next non-zero 32-bit seed
    pub fn next_seed(&self) -> u32 {
        loop {
            let mut z = self
                .counter
                .fetch_add(SPLITMIX_GAMMA, Ordering::Relaxed)
                .wrapping_add(SPLITMIX_GAMMA);
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^= z >> 31;
            let seed = (z >> 32) as u32;
            if seed != 0 {
                return seed;
            }
        }
    }

    /// A freshly seeded generator
    pub fn next_random(&self) -> Random {
        Random::new(self.next_seed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = Random::new(1234);
        let mut b = Random::new(1234);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_zero_seed_is_remapped() {
        let random = Random::new(0);
        assert_ne!(random.state(), 0);
    }

    #[test]
    fn test_float_range() {
        let mut random = Random::new(7);
        for _ in 0..1000 {
            let f = random.next_float();
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn test_float3_within_bounds() {
        let mut random = Random::from_index(3);
        let min = Float3::new(-1.0, 0.0, 10.0);
        let max = Float3::new(1.0, 0.5, 20.0);
        for _ in 0..1000 {
            let v = random.next_float3(min, max);
            assert!(v.x >= min.x && v.x <= max.x);
            assert!(v.y >= min.y && v.y <= max.y);
            assert!(v.z >= min.z && v.z <= max.z);
        }
    }

    #[test]
    fn test_seed_source_reproducible() {
        let a = SeedSource::new(99);
        let b = SeedSource::new(99);
        let seeds_a: Vec<u32> = (0..16).map(|_| a.next_seed()).collect();
        let seeds_b: Vec<u32> = (0..16).map(|_| b.next_seed()).collect();
        assert_eq!(seeds_a, seeds_b);
        assert!(seeds_a.iter().all(|&s| s != 0));
    }

    #[test]
    fn test_global_source_hands_out_distinct_seeds() {
        let source = SeedSource::global();
        assert_ne!(source.next_seed(), source.next_seed());
    }
}

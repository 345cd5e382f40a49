//! The agent store.
//!
//! Agents live in two parallel arrays. Agent `i` is whatever sits in slot `i`
//! of both; there is no separate identifier. Every step rewrites both arrays
//! in place, slot for slot.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, SimulationError};

/// Structure-of-arrays storage for agent positions and velocities.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentStore {
    /// Position of agent `i` in slot `i`.
    pub positions: Vec<Vec3>,
    /// Velocity of agent `i` in slot `i`.
    pub velocities: Vec<Vec3>,
}

impl AgentStore {
    /// Build a store from matching position and velocity arrays.
    ///
    /// # Panics
    ///
    /// Panics if the arrays differ in length.
    pub fn from_parts(positions: Vec<Vec3>, velocities: Vec<Vec3>) -> Self {
        assert_eq!(
            positions.len(),
            velocities.len(),
            "positions and velocities must describe the same agents"
        );
        Self {
            positions,
            velocities,
        }
    }

    /// Spawn `count` agents uniformly inside `[-scene_scale, scene_scale)^3`
    /// with velocity components drawn from `[-initial_speed, initial_speed)`.
    ///
    /// The same seed always yields the same flock.
    pub fn random(count: usize, scene_scale: f32, initial_speed: f32, seed: u64) -> Result<Self> {
        let mut positions = allocate::<Vec3>("positions", count)?;
        let mut velocities = allocate::<Vec3>("velocities", count)?;

        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..count {
            positions.push(random_vec3(&mut rng, scene_scale));
            velocities.push(random_vec3(&mut rng, initial_speed));
        }

        Ok(Self {
            positions,
            velocities,
        })
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True when the store holds no agents.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position and velocity of agent `index`.
    pub fn get(&self, index: usize) -> (Vec3, Vec3) {
        (self.positions[index], self.velocities[index])
    }
}

fn random_vec3(rng: &mut StdRng, scale: f32) -> Vec3 {
    if scale == 0.0 {
        return Vec3::ZERO;
    }
    Vec3::new(
        rng.gen_range(-scale..scale),
        rng.gen_range(-scale..scale),
        rng.gen_range(-scale..scale),
    )
}

/// Reserve an empty buffer of exactly `len` elements, reporting failure
/// instead of aborting.
pub(crate) fn allocate<T>(buffer: &'static str, len: usize) -> Result<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| SimulationError::Allocation { buffer, len })?;
    Ok(data)
}

/// Allocate a buffer of `len` copies of `value`.
pub(crate) fn allocate_filled<T: Clone>(buffer: &'static str, len: usize, value: T) -> Result<Vec<T>> {
    let mut data = allocate(buffer, len)?;
    data.resize(len, value);
    Ok(data)
}

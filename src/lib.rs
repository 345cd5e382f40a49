//! # flock-grid
//!
//! Boid flocking for large populations, with three interchangeable neighbor
//! searches that produce the same flock.
//!
//! ## Quick Start
//!
//! ```
//! use flock_grid::prelude::*;
//!
//! let mut boids = Boids::new(
//!     SimulationConfig::new()
//!         .with_scene_scale(50.0)
//!         .with_rules(FlockingRules::default().with_separation(3.0, 0.1)),
//! );
//! boids.init_simulation(1_000, 128).unwrap();
//!
//! for _ in 0..10 {
//!     boids.step_simulation_coherent_grid(0.2);
//! }
//!
//! let mut positions = vec![0.0; 1_000 * 4];
//! let mut velocities = vec![0.0; 1_000 * 4];
//! boids.copy_boids_to_vbo(&mut positions, &mut velocities).unwrap();
//! boids.end_simulation();
//! ```
//!
//! ## Core Concepts
//!
//! ### Agents
//!
//! The flock is an [`AgentStore`]: a position array and a velocity array,
//! where agent `i` is slot `i` of both.
//!
//! ### Rules
//!
//! Every step each agent applies cohesion, separation and alignment over
//! the agents within the matching radius, then its speed is capped and it
//! moves. The volume wraps around on every axis.
//!
//! ### Step methods
//!
//! | Method | Neighbor search |
//! |--------|-----------------|
//! | [`Boids::step_simulation_naive`] | all pairs, `O(N²)` |
//! | [`Boids::step_simulation_scattered_grid`] | uniform grid, data read through the sorted index array |
//! | [`Boids::step_simulation_coherent_grid`] | uniform grid, data reordered into cell order first |
//!
//! ## Spatial Grid
//!
//! Cell width is `cell_width_factor` times the largest rule radius (default
//! 2, so the search touches 8 cells). Configure with
//! [`SimulationConfig::with_cell_width_factor`].

pub mod agents;
pub mod config;
mod error;
pub mod integrator;
pub mod perf;
pub mod reorder;
pub mod rules;
mod selftest;
mod simulation;
pub mod sort;
pub mod spatial;

pub use agents::AgentStore;
pub use config::{FlockingRules, SimulationConfig};
pub use error::{Result, SimulationError};
pub use simulation::{Boids, StepMethod};
pub use sort::CellTable;
pub use spatial::UniformGrid;

/// Common imports.
pub mod prelude {
    pub use crate::agents::AgentStore;
    pub use crate::config::{FlockingRules, SimulationConfig};
    pub use crate::error::{Result, SimulationError};
    pub use crate::simulation::{Boids, StepMethod};
    pub use glam::Vec3;
}

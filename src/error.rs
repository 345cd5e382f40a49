//! Error types for flock-grid.
//!
//! Configuration problems and allocation failures surface as
//! [`SimulationError`] from [`Boids::init_simulation`](crate::Boids::init_simulation).
//! Stepping an uninitialized simulation is a programmer error and panics
//! instead.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Errors that can occur while configuring or driving a simulation.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// The requested agent count was zero.
    #[error("Agent count must be positive, got {0}")]
    InvalidAgentCount(usize),

    /// The requested workgroup size was zero.
    #[error("Workgroup size must be positive, got {0}")]
    InvalidWorkgroupSize(usize),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The derived cell width cannot contain every rule radius.
    #[error("Cell width {cell_width} is smaller than the largest rule radius {max_radius}")]
    InvalidCellWidth {
        /// Derived cell width.
        cell_width: f32,
        /// Largest of the three rule radii.
        max_radius: f32,
    },

    /// The derived grid has more cells than the simulation will allocate.
    #[error("Grid of {cells} cells exceeds the limit of {limit}")]
    GridTooLarge {
        /// Requested number of cells.
        cells: u64,
        /// Allowed number of cells.
        limit: u64,
    },

    /// A simulation buffer could not be allocated.
    #[error("Failed to allocate {buffer} buffer of {len} elements")]
    Allocation {
        /// Name of the buffer.
        buffer: &'static str,
        /// Requested element count.
        len: usize,
    },

    /// `init_simulation` was called while the simulation was running.
    #[error("Simulation is already initialized; call end_simulation first")]
    AlreadyInitialized,

    /// A display buffer handed to `copy_boids_to_vbo` has the wrong length.
    #[error("Output buffer holds {actual} floats, expected {expected}")]
    OutputBufferSize {
        /// Expected number of `f32` values (4 per agent).
        expected: usize,
        /// Actual number of `f32` values.
        actual: usize,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

//! Simulation configuration.
//!
//! [`SimulationConfig`] holds everything that is fixed for the lifetime of a
//! run: the flocking rule parameters, the size of the simulation volume, the
//! speed limit, how wide grid cells are relative to the rule radii, and the
//! seed used to spawn the initial flock.
//!
//! Configure with method chaining:
//!
//! ```
//! use flock_grid::{FlockingRules, SimulationConfig};
//!
//! let config = SimulationConfig::new()
//!     .with_scene_scale(50.0)
//!     .with_max_speed(2.0)
//!     .with_rules(FlockingRules::default().with_separation(4.0, 0.2))
//!     .with_seed(7);
//! assert!(config.validate().is_ok());
//! ```
//!
//! or load the same fields from TOML with [`SimulationConfig::load`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};

/// Upper bound on the number of grid cells a simulation will allocate.
pub const MAX_GRID_CELLS: u64 = 1 << 24;

/// Radii and weights of the three flocking rules.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockingRules {
    /// Rule 1: neighbors closer than this pull the agent toward their centroid.
    pub cohesion_radius: f32,
    /// Rule 2: neighbors closer than this push the agent away.
    pub separation_radius: f32,
    /// Rule 3: neighbors closer than this contribute to the average velocity.
    pub alignment_radius: f32,
    /// Fraction of the way toward the centroid applied per step.
    pub cohesion_scale: f32,
    /// Weight of the summed separation vector.
    pub separation_scale: f32,
    /// Fraction of the way toward the average velocity applied per step.
    pub alignment_scale: f32,
}

impl Default for FlockingRules {
    fn default() -> Self {
        Self {
            cohesion_radius: 5.0,
            separation_radius: 3.0,
            alignment_radius: 5.0,
            cohesion_scale: 0.01,
            separation_scale: 0.1,
            alignment_scale: 0.1,
        }
    }
}

impl FlockingRules {
    /// Set cohesion radius and scale.
    pub fn with_cohesion(mut self, radius: f32, scale: f32) -> Self {
        self.cohesion_radius = radius;
        self.cohesion_scale = scale;
        self
    }

    /// Set separation radius and scale.
    pub fn with_separation(mut self, radius: f32, scale: f32) -> Self {
        self.separation_radius = radius;
        self.separation_scale = scale;
        self
    }

    /// Set alignment radius and scale.
    pub fn with_alignment(mut self, radius: f32, scale: f32) -> Self {
        self.alignment_radius = radius;
        self.alignment_scale = scale;
        self
    }

    /// Largest of the three rule radii; the neighbor search reaches this far.
    pub fn max_radius(&self) -> f32 {
        self.cohesion_radius
            .max(self.separation_radius)
            .max(self.alignment_radius)
    }

    fn validate(&self) -> Result<()> {
        let radii = [
            ("cohesion_radius", self.cohesion_radius),
            ("separation_radius", self.separation_radius),
            ("alignment_radius", self.alignment_radius),
        ];
        for (name, value) in radii {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimulationError::InvalidConfig(format!(
                    "{name} must be a positive finite number, got {value}"
                )));
            }
        }
        let scales = [
            ("cohesion_scale", self.cohesion_scale),
            ("separation_scale", self.separation_scale),
            ("alignment_scale", self.alignment_scale),
        ];
        for (name, value) in scales {
            if !value.is_finite() {
                return Err(SimulationError::InvalidConfig(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Parameters fixed for the lifetime of a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Half extent of the cubic volume `[-scene_scale, scene_scale)^3`.
    pub scene_scale: f32,
    /// Agents never move faster than this.
    pub max_speed: f32,
    /// Grid cell width as a multiple of [`FlockingRules::max_radius`].
    pub cell_width_factor: f32,
    /// Spawned velocity components are drawn from `[-initial_speed, initial_speed)`.
    pub initial_speed: f32,
    /// Seed for the initial flock.
    pub seed: u64,
    /// Flocking rule radii and weights.
    pub rules: FlockingRules,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            scene_scale: 100.0,
            max_speed: 1.0,
            cell_width_factor: 2.0,
            initial_speed: 1.0,
            seed: 0x00b0_1d5e,
            rules: FlockingRules::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the half extent of the simulation volume.
    pub fn with_scene_scale(mut self, scene_scale: f32) -> Self {
        self.scene_scale = scene_scale;
        self
    }

    /// Set the speed limit.
    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Set the cell width relative to the largest rule radius.
    ///
    /// A factor of 2 confines the search to 8 cells, a factor of 1 to 27.
    pub fn with_cell_width_factor(mut self, factor: f32) -> Self {
        self.cell_width_factor = factor;
        self
    }

    /// Set the bound on spawned velocity components.
    pub fn with_initial_speed(mut self, initial_speed: f32) -> Self {
        self.initial_speed = initial_speed;
        self
    }

    /// Set the spawn seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the flocking rules.
    pub fn with_rules(mut self, rules: FlockingRules) -> Self {
        self.rules = rules;
        self
    }

    /// Parse a configuration from TOML. Missing fields keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Full edge length of the simulation volume.
    pub fn extent(&self) -> f32 {
        self.scene_scale * 2.0
    }

    /// Cell width derived from the rule radii.
    pub fn cell_width(&self) -> f32 {
        self.rules.max_radius() * self.cell_width_factor
    }

    /// Check every value and the grid it implies.
    pub fn validate(&self) -> Result<()> {
        if !(self.scene_scale.is_finite() && self.scene_scale > 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "scene_scale must be a positive finite number, got {}",
                self.scene_scale
            )));
        }
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "max_speed must be a positive finite number, got {}",
                self.max_speed
            )));
        }
        if !(self.initial_speed.is_finite() && self.initial_speed >= 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "initial_speed must be a non-negative finite number, got {}",
                self.initial_speed
            )));
        }
        self.rules.validate()?;

        let max_radius = self.rules.max_radius();
        let cell_width = self.cell_width();
        if !(cell_width.is_finite() && cell_width >= max_radius) {
            return Err(SimulationError::InvalidCellWidth {
                cell_width,
                max_radius,
            });
        }

        let resolution = (self.extent() / cell_width).ceil().max(1.0) as u64;
        let cells = resolution.saturating_pow(3);
        if cells > MAX_GRID_CELLS {
            return Err(SimulationError::GridTooLarge {
                cells,
                limit: MAX_GRID_CELLS,
            });
        }
        Ok(())
    }
}

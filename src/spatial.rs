//! Uniform grid index.
//!
//! The simulation volume is tiled by cubic cells of a fixed width. A cell is
//! addressed by integer coordinates `(x, y, z)` flattened row-major as
//! `x + y * res + z * res * res`, so walking x innermost touches consecutive
//! cell ids.
//!
//! The cell width is at least the largest rule radius, so every neighbor an
//! agent can see lies in its own cell or an adjacent one. With a width of
//! twice the radius the search touches 8 cells; with a width equal to the
//! radius it touches up to 27.

use glam::{UVec3, Vec3};
use rayon::prelude::*;

use crate::config::SimulationConfig;

/// Fixed partition of the simulation volume into cubic cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformGrid {
    /// Corner of cell `(0, 0, 0)`.
    pub min_corner: Vec3,
    /// Edge length of one cell.
    pub cell_width: f32,
    /// Cells per axis (the grid is `resolution^3`).
    pub resolution: u32,
}

impl UniformGrid {
    /// Grid covering `[min_corner, min_corner + extent)^3`.
    pub fn new(min_corner: Vec3, extent: f32, cell_width: f32) -> Self {
        let resolution = (extent / cell_width).ceil().max(1.0) as u32;
        Self {
            min_corner,
            cell_width,
            resolution,
        }
    }

    /// Grid for a validated configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            Vec3::splat(-config.scene_scale),
            config.extent(),
            config.cell_width(),
        )
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        let res = self.resolution as usize;
        res * res * res
    }

    /// Integer coordinates of the cell containing `position`.
    ///
    /// Positions are kept inside the volume by the integrator; coordinates
    /// are clamped so float rounding at the far faces stays in bounds.
    #[inline]
    pub fn cell_coords(&self, position: Vec3) -> UVec3 {
        debug_assert!(position.is_finite(), "agent position is not finite");
        let max = (self.resolution - 1) as f32;
        let cell = ((position - self.min_corner) / self.cell_width)
            .floor()
            .clamp(Vec3::ZERO, Vec3::splat(max));
        cell.as_uvec3()
    }

    /// Row-major cell id of integer cell coordinates.
    #[inline]
    pub fn flatten(&self, coords: UVec3) -> u32 {
        coords.x + coords.y * self.resolution + coords.z * self.resolution * self.resolution
    }

    /// Cell id of the cell containing `position`.
    #[inline]
    pub fn cell_index(&self, position: Vec3) -> u32 {
        self.flatten(self.cell_coords(position))
    }

    /// Write the owning cell id of every agent into `cell_indices` and reset
    /// `agent_indices` to the identity.
    pub fn compute_indices(
        &self,
        positions: &[Vec3],
        cell_indices: &mut [u32],
        agent_indices: &mut [u32],
        workgroup_size: usize,
    ) {
        cell_indices
            .par_chunks_mut(workgroup_size)
            .zip(agent_indices.par_chunks_mut(workgroup_size))
            .enumerate()
            .for_each(|(group, (cells, agents))| {
                let base = group * workgroup_size;
                for (local, (cell, agent)) in cells.iter_mut().zip(agents.iter_mut()).enumerate() {
                    let i = base + local;
                    *cell = self.cell_index(positions[i]);
                    *agent = i as u32;
                }
            });
    }

    /// Cells that can hold an agent within `radius` of `position`, x innermost.
    pub fn neighborhood(&self, position: Vec3, radius: f32) -> Neighborhood {
        let lo = self.cell_coords(position - Vec3::splat(radius));
        let hi = self.cell_coords(position + Vec3::splat(radius));
        Neighborhood {
            resolution: self.resolution,
            lo,
            hi,
            next: Some(lo),
        }
    }
}

/// Iterator over the cell ids of a box of cells.
#[derive(Clone, Debug)]
pub struct Neighborhood {
    resolution: u32,
    lo: UVec3,
    hi: UVec3,
    next: Option<UVec3>,
}

impl Iterator for Neighborhood {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let current = self.next?;
        let res = self.resolution;

        let mut step = current;
        step.x += 1;
        if step.x > self.hi.x {
            step.x = self.lo.x;
            step.y += 1;
            if step.y > self.hi.y {
                step.y = self.lo.y;
                step.z += 1;
            }
        }
        self.next = (step.z <= self.hi.z).then_some(step);

        Some(current.x + current.y * res + current.z * res * res)
    }
}

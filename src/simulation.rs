//! Simulation lifecycle and the three step pipelines.
//!
//! A [`Boids`] is either uninitialized or running. [`Boids::init_simulation`]
//! allocates every buffer for the chosen agent count and grid;
//! [`Boids::end_simulation`] drops them again. Stepping, copying or ending an
//! uninitialized simulation is a programmer error and panics.
//!
//! Each step is a sequence of data-parallel phases. A phase returns only once
//! every agent has been processed, and no phase reads state that the same
//! phase writes:
//!
//! ```text
//! naive:      rules(all pairs) -> integrate
//! scattered:  cell ids -> sort -> cell table -> rules(grid, indirect) -> integrate
//! coherent:   cell ids -> sort -> cell table -> reorder -> rules(grid, direct)
//!             -> integrate -> scatter back
//! ```

use std::fmt;
use std::mem;
use std::str::FromStr;

use glam::Vec3;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::agents::{allocate_filled, AgentStore};
use crate::config::{FlockingRules, SimulationConfig};
use crate::error::{Result, SimulationError};
use crate::integrator::{next_position, next_velocity, Volume};
use crate::reorder;
use crate::rules::{coherent_velocity_change, naive_velocity_change, scattered_velocity_change};
use crate::selftest;
use crate::sort::{sort_by_cell, CellTable};
use crate::spatial::UniformGrid;

/// Neighbor search strategy used for a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepMethod {
    /// Every agent scans every other agent.
    Naive,
    /// Grid search, agent data fetched through the sorted index array.
    ScatteredGrid,
    /// Grid search over agent data reordered into cell order.
    CoherentGrid,
}

impl StepMethod {
    /// All methods, cheapest to describe first.
    pub const ALL: [StepMethod; 3] = [
        StepMethod::Naive,
        StepMethod::ScatteredGrid,
        StepMethod::CoherentGrid,
    ];

    /// Short lowercase name, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            StepMethod::Naive => "naive",
            StepMethod::ScatteredGrid => "scattered",
            StepMethod::CoherentGrid => "coherent",
        }
    }
}

impl fmt::Display for StepMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StepMethod {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "naive" => Ok(StepMethod::Naive),
            "scattered" | "scattered-grid" | "uniform" => Ok(StepMethod::ScatteredGrid),
            "coherent" | "coherent-grid" => Ok(StepMethod::CoherentGrid),
            other => Err(SimulationError::InvalidConfig(format!(
                "unknown step method '{other}', expected naive, scattered or coherent"
            ))),
        }
    }
}

/// Buffers owned by a running simulation.
struct Running {
    store: AgentStore,
    next_velocities: Vec<Vec3>,
    grid: UniformGrid,
    volume: Volume,
    cell_indices: Vec<u32>,
    agent_indices: Vec<u32>,
    sorted_cells: Vec<u32>,
    sorted_agents: Vec<u32>,
    cell_counts: Vec<u32>,
    cells: CellTable,
    coherent_positions: Vec<Vec3>,
    coherent_velocities: Vec<Vec3>,
    slot_of_agent: Vec<u32>,
    workgroup_size: usize,
    steps: u64,
}

impl Running {
    fn allocate(store: AgentStore, config: &SimulationConfig, workgroup_size: usize) -> Result<Self> {
        let n = store.len();
        let grid = UniformGrid::from_config(config);
        let cell_count = grid.cell_count();

        Ok(Self {
            next_velocities: allocate_filled("next velocities", n, Vec3::ZERO)?,
            grid,
            volume: Volume::centered(config.scene_scale),
            cell_indices: allocate_filled("cell indices", n, 0)?,
            agent_indices: allocate_filled("agent indices", n, 0)?,
            sorted_cells: allocate_filled("sorted cells", n, 0)?,
            sorted_agents: allocate_filled("sorted agents", n, 0)?,
            cell_counts: allocate_filled("cell counts", cell_count, 0)?,
            cells: CellTable::new(cell_count)?,
            coherent_positions: allocate_filled("coherent positions", n, Vec3::ZERO)?,
            coherent_velocities: allocate_filled("coherent velocities", n, Vec3::ZERO)?,
            slot_of_agent: allocate_filled("slot of agent", n, 0)?,
            store,
            workgroup_size,
            steps: 0,
        })
    }

    /// Cell ids, sort, and cell table for the current positions.
    fn bin_agents(&mut self) {
        self.grid.compute_indices(
            &self.store.positions,
            &mut self.cell_indices,
            &mut self.agent_indices,
            self.workgroup_size,
        );
        sort_by_cell(
            &self.cell_indices,
            &self.agent_indices,
            &mut self.cell_counts,
            &mut self.sorted_cells,
            &mut self.sorted_agents,
        );
        self.cells.rebuild(&self.cell_counts);
        debug!(
            step = self.steps,
            occupied_cells = self.cells.occupied_cells(),
            "binned agents"
        );
    }

    /// Move every agent by its new velocity, then make the new velocities
    /// current.
    fn advance_canonical(&mut self, dt: f32) {
        let wg = self.workgroup_size;
        let volume = self.volume;
        self.store
            .positions
            .par_chunks_mut(wg)
            .zip(self.next_velocities.par_chunks(wg))
            .for_each(|(positions, velocities)| {
                for (p, &v) in positions.iter_mut().zip(velocities) {
                    *p = next_position(*p, v, dt, &volume);
                }
            });
        mem::swap(&mut self.store.velocities, &mut self.next_velocities);
        self.steps += 1;
    }

    fn step_naive(&mut self, rules: &FlockingRules, max_speed: f32, dt: f32) {
        let wg = self.workgroup_size;
        let positions = &self.store.positions;
        let velocities = &self.store.velocities;

        self.next_velocities
            .par_chunks_mut(wg)
            .enumerate()
            .for_each(|(group, out)| {
                let base = group * wg;
                for (local, next) in out.iter_mut().enumerate() {
                    let i = base + local;
                    let delta = naive_velocity_change(rules, i, positions, velocities);
                    *next = next_velocity(velocities[i], delta, max_speed);
                }
            });

        self.advance_canonical(dt);
    }

    fn step_scattered(&mut self, rules: &FlockingRules, max_speed: f32, dt: f32) {
        self.bin_agents();

        let wg = self.workgroup_size;
        let grid = &self.grid;
        let cells = &self.cells;
        let sorted_agents = &self.sorted_agents;
        let positions = &self.store.positions;
        let velocities = &self.store.velocities;

        self.next_velocities
            .par_chunks_mut(wg)
            .enumerate()
            .for_each(|(group, out)| {
                let base = group * wg;
                for (local, next) in out.iter_mut().enumerate() {
                    let i = base + local;
                    let delta = scattered_velocity_change(
                        rules,
                        grid,
                        cells,
                        sorted_agents,
                        i,
                        positions,
                        velocities,
                    );
                    *next = next_velocity(velocities[i], delta, max_speed);
                }
            });

        self.advance_canonical(dt);
    }

    fn step_coherent(&mut self, rules: &FlockingRules, max_speed: f32, dt: f32) {
        self.bin_agents();

        let wg = self.workgroup_size;
        reorder::gather(&self.store.positions, &self.sorted_agents, &mut self.coherent_positions, wg);
        reorder::gather(&self.store.velocities, &self.sorted_agents, &mut self.coherent_velocities, wg);

        // next_velocities is indexed by sorted slot for the rest of this step
        let grid = &self.grid;
        let cells = &self.cells;
        let sorted_positions = &self.coherent_positions;
        let sorted_velocities = &self.coherent_velocities;
        self.next_velocities
            .par_chunks_mut(wg)
            .enumerate()
            .for_each(|(group, out)| {
                let base = group * wg;
                for (local, next) in out.iter_mut().enumerate() {
                    let slot = base + local;
                    let delta = coherent_velocity_change(
                        rules,
                        grid,
                        cells,
                        slot,
                        sorted_positions,
                        sorted_velocities,
                    );
                    *next = next_velocity(sorted_velocities[slot], delta, max_speed);
                }
            });

        let volume = self.volume;
        self.coherent_positions
            .par_chunks_mut(wg)
            .zip(self.next_velocities.par_chunks(wg))
            .for_each(|(positions, velocities)| {
                for (p, &v) in positions.iter_mut().zip(velocities) {
                    *p = next_position(*p, v, dt, &volume);
                }
            });

        reorder::invert(&self.sorted_agents, &mut self.slot_of_agent);
        reorder::scatter_back(&self.coherent_positions, &self.slot_of_agent, &mut self.store.positions, wg);
        reorder::scatter_back(&self.next_velocities, &self.slot_of_agent, &mut self.store.velocities, wg);
        self.steps += 1;
    }
}

/// A boid flock and everything needed to step it.
///
/// # Example
///
/// ```
/// use flock_grid::{Boids, SimulationConfig};
///
/// let mut boids = Boids::new(SimulationConfig::new().with_scene_scale(20.0));
/// boids.init_simulation(500, 64).unwrap();
/// boids.step_simulation_coherent_grid(0.2);
///
/// let mut positions = vec![0.0; 500 * 4];
/// let mut velocities = vec![0.0; 500 * 4];
/// boids.copy_boids_to_vbo(&mut positions, &mut velocities).unwrap();
/// boids.end_simulation();
/// ```
pub struct Boids {
    config: SimulationConfig,
    running: Option<Running>,
}

impl Default for Boids {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl Boids {
    /// Create an uninitialized simulation.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    /// The configuration this simulation was created with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// True between `init_simulation` and `end_simulation`.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawn `agent_count` agents from the configured seed and allocate all
    /// buffers. `workgroup_size` sets how many agents each parallel task
    /// handles; it never changes results.
    pub fn init_simulation(&mut self, agent_count: usize, workgroup_size: usize) -> Result<()> {
        if agent_count == 0 {
            return Err(SimulationError::InvalidAgentCount(agent_count));
        }
        self.check_startable(workgroup_size)?;

        let store = AgentStore::random(
            agent_count,
            self.config.scene_scale,
            self.config.initial_speed,
            self.config.seed,
        )?;
        self.start(store, workgroup_size)
    }

    /// Start from an explicit flock instead of a random one. Positions
    /// outside the volume are wrapped into it.
    pub fn init_simulation_with_agents(&mut self, mut store: AgentStore, workgroup_size: usize) -> Result<()> {
        if store.is_empty() {
            return Err(SimulationError::InvalidAgentCount(0));
        }
        check_agents(&store)?;
        self.check_startable(workgroup_size)?;

        let volume = Volume::centered(self.config.scene_scale);
        for p in &mut store.positions {
            *p = volume.wrap(*p);
        }
        self.start(store, workgroup_size)
    }

    fn check_startable(&self, workgroup_size: usize) -> Result<()> {
        if self.running.is_some() {
            return Err(SimulationError::AlreadyInitialized);
        }
        if workgroup_size == 0 {
            return Err(SimulationError::InvalidWorkgroupSize(workgroup_size));
        }
        self.config.validate()
    }

    fn start(&mut self, store: AgentStore, workgroup_size: usize) -> Result<()> {
        let agents = store.len();
        let running = Running::allocate(store, &self.config, workgroup_size)?;
        info!(
            agents,
            workgroup_size,
            resolution = running.grid.resolution,
            cell_width = running.grid.cell_width,
            cells = running.grid.cell_count(),
            "simulation initialized"
        );
        self.running = Some(running);
        Ok(())
    }

    fn running(&self, operation: &str) -> &Running {
        match &self.running {
            Some(running) => running,
            None => panic!("{operation} called while the simulation is not initialized"),
        }
    }

    fn running_mut(&mut self, operation: &str) -> &mut Running {
        match &mut self.running {
            Some(running) => running,
            None => panic!("{operation} called while the simulation is not initialized"),
        }
    }

    /// Advance one step of `dt` seconds scanning all pairs.
    ///
    /// # Panics
    ///
    /// Panics if the simulation is not initialized.
    pub fn step_simulation_naive(&mut self, dt: f32) {
        let rules = self.config.rules;
        let max_speed = self.config.max_speed;
        self.running_mut("step_simulation_naive")
            .step_naive(&rules, max_speed, dt);
    }

    /// Advance one step of `dt` seconds with the grid, reading agent data
    /// through the sorted index array.
    ///
    /// # Panics
    ///
    /// Panics if the simulation is not initialized.
    pub fn step_simulation_scattered_grid(&mut self, dt: f32) {
        let rules = self.config.rules;
        let max_speed = self.config.max_speed;
        self.running_mut("step_simulation_scattered_grid")
            .step_scattered(&rules, max_speed, dt);
    }

    /// Advance one step of `dt` seconds with the grid, reading agent data
    /// from buffers reordered into cell order.
    ///
    /// # Panics
    ///
    /// Panics if the simulation is not initialized.
    pub fn step_simulation_coherent_grid(&mut self, dt: f32) {
        let rules = self.config.rules;
        let max_speed = self.config.max_speed;
        self.running_mut("step_simulation_coherent_grid")
            .step_coherent(&rules, max_speed, dt);
    }

    /// Advance one step with the given method.
    pub fn step(&mut self, method: StepMethod, dt: f32) {
        match method {
            StepMethod::Naive => self.step_simulation_naive(dt),
            StepMethod::ScatteredGrid => self.step_simulation_scattered_grid(dt),
            StepMethod::CoherentGrid => self.step_simulation_coherent_grid(dt),
        }
    }

    /// Write every agent, in canonical order, as `(x, y, z, 1.0)` records
    /// into the two display buffers. Each buffer must hold at least
    /// `4 * agent_count` floats; anything past that is left alone.
    ///
    /// # Panics
    ///
    /// Panics if the simulation is not initialized.
    pub fn copy_boids_to_vbo(&self, positions_out: &mut [f32], velocities_out: &mut [f32]) -> Result<()> {
        let running = self.running("copy_boids_to_vbo");
        write_records(&running.store.positions, positions_out)?;
        write_records(&running.store.velocities, velocities_out)?;
        Ok(())
    }

    /// Release every buffer.
    ///
    /// # Panics
    ///
    /// Panics if the simulation is not initialized, including a second call.
    pub fn end_simulation(&mut self) {
        let running = self.running.take();
        match running {
            Some(running) => info!(steps = running.steps, "simulation ended"),
            None => panic!("end_simulation called while the simulation is not initialized"),
        }
    }

    /// Run the built-in self checks against a private flock. The running
    /// simulation, if any, is not touched.
    pub fn unit_test(&self) -> bool {
        selftest::run(&self.config)
    }

    /// Current agents, or `None` when uninitialized.
    pub fn agents(&self) -> Option<&AgentStore> {
        self.running.as_ref().map(|r| &r.store)
    }

    /// Number of agents, or 0 when uninitialized.
    pub fn agent_count(&self) -> usize {
        self.agents().map_or(0, AgentStore::len)
    }

    /// The fixed grid, or `None` when uninitialized.
    pub fn grid(&self) -> Option<&UniformGrid> {
        self.running.as_ref().map(|r| &r.grid)
    }

    /// Cell ranges from the most recent grid step.
    pub fn cell_table(&self) -> Option<&CellTable> {
        self.running.as_ref().map(|r| &r.cells)
    }

    /// Agent indices in cell order from the most recent grid step.
    pub fn sorted_agent_indices(&self) -> Option<&[u32]> {
        self.running.as_ref().map(|r| r.sorted_agents.as_slice())
    }

    /// Steps taken since initialization.
    pub fn steps_taken(&self) -> u64 {
        self.running.as_ref().map_or(0, |r| r.steps)
    }
}

/// Reject stores the step pipelines cannot index or bin.
fn check_agents(store: &AgentStore) -> Result<()> {
    if store.positions.len() != store.velocities.len() {
        return Err(SimulationError::InvalidConfig(format!(
            "agent store has {} positions but {} velocities",
            store.positions.len(),
            store.velocities.len()
        )));
    }
    if let Some(i) = store.positions.iter().position(|p| !p.is_finite()) {
        return Err(SimulationError::InvalidConfig(format!(
            "agent {i} has a non-finite position {}",
            store.positions[i]
        )));
    }
    if let Some(i) = store.velocities.iter().position(|v| !v.is_finite()) {
        return Err(SimulationError::InvalidConfig(format!(
            "agent {i} has a non-finite velocity {}",
            store.velocities[i]
        )));
    }
    Ok(())
}

fn write_records(src: &[Vec3], out: &mut [f32]) -> Result<()> {
    let expected = src.len() * 4;
    if out.len() < expected {
        return Err(SimulationError::OutputBufferSize {
            expected,
            actual: out.len(),
        });
    }
    let records: &mut [[f32; 4]] = bytemuck::cast_slice_mut(&mut out[..expected]);
    records
        .par_iter_mut()
        .zip(src.par_iter())
        .for_each(|(record, v)| *record = v.extend(1.0).to_array());
    Ok(())
}

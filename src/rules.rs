//! Flocking rules.
//!
//! Each agent's velocity change is the sum of three rules evaluated over the
//! agents near it:
//!
//! - **Cohesion** - steer a fraction of the way toward the centroid of
//!   neighbors within the cohesion radius.
//! - **Separation** - push away from every neighbor within the separation
//!   radius, linearly in the offset.
//! - **Alignment** - steer a fraction of the way toward the average velocity
//!   of neighbors within the alignment radius.
//!
//! A rule with no neighbors in range contributes nothing.
//!
//! The three drivers differ only in which candidates they hand to
//! [`FlockAccumulator`]:
//!
//! | Driver | Candidates | Fetch |
//! |--------|------------|-------|
//! | [`naive_velocity_change`] | every other agent | direct |
//! | [`scattered_velocity_change`] | agents in nearby cells | through the sorted index array |
//! | [`coherent_velocity_change`] | agents in nearby cells | direct, from cell-sorted buffers |
//!
//! Distances are plain Euclidean and do not wrap around the volume.

use glam::Vec3;

use crate::config::FlockingRules;
use crate::sort::CellTable;
use crate::spatial::UniformGrid;

/// Running sums for the three rules around one agent.
#[derive(Clone, Copy, Debug)]
pub struct FlockAccumulator {
    position: Vec3,
    velocity: Vec3,
    cohesion_radius_sq: f32,
    separation_radius_sq: f32,
    alignment_radius_sq: f32,
    center_sum: Vec3,
    center_count: u32,
    separation_sum: Vec3,
    velocity_sum: Vec3,
    velocity_count: u32,
}

impl FlockAccumulator {
    /// Start accumulating around an agent at `position` moving at `velocity`.
    pub fn new(rules: &FlockingRules, position: Vec3, velocity: Vec3) -> Self {
        Self {
            position,
            velocity,
            cohesion_radius_sq: rules.cohesion_radius * rules.cohesion_radius,
            separation_radius_sq: rules.separation_radius * rules.separation_radius,
            alignment_radius_sq: rules.alignment_radius * rules.alignment_radius,
            center_sum: Vec3::ZERO,
            center_count: 0,
            separation_sum: Vec3::ZERO,
            velocity_sum: Vec3::ZERO,
            velocity_count: 0,
        }
    }

    /// Feed one other agent. The caller excludes the agent itself.
    #[inline]
    pub fn visit(&mut self, other_position: Vec3, other_velocity: Vec3) {
        let offset = other_position - self.position;
        let dist_sq = offset.length_squared();

        if dist_sq < self.cohesion_radius_sq {
            self.center_sum += other_position;
            self.center_count += 1;
        }
        if dist_sq < self.separation_radius_sq {
            self.separation_sum -= offset;
        }
        if dist_sq < self.alignment_radius_sq {
            self.velocity_sum += other_velocity;
            self.velocity_count += 1;
        }
    }

    /// Combined velocity change of all three rules.
    pub fn velocity_change(&self, rules: &FlockingRules) -> Vec3 {
        let mut delta = Vec3::ZERO;

        if self.center_count > 0 {
            let center = self.center_sum / self.center_count as f32;
            delta += (center - self.position) * rules.cohesion_scale;
        }

        delta += self.separation_sum * rules.separation_scale;

        if self.velocity_count > 0 {
            let average = self.velocity_sum / self.velocity_count as f32;
            delta += (average - self.velocity) * rules.alignment_scale;
        }

        delta
    }
}

/// Velocity change of agent `index`, scanning every other agent.
pub fn naive_velocity_change(
    rules: &FlockingRules,
    index: usize,
    positions: &[Vec3],
    velocities: &[Vec3],
) -> Vec3 {
    let mut acc = FlockAccumulator::new(rules, positions[index], velocities[index]);
    for (other, (&position, &velocity)) in positions.iter().zip(velocities).enumerate() {
        if other != index {
            acc.visit(position, velocity);
        }
    }
    acc.velocity_change(rules)
}

/// Velocity change of agent `index`, scanning the cells around it and
/// fetching each candidate through `sorted_agents`.
pub fn scattered_velocity_change(
    rules: &FlockingRules,
    grid: &UniformGrid,
    cells: &CellTable,
    sorted_agents: &[u32],
    index: usize,
    positions: &[Vec3],
    velocities: &[Vec3],
) -> Vec3 {
    let position = positions[index];
    let mut acc = FlockAccumulator::new(rules, position, velocities[index]);
    for cell in grid.neighborhood(position, rules.max_radius()) {
        for &other in &sorted_agents[cells.range(cell)] {
            let other = other as usize;
            if other != index {
                acc.visit(positions[other], velocities[other]);
            }
        }
    }
    acc.velocity_change(rules)
}

/// Velocity change of the agent in sorted slot `slot`, reading candidates
/// straight out of the cell-sorted buffers.
pub fn coherent_velocity_change(
    rules: &FlockingRules,
    grid: &UniformGrid,
    cells: &CellTable,
    slot: usize,
    sorted_positions: &[Vec3],
    sorted_velocities: &[Vec3],
) -> Vec3 {
    let position = sorted_positions[slot];
    let mut acc = FlockAccumulator::new(rules, position, sorted_velocities[slot]);
    for cell in grid.neighborhood(position, rules.max_radius()) {
        let range = cells.range(cell);
        let start = range.start;
        let members = sorted_positions[range.clone()]
            .iter()
            .zip(&sorted_velocities[range]);
        for (offset, (&other_position, &other_velocity)) in members.enumerate() {
            if start + offset != slot {
                acc.visit(other_position, other_velocity);
            }
        }
    }
    acc.velocity_change(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> FlockingRules {
        FlockingRules::default()
    }

    #[test]
    fn test_no_neighbors_no_change() {
        let acc = FlockAccumulator::new(&rules(), Vec3::ZERO, Vec3::X);
        assert_eq!(acc.velocity_change(&rules()), Vec3::ZERO);
    }

    #[test]
    fn test_far_neighbor_ignored() {
        let mut acc = FlockAccumulator::new(&rules(), Vec3::ZERO, Vec3::X);
        acc.visit(Vec3::new(6.0, 0.0, 0.0), Vec3::Y);
        assert_eq!(acc.velocity_change(&rules()), Vec3::ZERO);
    }

    #[test]
    fn test_radius_is_exclusive() {
        let mut acc = FlockAccumulator::new(&rules(), Vec3::ZERO, Vec3::ZERO);
        acc.visit(Vec3::new(5.0, 0.0, 0.0), Vec3::Y);
        assert_eq!(acc.velocity_change(&rules()), Vec3::ZERO);
    }

    #[test]
    fn test_cohesion_only() {
        // 4 units away: inside cohesion and alignment, outside separation
        let r = rules();
        let mut acc = FlockAccumulator::new(&r, Vec3::ZERO, Vec3::ZERO);
        acc.visit(Vec3::new(4.0, 0.0, 0.0), Vec3::ZERO);
        let dv = acc.velocity_change(&r);
        assert!((dv - Vec3::new(4.0 * r.cohesion_scale, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_separation_points_away() {
        let r = FlockingRules::default().with_cohesion(1.0, 0.0).with_alignment(1.0, 0.0);
        let mut acc = FlockAccumulator::new(&r, Vec3::ZERO, Vec3::ZERO);
        acc.visit(Vec3::new(0.0, 2.0, 0.0), Vec3::ZERO);
        acc.visit(Vec3::new(0.0, 0.0, -1.0), Vec3::ZERO);
        let dv = acc.velocity_change(&r);
        let expected = Vec3::new(0.0, -2.0, 1.0) * r.separation_scale;
        assert!((dv - expected).length() < 1e-6);
    }

    #[test]
    fn test_alignment_steers_toward_average() {
        let r = FlockingRules::default().with_cohesion(1.0, 0.0).with_separation(1.0, 0.0);
        let mut acc = FlockAccumulator::new(&r, Vec3::ZERO, Vec3::X);
        acc.visit(Vec3::new(4.0, 0.0, 0.0), Vec3::Y);
        acc.visit(Vec3::new(-4.0, 0.0, 0.0), Vec3::Y * 3.0);
        let dv = acc.velocity_change(&r);
        let expected = (Vec3::Y * 2.0 - Vec3::X) * r.alignment_scale;
        assert!((dv - expected).length() < 1e-6);
    }

    #[test]
    fn test_drivers_agree_on_small_flock() {
        let r = rules();
        let grid = UniformGrid::new(Vec3::splat(-20.0), 40.0, 10.0);
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(-1.0, 3.0, 1.0),
            Vec3::new(9.5, 0.0, 0.0),
            Vec3::new(-15.0, -15.0, -15.0),
        ];
        let velocities = vec![Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X, Vec3::ONE];
        let n = positions.len();

        let keys: Vec<u32> = positions.iter().map(|&p| grid.cell_index(p)).collect();
        let values: Vec<u32> = (0..n as u32).collect();
        let mut counts = vec![0; grid.cell_count()];
        let mut sorted_keys = vec![0; n];
        let mut sorted_agents = vec![0; n];
        crate::sort::sort_by_cell(&keys, &values, &mut counts, &mut sorted_keys, &mut sorted_agents);
        let mut table = CellTable::new(grid.cell_count()).unwrap();
        table.rebuild(&counts);

        let sorted_positions: Vec<Vec3> = sorted_agents.iter().map(|&i| positions[i as usize]).collect();
        let sorted_velocities: Vec<Vec3> = sorted_agents.iter().map(|&i| velocities[i as usize]).collect();

        for (slot, &agent) in sorted_agents.iter().enumerate() {
            let i = agent as usize;
            let naive = naive_velocity_change(&r, i, &positions, &velocities);
            let scattered = scattered_velocity_change(&r, &grid, &table, &sorted_agents, i, &positions, &velocities);
            let coherent = coherent_velocity_change(&r, &grid, &table, slot, &sorted_positions, &sorted_velocities);
            assert!((naive - scattered).length() < 1e-5, "agent {i}: {naive} vs {scattered}");
            assert!((naive - coherent).length() < 1e-5, "agent {i}: {naive} vs {coherent}");
        }
    }
}

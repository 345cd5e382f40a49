//! Built-in self checks behind [`Boids::unit_test`](crate::Boids::unit_test).
//!
//! The checks run on a private flock spawned from the caller's configuration
//! and report through `tracing`.

use glam::Vec3;
use tracing::{info, warn};

use crate::agents::AgentStore;
use crate::config::SimulationConfig;
use crate::simulation::{Boids, StepMethod};
use crate::sort::sort_by_cell;

/// Agents in the private flock used for the equivalence check.
const SELF_TEST_AGENTS: usize = 2_000;
/// Relative tolerance between step methods.
const TOLERANCE: f32 = 1e-4;

/// Run every check. Returns true if all pass.
pub fn run(config: &SimulationConfig) -> bool {
    let sort_ok = check_sort();
    let equivalence_ok = check_equivalence(config);

    let passed = sort_ok && equivalence_ok;
    if passed {
        info!("self test passed");
    } else {
        warn!(sort_ok, equivalence_ok, "self test failed");
    }
    passed
}

/// Sort a fixed key/value example and check the result.
fn check_sort() -> bool {
    let keys: [u32; 10] = [0, 0, 2, 4, 2, 4, 0, 6, 1, 5];
    let values: [u32; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
    let mut counts = [0u32; 7];
    let mut sorted_keys = [0u32; 10];
    let mut sorted_values = [0u32; 10];

    info!(?keys, ?values, "before bucket sort");
    sort_by_cell(&keys, &values, &mut counts, &mut sorted_keys, &mut sorted_values);
    info!(?sorted_keys, ?sorted_values, "after bucket sort");

    let ordered = sorted_keys.windows(2).all(|w| w[0] <= w[1]);
    let pairs_kept = sorted_keys
        .iter()
        .zip(&sorted_values)
        .all(|(&k, &v)| keys[v as usize] == k);
    let mut seen = sorted_values;
    seen.sort_unstable();
    let permutation = seen == values;

    ordered && pairs_kept && permutation
}

/// Step the same flock once with every method and compare.
fn check_equivalence(config: &SimulationConfig) -> bool {
    let store = match AgentStore::random(
        SELF_TEST_AGENTS,
        config.scene_scale,
        config.initial_speed,
        config.seed,
    ) {
        Ok(store) => store,
        Err(err) => {
            warn!(%err, "self test could not spawn its flock");
            return false;
        }
    };

    let mut results = Vec::with_capacity(StepMethod::ALL.len());
    for method in StepMethod::ALL {
        let mut boids = Boids::new(config.clone());
        if let Err(err) = boids.init_simulation_with_agents(store.clone(), 128) {
            warn!(%err, %method, "self test could not start");
            return false;
        }
        boids.step(method, 0.2);

        if method != StepMethod::Naive && !check_conservation(&boids) {
            warn!(%method, "cell ranges do not cover every agent exactly once");
            return false;
        }

        match boids.agents() {
            Some(agents) => results.push((method, agents.clone())),
            None => return false,
        }
        boids.end_simulation();
    }

    let (_, reference) = &results[0];
    for (method, result) in &results[1..] {
        let worst = max_relative_difference(reference, result, config.extent());
        info!(%method, worst, "compared against naive");
        if worst > TOLERANCE {
            return false;
        }
    }
    true
}

/// Every agent appears in exactly one cell range.
pub(crate) fn check_conservation(boids: &Boids) -> bool {
    let (Some(cells), Some(sorted)) = (boids.cell_table(), boids.sorted_agent_indices()) else {
        return false;
    };
    let n = boids.agent_count();
    if cells.occupancy() != n {
        return false;
    }

    let mut seen = vec![false; n];
    for cell in 0..cells.cell_count() as u32 {
        for &agent in &sorted[cells.range(cell)] {
            let slot = &mut seen[agent as usize];
            if *slot {
                return false;
            }
            *slot = true;
        }
    }
    seen.into_iter().all(|s| s)
}

/// Worst per-axis relative difference between two flocks. Positions are
/// compared around a torus of edge `extent`, so an agent that wrapped in one
/// flock and not the other counts by its true displacement.
pub(crate) fn max_relative_difference(a: &AgentStore, b: &AgentStore, extent: f32) -> f32 {
    let positions = a
        .positions
        .iter()
        .zip(&b.positions)
        .map(|(x, y)| relative_difference(*x, *y, Some(extent)));
    let velocities = a
        .velocities
        .iter()
        .zip(&b.velocities)
        .map(|(x, y)| relative_difference(*x, *y, None));
    positions.chain(velocities).fold(0.0, f32::max)
}

fn relative_difference(a: Vec3, b: Vec3, period: Option<f32>) -> f32 {
    let mut delta = (a - b).abs();
    if let Some(extent) = period {
        delta = delta.min(Vec3::splat(extent) - delta);
    }
    let scale = a.abs().max(b.abs()).max_element().max(1.0);
    delta.max_element() / scale
}

//! End-to-end tests for the three step methods.
//!
//! These drive the public API only: build a flock, step it, and inspect
//! the agents and cell table afterwards.

use flock_grid::prelude::*;

const DT: f32 = 0.2;

fn approx_eq(a: Vec3, b: Vec3, tolerance: f32) -> bool {
    (a - b).abs().max_element() <= tolerance
}

/// Worst per-axis relative difference, with positions measured around the
/// torus of edge `extent`.
fn max_relative_difference(a: &AgentStore, b: &AgentStore, extent: f32) -> f32 {
    let relative = |x: Vec3, y: Vec3, delta: Vec3| {
        let scale = x.abs().max(y.abs()).max_element().max(1.0);
        delta.max_element() / scale
    };
    let positions = a.positions.iter().zip(&b.positions).map(|(&x, &y)| {
        let delta = (x - y).abs();
        relative(x, y, delta.min(Vec3::splat(extent) - delta))
    });
    let velocities = a
        .velocities
        .iter()
        .zip(&b.velocities)
        .map(|(&x, &y)| relative(x, y, (x - y).abs()));
    positions.chain(velocities).fold(0.0, f32::max)
}

/// Start a simulation from `store`, take `steps` steps with `method`, and
/// return the resulting agents.
fn run(config: &SimulationConfig, store: &AgentStore, method: StepMethod, steps: usize, wg: usize) -> AgentStore {
    let mut boids = Boids::new(config.clone());
    boids.init_simulation_with_agents(store.clone(), wg).unwrap();
    for _ in 0..steps {
        boids.step(method, DT);
    }
    let agents = boids.agents().unwrap().clone();
    boids.end_simulation();
    agents
}

fn assert_conserved(boids: &Boids) {
    let cells = boids.cell_table().unwrap();
    let sorted = boids.sorted_agent_indices().unwrap();
    let n = boids.agent_count();
    assert_eq!(cells.occupancy(), n);

    let mut seen = vec![0u32; n];
    for cell in 0..cells.cell_count() as u32 {
        for &agent in &sorted[cells.range(cell)] {
            seen[agent as usize] += 1;
        }
    }
    assert!(seen.iter().all(|&count| count == 1), "agent missing or duplicated");
}

// ============================================================================
// Method equivalence
// ============================================================================

#[test]
fn test_grid_methods_match_naive() {
    let config = SimulationConfig::new().with_scene_scale(30.0).with_seed(7);
    let store = AgentStore::random(3_000, config.scene_scale, config.initial_speed, config.seed).unwrap();

    let naive = run(&config, &store, StepMethod::Naive, 1, 128);
    let scattered = run(&config, &store, StepMethod::ScatteredGrid, 1, 128);
    let coherent = run(&config, &store, StepMethod::CoherentGrid, 1, 128);

    assert!(max_relative_difference(&naive, &scattered, config.extent()) <= 1e-4);
    assert!(max_relative_difference(&naive, &coherent, config.extent()) <= 1e-4);
}

#[test]
fn test_fine_grid_matches_naive() {
    // cell width equal to the search radius: 27-cell neighborhood
    let config = SimulationConfig::new()
        .with_scene_scale(25.0)
        .with_cell_width_factor(1.0)
        .with_seed(99);
    let store = AgentStore::random(2_000, config.scene_scale, config.initial_speed, config.seed).unwrap();

    let naive = run(&config, &store, StepMethod::Naive, 1, 64);
    let scattered = run(&config, &store, StepMethod::ScatteredGrid, 1, 64);
    let coherent = run(&config, &store, StepMethod::CoherentGrid, 1, 64);

    assert!(max_relative_difference(&naive, &scattered, config.extent()) <= 1e-4);
    assert!(max_relative_difference(&naive, &coherent, config.extent()) <= 1e-4);
}

#[test]
fn test_workgroup_size_does_not_change_results() {
    let config = SimulationConfig::new().with_scene_scale(20.0).with_seed(3);
    let store = AgentStore::random(777, config.scene_scale, config.initial_speed, config.seed).unwrap();

    for method in StepMethod::ALL {
        let single = run(&config, &store, method, 3, 1);
        let wide = run(&config, &store, method, 3, 256);
        assert_eq!(single, wide, "{method} depends on workgroup size");
    }
}

#[test]
fn test_same_seed_same_flock() {
    let config = SimulationConfig::new().with_scene_scale(20.0).with_seed(1234);

    let mut a = Boids::new(config.clone());
    let mut b = Boids::new(config);
    a.init_simulation(200, 32).unwrap();
    b.init_simulation(200, 32).unwrap();

    assert_eq!(a.agents(), b.agents());
}

#[test]
fn test_wrapped_agent_compares_by_displacement() {
    // one flock has the agent just inside the far face, the other just past it
    let config = SimulationConfig::new().with_scene_scale(20.0);
    let inside = AgentStore::from_parts(vec![Vec3::new(19.9999, 0.0, 0.0)], vec![Vec3::X]);
    let wrapped = AgentStore::from_parts(vec![Vec3::new(-20.0, 0.0, 0.0)], vec![Vec3::X]);

    assert!(max_relative_difference(&inside, &wrapped, config.extent()) <= 1e-4);
}

// ============================================================================
// Grid bookkeeping
// ============================================================================

#[test]
fn test_every_agent_in_exactly_one_cell() {
    let config = SimulationConfig::new().with_scene_scale(15.0).with_seed(5);
    let mut boids = Boids::new(config);
    boids.init_simulation(1_500, 100).unwrap();

    for step in 0..6 {
        let method = if step % 2 == 0 {
            StepMethod::ScatteredGrid
        } else {
            StepMethod::CoherentGrid
        };
        boids.step(method, DT);
        assert_conserved(&boids);
    }

    let grid = boids.grid().unwrap();
    let cells = boids.cell_table().unwrap();
    assert_eq!(cells.cell_count(), grid.cell_count());
}

#[test]
fn test_positions_stay_inside_volume() {
    let config = SimulationConfig::new().with_scene_scale(10.0).with_max_speed(5.0);
    let mut boids = Boids::new(config.clone());
    boids.init_simulation(500, 32).unwrap();

    for _ in 0..20 {
        boids.step_simulation_coherent_grid(1.0);
    }

    let s = config.scene_scale;
    for p in &boids.agents().unwrap().positions {
        assert!(p.cmpge(Vec3::splat(-s)).all() && p.cmplt(Vec3::splat(s)).all(), "{p} escaped");
    }
}

// ============================================================================
// Single-agent behavior
// ============================================================================

#[test]
fn test_isolated_agent_moves_by_velocity() {
    let config = SimulationConfig::new().with_scene_scale(50.0);
    let velocity = Vec3::new(0.5, -0.25, 0.1);
    let store = AgentStore::from_parts(
        vec![Vec3::new(-10.0, 4.0, 0.0), Vec3::new(30.0, 30.0, 30.0)],
        vec![velocity, Vec3::ZERO],
    );

    for method in StepMethod::ALL {
        let after = run(&config, &store, method, 1, 8);
        assert_eq!(after.velocities[0], velocity, "{method} changed an isolated velocity");
        assert!(approx_eq(after.positions[0], Vec3::new(-9.9, 3.95, 0.02), 1e-5));
        assert_eq!(after.velocities[1], Vec3::ZERO);
    }
}

#[test]
fn test_speed_is_clamped() {
    let config = SimulationConfig::new().with_scene_scale(50.0).with_max_speed(1.0);
    let store = AgentStore::from_parts(vec![Vec3::ZERO], vec![Vec3::new(3.0, 4.0, 0.0)]);

    for method in StepMethod::ALL {
        let after = run(&config, &store, method, 1, 1);
        let v = after.velocities[0];
        assert!((v.length() - 1.0).abs() < 1e-5);
        assert!(approx_eq(v, Vec3::new(0.6, 0.8, 0.0), 1e-5));
    }
}

#[test]
fn test_agent_wraps_across_boundary() {
    let config = SimulationConfig::new().with_scene_scale(20.0).with_max_speed(2.0);
    let store = AgentStore::from_parts(
        vec![Vec3::new(19.9, -19.9, 0.0)],
        vec![Vec3::new(1.0, -1.0, 0.0)],
    );

    for method in StepMethod::ALL {
        let after = run(&config, &store, method, 1, 4);
        assert!(approx_eq(after.positions[0], Vec3::new(-19.9, 19.9, 0.0), 1e-4));
    }
}

// ============================================================================
// Two-agent separation
// ============================================================================

#[test]
fn test_pair_inside_separation_radius_only() {
    // 2 apart: inside separation (3), outside cohesion and alignment (1)
    let rules = FlockingRules::default()
        .with_cohesion(1.0, 0.01)
        .with_separation(3.0, 0.1)
        .with_alignment(1.0, 0.1);
    let config = SimulationConfig::new().with_scene_scale(20.0).with_rules(rules);
    let store = AgentStore::from_parts(
        vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)],
        vec![Vec3::ZERO, Vec3::ZERO],
    );

    for method in StepMethod::ALL {
        let after = run(&config, &store, method, 1, 2);

        assert!(approx_eq(after.velocities[0], Vec3::new(-0.2, 0.0, 0.0), 1e-6));
        assert!(approx_eq(after.velocities[1], Vec3::new(0.2, 0.0, 0.0), 1e-6));

        let a_moved = after.positions[0] - store.positions[0];
        let b_moved = after.positions[1] - store.positions[1];
        let axis = (store.positions[1] - store.positions[0]).normalize();
        assert!(a_moved.dot(axis) < 0.0 && b_moved.dot(axis) > 0.0);
        assert!(a_moved.cross(axis).length() < 1e-6);
        assert!(b_moved.cross(axis).length() < 1e-6);
        assert!(approx_eq(after.positions[0], Vec3::new(-0.04, 0.0, 0.0), 1e-5));
        assert!(approx_eq(after.positions[1], Vec3::new(2.04, 0.0, 0.0), 1e-5));
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
#[should_panic(expected = "not initialized")]
fn test_step_after_end_panics() {
    let mut boids = Boids::new(SimulationConfig::new().with_scene_scale(10.0));
    boids.init_simulation(50, 16).unwrap();
    boids.step_simulation_naive(DT);
    boids.end_simulation();
    boids.step_simulation_naive(DT);
}

#[test]
#[should_panic(expected = "not initialized")]
fn test_copy_after_end_panics() {
    let mut boids = Boids::new(SimulationConfig::new().with_scene_scale(10.0));
    boids.init_simulation(8, 4).unwrap();
    boids.end_simulation();
    let mut out = vec![0.0; 32];
    let mut vel = vec![0.0; 32];
    let _ = boids.copy_boids_to_vbo(&mut out, &mut vel);
}

#[test]
fn test_unit_test_reports_success() {
    let boids = Boids::new(SimulationConfig::new().with_scene_scale(25.0));
    assert!(boids.unit_test());
    assert!(!boids.is_running());
}

#[test]
fn test_config_file_round_trip_through_toml() {
    let config = SimulationConfig::from_toml_str(
        r#"
        scene_scale = 40.0
        max_speed = 2.0

        [rules]
        separation_radius = 4.0
        "#,
    )
    .unwrap();

    let mut boids = Boids::new(config);
    boids.init_simulation(300, 64).unwrap();
    boids.step_simulation_scattered_grid(DT);
    assert_eq!(boids.config().rules.separation_radius, 4.0);
    assert_eq!(boids.grid().unwrap().cell_width, 10.0);
}
